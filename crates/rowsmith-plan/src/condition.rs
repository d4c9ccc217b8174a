use regex::Regex;

use crate::errors::ConfigError;

/// Comparison applied to the discriminator column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionOp {
    Eq,
    NotEq,
    In,
}

/// Parsed FK condition such as `owner_type = 'user'` or
/// `kind IN ('a', 'b')`.
///
/// Literals are compared as text against the discriminator's rendered value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    column: String,
    op: ConditionOp,
    literals: Vec<String>,
}

impl Condition {
    pub fn parse(expression: &str) -> Result<Self, ConfigError> {
        let invalid = |detail: &str| ConfigError::InvalidCondition {
            condition: expression.to_string(),
            detail: detail.to_string(),
        };

        if let Some((column, body)) = parse_in_list(expression) {
            let literals = parse_literals(&body).ok_or_else(|| invalid("malformed IN list"))?;
            return Ok(Self {
                column,
                op: ConditionOp::In,
                literals,
            });
        }

        let (column, op, literal) =
            parse_comparison(expression).ok_or_else(|| invalid("expected column = 'value'"))?;
        Ok(Self {
            column,
            op,
            literals: vec![literal],
        })
    }

    /// Column the condition reads from the same row.
    pub fn discriminator(&self) -> &str {
        &self.column
    }

    pub fn op(&self) -> ConditionOp {
        self.op
    }

    /// Evaluate against the discriminator's current value. A missing or NULL
    /// discriminator never matches.
    pub fn matches(&self, value: Option<&str>) -> bool {
        let Some(value) = value else {
            return false;
        };
        match self.op {
            ConditionOp::Eq | ConditionOp::In => {
                self.literals.iter().any(|literal| literal == value)
            }
            ConditionOp::NotEq => self.literals.iter().all(|literal| literal != value),
        }
    }
}

fn parse_comparison(expr: &str) -> Option<(String, ConditionOp, String)> {
    let re = Regex::new(r"^\s*(\w+)\s*(==|=|!=|<>)\s*'((?:[^']|'')*)'\s*$").ok()?;
    let caps = re.captures(expr)?;
    let op = match &caps[2] {
        "=" | "==" => ConditionOp::Eq,
        _ => ConditionOp::NotEq,
    };
    Some((caps[1].to_string(), op, unescape(&caps[3])))
}

fn parse_in_list(expr: &str) -> Option<(String, String)> {
    let re = Regex::new(r"(?i)^\s*(\w+)\s+in\s*\((.*)\)\s*$").ok()?;
    let caps = re.captures(expr)?;
    Some((caps[1].to_string(), caps[2].to_string()))
}

fn parse_literals(body: &str) -> Option<Vec<String>> {
    let re = Regex::new(r"^\s*'((?:[^']|'')*)'\s*(,|$)").ok()?;
    let mut literals = Vec::new();
    let mut rest = body;
    while !rest.trim().is_empty() {
        let caps = re.captures(rest)?;
        literals.push(unescape(&caps[1]));
        rest = &rest[caps.get(0)?.end()..];
        if caps[2].is_empty() {
            break;
        }
    }
    if literals.is_empty() || !rest.trim().is_empty() {
        return None;
    }
    Some(literals)
}

fn unescape(literal: &str) -> String {
    literal.replace("''", "'")
}
