use std::collections::BTreeMap;

use serde::{Serialize, Serializer};
use serde_json::Value;

/// Generated value for a column.
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratedValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Fixed-point number: `units / 10^scale`.
    Decimal { units: i64, scale: u32 },
    Text(String),
}

/// A fully assembled row, keyed by column name.
pub type Row = BTreeMap<String, GeneratedValue>;

impl GeneratedValue {
    pub fn is_null(&self) -> bool {
        matches!(self, GeneratedValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            GeneratedValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            GeneratedValue::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Convert a config literal. Arrays and objects are kept as their JSON
    /// text.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => GeneratedValue::Null,
            Value::Bool(value) => GeneratedValue::Bool(*value),
            Value::Number(number) => match number.as_i64() {
                Some(value) => GeneratedValue::Int(value),
                None => GeneratedValue::Float(number.as_f64().unwrap_or_default()),
            },
            Value::String(value) => GeneratedValue::Text(value.clone()),
            other => GeneratedValue::Text(other.to_string()),
        }
    }

    /// Text form used for condition matching and dedup keys. `None` for NULL.
    pub fn render(&self) -> Option<String> {
        match self {
            GeneratedValue::Null => None,
            GeneratedValue::Bool(value) => Some(value.to_string()),
            GeneratedValue::Int(value) => Some(value.to_string()),
            GeneratedValue::Float(value) => Some(value.to_string()),
            GeneratedValue::Decimal { units, scale } => Some(decimal_text(*units, *scale)),
            GeneratedValue::Text(value) => Some(value.clone()),
        }
    }

    /// Cut text to at most `max_chars` characters.
    pub fn truncated(self, max_chars: Option<u32>) -> Self {
        match (self, max_chars) {
            (GeneratedValue::Text(value), Some(max)) if value.chars().count() > max as usize => {
                GeneratedValue::Text(value.chars().take(max as usize).collect())
            }
            (value, _) => value,
        }
    }
}

impl Serialize for GeneratedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            GeneratedValue::Null => serializer.serialize_none(),
            GeneratedValue::Bool(value) => serializer.serialize_bool(*value),
            GeneratedValue::Int(value) => serializer.serialize_i64(*value),
            GeneratedValue::Float(value) => serializer.serialize_f64(*value),
            GeneratedValue::Decimal { units, scale } => {
                serializer.serialize_f64(*units as f64 / 10_f64.powi(*scale as i32))
            }
            GeneratedValue::Text(value) => serializer.serialize_str(value),
        }
    }
}

/// Stable key for dedup of values that are not `Eq` (floats).
pub(crate) fn value_key(value: &GeneratedValue) -> String {
    match value {
        GeneratedValue::Null => "<null>".to_string(),
        GeneratedValue::Bool(value) => format!("b:{value}"),
        GeneratedValue::Int(value) => format!("i:{value}"),
        GeneratedValue::Float(value) => format!("f:{value}"),
        GeneratedValue::Decimal { units, scale } => format!("d:{}", decimal_text(*units, *scale)),
        GeneratedValue::Text(value) => format!("t:{value}"),
    }
}

fn decimal_text(units: i64, scale: u32) -> String {
    if scale == 0 {
        return units.to_string();
    }
    let factor = 10_u64.pow(scale);
    let magnitude = units.unsigned_abs();
    let sign = if units < 0 { "-" } else { "" };
    format!(
        "{sign}{}.{:0width$}",
        magnitude / factor,
        magnitude % factor,
        width = scale as usize
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_literals_convert() {
        assert_eq!(GeneratedValue::from_json(&Value::from(3)), GeneratedValue::Int(3));
        assert_eq!(
            GeneratedValue::from_json(&Value::from("x")),
            GeneratedValue::Text("x".to_string())
        );
        assert!(GeneratedValue::from_json(&Value::Null).is_null());
    }

    #[test]
    fn truncation_counts_characters() {
        let value = GeneratedValue::Text("ação_123".to_string()).truncated(Some(4));
        assert_eq!(value, GeneratedValue::Text("ação".to_string()));
        assert_eq!(
            GeneratedValue::Int(12345).truncated(Some(2)),
            GeneratedValue::Int(12345)
        );
    }

    #[test]
    fn decimals_render_at_their_scale() {
        let value = GeneratedValue::Decimal {
            units: 3_000_050,
            scale: 2,
        };
        assert_eq!(value.render().as_deref(), Some("30000.50"));
        assert_eq!(
            GeneratedValue::Decimal { units: -7, scale: 3 }.render().as_deref(),
            Some("-0.007")
        );
        assert_eq!(serde_json::to_string(&value).expect("json"), "30000.5");
    }
}
