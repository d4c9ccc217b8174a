//! Format placeholder engine.
//!
//! Templates use `{}`-style placeholders with an optional `:[0][width][radix]`
//! spec, e.g. `CODE_{:03d}_{:02x}`. The spec only affects rendering; the
//! value range of each slot is configured separately.

use rand::Rng;
use regex::Regex;

use crate::errors::FormatError;

/// Range used by slots past the configured list.
pub const DEFAULT_SLOT_RANGE: (i64, i64) = (0, 9);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Radix {
    Decimal,
    LowerHex,
    UpperHex,
    Octal,
    Binary,
}

/// Rendering spec of one placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotSpec {
    pub width: usize,
    pub zero_pad: bool,
    pub radix: Radix,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Slot(usize),
}

/// Parsed template: literal segments interleaved with ordered slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
    slots: Vec<SlotSpec>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, FormatError> {
        let token = Regex::new(r"\{\{|\}\}|\{([^{}]*)\}")
            .map_err(|_| FormatError::UnbalancedBrace(source.to_string()))?;
        let spec_re = Regex::new(r"^(?::(0)?(\d+)?([dxXob])?)?$")
            .map_err(|_| FormatError::UnbalancedBrace(source.to_string()))?;

        let mut segments = Vec::new();
        let mut slots = Vec::new();
        let mut literal = String::new();
        let mut last = 0;

        for caps in token.captures_iter(source) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            push_literal(source, &source[last..whole.start()], &mut literal)?;
            last = whole.end();

            match whole.as_str() {
                "{{" => literal.push('{'),
                "}}" => literal.push('}'),
                _ => {
                    let spec = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                    let parsed = spec_re.captures(spec).ok_or_else(|| FormatError::InvalidSpec {
                        template: source.to_string(),
                        spec: spec.to_string(),
                    })?;
                    let radix = match parsed.get(3).map(|m| m.as_str()) {
                        Some("x") => Radix::LowerHex,
                        Some("X") => Radix::UpperHex,
                        Some("o") => Radix::Octal,
                        Some("b") => Radix::Binary,
                        _ => Radix::Decimal,
                    };
                    let width = parsed
                        .get(2)
                        .and_then(|m| m.as_str().parse().ok())
                        .unwrap_or(0);
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Slot(slots.len()));
                    slots.push(SlotSpec {
                        width,
                        zero_pad: parsed.get(1).is_some(),
                        radix,
                    });
                }
            }
        }
        push_literal(source, &source[last..], &mut literal)?;
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        if slots.is_empty() {
            return Err(FormatError::NoPlaceholders(source.to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
            slots,
        })
    }

    pub fn slots(&self) -> &[SlotSpec] {
        &self.slots
    }

    /// Substitute one integer per slot. Missing values render as `0`.
    pub fn render(&self, values: &[i64]) -> String {
        let mut out = String::with_capacity(self.source.len() + 8);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Slot(idx) => {
                    let value = values.get(*idx).copied().unwrap_or_default();
                    out.push_str(&render_slot(&self.slots[*idx], value));
                }
            }
        }
        out
    }
}

fn push_literal(source: &str, text: &str, literal: &mut String) -> Result<(), FormatError> {
    if text.contains(['{', '}']) {
        return Err(FormatError::UnbalancedBrace(source.to_string()));
    }
    literal.push_str(text);
    Ok(())
}

fn render_slot(spec: &SlotSpec, value: i64) -> String {
    let magnitude = value.unsigned_abs();
    let digits = match spec.radix {
        Radix::Decimal => magnitude.to_string(),
        Radix::LowerHex => format!("{magnitude:x}"),
        Radix::UpperHex => format!("{magnitude:X}"),
        Radix::Octal => format!("{magnitude:o}"),
        Radix::Binary => format!("{magnitude:b}"),
    };
    let sign = if value < 0 { "-" } else { "" };
    let len = sign.len() + digits.len();
    if len >= spec.width {
        return format!("{sign}{digits}");
    }
    let pad = spec.width - len;
    if spec.zero_pad {
        format!("{sign}{}{digits}", "0".repeat(pad))
    } else {
        format!("{}{sign}{digits}", " ".repeat(pad))
    }
}

/// A template plus the value range of every slot.
///
/// Unique enumeration is mixed-radix with slot 0 as the least significant
/// digit, so slot `k` advances once every `Π size(slot j), j < k` indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateDomain {
    template: Template,
    ranges: Vec<(i64, i64)>,
    capacity: u64,
}

impl TemplateDomain {
    /// Bind ranges by position. Slots without a configured range use
    /// [`DEFAULT_SLOT_RANGE`]; extra ranges are ignored.
    pub fn new(template: Template, configured: &[(i64, i64)]) -> Result<Self, FormatError> {
        let mut ranges = Vec::with_capacity(template.slots.len());
        for slot in 0..template.slots.len() {
            let (min, max) = configured.get(slot).copied().unwrap_or(DEFAULT_SLOT_RANGE);
            if min > max {
                return Err(FormatError::InvertedSlotRange {
                    template: template.source.clone(),
                    slot,
                    min,
                    max,
                });
            }
            ranges.push((min, max));
        }
        let capacity = ranges
            .iter()
            .map(|range| range_size(*range))
            .try_fold(1_u64, |acc, size| acc.checked_mul(size))
            .unwrap_or(u64::MAX);
        Ok(Self {
            template,
            ranges,
            capacity,
        })
    }

    pub fn parse(format: &str, configured: &[(i64, i64)]) -> Result<Self, FormatError> {
        Self::new(Template::parse(format)?, configured)
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn ranges(&self) -> &[(i64, i64)] {
        &self.ranges
    }

    /// Number of distinct slot combinations.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Slot values of the `index`-th enumeration step (modulo capacity).
    pub fn slot_values_at(&self, index: u64) -> Vec<i64> {
        let mut rest = index % self.capacity;
        self.ranges
            .iter()
            .map(|(min, max)| {
                let size = range_size((*min, *max));
                let digit = rest % size;
                rest /= size;
                (*min as i128 + digit as i128) as i64
            })
            .collect()
    }

    pub fn value_at(&self, index: u64) -> String {
        self.template.render(&self.slot_values_at(index))
    }

    /// Longest rendering over all slot values. Each slot is longest at one of
    /// its range ends.
    pub fn max_text_len(&self) -> usize {
        self.template
            .segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => text.chars().count(),
                Segment::Slot(idx) => {
                    let spec = &self.template.slots[*idx];
                    let (min, max) = self.ranges[*idx];
                    render_slot(spec, min).len().max(render_slot(spec, max).len())
                }
            })
            .sum()
    }

    /// Independent uniform draw per slot.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        let values: Vec<i64> = self
            .ranges
            .iter()
            .map(|(min, max)| rng.random_range(*min..=*max))
            .collect();
        self.template.render(&values)
    }
}

/// Inclusive size of a range, saturating at `u64::MAX`.
pub(crate) fn range_size((min, max): (i64, i64)) -> u64 {
    let size = max as i128 - min as i128 + 1;
    u64::try_from(size.max(0)).unwrap_or(u64::MAX)
}
