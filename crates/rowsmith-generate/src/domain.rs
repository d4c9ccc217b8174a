use std::sync::Arc;

use chrono::{NaiveDateTime, TimeDelta};
use rand::Rng;
use rowsmith_core::{Column, TypeClass};
use rowsmith_plan::ColumnDomainSpec;

use crate::errors::FormatError;
use crate::template::{TemplateDomain, range_size};
use crate::value::GeneratedValue;

/// Scale used for decimal ranges on columns that declare none.
pub const DEFAULT_DECIMAL_SCALE: u32 = 2;
const MAX_DECIMAL_SCALE: u32 = 9;

/// Index-addressable set of candidate values for one column.
#[derive(Debug, Clone)]
pub enum ValueDomain {
    NumericRange { min: i64, max: i64 },
    /// Integer range rendered as digit strings, for text columns.
    DigitRange { min: i64, max: i64 },
    Decimal(DecimalRange),
    Temporal(TemporalRange),
    Values(Arc<[GeneratedValue]>),
    Template(Arc<TemplateDomain>),
    /// Distinct values of a referenced parent column (or static FK list).
    Parent(Arc<[GeneratedValue]>),
}

impl ValueDomain {
    /// Resolve a configured source against the column it fills. The column
    /// type picks the output form: digit strings for text, fixed-point at the
    /// column's scale for decimals, whole days for dates.
    pub fn for_column(spec: &ColumnDomainSpec, column: &Column) -> Result<Self, FormatError> {
        Ok(match spec {
            ColumnDomainSpec::Values(values) => ValueDomain::Values(
                values.iter().map(GeneratedValue::from_json).collect(),
            ),
            ColumnDomainSpec::NumericRange { min, max } => match column.type_class {
                TypeClass::String => ValueDomain::DigitRange {
                    min: *min,
                    max: *max,
                },
                TypeClass::Decimal | TypeClass::Float => {
                    decimal_domain(*min as f64, *max as f64, column)?
                }
                _ => ValueDomain::NumericRange {
                    min: *min,
                    max: *max,
                },
            },
            ColumnDomainSpec::DecimalRange { min, max } => match column.type_class {
                TypeClass::Integer => {
                    let (low, high) = (min.ceil(), max.floor());
                    if low > high {
                        return Err(FormatError::EmptyRange(format!(
                            "[{min}, {max}] holds no integer"
                        )));
                    }
                    ValueDomain::NumericRange {
                        min: low as i64,
                        max: high as i64,
                    }
                }
                _ => decimal_domain(*min, *max, column)?,
            },
            ColumnDomainSpec::TemporalRange {
                min,
                max,
                with_time,
            } => {
                let unit = match column.type_class {
                    TypeClass::Date => TemporalUnit::Day,
                    TypeClass::DateTime => TemporalUnit::Second,
                    _ if *with_time => TemporalUnit::Second,
                    _ => TemporalUnit::Day,
                };
                // A date-only upper bound covers that whole day.
                let end = if unit == TemporalUnit::Second && !with_time {
                    TimeDelta::try_seconds(86_399)
                        .and_then(|day| max.checked_add_signed(day))
                        .unwrap_or(*max)
                } else {
                    *max
                };
                ValueDomain::Temporal(TemporalRange::new(*min, end, unit))
            }
            ColumnDomainSpec::Template(template) => ValueDomain::Template(Arc::new(
                TemplateDomain::parse(&template.format, &template.slot_ranges)?,
            )),
        })
    }

    pub fn labels(labels: &[String]) -> Self {
        ValueDomain::Values(
            labels
                .iter()
                .map(|label| GeneratedValue::Text(label.clone()))
                .collect(),
        )
    }

    pub fn len(&self) -> u64 {
        match self {
            ValueDomain::NumericRange { min, max } | ValueDomain::DigitRange { min, max } => {
                range_size((*min, *max))
            }
            ValueDomain::Decimal(range) => range.len(),
            ValueDomain::Temporal(range) => range.len(),
            ValueDomain::Values(values) | ValueDomain::Parent(values) => values.len() as u64,
            ValueDomain::Template(template) => template.capacity(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Longest text this domain can produce, in characters. `None` when the
    /// domain emits no text.
    pub fn max_text_len(&self) -> Option<usize> {
        match self {
            ValueDomain::NumericRange { .. } | ValueDomain::Decimal(_) => None,
            ValueDomain::DigitRange { min, max } => {
                Some(min.to_string().len().max(max.to_string().len()))
            }
            ValueDomain::Temporal(range) => Some(range.unit.rendered_len()),
            ValueDomain::Values(values) | ValueDomain::Parent(values) => values
                .iter()
                .filter_map(GeneratedValue::as_str)
                .map(|text| text.chars().count())
                .max(),
            ValueDomain::Template(template) => Some(template.max_text_len()),
        }
    }

    /// Value at `index`, wrapping modulo [`len`](Self::len).
    pub fn value_at(&self, index: u64) -> GeneratedValue {
        let len = self.len();
        if len == 0 {
            return GeneratedValue::Null;
        }
        let index = index % len;
        match self {
            ValueDomain::NumericRange { min, .. } => {
                GeneratedValue::Int((*min as i128 + index as i128) as i64)
            }
            ValueDomain::DigitRange { min, .. } => {
                GeneratedValue::Text((*min as i128 + index as i128).to_string())
            }
            ValueDomain::Decimal(range) => range.value_at(index),
            ValueDomain::Temporal(range) => range.value_at(index),
            ValueDomain::Values(values) | ValueDomain::Parent(values) => {
                values[index as usize].clone()
            }
            ValueDomain::Template(template) => GeneratedValue::Text(template.value_at(index)),
        }
    }

    /// Independent draw. Templates draw each slot separately.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> GeneratedValue {
        match self {
            ValueDomain::NumericRange { min, max } => GeneratedValue::Int(rng.random_range(*min..=*max)),
            ValueDomain::DigitRange { min, max } => {
                GeneratedValue::Text(rng.random_range(*min..=*max).to_string())
            }
            ValueDomain::Template(template) => GeneratedValue::Text(template.sample(rng)),
            ValueDomain::Decimal(_)
            | ValueDomain::Temporal(_)
            | ValueDomain::Values(_)
            | ValueDomain::Parent(_) => {
                let len = self.len();
                if len == 0 {
                    GeneratedValue::Null
                } else {
                    self.value_at(rng.random_range(0..len))
                }
            }
        }
    }
}

fn decimal_domain(min: f64, max: f64, column: &Column) -> Result<ValueDomain, FormatError> {
    let scale = column
        .numeric_scale
        .unwrap_or(DEFAULT_DECIMAL_SCALE)
        .min(MAX_DECIMAL_SCALE);
    DecimalRange::new(min, max, scale)
        .map(ValueDomain::Decimal)
        .ok_or_else(|| FormatError::EmptyRange(format!("[{min}, {max}] at scale {scale}")))
}

/// Fixed-point range enumerated in steps of `10^-scale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecimalRange {
    low: i64,
    high: i64,
    scale: u32,
}

impl DecimalRange {
    /// `None` when no step of the scale falls inside `[min, max]`.
    pub fn new(min: f64, max: f64, scale: u32) -> Option<Self> {
        let factor = 10_f64.powi(scale as i32);
        let low = snap(min * factor, f64::ceil)?;
        let high = snap(max * factor, f64::floor)?;
        (low <= high).then_some(Self { low, high, scale })
    }

    pub fn len(&self) -> u64 {
        range_size((self.low, self.high))
    }

    fn value_at(&self, index: u64) -> GeneratedValue {
        GeneratedValue::Decimal {
            units: (self.low as i128 + index as i128) as i64,
            scale: self.scale,
        }
    }
}

/// Round to the nearest unit when float noise is all that separates the two,
/// otherwise apply `round`.
fn snap(scaled: f64, round: fn(f64) -> f64) -> Option<i64> {
    let nearest = scaled.round();
    let snapped = if (scaled - nearest).abs() < 1e-6 {
        nearest
    } else {
        round(scaled)
    };
    (snapped.is_finite() && snapped.abs() < i64::MAX as f64).then_some(snapped as i64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalUnit {
    /// Rendered `YYYY-MM-DD`.
    Day,
    /// Rendered `YYYY-MM-DD HH:MM:SS`.
    Second,
}

impl TemporalUnit {
    fn rendered_len(self) -> usize {
        match self {
            TemporalUnit::Day => 10,
            TemporalUnit::Second => 19,
        }
    }
}

/// Inclusive date or datetime range, one index per day or second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemporalRange {
    start: NaiveDateTime,
    steps: u64,
    unit: TemporalUnit,
}

impl TemporalRange {
    pub fn new(min: NaiveDateTime, max: NaiveDateTime, unit: TemporalUnit) -> Self {
        let span = match unit {
            TemporalUnit::Day => (max.date() - min.date()).num_days(),
            TemporalUnit::Second => (max - min).num_seconds(),
        };
        Self {
            start: min,
            steps: span.max(0) as u64 + 1,
            unit,
        }
    }

    pub fn len(&self) -> u64 {
        self.steps
    }

    fn value_at(&self, index: u64) -> GeneratedValue {
        let offset = i64::try_from(index).ok().and_then(|index| match self.unit {
            TemporalUnit::Day => TimeDelta::try_days(index),
            TemporalUnit::Second => TimeDelta::try_seconds(index),
        });
        match offset.and_then(|offset| self.start.checked_add_signed(offset)) {
            Some(at) => GeneratedValue::Text(render_temporal(at, self.unit)),
            None => GeneratedValue::Null,
        }
    }
}

pub(crate) fn render_temporal(at: NaiveDateTime, unit: TemporalUnit) -> String {
    match unit {
        TemporalUnit::Day => at.format("%Y-%m-%d").to_string(),
        TemporalUnit::Second => at.format("%Y-%m-%d %H:%M:%S").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::NaiveDate;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rowsmith_plan::TemplateSpec;
    use serde_json::Value;

    use super::*;

    fn column(type_class: TypeClass) -> Column {
        Column {
            name: "c".to_string(),
            type_class,
            is_nullable: false,
            is_auto_generated: false,
            character_max_length: None,
            numeric_precision: None,
            numeric_scale: None,
            enum_values: Vec::new(),
        }
    }

    fn day(text: &str) -> NaiveDateTime {
        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .expect("date")
            .and_hms_opt(0, 0, 0)
            .expect("midnight")
    }

    #[test]
    fn range_is_index_addressable() {
        let domain = ValueDomain::NumericRange { min: -2, max: 2 };
        assert_eq!(domain.len(), 5);
        assert_eq!(domain.value_at(0), GeneratedValue::Int(-2));
        assert_eq!(domain.value_at(7), GeneratedValue::Int(0));
    }

    #[test]
    fn values_cycle() {
        let spec = ColumnDomainSpec::Values(vec![Value::from("a"), Value::from("b")]);
        let domain = ValueDomain::for_column(&spec, &column(TypeClass::String)).expect("domain");
        let cycled: Vec<GeneratedValue> = (0..3).map(|idx| domain.value_at(idx)).collect();
        assert_eq!(
            cycled,
            vec![
                GeneratedValue::Text("a".to_string()),
                GeneratedValue::Text("b".to_string()),
                GeneratedValue::Text("a".to_string()),
            ]
        );
    }

    #[test]
    fn template_spec_builds_template_domain() {
        let spec = ColumnDomainSpec::Template(TemplateSpec {
            format: "T{:02d}".to_string(),
            slot_ranges: vec![(1, 3)],
        });
        let domain = ValueDomain::for_column(&spec, &column(TypeClass::String)).expect("domain");
        assert_eq!(domain.len(), 3);
        assert_eq!(domain.value_at(2), GeneratedValue::Text("T03".to_string()));
        assert_eq!(domain.max_text_len(), Some(3));
    }

    #[test]
    fn integer_range_on_text_column_emits_digit_strings() {
        let spec = ColumnDomainSpec::NumericRange { min: 100, max: 999 };
        let domain = ValueDomain::for_column(&spec, &column(TypeClass::String)).expect("domain");
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..20 {
            let value = domain.sample(&mut rng);
            let text = value.as_str().expect("text");
            assert!(text.chars().all(|ch| ch.is_ascii_digit()));
            assert!((100..=999).contains(&text.parse::<i64>().expect("digits")));
        }
        assert_eq!(domain.max_text_len(), Some(3));
    }

    #[test]
    fn decimal_range_uses_column_scale() {
        let spec = ColumnDomainSpec::DecimalRange {
            min: 30000.0,
            max: 150000.0,
        };
        let mut salary = column(TypeClass::Decimal);
        salary.numeric_scale = Some(2);
        let domain = ValueDomain::for_column(&spec, &salary).expect("domain");
        assert_eq!(domain.len(), 12_000_001);
        assert_eq!(
            domain.value_at(5).render().as_deref(),
            Some("30000.05")
        );

        let unique: HashSet<String> = (0..50)
            .map(|idx| domain.value_at(idx * 997).render().expect("decimal"))
            .collect();
        assert_eq!(unique.len(), 50);
    }

    #[test]
    fn decimal_bounds_snap_through_float_noise() {
        let range = DecimalRange::new(0.1, 0.3, 2).expect("range");
        assert_eq!(range.len(), 21);
        assert!(DecimalRange::new(0.001, 0.004, 2).is_none());
    }

    #[test]
    fn decimal_range_on_integer_column_rounds_inward() {
        let spec = ColumnDomainSpec::DecimalRange { min: 1.5, max: 4.5 };
        let domain = ValueDomain::for_column(&spec, &column(TypeClass::Integer)).expect("domain");
        assert!(matches!(domain, ValueDomain::NumericRange { min: 2, max: 4 }));
    }

    #[test]
    fn date_range_enumerates_days() {
        let spec = ColumnDomainSpec::TemporalRange {
            min: day("2020-01-01"),
            max: day("2024-12-31"),
            with_time: false,
        };
        let domain = ValueDomain::for_column(&spec, &column(TypeClass::Date)).expect("domain");
        assert_eq!(domain.len(), 1827);
        assert_eq!(
            domain.value_at(0),
            GeneratedValue::Text("2020-01-01".to_string())
        );
        assert_eq!(
            domain.value_at(1826),
            GeneratedValue::Text("2024-12-31".to_string())
        );
    }

    #[test]
    fn date_bounds_on_timestamp_column_cover_whole_days() {
        let spec = ColumnDomainSpec::TemporalRange {
            min: day("2024-01-01"),
            max: day("2024-03-31"),
            with_time: false,
        };
        let domain = ValueDomain::for_column(&spec, &column(TypeClass::DateTime)).expect("domain");
        assert_eq!(domain.len(), 91 * 86_400);
        assert_eq!(
            domain.value_at(domain.len() - 1),
            GeneratedValue::Text("2024-03-31 23:59:59".to_string())
        );

        let mut rng = ChaCha8Rng::seed_from_u64(9);
        for _ in 0..20 {
            let value = domain.sample(&mut rng);
            let parsed = NaiveDateTime::parse_from_str(
                value.as_str().expect("text"),
                "%Y-%m-%d %H:%M:%S",
            )
            .expect("datetime format");
            assert!(parsed >= day("2024-01-01"));
            assert!(parsed.date() <= day("2024-03-31").date());
        }
    }
}
