//! Values for columns with no configured source. Duplicates are possible
//! and not tracked.

use chrono::NaiveDate;
use fake::Fake;
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::{FirstName, LastName, Name};
use fake::faker::phone_number::en::PhoneNumber;
use rand::Rng;
use rand::distr::Alphanumeric;
use rowsmith_core::{Column, TypeClass};

use crate::domain::{TemporalRange, TemporalUnit, ValueDomain};
use crate::value::GeneratedValue;

const INT_MAX: i64 = 10_000;
const AGE_RANGE: (i64, i64) = (18, 80);
const TEXT_LEN: usize = 12;
const OTHER_LEN: usize = 8;
const DEFAULT_PRECISION: u32 = 10;
/// Whole digits of a random decimal are capped so units stay in `i64`.
const MAX_WHOLE_DIGITS: u32 = 9;
const FLOAT_MAX: f64 = 10_000.0;

/// Draw a plausible value for `column` from its type class and name.
pub fn random_value<R: Rng + ?Sized>(column: &Column, rng: &mut R) -> GeneratedValue {
    if column.is_enum() {
        let idx = rng.random_range(0..column.enum_values.len());
        return GeneratedValue::Text(column.enum_values[idx].clone());
    }
    match column.type_class {
        TypeClass::Integer => {
            let (min, max) = if is_age(&column.name) {
                AGE_RANGE
            } else {
                (0, INT_MAX)
            };
            GeneratedValue::Int(rng.random_range(min..=max))
        }
        TypeClass::Decimal => random_decimal(column, rng),
        TypeClass::Float => {
            let cents = rng.random_range(0..=(FLOAT_MAX * 100.0) as i64);
            GeneratedValue::Float(cents as f64 / 100.0)
        }
        TypeClass::Boolean => GeneratedValue::Bool(rng.random()),
        TypeClass::String => {
            GeneratedValue::Text(semantic_text(&column.name, rng)).truncated(column.character_max_length)
        }
        TypeClass::Date => random_temporal(TemporalUnit::Day, rng),
        TypeClass::DateTime => random_temporal(TemporalUnit::Second, rng),
        TypeClass::Time => GeneratedValue::Text(time_of_day(rng.random_range(0..86_400))),
        TypeClass::Uuid => {
            GeneratedValue::Text(uuid::Builder::from_random_bytes(rng.random()).into_uuid().to_string())
        }
        TypeClass::Set => {
            let members = column.enum_values.len().min(63);
            let mask = if members == 0 {
                0
            } else {
                rng.random_range(0..1_u64 << members)
            };
            GeneratedValue::Text(set_text(&column.enum_values, mask))
        }
        TypeClass::Other => {
            if column.is_nullable {
                GeneratedValue::Null
            } else {
                GeneratedValue::Text(alphanumeric(rng, OTHER_LEN))
            }
        }
    }
}

/// Members whose bit is set in `mask`, in declaration order, joined by `,`.
/// An empty mask is the empty set `''`.
pub(crate) fn set_text(members: &[String], mask: u64) -> String {
    members
        .iter()
        .take(63)
        .enumerate()
        .filter(|(bit, _)| mask & (1 << bit) != 0)
        .map(|(_, member)| member.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

pub(crate) fn time_of_day(seconds: u32) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600 % 24,
        seconds / 60 % 60,
        seconds % 60
    )
}

/// Default span for dates and datetimes with no configured range.
pub(crate) fn default_temporal_span(unit: TemporalUnit) -> Option<TemporalRange> {
    let start = NaiveDate::from_ymd_opt(1900, 1, 1)?.and_hms_opt(0, 0, 0)?;
    let end = NaiveDate::from_ymd_opt(2023, 12, 31)?.and_hms_opt(23, 59, 59)?;
    Some(TemporalRange::new(start, end, unit))
}

fn random_temporal<R: Rng + ?Sized>(unit: TemporalUnit, rng: &mut R) -> GeneratedValue {
    match default_temporal_span(unit) {
        Some(span) => ValueDomain::Temporal(span).sample(rng),
        None => GeneratedValue::Null,
    }
}

fn random_decimal<R: Rng + ?Sized>(column: &Column, rng: &mut R) -> GeneratedValue {
    let scale = column.numeric_scale.unwrap_or(0).min(MAX_WHOLE_DIGITS);
    let precision = column.numeric_precision.unwrap_or(DEFAULT_PRECISION).max(scale);
    let whole_digits = (precision - scale).min(MAX_WHOLE_DIGITS);
    let bound = 10_i64.pow(whole_digits + scale);
    GeneratedValue::Decimal {
        units: rng.random_range(0..bound),
        scale,
    }
}

fn is_age(name: &str) -> bool {
    let name = name.to_lowercase();
    name == "age" || name.ends_with("_age") || name.starts_with("age_")
}

fn semantic_text<R: Rng + ?Sized>(name: &str, rng: &mut R) -> String {
    let name = name.to_lowercase();
    if name.contains("email") {
        SafeEmail().fake_with_rng(rng)
    } else if name.contains("phone") {
        PhoneNumber().fake_with_rng(rng)
    } else if name.contains("first_name") {
        FirstName().fake_with_rng(rng)
    } else if name.contains("last_name") || name.contains("surname") {
        LastName().fake_with_rng(rng)
    } else if name.contains("name") {
        Name().fake_with_rng(rng)
    } else {
        alphanumeric(rng, TEXT_LEN)
    }
}

fn alphanumeric<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len).map(|_| rng.sample(Alphanumeric) as char).collect()
}
