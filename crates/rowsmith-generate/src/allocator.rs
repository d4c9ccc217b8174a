//! Non-repeating value issuance for single-column uniqueness.
//!
//! An allocator hands out tickets from an atomic counter and maps each
//! ticket to a value with a pure function, so the only shared mutation is
//! one `fetch_add`. Tickets past capacity wrap and the first wrap is
//! reported exactly once.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use rowsmith_core::{Column, TypeClass};

use crate::combination::{RankPermutation, mix64};
use crate::domain::{TemporalUnit, ValueDomain};
use crate::uncontrolled::{default_temporal_span, set_text, time_of_day};
use crate::value::GeneratedValue;

/// Counter state of one allocator.
#[derive(Debug)]
pub enum AllocationState {
    /// Ticket `n` maps to index `n % modulus`.
    Sequential { next: AtomicU64, modulus: u64 },
    /// Ticket `n` maps to `order(n % order.len())`.
    Pool {
        order: RankPermutation,
        cursor: AtomicU64,
    },
}

impl AllocationState {
    fn advance(&self, count: u64) -> u64 {
        match self {
            AllocationState::Sequential { next, .. } => next.fetch_add(count, Ordering::Relaxed),
            AllocationState::Pool { cursor, .. } => cursor.fetch_add(count, Ordering::Relaxed),
        }
    }

    fn capacity(&self) -> u64 {
        match self {
            AllocationState::Sequential { modulus, .. } => *modulus,
            AllocationState::Pool { order, .. } => order.len(),
        }
    }

    fn index_for(&self, ticket: u64) -> u64 {
        match self {
            AllocationState::Sequential { modulus, .. } => ticket % modulus,
            AllocationState::Pool { order, .. } => order.apply(ticket % order.len().max(1)),
        }
    }
}

/// What an allocator issues values from.
#[derive(Debug, Clone)]
pub enum AllocationSource {
    /// A configured range, value list, template, or parent value set.
    Domain(ValueDomain),
    /// No configured values: the column type's own sequence. Integers count
    /// up from 1, text gets a numeric suffix on the column name.
    Sequence(Column),
}

impl AllocationSource {
    fn capacity(&self) -> u64 {
        match self {
            AllocationSource::Domain(domain) => domain.len(),
            AllocationSource::Sequence(column) => sequence_capacity(column),
        }
    }

    fn value_at(&self, index: u64) -> GeneratedValue {
        match self {
            AllocationSource::Domain(domain) => domain.value_at(index),
            AllocationSource::Sequence(column) => sequence_value(column, index),
        }
    }
}

fn sequence_scale(column: &Column) -> u32 {
    column.numeric_scale.unwrap_or(0).min(9)
}

fn sequence_capacity(column: &Column) -> u64 {
    match column.type_class {
        TypeClass::Boolean => 2,
        TypeClass::Time => 86_400,
        TypeClass::Set => 1_u64 << column.enum_values.len().min(63),
        TypeClass::Date => default_temporal_span(TemporalUnit::Day).map_or(0, |span| span.len()),
        TypeClass::DateTime => {
            default_temporal_span(TemporalUnit::Second).map_or(0, |span| span.len())
        }
        TypeClass::Decimal => i64::MAX as u64 / 10_u64.pow(sequence_scale(column)),
        TypeClass::Float => 1 << f64::MANTISSA_DIGITS,
        TypeClass::String | TypeClass::Other => match column.character_max_length {
            // "_" plus as many digits as fit.
            Some(max) => 10_u64
                .checked_pow(max.saturating_sub(1))
                .map_or(i64::MAX as u64, |room| room.saturating_sub(1).clamp(1, i64::MAX as u64)),
            None => i64::MAX as u64,
        },
        TypeClass::Integer | TypeClass::Uuid => i64::MAX as u64,
    }
}

fn sequence_value(column: &Column, index: u64) -> GeneratedValue {
    match column.type_class {
        TypeClass::Integer => GeneratedValue::Int(index as i64 + 1),
        TypeClass::Decimal => {
            let scale = sequence_scale(column);
            GeneratedValue::Decimal {
                units: (index as i64 + 1).saturating_mul(10_i64.pow(scale)),
                scale,
            }
        }
        TypeClass::Float => GeneratedValue::Float(index as f64 + 1.0),
        TypeClass::Boolean => GeneratedValue::Bool(index % 2 == 1),
        TypeClass::Date => temporal_sequence(TemporalUnit::Day, index),
        TypeClass::DateTime => temporal_sequence(TemporalUnit::Second, index),
        TypeClass::Time => GeneratedValue::Text(time_of_day((index % 86_400) as u32)),
        TypeClass::Uuid => GeneratedValue::Text(sequence_uuid(index)),
        TypeClass::Set => GeneratedValue::Text(set_text(&column.enum_values, index)),
        TypeClass::String | TypeClass::Other => GeneratedValue::Text(suffixed(
            &column.name,
            index + 1,
            column.character_max_length,
        )),
    }
}

fn temporal_sequence(unit: TemporalUnit, index: u64) -> GeneratedValue {
    match default_temporal_span(unit) {
        Some(span) => ValueDomain::Temporal(span).value_at(index),
        None => GeneratedValue::Null,
    }
}

/// Version 4 layout with the index in the low bytes. The variant bits only
/// touch the top of byte 8, so indices below `2^62` stay distinct.
fn sequence_uuid(index: u64) -> String {
    let mut bytes = [0_u8; 16];
    bytes[..8].copy_from_slice(&mix64(index).to_be_bytes());
    bytes[8..].copy_from_slice(&index.to_be_bytes());
    uuid::Builder::from_random_bytes(bytes).into_uuid().to_string()
}

/// One issued value.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub ticket: u64,
    pub value: GeneratedValue,
    /// Set on the single ticket that first went past capacity.
    pub first_wrap: bool,
}

/// Thread-safe unique value issuer for one column or template slot.
#[derive(Debug)]
pub struct UniqueAllocator {
    column: String,
    source: AllocationSource,
    state: AllocationState,
    wrapped: AtomicBool,
}

impl UniqueAllocator {
    /// Enumerate the source in its natural order.
    pub fn sequential(column: impl Into<String>, source: AllocationSource) -> Self {
        let modulus = source.capacity().max(1);
        Self {
            column: column.into(),
            source,
            state: AllocationState::Sequential {
                next: AtomicU64::new(0),
                modulus,
            },
            wrapped: AtomicBool::new(false),
        }
    }

    /// Enumerate the source in a seeded shuffled order. The order is only
    /// materialized up to `materialize_limit` entries.
    pub fn pooled(
        column: impl Into<String>,
        source: AllocationSource,
        seed: u64,
        materialize_limit: u64,
    ) -> Self {
        let order = RankPermutation::new(source.capacity().max(1), seed, materialize_limit);
        Self {
            column: column.into(),
            source,
            state: AllocationState::Pool {
                order,
                cursor: AtomicU64::new(0),
            },
            wrapped: AtomicBool::new(false),
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn capacity(&self) -> u64 {
        self.state.capacity()
    }

    /// First-come-first-served issuance.
    pub fn take_next(&self) -> Allocation {
        let ticket = self.state.advance(1);
        self.issue(ticket)
    }

    /// Claim `count` consecutive tickets and return the first. Reserving
    /// ranges in a fixed order keeps concurrent runs deterministic.
    pub fn reserve(&self, count: u64) -> u64 {
        self.state.advance(count)
    }

    /// Map a reserved ticket to its value.
    pub fn issue(&self, ticket: u64) -> Allocation {
        let first_wrap =
            ticket >= self.capacity() && !self.wrapped.swap(true, Ordering::AcqRel);
        let index = self.state.index_for(ticket);
        Allocation {
            ticket,
            value: self.source.value_at(index),
            first_wrap,
        }
    }

    pub fn has_wrapped(&self) -> bool {
        self.wrapped.load(Ordering::Acquire)
    }
}

/// `base` + `_NNNNNNNN`, shortening `base` so the suffix survives a length
/// limit. Columns narrower than the padded suffix get a narrower pad.
fn suffixed(base: &str, number: u64, max_length: Option<u32>) -> String {
    let width = max_length.map_or(8, |max| (max as usize).saturating_sub(1).min(8));
    let suffix = format!("_{number:0width$}");
    match max_length {
        Some(max) => {
            let keep = (max as usize).saturating_sub(suffix.chars().count());
            let head: String = base.chars().take(keep).collect();
            format!("{head}{suffix}").chars().take(max as usize).collect()
        }
        None => format!("{base}{suffix}"),
    }
}
