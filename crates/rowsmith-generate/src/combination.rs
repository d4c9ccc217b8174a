//! Cartesian-product pools addressed by rank.
//!
//! A pool is never expanded into rows: an entry is a rank in
//! `0..capacity`, decoded into one index per dimension on demand. Only the
//! permutation used for sampling may be materialized, and only below a
//! configurable size.

use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::domain::ValueDomain;
use crate::errors::GenerationError;
use crate::value::GeneratedValue;

/// Values one dimension contributes to a pool entry.
#[derive(Debug, Clone)]
pub enum DimensionSource {
    /// One column drawn from a domain.
    Domain(ValueDomain),
    /// Several columns drawn together from distinct parent tuples.
    Tuples(Arc<[Vec<GeneratedValue>]>),
}

/// One axis of a combination space, covering one or more columns.
#[derive(Debug, Clone)]
pub struct Dimension {
    columns: Vec<String>,
    source: DimensionSource,
}

impl Dimension {
    /// Fails when the source is empty, naming the first column.
    pub fn new(
        table: &str,
        columns: Vec<String>,
        source: DimensionSource,
    ) -> Result<Self, GenerationError> {
        let dimension = Self { columns, source };
        if dimension.len() == 0 {
            return Err(GenerationError::MissingParentValues {
                table: table.to_string(),
                column: dimension.columns.join(","),
                detail: "no candidate values for combination building".to_string(),
            });
        }
        Ok(dimension)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn source(&self) -> &DimensionSource {
        &self.source
    }

    pub fn len(&self) -> u64 {
        match &self.source {
            DimensionSource::Domain(domain) => domain.len(),
            DimensionSource::Tuples(tuples) => tuples.len() as u64,
        }
    }

    pub fn write(&self, index: u64, out: &mut Vec<(String, GeneratedValue)>) {
        match &self.source {
            DimensionSource::Domain(domain) => {
                if let Some(column) = self.columns.first() {
                    out.push((column.clone(), domain.value_at(index)));
                }
            }
            DimensionSource::Tuples(tuples) => {
                let tuple = &tuples[(index % tuples.len() as u64) as usize];
                for (column, value) in self.columns.iter().zip(tuple) {
                    out.push((column.clone(), value.clone()));
                }
            }
        }
    }
}

/// Mixed-radix space over an ordered list of dimensions. Dimension 0 is the
/// most significant digit.
#[derive(Debug, Clone)]
pub struct CombinationSpace {
    dimensions: Vec<Dimension>,
    capacity: u64,
}

impl CombinationSpace {
    pub fn new(dimensions: Vec<Dimension>) -> Self {
        let capacity = dimensions
            .iter()
            .try_fold(1_u64, |acc, dim| acc.checked_mul(dim.len()))
            .unwrap_or(u64::MAX);
        Self {
            dimensions,
            capacity,
        }
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Per-dimension indices of the `rank`-th entry.
    pub fn decode(&self, rank: u64) -> Vec<u64> {
        let mut rest = rank;
        let mut indices = vec![0; self.dimensions.len()];
        for (slot, dim) in self.dimensions.iter().enumerate().rev() {
            let len = dim.len().max(1);
            indices[slot] = rest % len;
            rest /= len;
        }
        indices
    }

    /// Column assignments of the entry with the given per-dimension indices.
    pub fn assignments(&self, indices: &[u64]) -> Vec<(String, GeneratedValue)> {
        let mut out = Vec::new();
        for (dim, index) in self.dimensions.iter().zip(indices) {
            dim.write(*index, &mut out);
        }
        out
    }
}

/// Bijection on `0..n` used to visit ranks in shuffled order.
#[derive(Debug, Clone)]
pub enum RankPermutation {
    Materialized(Vec<u64>),
    /// Keyed Feistel network over the smallest even bit width covering `n`,
    /// cycle-walked back into `0..n`.
    Feistel {
        n: u64,
        half_bits: u32,
        keys: [u64; FEISTEL_ROUNDS],
    },
}

const FEISTEL_ROUNDS: usize = 4;

impl RankPermutation {
    /// Shuffled list when `n <= materialize_limit`, Feistel network otherwise.
    pub fn new(n: u64, seed: u64, materialize_limit: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        if n <= materialize_limit {
            let mut order: Vec<u64> = (0..n).collect();
            order.shuffle(&mut rng);
            return RankPermutation::Materialized(order);
        }
        Self::feistel(n, &mut rng)
    }

    pub fn feistel<R: Rng + ?Sized>(n: u64, rng: &mut R) -> Self {
        let bits = (u64::BITS - n.saturating_sub(1).leading_zeros()).max(2);
        let mut keys = [0_u64; FEISTEL_ROUNDS];
        for key in &mut keys {
            *key = rng.random();
        }
        RankPermutation::Feistel {
            n,
            half_bits: bits.div_ceil(2),
            keys,
        }
    }

    pub fn len(&self) -> u64 {
        match self {
            RankPermutation::Materialized(order) => order.len() as u64,
            RankPermutation::Feistel { n, .. } => *n,
        }
    }

    pub fn apply(&self, rank: u64) -> u64 {
        match self {
            RankPermutation::Materialized(order) if order.is_empty() => 0,
            RankPermutation::Materialized(order) => order[(rank % order.len() as u64) as usize],
            RankPermutation::Feistel { n, half_bits, keys } => {
                if *n <= 1 {
                    return 0;
                }
                // The network permutes 0..4^half_bits, at most 4n values, so
                // the walk back into 0..n is short.
                let mut value = rank % n;
                loop {
                    value = feistel_encrypt(value, *half_bits, keys);
                    if value < *n {
                        return value;
                    }
                }
            }
        }
    }
}

fn feistel_encrypt(value: u64, half_bits: u32, keys: &[u64; FEISTEL_ROUNDS]) -> u64 {
    let mask = (1_u64 << half_bits) - 1;
    let mut left = value >> half_bits;
    let mut right = value & mask;
    for key in keys {
        let next = left ^ (mix64(right ^ key) & mask);
        left = right;
        right = next;
    }
    (left << half_bits) | right
}

/// splitmix64 finalizer.
pub(crate) fn mix64(value: u64) -> u64 {
    let mut mixed = value.wrapping_add(0x9E37_79B9_7F4A_7C15);
    mixed = (mixed ^ (mixed >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    mixed = (mixed ^ (mixed >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    mixed ^ (mixed >> 31)
}

/// Where row `i` of a table takes its combination entry from.
#[derive(Debug, Clone)]
pub enum PoolOrder {
    /// Row `i` uses `permutation(i % capacity)`.
    Shuffled(RankPermutation),
    /// Row `i` uses `selected[i % selected.len()]` (stratified selection).
    Selected(Arc<[u64]>),
}

/// A sampled combination pool, read-only once built.
#[derive(Debug, Clone)]
pub struct CombinationPool {
    name: String,
    space: CombinationSpace,
    order: PoolOrder,
    requested: u64,
}

impl CombinationPool {
    /// Uniform sampling without replacement: one shuffle of the rank space,
    /// then row `i` takes the `i`-th shuffled rank. Rows past capacity cycle.
    pub fn shuffled(
        name: impl Into<String>,
        space: CombinationSpace,
        requested: u64,
        seed: u64,
        materialize_limit: u64,
    ) -> Self {
        let permutation = RankPermutation::new(space.capacity(), seed, materialize_limit);
        Self {
            name: name.into(),
            space,
            order: PoolOrder::Shuffled(permutation),
            requested,
        }
    }

    pub fn selected(
        name: impl Into<String>,
        space: CombinationSpace,
        requested: u64,
        selected: Vec<u64>,
    ) -> Self {
        Self {
            name: name.into(),
            space,
            order: PoolOrder::Selected(selected.into()),
            requested,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> u64 {
        self.space.capacity()
    }

    /// Distinct entries rows will actually draw from.
    pub fn available(&self) -> u64 {
        match &self.order {
            PoolOrder::Shuffled(_) => self.capacity(),
            PoolOrder::Selected(selected) => selected.len() as u64,
        }
    }

    pub fn is_short(&self) -> bool {
        self.available() < self.requested
    }

    /// Rank used by row `row_index`, cycling modulo the available entries.
    pub fn rank_for_row(&self, row_index: u64) -> u64 {
        match &self.order {
            PoolOrder::Shuffled(permutation) => {
                permutation.apply(row_index % permutation.len().max(1))
            }
            PoolOrder::Selected(selected) => {
                if selected.is_empty() {
                    0
                } else {
                    selected[(row_index % selected.len() as u64) as usize]
                }
            }
        }
    }

    pub fn assignments_for_row(&self, row_index: u64) -> Vec<(String, GeneratedValue)> {
        let rank = self.rank_for_row(row_index);
        self.space.assignments(&self.space.decode(rank))
    }
}
