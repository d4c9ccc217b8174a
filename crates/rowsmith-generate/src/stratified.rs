//! Balanced selection from an overlapping constraint group's pool.
//!
//! The pool's leading dimensions are the shared columns; every shared-key
//! value is a bucket of `Q = Π non-shared sizes` consecutive ranks. Buckets
//! are visited round-robin in shuffled order and each visit pulls the next
//! entry (in a per-bucket shuffled order, or a keyed permutation when the
//! buckets are too large to hold) whose projection onto every member
//! constraint's non-shared columns is still unused in that bucket. A bucket
//! therefore yields at most `min_k P_k` entries, where `P_k` is the number of
//! distinct projections of member `k`.

use std::collections::{HashMap, HashSet};

use crate::combination::{CombinationSpace, RankPermutation};
use crate::seed::hash_row_seed;

/// How a group's pool splits into shared and per-member dimensions.
#[derive(Debug, Clone)]
pub struct StratifiedLayout {
    /// Number of leading dimensions holding shared columns.
    pub shared_dims: usize,
    /// Per member constraint, the positions of its non-shared dimensions.
    pub projections: Vec<Vec<usize>>,
}

impl StratifiedLayout {
    pub fn bucket_count(&self, space: &CombinationSpace) -> u64 {
        product(space, 0..self.shared_dims)
    }

    pub fn bucket_size(&self, space: &CombinationSpace) -> u64 {
        product(space, self.shared_dims..space.dimensions().len())
    }

    /// Entries a single bucket can contribute without a duplicate on any
    /// member constraint.
    pub fn per_bucket_limit(&self, space: &CombinationSpace) -> u64 {
        self.projections
            .iter()
            .map(|dims| product(space, dims.iter().copied()))
            .min()
            .unwrap_or(1)
            .min(self.bucket_size(space))
    }
}

fn product(space: &CombinationSpace, dims: impl IntoIterator<Item = usize>) -> u64 {
    dims.into_iter()
        .filter_map(|idx| space.dimensions().get(idx))
        .try_fold(1_u64, |acc, dim| acc.checked_mul(dim.len()))
        .unwrap_or(u64::MAX)
}

struct Bucket {
    order: RankPermutation,
    cursor: u64,
    used: Vec<HashSet<Vec<u64>>>,
    exhausted: bool,
}

/// Select up to `requested` pool ranks, balanced across buckets.
///
/// Returns fewer ranks than requested when every bucket runs dry; the caller
/// cycles over the result and reports the shortfall.
pub fn stratified_select(
    space: &CombinationSpace,
    layout: &StratifiedLayout,
    requested: u64,
    seed: u64,
    materialize_limit: u64,
) -> Vec<u64> {
    let buckets = layout.bucket_count(space);
    let bucket_size = layout.bucket_size(space);
    let limits: Vec<u64> = layout
        .projections
        .iter()
        .map(|dims| product(space, dims.iter().copied()))
        .collect();

    let visit_order = RankPermutation::new(buckets, seed, materialize_limit);
    let mut state: HashMap<u64, Bucket> = HashMap::new();
    let target = requested.min(space.capacity());
    // Shuffled bucket orders are kept while every bucket the selection can
    // touch fits in the limit together.
    let bucket_limit = if bucket_size.saturating_mul(buckets.min(target)) <= materialize_limit {
        bucket_size
    } else {
        0
    };
    let mut selected: Vec<u64> = Vec::with_capacity(usize::try_from(target).unwrap_or(0));

    'passes: loop {
        let mut progressed = false;
        for position in 0..buckets {
            if selected.len() as u64 >= target {
                break 'passes;
            }
            let bucket_id = visit_order.apply(position);
            let bucket = state.entry(bucket_id).or_insert_with(|| {
                Bucket {
                    order: RankPermutation::new(
                        bucket_size,
                        hash_row_seed(seed, bucket_id),
                        bucket_limit,
                    ),
                    cursor: 0,
                    used: vec![HashSet::new(); layout.projections.len()],
                    exhausted: false,
                }
            });
            if bucket.exhausted {
                continue;
            }
            if let Some(rank) = pull(space, layout, &limits, bucket_id, bucket_size, bucket) {
                selected.push(rank);
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }

    selected
}

fn pull(
    space: &CombinationSpace,
    layout: &StratifiedLayout,
    limits: &[u64],
    bucket_id: u64,
    bucket_size: u64,
    bucket: &mut Bucket,
) -> Option<u64> {
    while bucket.cursor < bucket_size {
        let within = bucket.order.apply(bucket.cursor);
        bucket.cursor += 1;
        let rank = bucket_id * bucket_size + within;
        let indices = space.decode(rank);
        let keys: Vec<Vec<u64>> = layout
            .projections
            .iter()
            .map(|dims| dims.iter().map(|dim| indices[*dim]).collect())
            .collect();
        if keys
            .iter()
            .zip(&bucket.used)
            .any(|(key, used)| used.contains(key))
        {
            continue;
        }
        for (key, used) in keys.into_iter().zip(bucket.used.iter_mut()) {
            used.insert(key);
        }
        let saturated = bucket
            .used
            .iter()
            .zip(limits)
            .any(|(used, limit)| used.len() as u64 >= *limit);
        if saturated || bucket.cursor >= bucket_size {
            bucket.exhausted = true;
        }
        return Some(rank);
    }
    bucket.exhausted = true;
    None
}
