//! Deterministic seed derivation.

/// FNV-1a style mix of a run seed with a string key.
pub fn hash_seed(seed: u64, key: &str) -> u64 {
    let mut hash = seed ^ 0xcbf29ce484222325;
    for byte in key.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Positional seed for item `index` under `base`.
pub fn hash_row_seed(base: u64, index: u64) -> u64 {
    let mut hash = base ^ index.wrapping_mul(0x9e3779b97f4a7c15);
    hash ^= hash >> 29;
    hash = hash.wrapping_mul(0x100000001b3);
    hash
}
