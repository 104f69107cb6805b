//! Zero-subtree digests.
//!
//! `zero_hashes()[h]` is the root of a height-`h` subtree whose leaves are all
//! zero. The table is built on first use and shared read-only afterwards.

use std::sync::OnceLock;

use crate::hash::{hash_pair, Digest};

/// Maximum subtree height covered by the table
pub const ZERO_HASHES_DEPTH: usize = 64;

static ZERO_HASHES: OnceLock<[Digest; ZERO_HASHES_DEPTH + 1]> = OnceLock::new();

/// Precomputed zero hashes for each height.
/// `ZERO_HASHES[0]` = all-zeros (the zero leaf).
/// `ZERO_HASHES[i]` = hash(ZERO_HASHES[i-1], ZERO_HASHES[i-1])
pub fn zero_hashes() -> &'static [Digest] {
    ZERO_HASHES.get_or_init(|| {
        let mut hashes = [[0u8; 32]; ZERO_HASHES_DEPTH + 1];
        for i in 1..=ZERO_HASHES_DEPTH {
            hashes[i] = hash_pair(&hashes[i - 1], &hashes[i - 1]);
        }
        hashes
    })
}

/// Root of an all-zero subtree of the given height, if the table covers it.
#[must_use]
pub fn zero_hash(height: usize) -> Option<Digest> {
    zero_hashes().get(height).copied()
}
