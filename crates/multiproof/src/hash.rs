//! Node hashing.
//!
//! Internal nodes are `SHA-256(left ‖ right)`, the same compression function
//! SSZ merkleization uses, so roots produced here line up with any SSZ
//! `hash_tree_root`.

use sha2::{Digest as _, Sha256};

/// A 32-byte Merkle node.
pub type Digest = [u8; 32];

/// SHA-256 hash of two 32-byte nodes
#[must_use]
pub fn hash_pair(left: &Digest, right: &Digest) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}
