//! Multiproof Verification
//!
//! Recomputes a root from target digests plus helper digests without ever
//! building the tree. Known nodes are collapsed pairwise, deepest index
//! first, until the root is derived or nothing more can be combined.
//!
//! Complexity is O(m · log N) hashes for m targets in a tree of N leaves.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, instrument};

use crate::gindex::GeneralizedIndex;
use crate::hash::{hash_pair, Digest};
use crate::helper::TargetSet;
use crate::proof::ProofError;

/// Root implied by a single-leaf `branch` for the node at `index`.
///
/// Bit `i` of the index tells whether the running node is a right child at
/// height `i`, and so which side the branch digest goes on.
pub fn calculate_merkle_root(
    leaf: &Digest,
    branch: &[Digest],
    index: &GeneralizedIndex,
) -> Result<Digest, ProofError> {
    let depth = index.depth();
    if branch.len() as u64 != depth {
        return Err(ProofError::LengthMismatch {
            what: "branch",
            expected: usize::try_from(depth).unwrap_or(usize::MAX),
            actual: branch.len(),
        });
    }

    let mut node = *leaf;
    for (height, sibling) in branch.iter().enumerate() {
        node = if index.bit(height as u64) {
            hash_pair(sibling, &node)
        } else {
            hash_pair(&node, sibling)
        };
    }
    Ok(node)
}

/// Verify a single-leaf Merkle branch against `root`.
pub fn verify_merkle_proof(
    leaf: &Digest,
    branch: &[Digest],
    index: &GeneralizedIndex,
    root: &Digest,
) -> Result<bool, ProofError> {
    Ok(calculate_merkle_root(leaf, branch, index)? == *root)
}

/// Root implied by a multiproof, or `None` if the supplied nodes never
/// combine up to index 1.
///
/// `leaves` are parallel to `indices`, `proof` is parallel to
/// `helper_indices(indices)`. Every structural check happens before the
/// first hash.
pub fn calculate_multi_merkle_root(
    leaves: &[Digest],
    proof: &[Digest],
    indices: &[GeneralizedIndex],
) -> Result<Option<Digest>, ProofError> {
    let targets = TargetSet::new(indices)?;
    if leaves.len() != indices.len() {
        return Err(ProofError::LengthMismatch {
            what: "leaf",
            expected: indices.len(),
            actual: leaves.len(),
        });
    }
    // Expanding paths is quadratic in target depth; a proof too short for
    // the deepest target is rejected from the depths alone.
    let min_helpers = targets.min_helper_count();
    if (proof.len() as u64) < min_helpers {
        return Err(ProofError::LengthMismatch {
            what: "proof",
            expected: usize::try_from(min_helpers).unwrap_or(usize::MAX),
            actual: proof.len(),
        });
    }
    let helpers = targets.helper_indices();
    if proof.len() != helpers.len() {
        return Err(ProofError::LengthMismatch {
            what: "proof",
            expected: helpers.len(),
            actual: proof.len(),
        });
    }

    let mut known: BTreeMap<GeneralizedIndex, Digest> =
        indices.iter().cloned().zip(leaves.iter().copied()).collect();
    known.extend(helpers.into_iter().zip(proof.iter().copied()));

    // Everything above a pending index is smaller, so popping the largest
    // first sees both children of a node before the node itself.
    let mut pending: BTreeSet<GeneralizedIndex> = known.keys().cloned().collect();
    while let Some(index) = pending.pop_last() {
        let (Some(sibling), Some(parent)) = (index.sibling(), index.parent()) else {
            continue;
        };
        if known.contains_key(&parent) {
            continue;
        }
        let Some(sibling_digest) = known.get(&sibling) else {
            continue;
        };

        let digest = if index.is_left() {
            hash_pair(&known[&index], sibling_digest)
        } else {
            hash_pair(sibling_digest, &known[&index])
        };
        known.insert(parent.clone(), digest);
        pending.insert(parent);
    }

    Ok(known.get(&GeneralizedIndex::root()).copied())
}

/// Verify a multiproof against `root`.
///
/// Malformed inputs are errors; a proof that is well formed but does not
/// reconstruct `root` is `Ok(false)`.
#[instrument(skip_all, fields(targets = indices.len(), helpers = proof.len()))]
pub fn verify(
    leaves: &[Digest],
    proof: &[Digest],
    indices: &[GeneralizedIndex],
    root: &Digest,
) -> Result<bool, ProofError> {
    let valid = calculate_multi_merkle_root(leaves, proof, indices)?.as_ref() == Some(root);
    if !valid {
        debug!("Multiproof rejected");
    }
    Ok(valid)
}

/// Like [`verify`], with a mismatch reported as [`ProofError::VerificationFailed`].
pub fn ensure_valid(
    leaves: &[Digest],
    proof: &[Digest],
    indices: &[GeneralizedIndex],
    root: &Digest,
) -> Result<(), ProofError> {
    if verify(leaves, proof, indices, root)? {
        Ok(())
    } else {
        Err(ProofError::VerificationFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::generate;
    use crate::tree::MerkleTree;

    fn g(i: u64) -> GeneralizedIndex {
        GeneralizedIndex::try_from(i).unwrap()
    }

    fn gs(indices: &[u64]) -> Vec<GeneralizedIndex> {
        indices.iter().copied().map(g).collect()
    }

    fn fixture() -> (Vec<Digest>, Vec<Digest>, Vec<GeneralizedIndex>, Digest) {
        let all: Vec<Digest> = (0u8..8).map(|b| [b.wrapping_mul(37); 32]).collect();
        let targets = gs(&[8, 9, 14]);
        let proof = generate(&all, &targets).unwrap();
        let root = MerkleTree::from_leaves(&all).unwrap().root();
        (vec![all[0], all[1], all[6]], proof, targets, root)
    }

    #[test]
    fn test_valid_multiproof() {
        let (leaves, proof, targets, root) = fixture();
        assert!(verify(&leaves, &proof, &targets, &root).unwrap());
        assert!(ensure_valid(&leaves, &proof, &targets, &root).is_ok());
    }

    #[test]
    fn test_any_bit_flip_is_rejected() {
        let (leaves, proof, targets, root) = fixture();

        for i in 0..leaves.len() {
            for bit in 0..256 {
                let mut tampered = leaves.clone();
                tampered[i][bit / 8] ^= 1 << (bit % 8);
                assert!(!verify(&tampered, &proof, &targets, &root).unwrap());
            }
        }
        for i in 0..proof.len() {
            for bit in 0..256 {
                let mut tampered = proof.clone();
                tampered[i][bit / 8] ^= 1 << (bit % 8);
                assert!(!verify(&leaves, &tampered, &targets, &root).unwrap());
            }
        }
    }

    #[test]
    fn test_permuted_proof_is_rejected() {
        let (leaves, proof, targets, root) = fixture();
        let mut swapped = proof.clone();
        swapped.swap(0, 2);
        assert!(!verify(&leaves, &swapped, &targets, &root).unwrap());
        assert_eq!(
            ensure_valid(&leaves, &swapped, &targets, &root),
            Err(ProofError::VerificationFailed)
        );

        let mut reversed = proof;
        reversed.reverse();
        assert!(!verify(&leaves, &reversed, &targets, &root).unwrap());
    }

    #[test]
    fn test_permuted_targets_are_rejected() {
        let (leaves, proof, _, root) = fixture();
        assert!(!verify(&leaves, &proof, &gs(&[9, 8, 14]), &root).unwrap());
    }

    #[test]
    fn test_wrong_root_is_rejected() {
        let (leaves, proof, targets, _) = fixture();
        assert!(!verify(&leaves, &proof, &targets, &[0u8; 32]).unwrap());
    }

    #[test]
    fn test_length_mismatches() {
        let (leaves, proof, targets, root) = fixture();
        assert_eq!(
            verify(&leaves[..2], &proof, &targets, &root),
            Err(ProofError::LengthMismatch {
                what: "leaf",
                expected: 3,
                actual: 2
            })
        );
        let mut long = proof.clone();
        long.push([0u8; 32]);
        assert_eq!(
            verify(&leaves, &long, &targets, &root),
            Err(ProofError::LengthMismatch {
                what: "proof",
                expected: 3,
                actual: 4
            })
        );
    }

    #[test]
    fn test_deep_target_with_short_proof_fails_fast() {
        use num_bigint::BigUint;
        use num_traits::One;
        use std::time::{Duration, Instant};

        let deep = GeneralizedIndex::new(BigUint::one() << 100_000u32).unwrap();
        let started = Instant::now();
        assert_eq!(
            verify(&[[0u8; 32]], &[], &[deep.clone()], &[0u8; 32]),
            Err(ProofError::LengthMismatch {
                what: "proof",
                expected: 100_000,
                actual: 0
            })
        );
        assert!(matches!(
            verify(&[[0u8; 32], [1u8; 32]], &[[2u8; 32]; 3], &[deep, g(3)], &[0u8; 32]),
            Err(ProofError::LengthMismatch { what: "proof", actual: 3, .. })
        ));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_malformed_targets_rejected_before_hashing() {
        let (leaves, proof, _, root) = fixture();
        assert_eq!(
            verify(&leaves, &proof, &gs(&[8, 8, 14]), &root),
            Err(ProofError::DuplicateIndex(g(8)))
        );
        assert!(matches!(
            verify(&leaves, &proof, &gs(&[8, 4, 14]), &root),
            Err(ProofError::OverlappingIndices { .. })
        ));
        assert_eq!(verify(&[], &[], &[], &root), Err(ProofError::EmptyIndexSet));
    }

    #[test]
    fn test_root_as_target() {
        let root = [7u8; 32];
        assert!(verify(&[root], &[], &gs(&[1]), &root).unwrap());
        assert!(!verify(&[[8u8; 32]], &[], &gs(&[1]), &root).unwrap());
    }

    #[test]
    fn test_single_branch() {
        let all: Vec<Digest> = (0u8..4).map(|b| [b; 32]).collect();
        let tree = MerkleTree::from_leaves(&all).unwrap();
        let branch = generate(&all, &gs(&[6])).unwrap();

        assert_eq!(calculate_merkle_root(&all[2], &branch, &g(6)).unwrap(), tree.root());
        assert!(verify_merkle_proof(&all[2], &branch, &g(6), &tree.root()).unwrap());
        assert!(!verify_merkle_proof(&all[3], &branch, &g(6), &tree.root()).unwrap());
        assert!(matches!(
            calculate_merkle_root(&all[2], &branch[..1], &g(6)),
            Err(ProofError::LengthMismatch { what: "branch", .. })
        ));
    }
}
