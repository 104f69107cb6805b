//! Multiproof Generation
//!
//! Builds the tree, derives the helper indices from the targets alone, then
//! reads each helper node out of the tree. Helpers that fall outside the
//! materialized part of a declared-depth tree are zero subtrees.

use tracing::{debug, instrument};

use crate::gindex::GeneralizedIndex;
use crate::hash::Digest;
use crate::helper::TargetSet;
use crate::proof::ProofError;
use crate::tree::MerkleTree;

/// Generate the multiproof for `targets` over the smallest tree of `leaves`.
///
/// Returns the helper digests in descending helper-index order.
pub fn generate(leaves: &[Digest], targets: &[GeneralizedIndex]) -> Result<Vec<Digest>, ProofError> {
    // Targets are checked before any leaf is hashed; prove_from_tree
    // repeats the check for callers that bring their own tree.
    TargetSet::new(targets)?;
    let tree = MerkleTree::from_leaves(leaves)?;
    prove_from_tree(&tree, targets)
}

/// Generate the multiproof for `targets` over a tree of `2^depth` leaf
/// slots whose first slots are `leaves`.
pub fn generate_with_depth(
    leaves: &[Digest],
    depth: u32,
    targets: &[GeneralizedIndex],
) -> Result<Vec<Digest>, ProofError> {
    // Same early check as `generate`
    TargetSet::new(targets)?;
    let tree = MerkleTree::with_depth(leaves, depth)?;
    prove_from_tree(&tree, targets)
}

/// Read the helper digests for `targets` out of an already built tree.
#[instrument(skip_all, fields(targets = targets.len(), depth = tree.depth()))]
pub fn prove_from_tree(tree: &MerkleTree, targets: &[GeneralizedIndex]) -> Result<Vec<Digest>, ProofError> {
    let targets = TargetSet::new(targets)?;

    let depth = u64::from(tree.depth());
    if let Some(too_deep) = targets.indices().iter().find(|t| t.depth() > depth) {
        return Err(ProofError::IndexOutOfDomain {
            index: too_deep.to_string(),
            depth,
        });
    }

    let helpers = targets.helper_indices();
    let proof = helpers
        .iter()
        .map(|helper| tree.node(helper))
        .collect::<Result<Vec<_>, _>>()?;

    debug!(helpers = proof.len(), "Generated multiproof");
    Ok(proof)
}
