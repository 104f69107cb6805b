//! Layered Merkle Tree
//!
//! Materializes every layer of a binary Merkle tree from its leaf digests.
//! Layer 0 is padded once, to the next power of two, with zero leaves; every
//! layer above it is exactly half the one below, so a node at depth `d` and
//! offset `o` always lives at `layers[tree_depth - d][o]`.
//!
//! A tree may also be declared deeper than its leaves need (an SSZ list
//! limit). Only the populated part is materialized: above it each layer keeps
//! its single leftmost node, and every other node is a zero subtree read from
//! the zero-hash table.

use num_traits::ToPrimitive;

use crate::gindex::GeneralizedIndex;
use crate::hash::{hash_pair, Digest};
use crate::proof::{Multiproof, ProofError};
use crate::zero::{zero_hashes, ZERO_HASHES_DEPTH};

/// Deepest tree that can be declared; bounded by the zero-hash table.
pub const MAX_TREE_DEPTH: u32 = ZERO_HASHES_DEPTH as u32;

/// A fully hashed Merkle tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    /// `layers[0]` are the padded leaves, the last layer holds the root
    layers: Vec<Vec<Digest>>,
}

impl MerkleTree {
    /// Build the smallest tree holding `leaves`.
    pub fn from_leaves(leaves: &[Digest]) -> Result<Self, ProofError> {
        let depth = natural_depth(leaves.len())?;
        Self::with_depth(leaves, depth)
    }

    /// Build a tree of `2^depth` leaf slots whose first slots are `leaves`.
    pub fn with_depth(leaves: &[Digest], depth: u32) -> Result<Self, ProofError> {
        if depth > MAX_TREE_DEPTH {
            return Err(ProofError::TreeTooDeep {
                depth,
                max: MAX_TREE_DEPTH,
            });
        }
        let populated = natural_depth(leaves.len())?;
        if populated > depth {
            return Err(ProofError::LeafCountExceedsDepth {
                leaves: leaves.len(),
                depth,
            });
        }

        let mut layer = leaves.to_vec();
        layer.resize(1usize << populated, zero_hashes()[0]);

        let mut layers = Vec::with_capacity(depth as usize + 1);
        for _ in 0..populated {
            let parent: Vec<Digest> = layer
                .chunks_exact(2)
                .map(|pair| hash_pair(&pair[0], &pair[1]))
                .collect();
            layers.push(std::mem::replace(&mut layer, parent));
        }

        // Virtual levels: the populated subtree is always the left child.
        let zh = zero_hashes();
        for height in populated..depth {
            let parent = vec![hash_pair(&layer[0], &zh[height as usize])];
            layers.push(std::mem::replace(&mut layer, parent));
        }
        layers.push(layer);

        Ok(Self { layers })
    }

    /// Number of levels below the root.
    #[must_use]
    pub fn depth(&self) -> u32 {
        (self.layers.len() - 1) as u32
    }

    #[must_use]
    pub fn root(&self) -> Digest {
        self.layers[self.layers.len() - 1][0]
    }

    #[must_use]
    pub fn layers(&self) -> &[Vec<Digest>] {
        &self.layers
    }

    /// Materialized nodes at `height` above the leaves.
    #[must_use]
    pub fn layer(&self, height: u32) -> Option<&[Digest]> {
        self.layers.get(height as usize).map(Vec::as_slice)
    }

    /// Digest of the node at `index`.
    ///
    /// Nodes outside the materialized range are zero subtrees. Indices deeper
    /// than the tree are out of domain.
    pub fn node(&self, index: &GeneralizedIndex) -> Result<Digest, ProofError> {
        let depth = u64::from(self.depth());
        if index.depth() > depth {
            return Err(ProofError::IndexOutOfDomain {
                index: index.to_string(),
                depth,
            });
        }
        let height = (depth - index.depth()) as usize;
        let populated = index
            .offset_in_layer()
            .to_usize()
            .and_then(|offset| self.layers[height].get(offset));
        // height <= depth <= MAX_TREE_DEPTH, always inside the zero table
        Ok(populated.copied().unwrap_or_else(|| zero_hashes()[height]))
    }

    /// Multiproof bundle for `targets`, carrying the target node digests.
    pub fn multiproof(&self, targets: &[GeneralizedIndex]) -> Result<Multiproof, ProofError> {
        let proof = crate::generator::prove_from_tree(self, targets)?;
        let leaves = targets
            .iter()
            .map(|index| self.node(index))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Multiproof {
            indices: targets.to_vec(),
            leaves,
            proof,
            root: self.root(),
        })
    }
}

/// `ceil(log2(count))`, the depth of the smallest tree holding `count` leaves.
fn natural_depth(count: usize) -> Result<u32, ProofError> {
    if count == 0 {
        return Err(ProofError::EmptyLeaves);
    }
    Ok(count.next_power_of_two().trailing_zeros())
}

/// Mix in the length for a List's Merkle root.
/// `list_root = hash(data_root, length_as_le_bytes32)`
#[must_use]
pub fn mix_in_length(data_root: &Digest, length: u64) -> Digest {
    hash_pair(data_root, &length_chunk(length))
}

/// The length mix-in node: `length` little-endian, zero padded to 32 bytes.
#[must_use]
pub fn length_chunk(length: u64) -> Digest {
    let mut length_bytes = [0u8; 32];
    length_bytes[..8].copy_from_slice(&length.to_le_bytes());
    length_bytes
}
