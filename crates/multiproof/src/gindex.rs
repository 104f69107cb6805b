//! Generalized Index Arithmetic
//!
//! A generalized index (gindex) addresses a node of a virtual complete binary
//! tree: the root is 1 and the children of `i` are `2i` and `2i + 1`, so the
//! bits after the leading 1 spell the path from the root. Deep paths into
//! large lists exceed 64 bits, so indices are arbitrary-precision.

use std::fmt;
use std::str::FromStr;

use num_bigint::BigUint;
use num_traits::{One, ToPrimitive, Zero};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::proof::ProofError;

/// A node address in a binary Merkle tree. Always `>= 1`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GeneralizedIndex(BigUint);

impl GeneralizedIndex {
    /// The root node, gindex 1.
    #[must_use]
    pub fn root() -> Self {
        Self(BigUint::one())
    }

    /// Wrap a raw integer, rejecting zero.
    pub fn new(value: BigUint) -> Result<Self, ProofError> {
        if value.is_zero() {
            return Err(ProofError::ZeroIndex);
        }
        Ok(Self(value))
    }

    /// Callers guarantee `value >= 1`.
    pub(crate) fn from_nonzero(value: BigUint) -> Self {
        debug_assert!(!value.is_zero());
        Self(value)
    }

    /// The node at `offset` (0-indexed, left to right) among the `2^depth`
    /// nodes of the given depth.
    pub fn from_depth_and_offset(depth: u64, offset: u64) -> Result<Self, ProofError> {
        let base = BigUint::one() << depth;
        if BigUint::from(offset) >= base {
            return Err(ProofError::OffsetOutOfLayer { offset, depth });
        }
        Ok(Self(base + offset))
    }

    #[must_use]
    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }

    #[must_use]
    pub fn to_u64(&self) -> Option<u64> {
        self.0.to_u64()
    }

    /// Length of the path from the root, i.e. `bitlength - 1`.
    #[must_use]
    pub fn depth(&self) -> u64 {
        self.0.bits() - 1
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_one()
    }

    /// Whether this node is the left child of its parent (lowest bit clear).
    #[must_use]
    pub fn is_left(&self) -> bool {
        !self.bit(0)
    }

    /// Bit `position` of the index; bit `i` decides the side of the node at
    /// height `i` on the path when climbing to the root.
    #[must_use]
    pub fn bit(&self, position: u64) -> bool {
        ((&self.0 >> position) & &BigUint::one()).is_one()
    }

    /// `i xor 1`. The root has no sibling.
    #[must_use]
    pub fn sibling(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(Self(&self.0 ^ &BigUint::one()))
    }

    /// `i >> 1`. The root has no parent.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(Self(&self.0 >> 1u32))
    }

    /// `2i + right`
    #[must_use]
    pub fn child(&self, right: bool) -> Self {
        Self((&self.0 << 1u32) + u32::from(right))
    }

    /// Largest power of two not above the index, `2^depth`.
    #[must_use]
    pub fn floor_pow2(&self) -> BigUint {
        BigUint::one() << self.depth()
    }

    /// Position of the node within its layer, `i - 2^depth`.
    #[must_use]
    pub fn offset_in_layer(&self) -> BigUint {
        &self.0 - &self.floor_pow2()
    }

    /// Strict ancestry: `self` lies on the path from `other` to the root and
    /// is not `other` itself.
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        let (mine, theirs) = (self.depth(), other.depth());
        theirs > mine && (&other.0 >> (theirs - mine)) == self.0
    }

    /// The ancestor at `depth`, or the node itself at its own depth.
    /// Callers guarantee `depth <= self.depth()`.
    #[must_use]
    pub fn ancestor_at(&self, depth: u64) -> Self {
        Self(&self.0 >> (self.depth() - depth))
    }

    /// Concatenate generalized indices along a path
    ///
    /// Given gindices `i1` for A → B, `i2` for B → C, …, returns the gindex
    /// for A → Z. An empty chain is the root.
    #[must_use]
    pub fn concat(indices: &[GeneralizedIndex]) -> Self {
        let mut result = BigUint::one();
        for gindex in indices {
            let pow = gindex.floor_pow2();
            result = result * &pow + (&gindex.0 - &pow);
        }
        Self(result)
    }

    /// Sibling of every node on the path to the root, root excluded, ordered
    /// from the node upwards. This is the branch of a single-leaf proof.
    #[must_use]
    pub fn branch_indices(&self) -> Vec<Self> {
        let mut branch = Vec::with_capacity(usize::try_from(self.depth()).unwrap_or(0));
        let mut current = self.clone();
        while let (Some(sibling), Some(parent)) = (current.sibling(), current.parent()) {
            branch.push(sibling);
            current = parent;
        }
        branch
    }

    /// The node itself followed by its ancestors, root excluded.
    #[must_use]
    pub fn path_indices(&self) -> Vec<Self> {
        let mut path = Vec::with_capacity(usize::try_from(self.depth()).unwrap_or(0));
        let mut current = self.clone();
        while let Some(parent) = current.parent() {
            path.push(current);
            current = parent;
        }
        path
    }
}

impl TryFrom<u64> for GeneralizedIndex {
    type Error = ProofError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(BigUint::from(value))
    }
}

impl TryFrom<BigUint> for GeneralizedIndex {
    type Error = ProofError;

    fn try_from(value: BigUint) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<GeneralizedIndex> for BigUint {
    fn from(gindex: GeneralizedIndex) -> Self {
        gindex.0
    }
}

impl fmt::Display for GeneralizedIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for GeneralizedIndex {
    type Err = ProofError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .trim()
            .parse::<BigUint>()
            .map_err(|_| ProofError::InvalidIndex(s.to_string()))?;
        Self::new(value)
    }
}

// Decimal strings on the wire: JSON numbers stop being exact past 2^53.
impl Serialize for GeneralizedIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for GeneralizedIndex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
