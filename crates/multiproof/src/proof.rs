//! Multiproof bundles and the error taxonomy shared by the whole crate.
//!
//! A [`Multiproof`] carries everything a verifier needs: the target indices,
//! the digests found at those indices, the helper digests in descending
//! helper-index order, and the root they must reconstruct.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gindex::GeneralizedIndex;
use crate::hash::Digest;
use crate::helper::helper_indices;
use crate::schema::SchemaError;
use crate::verifier;

/// Errors that can occur during proof generation or verification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProofError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Generalized index 0 does not address a node")]
    ZeroIndex,

    #[error("Invalid generalized index {0:?}: must be a positive integer")]
    InvalidIndex(String),

    #[error("Offset {offset} does not fit in a layer of depth {depth}")]
    OffsetOutOfLayer { offset: u64, depth: u64 },

    #[error("Index {index} is out of domain for a tree of depth {depth}")]
    IndexOutOfDomain { index: String, depth: u64 },

    #[error("Target index set is empty")]
    EmptyIndexSet,

    #[error("Duplicate target index {0}")]
    DuplicateIndex(GeneralizedIndex),

    #[error("Target {ancestor} is an ancestor of target {descendant}")]
    OverlappingIndices {
        ancestor: GeneralizedIndex,
        descendant: GeneralizedIndex,
    },

    #[error("Cannot build a tree without leaves")]
    EmptyLeaves,

    #[error("Tree depth {depth} exceeds the supported maximum of {max}")]
    TreeTooDeep { depth: u32, max: u32 },

    #[error("{leaves} leaves do not fit a tree of depth {depth}")]
    LeafCountExceedsDepth { leaves: usize, depth: u32 },

    #[error("{what} count mismatch: expected {expected}, got {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Multiproof does not reconstruct the expected root")]
    VerificationFailed,
}

impl ProofError {
    /// Stable variant name, for reporting errors outside Rust.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Schema(_) => "Schema",
            Self::ZeroIndex => "ZeroIndex",
            Self::InvalidIndex(_) => "InvalidIndex",
            Self::OffsetOutOfLayer { .. } => "OffsetOutOfLayer",
            Self::IndexOutOfDomain { .. } => "IndexOutOfDomain",
            Self::EmptyIndexSet => "EmptyIndexSet",
            Self::DuplicateIndex(_) => "DuplicateIndex",
            Self::OverlappingIndices { .. } => "OverlappingIndices",
            Self::EmptyLeaves => "EmptyLeaves",
            Self::TreeTooDeep { .. } => "TreeTooDeep",
            Self::LeafCountExceedsDepth { .. } => "LeafCountExceedsDepth",
            Self::LengthMismatch { .. } => "LengthMismatch",
            Self::VerificationFailed => "VerificationFailed",
        }
    }
}

/// A self-contained multiproof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Multiproof {
    /// Proven generalized indices, in caller order
    pub indices: Vec<GeneralizedIndex>,

    /// Node digests at `indices`, parallel to them
    #[serde(with = "digest_vec_serde")]
    pub leaves: Vec<Digest>,

    /// Helper digests, parallel to `helper_indices(indices)`
    #[serde(with = "digest_vec_serde")]
    pub proof: Vec<Digest>,

    /// Root the proof authenticates against
    #[serde(with = "digest_serde")]
    pub root: Digest,
}

impl Multiproof {
    /// Indices of the helper digests, in proof order.
    #[must_use]
    pub fn helper_indices(&self) -> Vec<GeneralizedIndex> {
        helper_indices(&self.indices)
    }

    /// Check the bundle against its own root.
    pub fn verify(&self) -> Result<bool, ProofError> {
        verifier::verify(&self.leaves, &self.proof, &self.indices, &self.root)
    }

    /// Check the bundle against an externally trusted root.
    pub fn verify_against(&self, root: &Digest) -> Result<bool, ProofError> {
        verifier::verify(&self.leaves, &self.proof, &self.indices, root)
    }
}

/// Custom serde for `Vec<[u8; 32]>` as hex strings
pub mod digest_vec_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::hash::Digest;

    pub fn serialize<S>(data: &[Digest], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let hex_strings: Vec<String> = data.iter().map(|h| format!("0x{}", hex::encode(h))).collect();
        hex_strings.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Digest>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let hex_strings: Vec<String> = Vec::deserialize(deserializer)?;
        hex_strings
            .iter()
            .map(|s| super::digest_serde::decode(s).map_err(serde::de::Error::custom))
            .collect()
    }
}

/// Custom serde for a single `[u8; 32]` as a hex string
pub mod digest_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::hash::Digest;

    pub fn serialize<S>(bytes: &Digest, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Digest, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        decode(&s).map_err(serde::de::Error::custom)
    }

    pub(crate) fn decode(s: &str) -> Result<Digest, String> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| e.to_string())?;
        bytes
            .try_into()
            .map_err(|_| "expected 32 bytes".to_string())
    }
}
