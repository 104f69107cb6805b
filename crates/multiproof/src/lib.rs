//! # Merkle Multiproof Library
//!
//! Generalized-index Merkle multiproofs over SSZ-style binary trees:
//! - resolve a field/element path through a type schema to a generalized index
//! - derive the helper indices a set of targets needs
//! - generate the helper digests from a tree of leaf digests
//! - verify leaves plus helpers against a root without building the tree

pub mod generator;
pub mod gindex;
pub mod hash;
pub mod helper;
pub mod proof;
pub mod schema;
pub mod tree;
pub mod verifier;
pub mod zero;

pub use generator::{generate, generate_with_depth, prove_from_tree};
pub use gindex::GeneralizedIndex;
pub use hash::{hash_pair, Digest};
pub use helper::{helper_indices, TargetSet};
pub use proof::{Multiproof, ProofError};
pub use schema::{
    parse_path, resolve, resolve_item, ItemPosition, PathElement, SchemaError, SszType,
};
pub use tree::{length_chunk, mix_in_length, MerkleTree, MAX_TREE_DEPTH};
pub use verifier::{
    calculate_merkle_root, calculate_multi_merkle_root, ensure_valid, verify, verify_merkle_proof,
};
pub use zero::{zero_hash, zero_hashes, ZERO_HASHES_DEPTH};
