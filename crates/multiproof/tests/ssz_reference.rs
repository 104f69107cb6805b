//! Cross-checks against `ssz_rs` merkleization and branch verification

use multiproof::{
    generate, generate_with_depth, length_chunk, mix_in_length, parse_path, resolve, verify,
    verify_merkle_proof, Digest, GeneralizedIndex, MerkleTree, SszType,
};
use ssz_rs::prelude::*;

/// Beacon block header
#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
struct BeaconBlockHeader {
    slot: u64,
    proposer_index: u64,
    parent_root: [u8; 32],
    state_root: [u8; 32],
    body_root: [u8; 32],
}

fn header_schema() -> SszType {
    SszType::container([
        ("slot", SszType::uint64()),
        ("proposer_index", SszType::uint64()),
        ("parent_root", SszType::bytes32()),
        ("state_root", SszType::bytes32()),
        ("body_root", SszType::bytes32()),
    ])
}

fn uint64_chunk(value: u64) -> Digest {
    let mut chunk = [0u8; 32];
    chunk[..8].copy_from_slice(&value.to_le_bytes());
    chunk
}

fn sample_header() -> BeaconBlockHeader {
    BeaconBlockHeader {
        slot: 12345,
        proposer_index: 42,
        parent_root: [1u8; 32],
        state_root: [2u8; 32],
        body_root: [3u8; 32],
    }
}

/// Field roots of the header, in declaration order
fn field_roots(header: &BeaconBlockHeader) -> Vec<Digest> {
    vec![
        uint64_chunk(header.slot),
        uint64_chunk(header.proposer_index),
        header.parent_root,
        header.state_root,
        header.body_root,
    ]
}

fn to_node(digest: &Digest) -> Node {
    Node::try_from(digest.as_slice()).unwrap()
}

#[test]
fn test_padded_tree_matches_hash_tree_root() {
    let header = sample_header();
    let expected: [u8; 32] = header.hash_tree_root().unwrap().into();

    let tree = MerkleTree::from_leaves(&field_roots(&header)).unwrap();
    assert_eq!(tree.root(), expected);
}

#[test]
fn test_state_root_multiproof_against_ssz_root() {
    let header = sample_header();
    let root: [u8; 32] = header.hash_tree_root().unwrap().into();
    let leaves = field_roots(&header);

    let state_root = resolve(&header_schema(), &parse_path("state_root")).unwrap();
    let body_root = resolve(&header_schema(), &parse_path("body_root")).unwrap();
    assert_eq!(state_root.to_u64(), Some(11));
    assert_eq!(body_root.to_u64(), Some(12));

    let targets = vec![state_root, body_root];
    let proof = generate(&leaves, &targets).unwrap();
    assert!(verify(&[header.state_root, header.body_root], &proof, &targets, &root).unwrap());
    assert!(!verify(&[header.body_root, header.state_root], &proof, &targets, &root).unwrap());
}

#[test]
fn test_single_branch_accepted_by_ssz_rs() {
    let header = sample_header();
    let root: [u8; 32] = header.hash_tree_root().unwrap().into();
    let leaves = field_roots(&header);

    for field in ["slot", "proposer_index", "parent_root", "state_root", "body_root"] {
        let gindex = resolve(&header_schema(), &[field.into()]).unwrap();
        let branch = generate(&leaves, std::slice::from_ref(&gindex)).unwrap();
        let leaf = MerkleTree::from_leaves(&leaves).unwrap().node(&gindex).unwrap();

        let nodes: Vec<Node> = branch.iter().map(to_node).collect();
        let index = gindex.to_u64().unwrap() as usize;
        ssz_rs::proofs::is_valid_merkle_branch_for_generalized_index(
            to_node(&leaf),
            &nodes,
            index,
            to_node(&root),
        )
        .expect("proof should be valid");
    }
}

#[test]
fn test_list_length_node_through_resolver() {
    // List[uint64, 16] holding three values: 4 per chunk, 4 data chunks
    let schema = SszType::list(SszType::uint64(), 16);
    let values = [7u64, 8, 9];

    let mut chunk = [0u8; 32];
    for (i, value) in values.iter().enumerate() {
        chunk[i * 8..(i + 1) * 8].copy_from_slice(&value.to_le_bytes());
    }
    let data = MerkleTree::with_depth(&[chunk], 2).unwrap();
    let list_root = mix_in_length(&data.root(), values.len() as u64);

    // Whole list as a tree: data root at 2, length at 3, chunks at 8..=11
    let length_index = resolve(&schema, &parse_path("length")).unwrap();
    let element_index = resolve(&schema, &parse_path("2")).unwrap();
    assert_eq!(length_index.to_u64(), Some(3));
    assert_eq!(element_index.to_u64(), Some(8));

    let full = MerkleTree::from_leaves(&[data.root(), length_chunk(3)]).unwrap();
    assert_eq!(full.root(), list_root);

    let targets = vec![length_index];
    let proof = generate(&[data.root(), length_chunk(3)], &targets).unwrap();
    assert_eq!(proof, vec![data.root()]);
    assert!(verify(&[length_chunk(3)], &proof, &targets, &list_root).unwrap());

    // The element chunk, proven across the list's data tree and length node
    let mut element_proof =
        generate_with_depth(&[chunk], 2, &[GeneralizedIndex::try_from(4).unwrap()]).unwrap();
    element_proof.push(length_chunk(3));
    assert!(verify_merkle_proof(&chunk, &element_proof, &element_index, &list_root).unwrap());
}
