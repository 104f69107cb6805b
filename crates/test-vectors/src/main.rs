//! Test Vector Generator
//!
//! Generates JSON test vectors for multiproof verifiers in other languages.

use anyhow::{ensure, Result};
use clap::Parser;
use multiproof::{
    parse_path, resolve, Digest, GeneralizedIndex, MerkleTree, Multiproof, ProofError, SchemaError,
    SszType,
};
use serde::Serialize;
use sha2::{Digest as _, Sha256};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "generate-test-vectors")]
#[command(about = "Generate Merkle multiproof test vectors")]
struct Args {
    /// Output directory for test vectors
    #[arg(short, long, env = "TEST_VECTORS_DIR", default_value = "test-vectors")]
    output: PathBuf,

    /// Largest leaf count to generate vectors for
    #[arg(long, default_value = "32")]
    max_leaves: u64,

    /// Random target sets per leaf count
    #[arg(long, default_value = "3")]
    cases_per_size: u64,

    /// Seed for the deterministic leaf and target stream
    #[arg(long, env = "TEST_VECTORS_SEED", default_value = "0")]
    seed: u64,
}

/// Test vector file format
#[derive(Debug, Serialize)]
struct TestVectorFile {
    /// Node hash function
    hash: &'static str,
    /// Leaves 0..7 as big-endian integers, targets 8, 9, 14
    worked_example: ValidVector,
    /// Proofs that must verify
    valid: Vec<ValidVector>,
    /// Proofs that must be rejected
    invalid: Vec<InvalidVector>,
    /// Schema paths and the gindex they resolve to
    resolutions: Vec<Resolution>,
}

/// A proof that verifies
#[derive(Debug, Serialize)]
struct ValidVector {
    leaf_count: u64,
    helper_indices: Vec<GeneralizedIndex>,
    #[serde(flatten)]
    multiproof: Multiproof,
}

/// A tampered proof for negative testing
#[derive(Debug, Serialize)]
struct InvalidVector {
    description: String,
    #[serde(flatten)]
    multiproof: Multiproof,
    expected_error: &'static str,
}

#[derive(Debug, Serialize)]
struct Resolution {
    schema: SszType,
    path: String,
    gindex: GeneralizedIndex,
}

/// `sha256(seed ‖ a ‖ b)`, the source of every pseudo-random choice here
fn stream(seed: u64, a: u64, b: u64) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(seed.to_le_bytes());
    hasher.update(a.to_le_bytes());
    hasher.update(b.to_le_bytes());
    hasher.finalize().into()
}

fn be_leaf(value: u64) -> Digest {
    let mut leaf = [0u8; 32];
    leaf[24..].copy_from_slice(&value.to_be_bytes());
    leaf
}

fn valid_vector(leaves: &[Digest], targets: &[GeneralizedIndex]) -> Result<ValidVector> {
    let tree = MerkleTree::from_leaves(leaves)?;
    let multiproof = tree.multiproof(targets)?;
    ensure!(multiproof.verify()?, "generated proof does not verify");
    Ok(ValidVector {
        leaf_count: leaves.len() as u64,
        helper_indices: multiproof.helper_indices(),
        multiproof,
    })
}

/// Leaf-level targets picked from the stream, de-duplicated.
fn pick_targets(seed: u64, leaf_count: u64, case: u64) -> Result<Vec<GeneralizedIndex>> {
    let depth = u64::from(leaf_count.next_power_of_two().trailing_zeros());
    let choice = stream(seed, leaf_count, 1_000 + case);
    let wanted = 1 + usize::from(choice[0] % 4);

    let mut positions: Vec<u64> = choice[1..=wanted]
        .iter()
        .map(|byte| u64::from(*byte) % leaf_count)
        .collect();
    positions.sort_unstable();
    positions.dedup();

    let targets = positions
        .into_iter()
        .map(|pos| GeneralizedIndex::from_depth_and_offset(depth, pos))
        .collect::<Result<Vec<_>, ProofError>>()?;
    Ok(targets)
}

/// Error variant name a verifier must report, `None` if the proof verifies.
fn expected_error(multiproof: &Multiproof) -> Option<&'static str> {
    match multiproof.verify() {
        Ok(true) => None,
        Ok(false) => Some(ProofError::VerificationFailed.kind()),
        Err(e) => Some(e.kind()),
    }
}

fn invalid_vectors(base: &Multiproof) -> Vec<InvalidVector> {
    let mut out = Vec::new();
    let mut push = |description: &str, multiproof: Multiproof| {
        // A tampering that still verifies is not a negative vector
        if let Some(expected_error) = expected_error(&multiproof) {
            out.push(InvalidVector {
                description: description.to_string(),
                multiproof,
                expected_error,
            });
        }
    };

    let mut flipped_leaf = base.clone();
    flipped_leaf.leaves[0][31] ^= 1;
    push("Lowest bit of the first leaf flipped", flipped_leaf);

    if !base.proof.is_empty() {
        let mut flipped_proof = base.clone();
        flipped_proof.proof[0][0] ^= 0x80;
        push("Highest bit of the first helper flipped", flipped_proof);

        let mut truncated = base.clone();
        truncated.proof.pop();
        push("Last helper dropped", truncated);
    }

    if base.proof.len() >= 2 {
        let mut swapped = base.clone();
        swapped.proof.swap(0, 1);
        push("First two helpers swapped", swapped);
    }

    let mut wrong_root = base.clone();
    wrong_root.root = [0u8; 32];
    push("Zero root", wrong_root);

    let mut duplicated = base.clone();
    duplicated.indices.push(base.indices[0].clone());
    duplicated.leaves.push(base.leaves[0]);
    push("Target index repeated", duplicated);

    out
}

fn resolutions() -> Result<Vec<Resolution>> {
    let header = SszType::container([
        ("slot", SszType::uint64()),
        ("proposer_index", SszType::uint64()),
        ("parent_root", SszType::bytes32()),
        ("state_root", SszType::bytes32()),
        ("body_root", SszType::bytes32()),
    ]);
    let body = SszType::container([
        ("randao_reveal", SszType::vector(SszType::Basic { size: 1 }, 96)),
        ("graffiti", SszType::bytes32()),
        (
            "blob_kzg_commitments",
            SszType::list(SszType::vector(SszType::Basic { size: 1 }, 48), 4096),
        ),
        ("balances", SszType::list(SszType::uint64(), 1 << 40)),
    ]);

    let cases = [
        (&header, "state_root"),
        (&header, "body_root"),
        (&body, "blob_kzg_commitments.0"),
        (&body, "blob_kzg_commitments.4095"),
        (&body, "blob_kzg_commitments.length"),
        (&body, "balances.1000000"),
    ];

    let resolved = cases
        .into_iter()
        .map(|(schema, path)| {
            resolve(schema, &parse_path(path)).map(|gindex| Resolution {
                schema: schema.clone(),
                path: path.to_string(),
                gindex,
            })
        })
        .collect::<Result<Vec<_>, SchemaError>>()?;
    Ok(resolved)
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    ensure!(args.max_leaves >= 1, "--max-leaves must be at least 1");

    tracing::info!(
        output = %args.output.display(),
        max_leaves = args.max_leaves,
        cases_per_size = args.cases_per_size,
        seed = args.seed,
        "Generating test vectors"
    );

    // Ensure output directory exists
    std::fs::create_dir_all(&args.output)?;

    let example_leaves: Vec<Digest> = (0..8).map(be_leaf).collect();
    let example_targets = [8u64, 9, 14]
        .into_iter()
        .map(GeneralizedIndex::try_from)
        .collect::<Result<Vec<_>, ProofError>>()?;
    let worked_example = valid_vector(&example_leaves, &example_targets)?;

    let mut valid = Vec::new();
    let mut invalid = Vec::new();
    for leaf_count in 1..=args.max_leaves {
        let leaves: Vec<Digest> = (0..leaf_count)
            .map(|i| stream(args.seed, leaf_count, i))
            .collect();

        for case in 0..args.cases_per_size {
            let targets = pick_targets(args.seed, leaf_count, case)?;
            let vector = valid_vector(&leaves, &targets)?;
            if case == 0 {
                invalid.extend(invalid_vectors(&vector.multiproof));
            }
            valid.push(vector);
        }
    }

    let file = TestVectorFile {
        hash: "sha256",
        worked_example,
        valid,
        invalid,
        resolutions: resolutions()?,
    };

    tracing::info!(
        valid = file.valid.len(),
        invalid = file.invalid.len(),
        resolutions = file.resolutions.len(),
        "Built test vectors"
    );

    let output_path = args.output.join("multiproof_vectors.json");
    let json = serde_json::to_string_pretty(&file)?;
    std::fs::write(&output_path, json)?;

    tracing::info!(path = %output_path.display(), "Wrote test vectors");

    Ok(())
}
