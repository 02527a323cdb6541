//! Durable challenge progress. Each record is the state machine of one
//! pipeline for one epoch, persisted after every externally observable step
//! so a restart re-enters at the latest durable boundary.

use ceres_lib::pois::SpaceProof;
use ceres_lib::types::WorkerPublicKey;
use serde::{Deserialize, Serialize};

/// One proven subrange of the idle set, with the miner's endorsement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileBlockProof {
    pub left: i64,
    pub right: i64,
    pub space_proof: SpaceProof,
    /// SHA-256 over the canonical proof encoding.
    pub proof_hash: Vec<u8>,
    /// Miner signature over `proof_hash`, required before any TEE sees it.
    pub proof_hash_sign: Vec<u8>,
}

/// A TEE's endorsement of one verified block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockVerification {
    pub proof_hash: Vec<u8>,
    pub left: i64,
    pub right: i64,
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdleProofRecord {
    pub start: u32,
    pub chain_front: i64,
    pub chain_rear: i64,
    pub acc: Vec<u8>,
    pub chall_random: Vec<i64>,
    pub file_block_proofs: Vec<FileBlockProof>,
    /// SHA-256 over the concatenated per-block proof hashes, insertion order.
    pub idle_proof: Vec<u8>,
    /// Per-block TEE verifications, ready for the total verification.
    pub blocks_proof: Vec<BlockVerification>,
    pub allocated_tee: Option<WorkerPublicKey>,
    pub total_signature: Option<Vec<u8>>,
    pub idle_result: bool,
}

impl IdleProofRecord {
    pub fn new(start: u32, front: i64, rear: i64, acc: Vec<u8>, chall_random: Vec<i64>) -> Self {
        Self {
            start,
            chain_front: front,
            chain_rear: rear,
            acc,
            chall_random,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceProofRecord {
    pub start: u32,
    /// Aggregate σ submitted as the service proof.
    pub proof: String,
    pub bloom_filter: Vec<u64>,
    pub tee_pubkey: WorkerPublicKey,
    pub signature: Vec<u8>,
    /// True while the proof submission is still owed to the chain.
    pub submit_proof: bool,
    /// True while the verified-result submission is still owed.
    pub submit_result: bool,
}
