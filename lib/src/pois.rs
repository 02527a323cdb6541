//! Proof-of-idle-space primitives.
//!
//! The inner cryptography (RSA accumulator, merkle labeling) lives behind the
//! [`SpaceProver`] trait; this module fixes the proof *shapes* and the
//! canonical byte encoding their digests are computed over.

use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum PoisError {
    #[error("PoisError::Prover `{0}`")]
    Prover(String),
    #[error("PoisError::State `{0}`")]
    State(String),
}

impl From<String> for PoisError {
    fn from(e: String) -> Self {
        PoisError::Prover(e)
    }
}

/// RSA key material backing the accumulator. Opaque big-endian byte blobs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RsaKey {
    pub n: Vec<u8>,
    pub g: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MhtProof {
    pub index: i32,
    pub label: Vec<u8>,
    pub paths: Vec<Vec<u8>>,
    pub locs: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MhtProofGroup {
    pub proofs: Vec<MhtProof>,
}

/// One node of an accumulator witness chain. The chain is a homogeneous
/// linked structure; a terminal node carries no `acc`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccWitnessNode {
    pub elem: Vec<u8>,
    pub wit: Vec<u8>,
    pub acc: Option<Box<AccWitnessNode>>,
}

impl AccWitnessNode {
    /// Number of nodes in this chain, including self.
    pub fn depth(&self) -> usize {
        1 + self.acc.as_deref().map_or(0, AccWitnessNode::depth)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpaceProof {
    pub left: i64,
    pub right: i64,
    pub roots: Vec<Vec<u8>>,
    pub proofs: Vec<MhtProofGroup>,
    pub wit_chains: Vec<AccWitnessNode>,
}

/// Canonical wire encoding of a space proof.
///
/// Every variable-length field is prefixed with its u64 big-endian length and
/// fields are emitted in declaration order, so the encoding (and therefore
/// the per-block proof hash) is stable across runs and platforms.
pub fn encode_space_proof(proof: &SpaceProof) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&proof.left.to_be_bytes());
    out.extend_from_slice(&proof.right.to_be_bytes());
    put_bytes_list(&mut out, &proof.roots);
    out.extend_from_slice(&(proof.proofs.len() as u64).to_be_bytes());
    for group in &proof.proofs {
        out.extend_from_slice(&(group.proofs.len() as u64).to_be_bytes());
        for p in &group.proofs {
            out.extend_from_slice(&p.index.to_be_bytes());
            put_bytes(&mut out, &p.label);
            put_bytes_list(&mut out, &p.paths);
            put_bytes(&mut out, &p.locs);
        }
    }
    out.extend_from_slice(&(proof.wit_chains.len() as u64).to_be_bytes());
    for node in &proof.wit_chains {
        encode_wit_node(&mut out, node);
    }
    out
}

fn encode_wit_node(out: &mut Vec<u8>, node: &AccWitnessNode) {
    put_bytes(out, &node.elem);
    put_bytes(out, &node.wit);
    match &node.acc {
        Some(next) => {
            out.push(1);
            encode_wit_node(out, next);
        }
        None => out.push(0),
    }
}

fn put_bytes(out: &mut Vec<u8>, b: &[u8]) {
    out.extend_from_slice(&(b.len() as u64).to_be_bytes());
    out.extend_from_slice(b);
}

fn put_bytes_list(out: &mut Vec<u8>, list: &[Vec<u8>]) {
    out.extend_from_slice(&(list.len() as u64).to_be_bytes());
    for b in list {
        put_bytes(out, b);
    }
}

/// Yields challenged subranges of the idle block set. Fed the hash of the
/// previous block proof; returns `left == right` when the walk is done.
pub type ChallengeHandle = Box<dyn FnMut(Option<&[u8]>) -> (i64, i64) + Send>;

/// Black-box space prover over the miner's sealed idle blocks.
pub trait SpaceProver: Send {
    /// Bind the prover to the challenge state published on the chain.
    fn set_challenge_state(
        &mut self,
        key: &RsaKey,
        acc: &[u8],
        front: i64,
        rear: i64,
    ) -> Result<(), PoisError>;

    /// Build the subrange iterator for this challenge. Iteration order is
    /// fixed by the handle; callers must not reorder it.
    fn challenge_handle(&self, miner_id: &[u8], chall_random: &[i64]) -> ChallengeHandle;

    /// Prove possession of blocks in `[left, right)`.
    fn prove_space(
        &mut self,
        chall_random: &[i64],
        left: i64,
        right: i64,
    ) -> Result<SpaceProof, PoisError>;
}
