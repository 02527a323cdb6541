#![allow(dead_code)]

use std::sync::Arc;

use ceres_chain::{
    ChallengeElement, ChallengeInfo, MinerSnapshot, ProveAssignment, ProveInfo, SpaceProofInfo,
};
use ceres_host::config::Config;
use ceres_host::mock::{MockChain, MockVerifier};
use ceres_host::native::{NativePorProver, NativeSpaceProver};
use ceres_host::signer::KeypairSigner;
use ceres_host::{Node, NodeParts};
use ceres_lib::pois::RsaKey;
use ceres_lib::signer::Signer;
use ceres_lib::types::{AccountId, TeeRole, WorkerPublicKey};
use ceres_tee::TeeRegistry;

pub const TEE_KEY: WorkerPublicKey = [9u8; 32];

const SEED: &str = "2222222222222222222222222222222222222222222222222222222222222222";

pub fn miner_key() -> AccountId {
    KeypairSigner::from_seed_hex(SEED).unwrap().public_key()
}

pub fn test_node(
    dir: &tempfile::TempDir,
    chain: Arc<MockChain>,
    verifier: Arc<MockVerifier>,
) -> Arc<Node> {
    let config = Config {
        workspace: dir.path().to_path_buf(),
        ..Default::default()
    };
    Node::new(
        config,
        NodeParts {
            chain,
            verifier,
            registry: Arc::new(TeeRegistry::new(Vec::new())),
            signer: Arc::new(KeypairSigner::from_seed_hex(SEED).unwrap()),
            space_prover: Box::new(NativeSpaceProver::default()),
            por_prover: Arc::new(NativePorProver),
            pois_key: RsaKey::default(),
        },
    )
    .unwrap()
}

/// Registry entry so endpoint resolution does not go through the chain.
pub fn register_tee(node: &Node) {
    node.registry
        .save(&hex::encode(TEE_KEY), "tee:80", TeeRole::Verifier);
}

/// Challenge snapshot the chain serves after the idle proof lands.
pub fn challenge_with_allocation(start: u32, expiration: u32) -> ChallengeInfo {
    ChallengeInfo {
        challenge: ChallengeElement {
            start,
            verify_expiration: expiration,
            space_param: vec![1, 2, 3, 4, 5, 6, 7, 8],
            random_index_list: Vec::new(),
            random_list: Vec::new(),
            miner_snapshot: MinerSnapshot {
                space_proof_info: SpaceProofInfo {
                    front: 0,
                    rear: 1,
                    accumulator: vec![1; 4],
                },
                tee_signature: vec![2; 8],
            },
        },
        prove_info: ProveInfo {
            idle_prove: Some(ProveAssignment {
                tee_pubkey: TEE_KEY,
            }),
            service_prove: None,
        },
    }
}
