mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use ceres_host::error::HostError;
use ceres_host::idle::IdleChallengeParams;
use ceres_host::mock::{MockChain, MockVerifier};
use ceres_host::record::IdleProofRecord;
use ceres_host::store::StoreError;
use ceres_lib::pois::{encode_space_proof, RsaKey, SpaceProver};
use ceres_host::native::NativeSpaceProver;
use sha2::{Digest, Sha256};

use common::{challenge_with_allocation, register_tee, test_node, TEE_KEY};

fn params(start: u32, front: i64, rear: i64) -> IdleChallengeParams {
    IdleChallengeParams {
        latest_block: 10,
        start,
        verify_expiration: 1000,
        front,
        rear,
        space_param: vec![1, 2, 3, 4, 5, 6, 7, 8],
        accumulator: vec![1; 4],
        tee_sign: vec![2; 8],
        allocated_tee: [0u8; 32],
        proof_submitted: false,
    }
}

#[tokio::test]
async fn expired_challenge_exits_before_generation() {
    let dir = tempfile::tempdir().unwrap();
    let chain = Arc::new(MockChain::default());
    let verifier = Arc::new(MockVerifier::default());
    let node = test_node(&dir, chain.clone(), verifier.clone());

    let mut p = params(5, 0, 1024);
    p.verify_expiration = 100;
    p.latest_block = 101;
    let err = node.run_idle_challenge(p).await.unwrap_err();

    assert!(matches!(
        err,
        HostError::ChallengeExpired {
            expiration: 100,
            block: 101
        }
    ));
    assert!(chain.calls().is_empty());
    assert_eq!(verifier.single_calls.load(Ordering::SeqCst), 0);
    assert!(matches!(node.store.load_idle(5), Err(StoreError::Missing)));
}

#[tokio::test]
async fn empty_idle_set_submits_empty_proof() {
    let dir = tempfile::tempdir().unwrap();
    let chain = Arc::new(MockChain::default());
    let verifier = Arc::new(MockVerifier::default());
    let node = test_node(&dir, chain.clone(), verifier.clone());

    node.run_idle_challenge(params(5, 0, 0)).await.unwrap();

    assert_eq!(chain.calls(), vec!["submit_idle_proof:empty"]);
    assert_eq!(verifier.single_calls.load(Ordering::SeqCst), 0);
    assert_eq!(verifier.total_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn single_block_challenge_runs_to_result() {
    let dir = tempfile::tempdir().unwrap();
    let chain = Arc::new(MockChain::default());
    *chain.challenge.lock().unwrap() = Some(challenge_with_allocation(5, 1000));
    chain
        .workers
        .lock()
        .unwrap()
        .insert(TEE_KEY, (1, "http://tee/".to_string()));
    let verifier = Arc::new(MockVerifier::default());
    let node = test_node(&dir, chain.clone(), verifier.clone());

    node.run_idle_challenge(params(5, 0, 1)).await.unwrap();

    let record = node.store.load_idle(5).unwrap();
    assert_eq!(record.file_block_proofs.len(), 1);
    assert_eq!(record.blocks_proof.len(), 1);
    assert!(record.idle_result);
    assert_eq!(record.allocated_tee, Some(TEE_KEY));

    // idle_proof = H(H(serialize(proof_0)))
    let mut reference = NativeSpaceProver::default();
    reference
        .set_challenge_state(&RsaKey::default(), &[1; 4], 0, 1)
        .unwrap();
    let proof0 = reference
        .prove_space(&[1, 2, 3, 4, 5, 6, 7, 8], 0, 1)
        .unwrap();
    let inner = Sha256::digest(encode_space_proof(&proof0));
    let expected = Sha256::digest(inner.as_slice());
    assert_eq!(record.idle_proof, expected.to_vec());

    assert_eq!(verifier.single_calls.load(Ordering::SeqCst), 1);
    assert_eq!(verifier.total_calls.load(Ordering::SeqCst), 1);
    assert_eq!(chain.count("submit_idle_proof"), 1);
    assert_eq!(chain.count("submit_idle_proof_result"), 1);
}

#[tokio::test(start_paused = true)]
async fn digest_is_deterministic_across_runs() {
    let mut digests = Vec::new();
    for _ in 0..2 {
        let dir = tempfile::tempdir().unwrap();
        let chain = Arc::new(MockChain::default());
        *chain.challenge.lock().unwrap() = Some(challenge_with_allocation(5, 1000));
        chain
            .workers
            .lock()
            .unwrap()
            .insert(TEE_KEY, (1, "http://tee/".to_string()));
        let node = test_node(&dir, chain, Arc::new(MockVerifier::default()));
        node.run_idle_challenge(params(5, 0, 600)).await.unwrap();
        digests.push(node.store.load_idle(5).unwrap().idle_proof);
    }
    assert_eq!(digests[0], digests[1]);
    assert_eq!(digests[0].len(), 32);
}

#[tokio::test]
async fn resume_with_total_signature_submits_result_only() {
    let dir = tempfile::tempdir().unwrap();
    let chain = Arc::new(MockChain::default());
    let verifier = Arc::new(MockVerifier::default());
    let node = test_node(&dir, chain.clone(), verifier.clone());

    let mut record = IdleProofRecord::new(5, 0, 1, vec![1; 4], vec![1, 2, 3, 4, 5, 6, 7, 8]);
    record.idle_proof = vec![6; 32];
    record.total_signature = Some(vec![7; 256]);
    record.idle_result = true;
    node.store.save_idle(&record).unwrap();

    let mut p = params(5, 0, 1);
    p.proof_submitted = true;
    p.allocated_tee = TEE_KEY;
    node.run_idle_challenge(p).await.unwrap();

    assert_eq!(chain.calls(), vec!["submit_idle_proof_result"]);
    assert_eq!(verifier.single_calls.load(Ordering::SeqCst), 0);
    assert_eq!(verifier.total_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn resume_with_blocks_proof_skips_per_block_verification() {
    let dir = tempfile::tempdir().unwrap();
    let chain = Arc::new(MockChain::default());
    let verifier = Arc::new(MockVerifier::default());
    let node = test_node(&dir, chain.clone(), verifier.clone());
    register_tee(&node);

    let mut record = IdleProofRecord::new(5, 0, 1, vec![1; 4], vec![1, 2, 3, 4, 5, 6, 7, 8]);
    record.idle_proof = vec![6; 32];
    record.file_block_proofs.push(Default::default());
    record.blocks_proof.push(Default::default());
    node.store.save_idle(&record).unwrap();

    let mut p = params(5, 0, 1);
    p.proof_submitted = true;
    p.allocated_tee = TEE_KEY;
    node.run_idle_challenge(p).await.unwrap();

    assert_eq!(verifier.single_calls.load(Ordering::SeqCst), 0);
    assert_eq!(verifier.total_calls.load(Ordering::SeqCst), 1);
    assert_eq!(chain.count("submit_idle_proof"), 0);
    assert_eq!(chain.count("submit_idle_proof_result"), 1);
}

#[tokio::test]
async fn stale_record_is_evicted_before_fresh_run() {
    let dir = tempfile::tempdir().unwrap();
    let chain = Arc::new(MockChain::default());
    let verifier = Arc::new(MockVerifier::default());
    let node = test_node(&dir, chain.clone(), verifier.clone());

    node.store
        .save_idle(&IdleProofRecord::new(3, 0, 0, vec![], vec![]))
        .unwrap();

    node.run_idle_challenge(params(4, 0, 0)).await.unwrap();

    assert_eq!(chain.calls(), vec!["submit_idle_proof:empty"]);
    assert!(matches!(node.store.load_idle(4), Err(StoreError::Missing)));
}

#[tokio::test(start_paused = true)]
async fn malformed_total_signature_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let chain = Arc::new(MockChain::default());
    *chain.challenge.lock().unwrap() = Some(challenge_with_allocation(5, 1000));
    chain
        .workers
        .lock()
        .unwrap()
        .insert(TEE_KEY, (1, "http://tee/".to_string()));
    let verifier = Arc::new(MockVerifier {
        total_signature_len: 10,
        ..Default::default()
    });
    let node = test_node(&dir, chain.clone(), verifier.clone());

    let err = node.run_idle_challenge(params(5, 0, 1)).await.unwrap_err();

    assert!(matches!(err, HostError::MalformedTeeResponse(_)));
    assert_eq!(chain.count("submit_idle_proof"), 1);
    assert_eq!(chain.count("submit_idle_proof_result"), 0);
}
