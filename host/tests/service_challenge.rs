mod common;

use std::fs;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use ceres_chain::{FileMetadata, FragmentInfo, SegmentInfo};
use ceres_host::error::HostError;
use ceres_host::mock::{MockChain, MockVerifier};
use ceres_host::record::ServiceProofRecord;
use ceres_host::service::ServiceChallengeParams;
use ceres_host::Node;
use ceres_lib::consts::BLOOM_FILTER_LEN;
use ceres_lib::por::FragmentTag;

use common::{miner_key, test_node};

const FID: &str = "fid0";

fn params(start: u32) -> ServiceChallengeParams {
    ServiceChallengeParams {
        latest_block: 10,
        start,
        verify_expiration: 1000,
        random_index_list: vec![1, 2, 3],
        random_list: vec![vec![0x01], vec![0x02], vec![0xff, 0x00]],
    }
}

fn fragment_names(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("frag{i:04}")).collect()
}

/// Drop `n` fragments of `FID` with valid tags onto disk and register them
/// with the mock chain, assigned to this miner since block 1.
fn seed_fragments(node: &Node, chain: &MockChain, n: usize) {
    let names = fragment_names(n);
    let dir = node.workspace.file_dir().join(FID);
    fs::create_dir_all(&dir).unwrap();
    for name in &names {
        fs::write(dir.join(name), vec![7u8; 16]).unwrap();
        let tag = FragmentTag {
            name: name.clone(),
            u: "11".to_string(),
            phi: vec!["1".to_string(), "2".to_string(), "3".to_string(), "4".to_string()],
            u_sig: vec![1, 2, 3],
        };
        tag.save(&node.workspace.tag_path(FID, name)).unwrap();
    }
    chain.files.lock().unwrap().insert(
        FID.to_string(),
        FileMetadata {
            segment_list: vec![SegmentInfo {
                hash: "segment0".to_string(),
                fragment_list: names
                    .iter()
                    .map(|name| FragmentInfo {
                        hash: name.clone(),
                        miner: miner_key(),
                        tag: Some(1),
                    })
                    .collect(),
            }],
        },
    );
}

#[tokio::test]
async fn three_fragments_one_batch_one_aggregate() {
    let dir = tempfile::tempdir().unwrap();
    let chain = Arc::new(MockChain::default());
    let verifier = Arc::new(MockVerifier::default());
    let node = test_node(&dir, chain.clone(), verifier.clone());
    seed_fragments(&node, &chain, 3);

    node.run_service_challenge(params(10)).await.unwrap();

    assert_eq!(verifier.batch_calls.load(Ordering::SeqCst), 1);
    assert_eq!(verifier.aggregate_calls.load(Ordering::SeqCst), 1);
    assert_eq!(chain.count("submit_service_proof"), 1);
    assert_eq!(chain.count("submit_verify_service_result"), 1);

    let record = node.store.load_service(10).unwrap();
    assert!(!record.submit_proof);
    assert!(!record.submit_result);
    assert!(record.bloom_filter.len() <= BLOOM_FILTER_LEN);
    assert!(!record.proof.is_empty());
    assert!(!node.is_service_challenging());
}

#[tokio::test]
async fn batch_boundary_at_five_thousand_fragments() {
    let dir = tempfile::tempdir().unwrap();
    let chain = Arc::new(MockChain::default());
    let verifier = Arc::new(MockVerifier::default());
    let node = test_node(&dir, chain.clone(), verifier.clone());
    seed_fragments(&node, &chain, 5001);

    node.run_service_challenge(params(10)).await.unwrap();

    // ceil(5001 / 5000) batch calls, one aggregate call
    assert_eq!(verifier.batch_calls.load(Ordering::SeqCst), 2);
    assert_eq!(verifier.aggregate_calls.load(Ordering::SeqCst), 1);
    assert_eq!(chain.count("submit_service_proof"), 1);
    assert_eq!(chain.count("submit_verify_service_result"), 1);
}

#[tokio::test]
async fn missing_fragment_opens_restoral_order_and_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let chain = Arc::new(MockChain::default());
    let verifier = Arc::new(MockVerifier::default());
    let node = test_node(&dir, chain.clone(), verifier.clone());
    seed_fragments(&node, &chain, 3);
    fs::remove_file(node.workspace.fragment_path(FID, "frag0001")).unwrap();

    let err = node.run_service_challenge(params(10)).await.unwrap_err();

    match err {
        HostError::MissingFragment { fid, fragment } => {
            assert_eq!(fid, FID);
            assert_eq!(fragment, "frag0001");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(chain.count(&format!("restoral_order:{FID}/frag0001")), 1);
    assert_eq!(verifier.batch_calls.load(Ordering::SeqCst), 0);
    assert_eq!(chain.count("submit_service_proof"), 0);
    assert!(!node.is_service_challenging());
}

#[tokio::test]
async fn malformed_tag_is_recomputed_through_marker() {
    let dir = tempfile::tempdir().unwrap();
    let chain = Arc::new(MockChain::default());
    let verifier = Arc::new(MockVerifier {
        tag: Some(FragmentTag {
            name: "frag0000".to_string(),
            u: "13".to_string(),
            phi: vec!["5".to_string(), "6".to_string()],
            u_sig: vec![9, 9],
        }),
        ..Default::default()
    });
    let node = test_node(&dir, chain.clone(), verifier.clone());
    seed_fragments(&node, &chain, 1);
    fs::write(node.workspace.tag_path(FID, "frag0000"), b"not json").unwrap();

    node.run_service_challenge(params(10)).await.unwrap();

    assert_eq!(verifier.gen_tag_calls.load(Ordering::SeqCst), 1);
    let restored = FragmentTag::load(&node.workspace.tag_path(FID, "frag0000")).unwrap();
    assert_eq!(restored.u, "13");
    assert_eq!(chain.count("submit_service_proof"), 1);
}

#[tokio::test]
async fn unrecoverable_tag_aborts_with_restoral_order() {
    let dir = tempfile::tempdir().unwrap();
    let chain = Arc::new(MockChain::default());
    let verifier = Arc::new(MockVerifier::default());
    let node = test_node(&dir, chain.clone(), verifier.clone());
    seed_fragments(&node, &chain, 1);
    fs::write(node.workspace.tag_path(FID, "frag0000"), b"not json").unwrap();

    let err = node.run_service_challenge(params(10)).await.unwrap_err();

    assert!(matches!(err, HostError::InvalidTag { .. }));
    assert_eq!(chain.count(&format!("restoral_order:{FID}/frag0000")), 1);
    assert_eq!(verifier.batch_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn resume_submits_only_what_is_still_owed() {
    let dir = tempfile::tempdir().unwrap();
    let chain = Arc::new(MockChain::default());
    let verifier = Arc::new(MockVerifier::default());
    let node = test_node(&dir, chain.clone(), verifier.clone());

    node.store
        .save_service(&ServiceProofRecord {
            start: 10,
            proof: "123".to_string(),
            bloom_filter: vec![1, 2],
            tee_pubkey: [5; 32],
            signature: vec![4; 64],
            submit_proof: false,
            submit_result: true,
        })
        .unwrap();

    node.run_service_challenge(params(10)).await.unwrap();

    assert_eq!(chain.calls(), vec!["submit_verify_service_result"]);
    assert_eq!(verifier.batch_calls.load(Ordering::SeqCst), 0);
    assert!(!node.store.load_service(10).unwrap().submit_result);
}

#[tokio::test]
async fn fully_submitted_record_is_a_noop() {
    let dir = tempfile::tempdir().unwrap();
    let chain = Arc::new(MockChain::default());
    let verifier = Arc::new(MockVerifier::default());
    let node = test_node(&dir, chain.clone(), verifier.clone());

    node.store
        .save_service(&ServiceProofRecord {
            start: 10,
            submit_proof: false,
            submit_result: false,
            ..Default::default()
        })
        .unwrap();

    node.run_service_challenge(params(10)).await.unwrap();

    assert!(chain.calls().is_empty());
    assert_eq!(verifier.batch_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn oversized_bloom_filter_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let chain = Arc::new(MockChain::default());
    let verifier = Arc::new(MockVerifier {
        bloom_override: Some(BLOOM_FILTER_LEN + 1),
        ..Default::default()
    });
    let node = test_node(&dir, chain.clone(), verifier.clone());
    seed_fragments(&node, &chain, 3);

    let err = node.run_service_challenge(params(10)).await.unwrap_err();

    assert!(matches!(err, HostError::MalformedTeeResponse(_)));
    assert_eq!(verifier.batch_calls.load(Ordering::SeqCst), 1);
    assert_eq!(verifier.aggregate_calls.load(Ordering::SeqCst), 0);
    assert_eq!(chain.count("submit_service_proof"), 0);
}

#[tokio::test]
async fn expired_challenge_exits_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let chain = Arc::new(MockChain::default());
    let verifier = Arc::new(MockVerifier::default());
    let node = test_node(&dir, chain.clone(), verifier.clone());
    seed_fragments(&node, &chain, 3);

    let mut p = params(10);
    p.verify_expiration = 100;
    p.latest_block = 100;
    let err = node.run_service_challenge(p).await.unwrap_err();

    assert!(matches!(err, HostError::ChallengeExpired { .. }));
    assert!(chain.calls().is_empty());
    assert_eq!(verifier.batch_calls.load(Ordering::SeqCst), 0);
}
