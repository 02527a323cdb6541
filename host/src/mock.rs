//! Test doubles for the node's external collaborators. The mocks record
//! every interaction so tests can assert on call counts and ordering.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use ceres_chain::{
    ChainError, ChainGateway, ChallengeInfo, FileMetadata, RewardInfo, StorageOrder, TeeWorker,
};
use ceres_lib::consts::TEE_SIG_LEN;
use ceres_lib::por::FragmentTag;
use ceres_lib::types::{AccountId, WorkerPublicKey};
use ceres_tee::proto;
use ceres_tee::{RetryPolicy, TeeError, TeeVerifier};

#[derive(Default)]
pub struct MockChain {
    pub height: AtomicU32,
    pub challenge: Mutex<Option<ChallengeInfo>>,
    pub files: Mutex<HashMap<String, FileMetadata>>,
    pub orders: Mutex<HashMap<String, StorageOrder>>,
    pub reward: Mutex<RewardInfo>,
    /// Worker pubkey -> (role, endpoint).
    pub workers: Mutex<HashMap<WorkerPublicKey, (u8, String)>>,
    /// Whether submissions fail with a transport error.
    pub fail_submissions: std::sync::atomic::AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl MockChain {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of recorded calls with exactly this label.
    pub fn count(&self, label: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == label).count()
    }

    fn record(&self, entry: impl Into<String>) {
        self.calls.lock().unwrap().push(entry.into());
    }

    fn submit(&self, label: &str) -> Result<String, ChainError> {
        if self.fail_submissions.load(Ordering::SeqCst) {
            return Err(ChainError::Transport("mock submission failure".to_string()));
        }
        self.record(label);
        Ok(format!("0xmock_{label}"))
    }
}

#[async_trait]
impl ChainGateway for MockChain {
    async fn block_height(&self) -> Result<u32, ChainError> {
        Ok(self.height.load(Ordering::SeqCst))
    }

    async fn query_challenge_info(&self, _miner: &AccountId) -> Result<ChallengeInfo, ChainError> {
        self.record("query_challenge_info");
        self.challenge
            .lock()
            .unwrap()
            .clone()
            .ok_or(ChainError::EmptyValue)
    }

    async fn query_file(&self, fid: &str, _at: u32) -> Result<FileMetadata, ChainError> {
        self.record(format!("query_file:{fid}"));
        self.files
            .lock()
            .unwrap()
            .get(fid)
            .cloned()
            .ok_or(ChainError::EmptyValue)
    }

    async fn query_file_metadata(&self, fid: &str) -> Result<FileMetadata, ChainError> {
        self.record(format!("query_file_metadata:{fid}"));
        self.files
            .lock()
            .unwrap()
            .get(fid)
            .cloned()
            .ok_or(ChainError::EmptyValue)
    }

    async fn query_storage_order(&self, fid: &str) -> Result<StorageOrder, ChainError> {
        self.record(format!("query_storage_order:{fid}"));
        self.orders
            .lock()
            .unwrap()
            .get(fid)
            .cloned()
            .ok_or(ChainError::EmptyValue)
    }

    async fn query_tee_worker(&self, pubkey: &WorkerPublicKey) -> Result<TeeWorker, ChainError> {
        self.record("query_tee_worker");
        self.workers
            .lock()
            .unwrap()
            .get(pubkey)
            .map(|(role, _)| TeeWorker {
                pubkey: *pubkey,
                role: *role,
            })
            .ok_or(ChainError::EmptyValue)
    }

    async fn query_tee_work_endpoint(
        &self,
        pubkey: &WorkerPublicKey,
    ) -> Result<String, ChainError> {
        self.record("query_tee_work_endpoint");
        self.workers
            .lock()
            .unwrap()
            .get(pubkey)
            .map(|(_, endpoint)| endpoint.clone())
            .ok_or(ChainError::EmptyValue)
    }

    async fn query_reward(&self, _account: &AccountId) -> Result<RewardInfo, ChainError> {
        Ok(self.reward.lock().unwrap().clone())
    }

    async fn submit_idle_proof(&self, proof: Vec<u8>) -> Result<String, ChainError> {
        self.submit(if proof.is_empty() {
            "submit_idle_proof:empty"
        } else {
            "submit_idle_proof"
        })
    }

    async fn submit_idle_proof_result(
        &self,
        _proof: Vec<u8>,
        _front: u64,
        _rear: u64,
        _accumulator: Vec<u8>,
        _result: bool,
        _signature: Vec<u8>,
        _tee_pubkey: WorkerPublicKey,
    ) -> Result<String, ChainError> {
        self.submit("submit_idle_proof_result")
    }

    async fn submit_service_proof(&self, _proof: Vec<u8>) -> Result<String, ChainError> {
        self.submit("submit_service_proof")
    }

    async fn submit_verify_service_result(
        &self,
        _result: bool,
        _signature: Vec<u8>,
        _bloom_filter: Vec<u64>,
        _tee_pubkey: WorkerPublicKey,
    ) -> Result<String, ChainError> {
        self.submit("submit_verify_service_result")
    }

    async fn report_file(&self, index: u8, fid: &str) -> Result<String, ChainError> {
        self.submit(&format!("report_file:{index}:{fid}"))
    }

    async fn generate_restoral_order(
        &self,
        fid: &str,
        fragment: &str,
    ) -> Result<String, ChainError> {
        self.submit(&format!("restoral_order:{fid}/{fragment}"))
    }
}

pub struct MockVerifier {
    pub single_calls: AtomicU32,
    pub total_calls: AtomicU32,
    pub batch_calls: AtomicU32,
    pub aggregate_calls: AtomicU32,
    pub gen_tag_calls: AtomicU32,
    /// Length of the total-verification signature (the chain demands
    /// exactly `TEE_SIG_LEN`).
    pub total_signature_len: usize,
    pub aggregate_signature_len: usize,
    pub tee_account_len: usize,
    /// When set, batch replies carry a bloom filter of exactly this many
    /// words instead of stacking the request's.
    pub bloom_override: Option<usize>,
    /// Tag served by `gen_tag`; `None` makes recomputation fail.
    pub tag: Option<FragmentTag>,
}

impl Default for MockVerifier {
    fn default() -> Self {
        Self {
            single_calls: AtomicU32::new(0),
            total_calls: AtomicU32::new(0),
            batch_calls: AtomicU32::new(0),
            aggregate_calls: AtomicU32::new(0),
            gen_tag_calls: AtomicU32::new(0),
            total_signature_len: TEE_SIG_LEN,
            aggregate_signature_len: 64,
            tee_account_len: 32,
            bloom_override: None,
            tag: None,
        }
    }
}

#[async_trait]
impl TeeVerifier for MockVerifier {
    async fn verify_space_proof(
        &self,
        _endpoint: &str,
        _request: proto::SpaceProofVerifyRequest,
    ) -> Result<proto::SpaceProofVerifyResponse, TeeError> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        Ok(proto::SpaceProofVerifyResponse {
            signature: vec![1; 64],
        })
    }

    async fn verify_space_proof_total(
        &self,
        _endpoint: &str,
        _request: proto::SpaceProofVerifyTotalRequest,
        _policy: &RetryPolicy,
    ) -> Result<proto::SpaceProofVerifyTotalResponse, TeeError> {
        self.total_calls.fetch_add(1, Ordering::SeqCst);
        Ok(proto::SpaceProofVerifyTotalResponse {
            signature: vec![7; self.total_signature_len],
            idle_result: true,
        })
    }

    async fn batch_verify(
        &self,
        _endpoints: &[String],
        request: proto::BatchVerifyRequest,
    ) -> Result<proto::BatchVerifyResponse, TeeError> {
        let batch = self.batch_calls.fetch_add(1, Ordering::SeqCst);
        let bloom = match self.bloom_override {
            Some(len) => vec![0; len],
            None => {
                let mut bloom = request.service_bloom_filter.clone();
                bloom.push(u64::from(batch) + 1);
                bloom
            }
        };
        Ok(proto::BatchVerifyResponse {
            service_bloom_filter: bloom,
            batch_verify_result: true,
            signature: vec![3; 64],
        })
    }

    async fn aggregate_signature(
        &self,
        _endpoints: &[String],
        _request: proto::AggregateSignatureRequest,
    ) -> Result<proto::AggregateSignatureResponse, TeeError> {
        self.aggregate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(proto::AggregateSignatureResponse {
            signature: vec![4; self.aggregate_signature_len],
            tee_account_id: vec![5; self.tee_account_len],
        })
    }

    async fn gen_tag(
        &self,
        _endpoints: &[String],
        _request: proto::GenTagRequest,
    ) -> Result<proto::GenTagResponse, TeeError> {
        self.gen_tag_calls.fetch_add(1, Ordering::SeqCst);
        match &self.tag {
            Some(tag) => Ok(proto::GenTagResponse {
                tag: Some(proto::Tag {
                    name: tag.name.clone(),
                    u: tag.u.clone(),
                    phi: tag.phi.clone(),
                }),
                u_sig: tag.u_sig.clone(),
            }),
            None => Err(TeeError::Status("no marker available".to_string())),
        }
    }
}
