use async_trait::async_trait;
use ceres_lib::types::{AccountId, WorkerPublicKey};

use crate::error::ChainError;
use crate::types::*;

/// Everything the challenge pipelines need from the chain.
///
/// Submissions return the transaction hash on success. Queries return
/// [`ChainError::EmptyValue`] when the chain holds nothing for the key,
/// which callers must treat as "not present" rather than as a failure.
#[async_trait]
pub trait ChainGateway: Send + Sync {
    async fn block_height(&self) -> Result<u32, ChainError>;

    async fn query_challenge_info(&self, miner: &AccountId) -> Result<ChallengeInfo, ChainError>;

    /// File metadata as of block `at` (challenge lookups are pinned to the
    /// challenge start).
    async fn query_file(&self, fid: &str, at: u32) -> Result<FileMetadata, ChainError>;

    /// Latest file metadata, used by the report path.
    async fn query_file_metadata(&self, fid: &str) -> Result<FileMetadata, ChainError>;

    async fn query_storage_order(&self, fid: &str) -> Result<StorageOrder, ChainError>;

    async fn query_tee_worker(&self, pubkey: &WorkerPublicKey) -> Result<TeeWorker, ChainError>;

    async fn query_tee_work_endpoint(
        &self,
        pubkey: &WorkerPublicKey,
    ) -> Result<String, ChainError>;

    async fn query_reward(&self, account: &AccountId) -> Result<RewardInfo, ChainError>;

    async fn submit_idle_proof(&self, proof: Vec<u8>) -> Result<String, ChainError>;

    #[allow(clippy::too_many_arguments)]
    async fn submit_idle_proof_result(
        &self,
        proof: Vec<u8>,
        front: u64,
        rear: u64,
        accumulator: Vec<u8>,
        result: bool,
        signature: Vec<u8>,
        tee_pubkey: WorkerPublicKey,
    ) -> Result<String, ChainError>;

    async fn submit_service_proof(&self, proof: Vec<u8>) -> Result<String, ChainError>;

    async fn submit_verify_service_result(
        &self,
        result: bool,
        signature: Vec<u8>,
        bloom_filter: Vec<u64>,
        tee_pubkey: WorkerPublicKey,
    ) -> Result<String, ChainError>;

    async fn report_file(&self, index: u8, fid: &str) -> Result<String, ChainError>;

    /// Ask the network to restore a fragment this miner can no longer serve.
    async fn generate_restoral_order(
        &self,
        fid: &str,
        fragment: &str,
    ) -> Result<String, ChainError>;
}
