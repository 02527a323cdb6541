//! JSON-RPC implementation of the chain gateway.

use std::time::Duration;

use async_trait::async_trait;
use ceres_lib::types::{AccountId, WorkerPublicKey};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use crate::error::ChainError;
use crate::gateway::ChainGateway;
use crate::types::*;

const RPC_TIMEOUT: Duration = Duration::from_secs(30);

/// Chain RPC client. Tries each configured endpoint in order and sticks with
/// the first that answers.
pub struct RpcGateway {
    http: reqwest::Client,
    endpoints: Vec<Url>,
}

impl RpcGateway {
    pub fn new(endpoints: Vec<Url>) -> Result<Self, ChainError> {
        if endpoints.is_empty() {
            return Err(ChainError::Transport("no rpc endpoints configured".to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(RPC_TIMEOUT)
            .build()
            .map_err(|e| ChainError::Transport(e.to_string()))?;
        Ok(Self { http, endpoints })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, ChainError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let mut last_err = ChainError::Transport("no endpoint answered".to_string());
        for endpoint in &self.endpoints {
            let resp = match self.http.post(endpoint.clone()).json(&body).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    debug!("rpc {method} via {endpoint} failed: {e}");
                    last_err = e.into();
                    continue;
                }
            };
            let reply: Value = resp.json().await?;
            if let Some(err) = reply.get("error") {
                return Err(ChainError::Rpc {
                    code: err.get("code").and_then(Value::as_i64).unwrap_or(0),
                    message: err
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                });
            }
            let result = reply.get("result").cloned().unwrap_or(Value::Null);
            if result.is_null() {
                return Err(ChainError::EmptyValue);
            }
            return serde_json::from_value(result).map_err(|e| ChainError::Decode(e.to_string()));
        }
        Err(last_err)
    }
}

#[async_trait]
impl ChainGateway for RpcGateway {
    async fn block_height(&self) -> Result<u32, ChainError> {
        self.call("chain_blockHeight", json!([])).await
    }

    async fn query_challenge_info(&self, miner: &AccountId) -> Result<ChallengeInfo, ChainError> {
        self.call("audit_challengeSnapshot", json!([hex::encode(miner)]))
            .await
    }

    async fn query_file(&self, fid: &str, at: u32) -> Result<FileMetadata, ChainError> {
        self.call("fileBank_fileMetadata", json!([fid, at])).await
    }

    async fn query_file_metadata(&self, fid: &str) -> Result<FileMetadata, ChainError> {
        self.call("fileBank_fileMetadata", json!([fid, Value::Null]))
            .await
    }

    async fn query_storage_order(&self, fid: &str) -> Result<StorageOrder, ChainError> {
        self.call("fileBank_dealMap", json!([fid])).await
    }

    async fn query_tee_worker(&self, pubkey: &WorkerPublicKey) -> Result<TeeWorker, ChainError> {
        self.call("teeWorker_worker", json!([hex::encode(pubkey)]))
            .await
    }

    async fn query_tee_work_endpoint(
        &self,
        pubkey: &WorkerPublicKey,
    ) -> Result<String, ChainError> {
        self.call("teeWorker_endpoint", json!([hex::encode(pubkey)]))
            .await
    }

    async fn query_reward(&self, account: &AccountId) -> Result<RewardInfo, ChainError> {
        self.call("storageMiner_reward", json!([hex::encode(account)]))
            .await
    }

    async fn submit_idle_proof(&self, proof: Vec<u8>) -> Result<String, ChainError> {
        self.call("audit_submitIdleProof", json!([hex::encode(proof)]))
            .await
    }

    async fn submit_idle_proof_result(
        &self,
        proof: Vec<u8>,
        front: u64,
        rear: u64,
        accumulator: Vec<u8>,
        result: bool,
        signature: Vec<u8>,
        tee_pubkey: WorkerPublicKey,
    ) -> Result<String, ChainError> {
        self.call(
            "audit_submitIdleProofResult",
            json!([
                hex::encode(proof),
                front,
                rear,
                hex::encode(accumulator),
                result,
                hex::encode(signature),
                hex::encode(tee_pubkey),
            ]),
        )
        .await
    }

    async fn submit_service_proof(&self, proof: Vec<u8>) -> Result<String, ChainError> {
        self.call("audit_submitServiceProof", json!([hex::encode(proof)]))
            .await
    }

    async fn submit_verify_service_result(
        &self,
        result: bool,
        signature: Vec<u8>,
        bloom_filter: Vec<u64>,
        tee_pubkey: WorkerPublicKey,
    ) -> Result<String, ChainError> {
        self.call(
            "audit_submitVerifyServiceResult",
            json!([result, hex::encode(signature), bloom_filter, hex::encode(tee_pubkey)]),
        )
        .await
    }

    async fn report_file(&self, index: u8, fid: &str) -> Result<String, ChainError> {
        self.call("fileBank_transferReport", json!([index, fid])).await
    }

    async fn generate_restoral_order(
        &self,
        fid: &str,
        fragment: &str,
    ) -> Result<String, ChainError> {
        self.call("fileBank_generateRestoralOrder", json!([fid, fragment]))
            .await
    }
}
