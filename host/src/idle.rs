//! Idle space-proof pipeline.
//!
//! One run per challenge epoch: walk the challenged subranges of the idle
//! set, prove and sign each block, submit the digest, stream the blocks
//! through the allocated TEE, then submit the verified result. Progress is
//! persisted at every externally observable boundary so a restart re-enters
//! at the latest durable step.

use ceres_lib::consts::{BLOCK_INTERVAL, TEE_SIG_LEN};
use ceres_lib::pois::encode_space_proof;
use ceres_lib::types::{is_all_zero, TeeRole, WorkerPublicKey};
use ceres_tee::proto;
use ceres_tee::{normalize_endpoint, RetryPolicy, TOTAL_POLICY, TOTAL_RESUME_POLICY};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::error::{HostError, HostResult};
use crate::record::{BlockVerification, FileBlockProof, IdleProofRecord};
use crate::store::StoreError;
use crate::Node;

const SUBMIT_ATTEMPTS: u32 = 5;
const SUBMIT_PAUSE: std::time::Duration = std::time::Duration::from_secs(60);

/// Chain-published parameters for one idle challenge epoch.
#[derive(Debug, Clone)]
pub struct IdleChallengeParams {
    pub latest_block: u32,
    pub start: u32,
    pub verify_expiration: u32,
    pub front: i64,
    pub rear: i64,
    pub space_param: Vec<i64>,
    pub accumulator: Vec<u8>,
    pub tee_sign: Vec<u8>,
    /// Zero until the chain allocates a verifier for the submitted proof.
    pub allocated_tee: WorkerPublicKey,
    pub proof_submitted: bool,
}

enum Resume {
    /// The persisted record carried the run to completion (or as far as the
    /// TEE allows this tick); nothing further to do.
    Handled,
    /// No usable record; generate from scratch.
    Fresh,
}

impl Node {
    pub async fn run_idle_challenge(&self, params: IdleChallengeParams) -> HostResult<()> {
        if params.verify_expiration <= params.latest_block {
            warn!(
                target: "ichal",
                "challenge expired: {} <= {}",
                params.verify_expiration, params.latest_block
            );
            return Err(HostError::ChallengeExpired {
                expiration: params.verify_expiration,
                block: params.latest_block,
            });
        }

        match self.try_resume_idle(&params).await? {
            Resume::Handled => return Ok(()),
            Resume::Fresh => {}
        }

        info!(target: "ichal", "idle chain challenge: {}", params.start);

        if params.front == params.rear {
            // no idle blocks held; the empty proof tells the chain as much
            let tx = self.chain.submit_idle_proof(Vec::new()).await?;
            info!(target: "ichal", "submitted empty idle proof: {tx}");
            return Ok(());
        }

        let mut record = IdleProofRecord::new(
            params.start,
            params.front,
            params.rear,
            params.accumulator.clone(),
            params.space_param.clone(),
        );
        self.generate_space_proofs(&mut record).await?;
        self.store.save_idle(&record)?;

        let tx = self.chain.submit_idle_proof(record.idle_proof.clone()).await?;
        info!(target: "ichal", "submitted idle proof: {tx}");

        // give the chain time to allocate a verifier
        tokio::time::sleep(2 * BLOCK_INTERVAL).await;

        let chall = self
            .chain
            .query_challenge_info(&self.signer.public_key())
            .await?;
        let assignment = chall
            .prove_info
            .idle_prove
            .ok_or(HostError::TeeNotAllocated)?;
        record.allocated_tee = Some(assignment.tee_pubkey);
        self.store.save_idle(&record)?;

        let endpoint = self.resolve_tee_endpoint(&assignment.tee_pubkey).await?;
        info!(target: "ichal", "allocated tee: {endpoint}");

        self.verify_blocks(&mut record, &params, &endpoint).await?;
        self.verify_total(&mut record, &params, &endpoint, &TOTAL_POLICY)
            .await?;
        self.submit_idle_result(&record).await
    }

    /// Pick the run back up from the persisted record. Stale and missing
    /// records fall through to fresh generation; a record whose proof is
    /// already on chain re-enters at the first step not yet done.
    async fn try_resume_idle(&self, params: &IdleChallengeParams) -> HostResult<Resume> {
        let mut record = match self.store.load_idle(params.start) {
            Ok(record) => record,
            Err(StoreError::Missing) | Err(StoreError::Stale { .. }) => return Ok(Resume::Fresh),
            Err(e) => return Err(e.into()),
        };
        info!(target: "ichal", "local idle record for challenge {}", record.start);

        if !params.proof_submitted {
            return Ok(Resume::Fresh);
        }

        let tee_pubkey = if is_all_zero(&params.allocated_tee) {
            let chall = self
                .chain
                .query_challenge_info(&self.signer.public_key())
                .await?;
            chall
                .prove_info
                .idle_prove
                .ok_or(HostError::TeeNotAllocated)?
                .tee_pubkey
        } else {
            params.allocated_tee
        };
        record.allocated_tee = Some(tee_pubkey);

        if record.total_signature.is_some() {
            self.submit_idle_result(&record).await?;
            return Ok(Resume::Handled);
        }

        self.store.save_idle(&record)?;
        let endpoint = self.resolve_tee_endpoint(&tee_pubkey).await?;
        info!(target: "ichal", "allocated tee: {endpoint}");

        if record.blocks_proof.is_empty() {
            self.verify_blocks(&mut record, params, &endpoint).await?;
        }
        self.verify_total(&mut record, params, &endpoint, &TOTAL_RESUME_POLICY)
            .await?;
        self.submit_idle_result(&record).await?;
        Ok(Resume::Handled)
    }

    /// Walk the challenge handle over the idle set, proving, hashing and
    /// signing each subrange. The walk feeds each proof hash back into the
    /// handle, so order is fixed and must not be parallelized.
    async fn generate_space_proofs(&self, record: &mut IdleProofRecord) -> HostResult<()> {
        info!(target: "ichal", "start calc challenge...");
        let mut prover = self.space_prover.lock().await;
        prover.set_challenge_state(
            &self.pois_key,
            &record.acc,
            record.chain_front,
            record.chain_rear,
        )?;
        let mut handle = prover.challenge_handle(&self.miner_id(), &record.chall_random);

        let mut concat = Vec::new();
        let mut previous_hash: Option<Vec<u8>> = None;
        loop {
            let (left, right) = handle(previous_hash.as_deref());
            if left == right {
                break;
            }
            let space_proof = prover.prove_space(&record.chall_random, left, right)?;
            let proof_hash = Sha256::digest(encode_space_proof(&space_proof)).to_vec();
            let proof_hash_sign = self.signer.sign(&proof_hash)?;
            concat.extend_from_slice(&proof_hash);
            record.file_block_proofs.push(FileBlockProof {
                left,
                right,
                space_proof,
                proof_hash: proof_hash.clone(),
                proof_hash_sign,
            });
            self.store.save_idle(record)?;
            previous_hash = Some(proof_hash);
        }
        record.idle_proof = Sha256::digest(&concat).to_vec();
        Ok(())
    }

    /// Have the allocated TEE verify each block proof and countersign it.
    async fn verify_blocks(
        &self,
        record: &mut IdleProofRecord,
        params: &IdleChallengeParams,
        endpoint: &str,
    ) -> HostResult<()> {
        info!(target: "ichal", "verifying {} blocks on tee {endpoint}", record.file_block_proofs.len());
        let pois_info = proto::MinerPoisInfo {
            acc: record.acc.clone(),
            front: record.chain_front,
            rear: record.chain_rear,
            key_n: self.pois_key.n.clone(),
            key_g: self.pois_key.g.clone(),
            status_tee_sign: params.tee_sign.clone(),
        };

        let mut blocks = Vec::with_capacity(record.file_block_proofs.len());
        for block in &record.file_block_proofs {
            let request = proto::SpaceProofVerifyRequest {
                space_chals: record.chall_random.clone(),
                miner_id: self.miner_id(),
                pois_info: Some(pois_info.clone()),
                proof: Some((&block.space_proof).into()),
                miner_space_proof_hash_sig: block.proof_hash_sign.clone(),
            };
            let response = self.verifier.verify_space_proof(endpoint, request).await?;
            blocks.push(BlockVerification {
                proof_hash: block.proof_hash.clone(),
                left: block.left,
                right: block.right,
                signature: response.signature,
            });
        }
        record.blocks_proof = blocks;
        self.store.save_idle(record)?;
        Ok(())
    }

    /// Submit the whole countersigned block list for the aggregate verdict.
    async fn verify_total(
        &self,
        record: &mut IdleProofRecord,
        params: &IdleChallengeParams,
        endpoint: &str,
        policy: &RetryPolicy,
    ) -> HostResult<()> {
        info!(target: "ichal", "requesting total verification on tee {endpoint}");
        let request = proto::SpaceProofVerifyTotalRequest {
            miner_id: self.miner_id(),
            proof_list: record.blocks_proof.iter().map(to_wire_block).collect(),
            front: params.front,
            rear: params.rear,
            acc: record.acc.clone(),
            space_chals: record.chall_random.clone(),
        };
        let response = self
            .verifier
            .verify_space_proof_total(endpoint, request, policy)
            .await?;
        if response.signature.len() != TEE_SIG_LEN {
            return Err(HostError::MalformedTeeResponse(format!(
                "total signature length {} != {TEE_SIG_LEN}",
                response.signature.len()
            )));
        }
        info!(target: "ichal", "total verification result: {}", response.idle_result);
        record.total_signature = Some(response.signature);
        record.idle_result = response.idle_result;
        self.store.save_idle(record)?;
        Ok(())
    }

    async fn submit_idle_result(&self, record: &IdleProofRecord) -> HostResult<()> {
        let signature = record
            .total_signature
            .clone()
            .ok_or_else(|| HostError::MalformedTeeResponse("missing total signature".to_string()))?;
        if signature.len() != TEE_SIG_LEN {
            return Err(HostError::MalformedTeeResponse(format!(
                "total signature length {} != {TEE_SIG_LEN}",
                signature.len()
            )));
        }
        let tee_pubkey = record.allocated_tee.ok_or(HostError::TeeNotAllocated)?;

        let mut last = String::new();
        for attempt in 0..SUBMIT_ATTEMPTS {
            match self
                .chain
                .submit_idle_proof_result(
                    record.idle_proof.clone(),
                    record.chain_front as u64,
                    record.chain_rear as u64,
                    record.acc.clone(),
                    record.idle_result,
                    signature.clone(),
                    tee_pubkey,
                )
                .await
            {
                Ok(tx) => {
                    info!(target: "ichal", "submit idle proof result suc: {tx}");
                    return Ok(());
                }
                Err(e) => {
                    warn!(target: "ichal", "submit idle proof result: {e}");
                    last = e.to_string();
                }
            }
            if attempt + 1 < SUBMIT_ATTEMPTS {
                tokio::time::sleep(SUBMIT_PAUSE).await;
            }
        }
        Err(HostError::SubmitFailed {
            attempts: SUBMIT_ATTEMPTS,
            last,
        })
    }

    /// Endpoint for a chain-allocated worker: the registry if we have seen
    /// it, the chain otherwise (and remember it for next time).
    pub(crate) async fn resolve_tee_endpoint(
        &self,
        pubkey: &WorkerPublicKey,
    ) -> HostResult<String> {
        let account = hex::encode(pubkey);
        if let Some(info) = self.registry.get(&account) {
            return Ok(info.endpoint);
        }
        let worker = self.chain.query_tee_worker(pubkey).await?;
        let endpoint = self.chain.query_tee_work_endpoint(pubkey).await?;
        let role = TeeRole::try_from(worker.role)
            .map_err(|r| HostError::MalformedTeeResponse(format!("unknown tee role {r}")))?;
        self.registry.save(&account, &endpoint, role);
        Ok(normalize_endpoint(&endpoint))
    }
}

fn to_wire_block(block: &BlockVerification) -> proto::BlocksProof {
    proto::BlocksProof {
        proof_hash_and_left_right: Some(proto::ProofHashAndLeftRight {
            space_proof_hash: block.proof_hash.clone(),
            left: block.left,
            right: block.right,
        }),
        signature: block.signature.clone(),
    }
}
