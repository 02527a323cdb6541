//! Service proof-of-retrievability pipeline.
//!
//! Enumerates the fragments this miner is challenged on, produces one PoR
//! sample per fragment, folds samples into σ, and ships them to verifier
//! TEEs in batches of `BATCH_SIZE`. The bloom filter is carried across
//! batches; the per-batch history is folded into one aggregate signature,
//! and proof plus verdict go on chain as two independent submissions.

use std::mem;

use ceres_chain::ChainError;
use ceres_lib::consts::{
    BATCH_SIZE, BLOCK_INTERVAL, BLOOM_FILTER_LEN, GEN_PROOF_TIMEOUT, TEE_SIG_LEN,
    WORKER_PUBLIC_KEY_LEN,
};
use ceres_lib::por::{q_slice, split_by_n, FragmentTag, GenProofResult, PorError, QElement};
use ceres_lib::types::WorkerPublicKey;
use ceres_tee::proto;
use tracing::{info, warn};

use crate::error::{HostError, HostResult};
use crate::record::ServiceProofRecord;
use crate::store::StoreError;
use crate::workspace::Workspace;
use crate::Node;

const SUBMIT_ATTEMPTS: u32 = 5;
const SUBMIT_PAUSE: std::time::Duration = std::time::Duration::from_secs(60);
const QUERY_FILE_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct ServiceChallengeParams {
    pub latest_block: u32,
    pub start: u32,
    pub verify_expiration: u32,
    pub random_index_list: Vec<u32>,
    pub random_list: Vec<Vec<u8>>,
}

enum Resume {
    Handled,
    Fresh,
}

/// Everything the chain needs once the TEEs are done.
struct ServiceOutcome {
    proof: String,
    bloom_filter: Vec<u64>,
    aggregate: proto::AggregateSignatureResponse,
}

/// Accumulated per-fragment material between batch flushes.
#[derive(Default)]
struct BatchState {
    names: Vec<String>,
    us: Vec<String>,
    mus: Vec<String>,
    u_sigs: Vec<Vec<u8>>,
    sigma: String,
}

/// Clears the reentry flag even when the run errors or panics.
struct ChallengingGuard<'a>(&'a Node);

impl<'a> ChallengingGuard<'a> {
    fn engage(node: &'a Node) -> Self {
        node.set_service_challenging(true);
        Self(node)
    }
}

impl Drop for ChallengingGuard<'_> {
    fn drop(&mut self) {
        self.0.set_service_challenging(false);
    }
}

impl Node {
    pub async fn run_service_challenge(&self, params: ServiceChallengeParams) -> HostResult<()> {
        if params.verify_expiration <= params.latest_block {
            warn!(
                target: "schal",
                "challenge expired: {} <= {}",
                params.verify_expiration, params.latest_block
            );
            return Err(HostError::ChallengeExpired {
                expiration: params.verify_expiration,
                block: params.latest_block,
            });
        }

        match self.try_resume_service(&params).await? {
            Resume::Handled => return Ok(()),
            Resume::Fresh => {}
        }

        let _guard = ChallengingGuard::engage(self);
        info!(target: "schal", "service chain challenge: {}", params.start);

        let outcome = self.batch_gen_proof_and_verify(&params).await?;

        let tee_pubkey: WorkerPublicKey = outcome
            .aggregate
            .tee_account_id
            .as_slice()
            .try_into()
            .map_err(|_| {
                HostError::MalformedTeeResponse(format!(
                    "tee account id length {} != {WORKER_PUBLIC_KEY_LEN}",
                    outcome.aggregate.tee_account_id.len()
                ))
            })?;

        let mut record = ServiceProofRecord {
            start: params.start,
            proof: outcome.proof,
            bloom_filter: outcome.bloom_filter,
            tee_pubkey,
            signature: outcome.aggregate.signature,
            submit_proof: true,
            submit_result: true,
        };
        self.store.save_service(&record)?;

        self.submit_service_proof(&mut record).await?;
        self.submit_service_result(&mut record).await
    }

    async fn try_resume_service(&self, params: &ServiceChallengeParams) -> HostResult<Resume> {
        let mut record = match self.store.load_service(params.start) {
            Ok(record) => record,
            Err(StoreError::Missing) | Err(StoreError::Stale { .. }) => return Ok(Resume::Fresh),
            Err(e) => return Err(e.into()),
        };

        if !record.submit_result {
            // both submissions already landed this epoch
            return Ok(Resume::Handled);
        }

        info!(target: "schal", "local service record for challenge {}", record.start);

        if record.submit_proof {
            if record.signature.is_empty() {
                // crashed before the TEE work finished; nothing to reuse
                return Ok(Resume::Fresh);
            }
            self.submit_service_proof(&mut record).await?;
        }
        self.submit_service_result(&mut record).await?;
        Ok(Resume::Handled)
    }

    async fn submit_service_proof(&self, record: &mut ServiceProofRecord) -> HostResult<()> {
        let mut last = String::new();
        for attempt in 0..SUBMIT_ATTEMPTS {
            match self
                .chain
                .submit_service_proof(record.proof.clone().into_bytes())
                .await
            {
                Ok(tx) => {
                    info!(target: "schal", "submit service proof suc: {tx}");
                    record.submit_proof = false;
                    self.store.save_service(record)?;
                    return Ok(());
                }
                Err(e) => {
                    warn!(target: "schal", "submit service proof: {e}");
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

    async fn submit_service_result(&self, record: &mut ServiceProofRecord) -> HostResult<()> {
        let mut last = String::new();
        for attempt in 0..SUBMIT_ATTEMPTS {
            match self
                .chain
                .submit_verify_service_result(
                    true,
                    record.signature.clone(),
                    record.bloom_filter.clone(),
                    record.tee_pubkey,
                )
                .await
            {
                Ok(tx) => {
                    info!(target: "schal", "submit service aggr proof result suc: {tx}");
                    record.submit_result = false;
                    self.store.save_service(record)?;
                    return Ok(());
                }
                Err(e) => {
                    warn!(target: "schal", "submit service result: {e}");
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

    async fn batch_gen_proof_and_verify(
        &self,
        params: &ServiceChallengeParams,
    ) -> HostResult<ServiceOutcome> {
        let q = q_slice(&params.random_index_list, &params.random_list);
        let q_wire = proto::QSlice::from_challenge(&params.random_index_list, &params.random_list);
        let endpoints = self.registry.verifier_endpoints();

        let mut batch = BatchState::default();
        let mut sigma_onchain = String::new();
        let mut stacked_bloom: Vec<u64> = Vec::new();
        let mut history: Vec<proto::VerifiedBatch> = Vec::new();
        let mut challenged = 0usize;

        for dir in Workspace::subdirs(&self.workspace.file_dir())? {
            let fid = dir
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            info!(target: "schal", "check the file: {fid}");

            let fragments = self.challenged_fragments(&fid, params.start).await?;
            info!(target: "schal", "number of challenged fragments: {}", fragments.len());

            for fragment in fragments {
                let tag = self.check_tag(&fid, &fragment).await?;

                let fragment_path = self.workspace.fragment_path(&fid, &fragment);
                if !fragment_path.is_file() {
                    let _ = self.chain.generate_restoral_order(&fid, &fragment).await;
                    return Err(HostError::MissingFragment { fid, fragment });
                }

                let (matrix, _) = split_by_n(&fragment_path, tag.phi.len())?;
                let sample = self.gen_proof_bounded(&fragment, &q, &tag, matrix).await?;

                batch.sigma = self.por_prover.aggr_append(&batch.sigma, &sample.sigma)?;
                sigma_onchain = self.por_prover.aggr_append(&sigma_onchain, &sample.sigma)?;
                batch.names.push(tag.name);
                batch.us.push(tag.u);
                batch.mus.push(sample.mu);
                batch.u_sigs.push(tag.u_sig);

                challenged += 1;
                if challenged % BATCH_SIZE == 0 {
                    self.flush_batch(&mut batch, &q_wire, &mut stacked_bloom, &mut history, &endpoints)
                        .await?;
                }
            }
        }

        if !batch.names.is_empty() {
            self.flush_batch(&mut batch, &q_wire, &mut stacked_bloom, &mut history, &endpoints)
                .await?;
        }

        let last = history.last().ok_or(HostError::NoChallengedFragment)?;
        if last.service_bloom_filter.len() > BLOOM_FILTER_LEN {
            return Err(HostError::MalformedTeeResponse(format!(
                "bloom filter length {} > {BLOOM_FILTER_LEN}",
                last.service_bloom_filter.len()
            )));
        }
        let bloom_filter = last.service_bloom_filter.clone();

        let request = proto::AggregateSignatureRequest {
            batch_history: history,
            q_slices: Some(q_wire),
        };
        let aggregate = self.verifier.aggregate_signature(&endpoints, request).await?;
        if aggregate.signature.len() > TEE_SIG_LEN {
            return Err(HostError::MalformedTeeResponse(format!(
                "aggregate signature length {} > {TEE_SIG_LEN}",
                aggregate.signature.len()
            )));
        }

        info!(target: "schal", "batch verification finished over {challenged} fragments");
        Ok(ServiceOutcome {
            proof: sigma_onchain,
            bloom_filter,
            aggregate,
        })
    }

    async fn flush_batch(
        &self,
        batch: &mut BatchState,
        q_wire: &proto::QSlice,
        stacked_bloom: &mut Vec<u64>,
        history: &mut Vec<proto::VerifiedBatch>,
        endpoints: &[String],
    ) -> HostResult<()> {
        let request = proto::BatchVerifyRequest {
            agg_proof: Some(proto::BatchVerifyParam {
                names: mem::take(&mut batch.names),
                us: mem::take(&mut batch.us),
                mus: mem::take(&mut batch.mus),
                sigma: batch.sigma.clone(),
            }),
            miner_id: self.miner_id(),
            q_slices: Some(q_wire.clone()),
            u_sigs: mem::take(&mut batch.u_sigs),
            service_bloom_filter: stacked_bloom.clone(),
        };
        let response = self.verifier.batch_verify(endpoints, request).await?;

        *stacked_bloom = response.service_bloom_filter.clone();
        history.push(proto::VerifiedBatch {
            miner_id: self.miner_id(),
            result: response.batch_verify_result,
            sigma: mem::take(&mut batch.sigma),
            service_bloom_filter: response.service_bloom_filter,
            signature: response.signature,
        });
        Ok(())
    }

    /// Fragment hashes of `fid` this miner must prove in epoch `start`:
    /// assigned to us, tag recorded at or before the challenge.
    async fn challenged_fragments(&self, fid: &str, start: u32) -> HostResult<Vec<String>> {
        let miner = self.signer.public_key();

        let mut metadata = None;
        let mut last: Option<ChainError> = None;
        for _ in 0..QUERY_FILE_ATTEMPTS {
            match self.chain.query_file(fid, start).await {
                Ok(m) => {
                    metadata = Some(m);
                    break;
                }
                Err(e) if e.is_empty() => return Ok(Vec::new()),
                Err(e) => {
                    last = Some(e);
                    tokio::time::sleep(BLOCK_INTERVAL).await;
                }
            }
        }
        let Some(metadata) = metadata else {
            return Err(last.expect("query loop records an error").into());
        };

        let mut out = Vec::new();
        for segment in &metadata.segment_list {
            for fragment in &segment.fragment_list {
                if fragment.miner != miner {
                    continue;
                }
                if let Some(birth) = fragment.tag {
                    if birth <= start {
                        out.push(fragment.hash.clone());
                    }
                }
            }
        }
        Ok(out)
    }

    /// Load the fragment's tag; recompute through a marker TEE if missing or
    /// malformed. A fragment we cannot tag is a fragment we cannot prove, so
    /// the second failure opens a restoral order and fails the epoch.
    async fn check_tag(&self, fid: &str, fragment: &str) -> HostResult<FragmentTag> {
        let tag_path = self.workspace.tag_path(fid, fragment);
        match FragmentTag::load(&tag_path) {
            Ok(tag) => return Ok(tag),
            Err(e) => {
                warn!(target: "schal", "invalid tag {}: {e}", tag_path.display());
            }
        }
        let _ = std::fs::remove_file(&tag_path);

        match self.recompute_tag(fid, fragment).await {
            Ok(tag) => {
                tag.save(&tag_path)?;
                Ok(tag)
            }
            Err(e) => {
                warn!(target: "schal", "recomputing tag for {fid}/{fragment} failed: {e}");
                let _ = self.chain.generate_restoral_order(fid, fragment).await;
                Err(HostError::InvalidTag {
                    fid: fid.to_string(),
                    fragment: fragment.to_string(),
                })
            }
        }
    }

    async fn recompute_tag(&self, fid: &str, fragment: &str) -> HostResult<FragmentTag> {
        let path = self.workspace.fragment_path(fid, fragment);
        let data = tokio::fs::read(&path).await?;
        let request = proto::GenTagRequest {
            fragment_name: fragment.to_string(),
            fragment_data: data,
            miner_id: self.miner_id(),
        };
        let response = self
            .verifier
            .gen_tag(&self.registry.marker_endpoints(), request)
            .await?;
        let tag = response
            .tag
            .ok_or_else(|| HostError::MalformedTeeResponse("gen tag reply missing tag".to_string()))?;
        Ok(FragmentTag {
            name: tag.name,
            u: tag.u,
            phi: tag.phi,
            u_sig: response.u_sig,
        })
    }

    /// One PoR sample, bounded by the per-fragment deadline. The prover runs
    /// on the blocking pool; a fragment that cannot be proven in time fails
    /// the epoch rather than stalling the batch.
    async fn gen_proof_bounded(
        &self,
        fragment: &str,
        q: &[QElement],
        tag: &FragmentTag,
        matrix: Vec<Vec<u8>>,
    ) -> HostResult<GenProofResult> {
        let prover = self.por_prover.clone();
        let q = q.to_vec();
        let phi = tag.phi.clone();
        let task = tokio::task::spawn_blocking(move || prover.gen_proof(&q, &phi, &matrix));
        match tokio::time::timeout(GEN_PROOF_TIMEOUT, task).await {
            Ok(Ok(result)) => Ok(result?),
            Ok(Err(join_err)) => Err(HostError::Por(PorError::Prover(join_err.to_string()))),
            Err(_) => Err(HostError::GenProofTimeout {
                fragment: fragment.to_string(),
            }),
        }
    }
}
