use ceres_lib::types::{AccountId, WorkerPublicKey};
use serde::{Deserialize, Serialize};

/// Snapshot of the open challenge published for a miner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChallengeInfo {
    pub challenge: ChallengeElement,
    pub prove_info: ProveInfo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChallengeElement {
    /// Challenge epoch.
    pub start: u32,
    /// Block after which verified results are rejected.
    pub verify_expiration: u32,
    /// Random scalars for the space-proof challenge.
    pub space_param: Vec<i64>,
    /// Indices selecting service fragment chunks.
    pub random_index_list: Vec<u32>,
    /// Random scalars parallel to `random_index_list`.
    pub random_list: Vec<Vec<u8>>,
    pub miner_snapshot: MinerSnapshot,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MinerSnapshot {
    pub space_proof_info: SpaceProofInfo,
    /// TEE signature over the miner's registered space-proof state.
    pub tee_signature: Vec<u8>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpaceProofInfo {
    /// Inclusive lower bound of the persisted idle-block range.
    pub front: i64,
    /// Exclusive upper bound of the persisted idle-block range.
    pub rear: i64,
    /// Accumulator commitment over the idle set.
    pub accumulator: Vec<u8>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProveInfo {
    /// Set once the idle proof was submitted; carries the allocated TEE.
    pub idle_prove: Option<ProveAssignment>,
    pub service_prove: Option<ProveAssignment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProveAssignment {
    pub tee_pubkey: WorkerPublicKey,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileMetadata {
    pub segment_list: Vec<SegmentInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SegmentInfo {
    pub hash: String,
    pub fragment_list: Vec<FragmentInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FragmentInfo {
    pub hash: String,
    /// Miner currently assigned this fragment.
    pub miner: AccountId,
    /// Block at which the fragment's tag was recorded, if any.
    pub tag: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageOrder {
    pub complete_list: Vec<CompleteInfo>,
    pub miner_task_list: Vec<MinerTask>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompleteInfo {
    pub index: u8,
    pub miner: AccountId,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MinerTask {
    pub index: u8,
    pub miner: Option<AccountId>,
    pub fragment_list: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeeWorker {
    pub pubkey: WorkerPublicKey,
    pub role: u8,
}

/// Reward balances rendered by the operator CLI. Decimal strings as the
/// chain reports them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RewardInfo {
    pub total: String,
    pub claimed: String,
    pub available: String,
}
