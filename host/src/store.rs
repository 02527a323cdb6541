//! Crash-safe persistence for challenge records.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::record::{IdleProofRecord, ServiceProofRecord};
use crate::workspace::Workspace;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("no record on disk")]
    Missing,

    /// The record belongs to an earlier epoch. The file is already gone by
    /// the time this is returned.
    #[error("record is stale: have start {have}, want {want}")]
    Stale { have: u32, want: u32 },

    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Reads and writes the two per-epoch proof records. Writes go through a
/// temp file plus fsync plus rename so a crash never leaves a torn record.
#[derive(Debug, Clone)]
pub struct ProofStore {
    workspace: Workspace,
}

impl ProofStore {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }

    pub fn save_idle(&self, record: &IdleProofRecord) -> Result<(), StoreError> {
        atomic_write_json(&self.workspace.idle_proof_path(), record)
    }

    /// Load the idle record for epoch `start`. A record from another epoch
    /// is deleted and reported as stale.
    pub fn load_idle(&self, start: u32) -> Result<IdleProofRecord, StoreError> {
        let path = self.workspace.idle_proof_path();
        let record: IdleProofRecord = load_json(&path)?;
        if record.start != start {
            let _ = fs::remove_file(&path);
            info!("evicted stale idle record from epoch {}", record.start);
            return Err(StoreError::Stale {
                have: record.start,
                want: start,
            });
        }
        Ok(record)
    }

    pub fn save_service(&self, record: &ServiceProofRecord) -> Result<(), StoreError> {
        atomic_write_json(&self.workspace.service_proof_path(), record)
    }

    pub fn load_service(&self, start: u32) -> Result<ServiceProofRecord, StoreError> {
        let path = self.workspace.service_proof_path();
        let record: ServiceProofRecord = load_json(&path)?;
        if record.start != start {
            let _ = fs::remove_file(&path);
            info!("evicted stale service record from epoch {}", record.start);
            return Err(StoreError::Stale {
                have: record.start,
                want: start,
            });
        }
        Ok(record)
    }
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let buf = match fs::read(path) {
        Ok(buf) => buf,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(StoreError::Missing),
        Err(e) => return Err(e.into()),
    };
    Ok(serde_json::from_slice(&buf)?)
}

fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let buf = serde_json::to_vec(value)?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(&buf)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}
