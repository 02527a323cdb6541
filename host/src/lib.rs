//! Miner host: challenge supervisor, controllers, and durable proof state.

pub mod config;
pub mod discover;
pub mod error;
pub mod idle;
pub mod logging;
pub mod mock;
pub mod native;
pub mod record;
pub mod report;
pub mod reward;
pub mod service;
pub mod signer;
pub mod sink;
pub mod store;
pub mod supervisor;
pub mod workspace;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ceres_chain::ChainGateway;
use ceres_lib::pois::{RsaKey, SpaceProver};
use ceres_lib::por::PorProver;
use ceres_lib::signer::Signer;
use ceres_tee::{TeeRegistry, TeeVerifier};
use tokio::sync::{Mutex, RwLock};

use crate::config::Config;
use crate::error::{HostError, HostResult};
use crate::store::ProofStore;
use crate::workspace::Workspace;

/// External collaborators the node is wired with at startup.
pub struct NodeParts {
    pub chain: Arc<dyn ChainGateway>,
    pub verifier: Arc<dyn TeeVerifier>,
    pub registry: Arc<TeeRegistry>,
    pub signer: Arc<dyn Signer>,
    pub space_prover: Box<dyn SpaceProver>,
    pub por_prover: Arc<dyn PorProver>,
    pub pois_key: RsaKey,
}

/// One running miner. Shared by the supervisor and the controllers; all
/// cross-task state sits behind locks or atomics.
pub struct Node {
    pub config: Config,
    pub workspace: Workspace,
    pub store: ProofStore,
    pub chain: Arc<dyn ChainGateway>,
    pub verifier: Arc<dyn TeeVerifier>,
    pub registry: Arc<TeeRegistry>,
    pub signer: Arc<dyn Signer>,
    pub space_prover: Mutex<Box<dyn SpaceProver>>,
    pub por_prover: Arc<dyn PorProver>,
    pub pois_key: RsaKey,
    pub peers: RwLock<HashMap<String, String>>,
    pub http: reqwest::Client,
    service_challenging: AtomicBool,
}

impl Node {
    pub fn new(config: Config, parts: NodeParts) -> HostResult<Arc<Self>> {
        let workspace = Workspace::new(&config.workspace);
        workspace.init()?;
        let store = ProofStore::new(workspace.clone());
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| HostError::Http(e.to_string()))?;
        Ok(Arc::new(Self {
            config,
            workspace,
            store,
            chain: parts.chain,
            verifier: parts.verifier,
            registry: parts.registry,
            signer: parts.signer,
            space_prover: Mutex::new(parts.space_prover),
            por_prover: parts.por_prover,
            pois_key: parts.pois_key,
            peers: RwLock::new(HashMap::new()),
            http,
            service_challenging: AtomicBool::new(false),
        }))
    }

    /// The miner's public key in the form chain and TEEs expect.
    pub fn miner_id(&self) -> Vec<u8> {
        self.signer.public_key().to_vec()
    }

    pub fn is_service_challenging(&self) -> bool {
        self.service_challenging.load(Ordering::SeqCst)
    }

    pub(crate) fn set_service_challenging(&self, value: bool) {
        self.service_challenging.store(value, Ordering::SeqCst);
    }
}
