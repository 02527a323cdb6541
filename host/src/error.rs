use ceres_chain::ChainError;
use ceres_lib::pois::PoisError;
use ceres_lib::por::PorError;
use ceres_lib::signer::SignError;
use ceres_tee::TeeError;

use crate::store::StoreError;

/// The standardized error returned by the challenge pipelines.
#[derive(thiserror::Error, Debug)]
pub enum HostError {
    #[error("There was an error with the chain gateway: {0}")]
    Chain(#[from] ChainError),

    #[error("There was an error with a tee worker: {0}")]
    Tee(#[from] TeeError),

    #[error("There was an error with the space prover: {0}")]
    Pois(#[from] PoisError),

    #[error("There was an error with the por prover: {0}")]
    Por(#[from] PorError),

    #[error("There was an error with the proof store: {0}")]
    Store(#[from] StoreError),

    #[error("There was a I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("There was a deserialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Could not sign the proof hash: {0}")]
    Signer(#[from] SignError),

    #[error("There was an error with the http client: {0}")]
    Http(String),

    /// The verify window closed; the challenge is lost for this epoch.
    #[error("Challenge expired: verify deadline {expiration} <= block {block}")]
    ChallengeExpired { expiration: u32, block: u32 },

    /// The chain has not yet allocated a TEE to verify the idle proof.
    #[error("No tee allocated for the idle proof yet")]
    TeeNotAllocated,

    /// A challenged fragment is gone from disk; a restoral order was opened.
    #[error("Challenge failed due to missing fragment: {fid}/{fragment}")]
    MissingFragment { fid: String, fragment: String },

    /// A fragment tag could not be loaded or recomputed.
    #[error("Challenge failed due to an invalid tag: {fid}/{fragment}")]
    InvalidTag { fid: String, fragment: String },

    /// The challenge selected no fragment at all; nothing to prove.
    #[error("No service fragment is challenged in this epoch")]
    NoChallengedFragment,

    /// A TEE reply violated a declared length bound. Fatal for the epoch.
    #[error("Malformed tee response: {0}")]
    MalformedTeeResponse(String),

    #[error("Proof computation timed out for fragment {fragment}")]
    GenProofTimeout { fragment: String },

    /// The chain rejected the submission on every attempt.
    #[error("Submission failed after {attempts} attempts: {last}")]
    SubmitFailed { attempts: u32, last: String },
}

pub type HostResult<T> = Result<T, HostError>;
