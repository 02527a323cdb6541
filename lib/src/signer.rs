use crate::types::AccountId;

#[derive(thiserror::Error, Debug)]
#[error("SignError `{0}`")]
pub struct SignError(pub String);

/// Miner signing identity. The concrete keypair lives in the operator SDK;
/// the challenge pipelines only need to sign digests and name themselves.
pub trait Signer: Send + Sync {
    fn sign(&self, msg: &[u8]) -> Result<Vec<u8>, SignError>;

    /// Public key the chain knows this miner by.
    fn public_key(&self) -> AccountId;

    /// Human-readable account string, used in upload headers.
    fn account(&self) -> String;
}
