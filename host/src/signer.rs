use ceres_lib::signer::{SignError, Signer};
use ceres_lib::types::AccountId;
use ed25519_dalek::{Signer as _, SigningKey};

/// Ed25519 miner identity derived from the configured seed.
pub struct KeypairSigner {
    key: SigningKey,
    account: String,
}

impl KeypairSigner {
    pub fn from_seed_hex(seed: &str) -> Result<Self, SignError> {
        let bytes = hex::decode(seed.trim_start_matches("0x"))
            .map_err(|e| SignError(format!("invalid seed hex: {e}")))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| SignError("signing seed must be 32 bytes".to_string()))?;
        let key = SigningKey::from_bytes(&seed);
        let account = hex::encode(key.verifying_key().to_bytes());
        Ok(Self { key, account })
    }
}

impl Signer for KeypairSigner {
    fn sign(&self, msg: &[u8]) -> Result<Vec<u8>, SignError> {
        Ok(self.key.sign(msg).to_bytes().to_vec())
    }

    fn public_key(&self) -> AccountId {
        self.key.verifying_key().to_bytes()
    }

    fn account(&self) -> String {
        self.account.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_signatures() {
        let signer = KeypairSigner::from_seed_hex(&"11".repeat(32)).unwrap();
        let a = signer.sign(b"proof hash").unwrap();
        let b = signer.sign(b"proof hash").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_eq!(signer.account(), hex::encode(signer.public_key()));
    }

    #[test]
    fn rejects_short_seed() {
        assert!(KeypairSigner::from_seed_hex("abcd").is_err());
    }
}
