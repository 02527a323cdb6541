use serde::{Deserialize, Serialize};

use crate::consts::WORKER_PUBLIC_KEY_LEN;

/// Public key identifying a TEE worker on the chain.
pub type WorkerPublicKey = [u8; WORKER_PUBLIC_KEY_LEN];

/// On-chain account public key of a miner.
pub type AccountId = [u8; 32];

/// Role a TEE worker is registered with on the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TeeRole {
    Full,
    Verifier,
    Marker,
}

impl TryFrom<u8> for TeeRole {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TeeRole::Full),
            1 => Ok(TeeRole::Verifier),
            2 => Ok(TeeRole::Marker),
            other => Err(other),
        }
    }
}

/// An unassigned worker key on the chain is all zeroes.
pub fn is_all_zero(key: &WorkerPublicKey) -> bool {
    key.iter().all(|b| *b == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_key_detection() {
        assert!(is_all_zero(&[0u8; WORKER_PUBLIC_KEY_LEN]));
        let mut key = [0u8; WORKER_PUBLIC_KEY_LEN];
        key[31] = 1;
        assert!(!is_all_zero(&key));
    }

    #[test]
    fn role_from_u8() {
        assert_eq!(TeeRole::try_from(0), Ok(TeeRole::Full));
        assert_eq!(TeeRole::try_from(1), Ok(TeeRole::Verifier));
        assert_eq!(TeeRole::try_from(2), Ok(TeeRole::Marker));
        assert_eq!(TeeRole::try_from(3), Err(3));
    }
}
