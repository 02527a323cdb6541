//! Native provers: deterministic stand-ins for the sealed-space and PoR
//! schemes. They exercise the full pipeline shape without being
//! cryptographic arguments, the same way a native prover stands in for a
//! real guest prover during development and testing.

use ceres_lib::pois::{
    AccWitnessNode, ChallengeHandle, PoisError, RsaKey, SpaceProof, SpaceProver,
};
use ceres_lib::por::{GenProofResult, PorError, PorProver, QElement};
use num_bigint::BigUint;
use sha2::{Digest, Sha256};

/// Blocks covered by one challenge subrange.
const WINDOW: i64 = 256;

#[derive(Debug, Default)]
pub struct NativeSpaceProver {
    front: i64,
    rear: i64,
}

impl SpaceProver for NativeSpaceProver {
    fn set_challenge_state(
        &mut self,
        _key: &RsaKey,
        _acc: &[u8],
        front: i64,
        rear: i64,
    ) -> Result<(), PoisError> {
        if rear < front {
            return Err(PoisError::State(format!("rear {rear} < front {front}")));
        }
        self.front = front;
        self.rear = rear;
        Ok(())
    }

    fn challenge_handle(&self, _miner_id: &[u8], _chall_random: &[i64]) -> ChallengeHandle {
        let rear = self.rear;
        let mut cursor = self.front;
        Box::new(move |_previous_hash| {
            let left = cursor;
            let right = (cursor + WINDOW).min(rear);
            cursor = right;
            (left, right)
        })
    }

    fn prove_space(
        &mut self,
        chall_random: &[i64],
        left: i64,
        right: i64,
    ) -> Result<SpaceProof, PoisError> {
        let mut hasher = Sha256::new();
        for v in chall_random {
            hasher.update(v.to_be_bytes());
        }
        hasher.update(left.to_be_bytes());
        hasher.update(right.to_be_bytes());
        let digest = hasher.finalize().to_vec();

        Ok(SpaceProof {
            left,
            right,
            roots: vec![digest.clone()],
            proofs: Vec::new(),
            wit_chains: vec![AccWitnessNode {
                elem: digest.clone(),
                wit: digest,
                acc: None,
            }],
        })
    }
}

#[derive(Debug, Default)]
pub struct NativePorProver;

impl PorProver for NativePorProver {
    fn gen_proof(
        &self,
        q: &[QElement],
        phi: &[String],
        matrix: &[Vec<u8>],
    ) -> Result<GenProofResult, PorError> {
        let mut sigma_hasher = Sha256::new();
        for entry in phi {
            sigma_hasher.update(entry.as_bytes());
        }
        for chunk in matrix {
            sigma_hasher.update(chunk);
        }
        let mut mu_hasher = Sha256::new();
        for element in q {
            mu_hasher.update(element.i.to_be_bytes());
            mu_hasher.update(element.v.as_bytes());
        }
        Ok(GenProofResult {
            sigma: BigUint::from_bytes_be(&sigma_hasher.finalize()).to_str_radix(10),
            mu: BigUint::from_bytes_be(&mu_hasher.finalize()).to_str_radix(10),
        })
    }

    fn aggr_append(&self, sigma: &str, sub_sigma: &str) -> Result<String, PorError> {
        let parse = |s: &str| -> Result<BigUint, PorError> {
            if s.is_empty() {
                return Ok(BigUint::default());
            }
            s.parse()
                .map_err(|_| PorError::Prover(format!("non-decimal sigma: {s}")))
        };
        Ok((parse(sigma)? + parse(sub_sigma)?).to_str_radix(10))
    }
}
