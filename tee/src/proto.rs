//! Generated wire types for the TEE verification service, plus conversions
//! from the in-memory proof shapes.

pub mod v1 {
    tonic::include_proto!("ceres.tee.v1");
}

pub use v1::verifier_client::VerifierClient;
pub use v1::{
    AccWitnessNode, AggregateSignatureRequest, AggregateSignatureResponse, BatchVerifyParam,
    BatchVerifyRequest, BatchVerifyResponse, BlocksProof, GenTagRequest, GenTagResponse,
    MhtProof, MhtProofGroup, MinerPoisInfo, ProofHashAndLeftRight, QSlice, SpaceProof,
    SpaceProofVerifyRequest, SpaceProofVerifyResponse, SpaceProofVerifyTotalRequest,
    SpaceProofVerifyTotalResponse, Tag, VerifiedBatch,
};

use ceres_lib::pois;

impl From<&pois::MhtProof> for MhtProof {
    fn from(p: &pois::MhtProof) -> Self {
        MhtProof {
            index: p.index,
            label: p.label.clone(),
            paths: p.paths.clone(),
            locs: p.locs.clone(),
        }
    }
}

impl From<&pois::MhtProofGroup> for MhtProofGroup {
    fn from(g: &pois::MhtProofGroup) -> Self {
        MhtProofGroup {
            proofs: g.proofs.iter().map(Into::into).collect(),
        }
    }
}

impl From<&pois::AccWitnessNode> for AccWitnessNode {
    fn from(n: &pois::AccWitnessNode) -> Self {
        AccWitnessNode {
            elem: n.elem.clone(),
            wit: n.wit.clone(),
            acc: n.acc.as_deref().map(|next| Box::new(next.into())),
        }
    }
}

impl From<&pois::SpaceProof> for SpaceProof {
    fn from(p: &pois::SpaceProof) -> Self {
        SpaceProof {
            left: p.left,
            right: p.right,
            roots: p.roots.clone(),
            proofs: p.proofs.iter().map(Into::into).collect(),
            wit_chains: p.wit_chains.iter().map(Into::into).collect(),
        }
    }
}

impl QSlice {
    pub fn from_challenge(random_index_list: &[u32], random_list: &[Vec<u8>]) -> Self {
        QSlice {
            random_index_list: random_index_list.to_vec(),
            random_list: random_list.to_vec(),
        }
    }
}
