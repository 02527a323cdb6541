//! Proof-of-retrievability primitives for service fragments.
//!
//! Tags are produced at ingestion time by a marker TEE and stored beside the
//! fragment; the polynomial commitment scheme itself is behind [`PorProver`].

use std::fs;
use std::path::Path;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum PorError {
    #[error("PorError::FileIo `{0}`")]
    FileIo(#[from] std::io::Error),
    #[error("PorError::Tag `{0}`")]
    Tag(String),
    #[error("PorError::Prover `{0}`")]
    Prover(String),
}

/// Commitment metadata for one stored fragment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FragmentTag {
    pub name: String,
    pub u: String,
    pub phi: Vec<String>,
    pub u_sig: Vec<u8>,
}

impl FragmentTag {
    pub fn load(path: &Path) -> Result<Self, PorError> {
        let buf = fs::read(path)?;
        serde_json::from_slice(&buf).map_err(|e| PorError::Tag(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<(), PorError> {
        let buf = serde_json::to_vec(self).map_err(|e| PorError::Tag(e.to_string()))?;
        fs::write(path, buf)?;
        Ok(())
    }
}

/// One element of the challenge Q-slice: a fragment-chunk index paired with
/// a random coefficient rendered in decimal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QElement {
    pub i: i64,
    pub v: String,
}

/// Pair the chain's parallel random sequences into a Q-slice. The value is
/// the big-endian integer decoded from the random scalar.
pub fn q_slice(random_index_list: &[u32], random_list: &[Vec<u8>]) -> Vec<QElement> {
    random_index_list
        .iter()
        .zip(random_list)
        .map(|(i, v)| QElement {
            i: i64::from(*i),
            v: BigUint::from_bytes_be(v).to_str_radix(10),
        })
        .collect()
}

/// Split the file at `path` into exactly `n` equally sized chunks. The chunk
/// width is `ceil(len / n)`; the final chunk is zero-padded when the source
/// length is not a multiple. Returns the chunks and the source length.
pub fn split_by_n(path: &Path, n: usize) -> Result<(Vec<Vec<u8>>, u64), PorError> {
    if n == 0 {
        return Err(PorError::Tag("tag has no phi entries".to_string()));
    }
    let data = fs::read(path)?;
    let len = data.len() as u64;
    if data.is_empty() {
        return Ok((vec![Vec::new(); n], 0));
    }
    let width = data.len().div_ceil(n);
    let mut chunks = Vec::with_capacity(n);
    for part in data.chunks(width) {
        let mut chunk = part.to_vec();
        chunk.resize(width, 0);
        chunks.push(chunk);
    }
    // Sources shorter than n bytes produce fewer than n chunks; pad out so
    // the matrix always matches the tag's phi count.
    chunks.resize(n, vec![0u8; width]);
    Ok((chunks, len))
}

/// Per-fragment proof sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenProofResult {
    pub sigma: String,
    pub mu: String,
}

/// Black-box PoR prover for one fragment and the running σ aggregation.
pub trait PorProver: Send + Sync {
    /// Produce `{σ_i, μ_i}` for one fragment against the challenge Q-slice.
    fn gen_proof(
        &self,
        q: &[QElement],
        phi: &[String],
        matrix: &[Vec<u8>],
    ) -> Result<GenProofResult, PorError>;

    /// Fold a per-fragment σ into the running aggregate. An empty aggregate
    /// is the identity.
    fn aggr_append(&self, sigma: &str, sub_sigma: &str) -> Result<String, PorError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn q_slice_decodes_big_endian_decimal() {
        let q = q_slice(&[3, 9], &[vec![0x01, 0x00], vec![0xff]]);
        assert_eq!(q.len(), 2);
        assert_eq!(q[0].i, 3);
        assert_eq!(q[0].v, "256");
        assert_eq!(q[1].i, 9);
        assert_eq!(q[1].v, "255");
    }

    #[test]
    fn q_slice_empty_scalar_is_zero() {
        let q = q_slice(&[1], &[vec![]]);
        assert_eq!(q[0].v, "0");
    }

    #[test]
    fn split_exact_multiple() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&[1u8; 12]).unwrap();
        let (chunks, len) = split_by_n(f.path(), 4).unwrap();
        assert_eq!(len, 12);
        assert_eq!(chunks.len(), 4);
        assert!(chunks.iter().all(|c| c.len() == 3));
    }

    #[test]
    fn split_pads_final_chunk() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&[7u8; 10]).unwrap();
        let (chunks, len) = split_by_n(f.path(), 4).unwrap();
        assert_eq!(len, 10);
        assert_eq!(chunks.len(), 4);
        assert!(chunks.iter().all(|c| c.len() == 3));
        // 10 bytes over 4 chunks of 3: last chunk holds one byte + padding.
        assert_eq!(chunks[3], vec![7, 0, 0]);
        let total: usize = chunks.iter().map(|c| c.iter().filter(|b| **b == 7).count()).sum();
        assert_eq!(total, 10);
    }

    #[test]
    fn split_rejects_zero_chunks() {
        let f = tempfile::NamedTempFile::new().unwrap();
        assert!(split_by_n(f.path(), 0).is_err());
    }

    #[test]
    fn tag_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frag.tag");
        let tag = FragmentTag {
            name: "frag".to_string(),
            u: "17".to_string(),
            phi: vec!["1".to_string(), "2".to_string()],
            u_sig: vec![1, 2, 3],
        };
        tag.save(&path).unwrap();
        assert_eq!(FragmentTag::load(&path).unwrap(), tag);
    }
}
