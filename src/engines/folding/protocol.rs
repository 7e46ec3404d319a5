//! Wire format of the remote folding service.
//!
//! Requests are JSON `{"method": ..., "args": {"seq": ...}}`. Replies are a
//! little-endian binary frame: `f64 free_energy | i32 length | length bytes of
//! dot-bracket text | (i32 i, i32 j, f64 probability)*`.

use crate::error::{CodonOptError, Result};
use crate::types::{BasePairProbability, RawFolding};
use serde::{Deserialize, Serialize};

pub const HEADER_LEN: usize = 12;
pub const PAIR_RECORD_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcArgs {
    pub seq: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub method: String,
    pub args: RpcArgs,
}

impl RpcRequest {
    pub fn new(method: &str, seq: &str) -> Self {
        Self {
            method: method.to_string(),
            args: RpcArgs { seq: seq.to_string() },
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Correlation id of one sequence within a call
pub fn correlation_id(call_id: &str, index: usize) -> String {
    format!("{}:{}", call_id, index)
}

pub fn parse_correlation_id(id: &str) -> Option<(&str, usize)> {
    let (call_id, index) = id.split_once(':')?;
    index.parse().ok().map(|index| (call_id, index))
}

fn read_array<const N: usize>(bytes: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[offset..offset + N]);
    out
}

pub fn decode_reply(body: &[u8]) -> Result<RawFolding> {
    if body.len() < HEADER_LEN {
        return Err(CodonOptError::Protocol(format!(
            "frame of {} bytes is shorter than the {}-byte header",
            body.len(),
            HEADER_LEN
        )));
    }

    let free_energy = f64::from_le_bytes(read_array(body, 0));
    let length = i32::from_le_bytes(read_array(body, 8));
    let length = usize::try_from(length)
        .map_err(|_| CodonOptError::Protocol(format!("negative structure length {}", length)))?;

    let structure_end = HEADER_LEN + length;
    if body.len() < structure_end {
        return Err(CodonOptError::Protocol(format!(
            "structure of {} bytes truncated at {}",
            length,
            body.len() - HEADER_LEN
        )));
    }
    let structure = std::str::from_utf8(&body[HEADER_LEN..structure_end])
        .map_err(|e| CodonOptError::Protocol(format!("structure is not UTF-8: {}", e)))?
        .to_string();

    let trailer = &body[structure_end..];
    if trailer.len() % PAIR_RECORD_LEN != 0 {
        return Err(CodonOptError::Protocol(format!(
            "{} trailing bytes do not form whole pair records",
            trailer.len()
        )));
    }

    let base_pairs = if trailer.is_empty() {
        None
    } else {
        let mut pairs = Vec::with_capacity(trailer.len() / PAIR_RECORD_LEN);
        for record in trailer.chunks_exact(PAIR_RECORD_LEN) {
            let i = i32::from_le_bytes(read_array(record, 0));
            let j = i32::from_le_bytes(read_array(record, 4));
            let probability = f64::from_le_bytes(read_array(record, 8));
            let (i, j) = match (usize::try_from(i), usize::try_from(j)) {
                (Ok(i), Ok(j)) => (i, j),
                _ => {
                    return Err(CodonOptError::Protocol(format!(
                        "negative pair index ({}, {})",
                        i, j
                    )))
                }
            };
            pairs.push(BasePairProbability { i, j, probability });
        }
        Some(pairs)
    };

    Ok(RawFolding {
        structure,
        free_energy,
        base_pairs,
    })
}

pub fn encode_reply(folding: &RawFolding) -> Vec<u8> {
    let pairs = folding.base_pairs.as_deref().unwrap_or(&[]);
    let mut out =
        Vec::with_capacity(HEADER_LEN + folding.structure.len() + pairs.len() * PAIR_RECORD_LEN);
    out.extend_from_slice(&folding.free_energy.to_le_bytes());
    out.extend_from_slice(&(folding.structure.len() as i32).to_le_bytes());
    out.extend_from_slice(folding.structure.as_bytes());
    for bp in pairs {
        out.extend_from_slice(&(bp.i as i32).to_le_bytes());
        out.extend_from_slice(&(bp.j as i32).to_le_bytes());
        out.extend_from_slice(&bp.probability.to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(energy: f64, structure: &str, pairs: &[(i32, i32, f64)]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&energy.to_le_bytes());
        out.extend_from_slice(&(structure.len() as i32).to_le_bytes());
        out.extend_from_slice(structure.as_bytes());
        for &(i, j, p) in pairs {
            out.extend_from_slice(&i.to_le_bytes());
            out.extend_from_slice(&j.to_le_bytes());
            out.extend_from_slice(&p.to_le_bytes());
        }
        out
    }

    #[test]
    fn test_decode_mfe_frame() {
        let folding = decode_reply(&frame(-7.5, "((...))", &[])).unwrap();
        assert_eq!(folding.structure, "((...))");
        assert_eq!(folding.free_energy, -7.5);
        assert!(folding.base_pairs.is_none());
    }

    #[test]
    fn test_decode_partition_frame() {
        let body = frame(-3.25, "(...)", &[(0, 4, 0.9), (1, 3, 0.05)]);
        assert_eq!(body.len(), HEADER_LEN + 5 + 2 * PAIR_RECORD_LEN);

        let pairs = decode_reply(&body).unwrap().base_pairs.unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!((pairs[0].i, pairs[0].j), (0, 4));
        assert_eq!(pairs[0].probability, 0.9);
        assert_eq!(pairs[1].probability, 0.05);
    }

    #[test]
    fn test_decode_rejects_malformed_frames() {
        assert!(matches!(decode_reply(&[0u8; 5]), Err(CodonOptError::Protocol(_))));

        let mut truncated = frame(-1.0, "((...))", &[]);
        truncated.truncate(HEADER_LEN + 3);
        assert!(decode_reply(&truncated).is_err());

        let mut ragged = frame(-1.0, "(...)", &[(0, 4, 0.5)]);
        ragged.pop();
        assert!(decode_reply(&ragged).is_err());

        assert!(decode_reply(&frame(-1.0, ".....", &[(-1, 4, 0.5)])).is_err());
    }

    #[test]
    fn test_encode_matches_decoder() {
        let folding = RawFolding {
            structure: "(...)".to_string(),
            free_energy: -2.0,
            base_pairs: Some(vec![BasePairProbability { i: 0, j: 4, probability: 0.75 }]),
        };
        assert_eq!(decode_reply(&encode_reply(&folding)).unwrap(), folding);
    }

    #[test]
    fn test_request_payload_shape() {
        let bytes = RpcRequest::new("linearfold", "AUGC").to_bytes().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["method"], "linearfold");
        assert_eq!(value["args"]["seq"], "AUGC");
    }

    #[test]
    fn test_correlation_id_round_trip() {
        let id = correlation_id("abc123", 7);
        assert_eq!(id, "abc123:7");
        assert_eq!(parse_correlation_id(&id), Some(("abc123", 7)));
        assert_eq!(parse_correlation_id("abc123"), None);
        assert_eq!(parse_correlation_id("abc:x"), None);
    }
}
