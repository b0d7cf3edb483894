//! M2 rotation - deterministic validator order from revealed secrets
//!
//! Every node derives the same order from the same revealed secrets, so the
//! generator is seeded per call from the secret sum and never shared.

use frecnet_primitives::{left_pad_bytes, M2_BYTE_LENGTH};

use crate::error::{Error, Result};
use crate::lfg::LfgRng;

/// Derive the next epoch's validator order (indices into the sorted masternode list).
///
/// Tail-consuming Fisher-Yates over `[0, validator_count)`: at step `i` an index
/// `r` in `[0, max(1, i))` is swapped into position `i`, the swapped-out value
/// becomes `order[i]`, and the tail is dropped from the working set.
pub fn generate_rotation_order(secrets: &[i64], validator_count: i64) -> Vec<i64> {
    if validator_count <= 0 {
        return vec![];
    }

    let seed = secrets.iter().fold(0i64, |acc, s| acc.wrapping_add(*s));
    let mut rng = LfgRng::new(seed);

    let mut working: Vec<i64> = (0..validator_count).collect();
    let mut order = vec![0i64; working.len()];

    for i in (0..working.len()).rev() {
        let bound = (working.len() - 1).max(1);
        let r = rng.intn(bound as i64) as usize;
        working.swap(r, i);
        order[i] = working[i];
        working.truncate(i);
    }

    log::debug!("Generated M2 order for {} validators (seed {})", validator_count, seed);
    order
}

/// Encode an M2 order: each index as decimal digits, zero-byte left-padded to
/// `M2_BYTE_LENGTH`. Indices must fit the width.
pub fn build_rotation_bytes(order: &[i64]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(order.len() * M2_BYTE_LENGTH);
    for index in order {
        bytes.extend(left_pad_bytes(index.to_string().as_bytes(), M2_BYTE_LENGTH));
    }
    bytes
}

/// Decode the output of [`build_rotation_bytes`].
///
/// A trailing partial chunk is ignored. Any chunk that is not a number makes
/// the whole result empty.
pub fn decode_rotation_bytes(bytes: &[u8]) -> Vec<i64> {
    let mut order = Vec::with_capacity(bytes.len() / M2_BYTE_LENGTH);
    for chunk in bytes.chunks_exact(M2_BYTE_LENGTH) {
        let digits = trim_zero_bytes(chunk);
        match std::str::from_utf8(digits).ok().and_then(|s| s.parse::<i64>().ok()) {
            Some(index) => order.push(index),
            None => {
                log::error!("Can not convert M2 chunk {} to integer", hex::encode(chunk));
                return vec![];
            }
        }
    }
    order
}

/// Decode a `0x`-prefixed hex M2 payload (as stored in checkpoint headers)
pub fn decode_rotation_hex(data: &str) -> Result<Vec<i64>> {
    let stripped = data
        .strip_prefix("0x")
        .or_else(|| data.strip_prefix("0X"))
        .ok_or_else(|| Error::InvalidHex("missing 0x prefix".into()))?;
    let bytes = hex::decode(stripped).map_err(|e| Error::InvalidHex(e.to_string()))?;
    Ok(decode_rotation_bytes(&bytes))
}

fn trim_zero_bytes(chunk: &[u8]) -> &[u8] {
    let start = chunk.iter().position(|b| *b != 0).unwrap_or(chunk.len());
    let end = chunk.iter().rposition(|b| *b != 0).map_or(start, |p| p + 1);
    &chunk[start..end]
}
