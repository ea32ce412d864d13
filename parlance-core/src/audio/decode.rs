//! Payload decoding with float32/PCM16 auto-detection.
//!
//! A payload is interpreted as float32 little-endian iff its length is a
//! multiple of 4 AND every decoded value satisfies |x| <= 1.5 (float audio
//! is nominally in [-1, 1]; the margin tolerates mild clipping). Anything
//! else falls back to signed 16-bit PCM scaled by 1/32768. Clipped float
//! streams that genuinely exceed ±1.5 will therefore misdetect as PCM —
//! changing that requires a protocol revision, not a decoder tweak.

use crate::error::{ParlanceError, Result};

/// Largest magnitude a payload may decode to and still be accepted as float32.
const FLOAT32_PLAUSIBLE_LIMIT: f32 = 1.5;

/// Decode a transport payload into mono f32 samples.
///
/// # Errors
/// Returns `ParlanceError::Decode` when the payload fits neither encoding
/// (odd byte count that also fails the float32 check).
pub fn decode_payload(payload: &[u8]) -> Result<Vec<f32>> {
    if payload.is_empty() {
        return Ok(Vec::new());
    }

    if payload.len() % 4 == 0 {
        let floats: Vec<f32> = payload
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        // NaN fails this comparison too, which is what we want.
        if floats.iter().all(|x| x.abs() <= FLOAT32_PLAUSIBLE_LIMIT) {
            return Ok(floats);
        }
    }

    if payload.len() % 2 != 0 {
        return Err(ParlanceError::Decode(format!(
            "{} bytes fit neither float32 nor 16-bit PCM framing",
            payload.len()
        )));
    }

    Ok(payload
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
        .collect())
}
