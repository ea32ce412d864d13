//! Wire-audio handling.
//!
//! Clients push raw audio payloads over the transport in one of two
//! encodings (float32 LE or signed 16-bit PCM LE); `decode` normalises
//! both into mono f32 samples in [-1.0, 1.0] at the fixed wire rate.

pub mod decode;

pub use decode::decode_payload;

/// Wire sample rate: all transport audio is 16 kHz mono.
pub const WIRE_SAMPLE_RATE: u32 = 16_000;
