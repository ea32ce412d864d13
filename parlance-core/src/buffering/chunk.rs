//! Audio spans exchanged between pipeline stages.

use crate::audio::WIRE_SAMPLE_RATE;

/// A contiguous span of mono samples: one frame on its way to the VAD
/// scorer, or one extracted utterance on its way to a recognition backend.
///
/// Transport audio is fixed at 16 kHz mono, so every span in this crate
/// carries the wire rate; the field exists because backends and capture
/// sidecars still need to state it.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Mono f32 samples in [-1.0, 1.0].
    pub samples: Vec<f32>,
    /// Sample rate in Hz (the 16 kHz wire rate).
    pub sample_rate: u32,
}

impl AudioChunk {
    /// Wrap samples at the wire rate.
    pub fn wire(samples: Vec<f32>) -> Self {
        Self {
            samples,
            sample_rate: WIRE_SAMPLE_RATE,
        }
    }

    /// Duration of the span in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }
}
