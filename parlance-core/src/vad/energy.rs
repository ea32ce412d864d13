//! Energy-based speech scorer using normalised RMS.
//!
//! ## Algorithm
//!
//! 1. Compute RMS of the incoming frame.
//! 2. Divide by a reference "full speech" RMS level.
//! 3. Clamp into [0, 1] — that ratio is the speech probability.
//!
//! Crude next to a neural scorer, but it needs no model file, runs in a
//! few microseconds per frame, and behaves monotonically with loudness,
//! which is what the threshold comparison in the pipeline needs.

use super::SpeechScorer;
use crate::buffering::chunk::AudioChunk;
use crate::error::Result;

/// A simple energy-based speech scorer.
#[derive(Debug, Clone)]
pub struct EnergyScorer {
    /// RMS level mapped to probability 1.0. Typical speech sits around
    /// 0.05–0.2 RMS on a reasonable microphone; 0.1 makes half-scale
    /// speech score 1.0 and quiet room noise score near 0.
    full_scale_rms: f32,
}

impl EnergyScorer {
    pub fn new(full_scale_rms: f32) -> Self {
        Self {
            full_scale_rms: full_scale_rms.max(f32::EPSILON),
        }
    }

    /// Compute the root-mean-square of a sample slice.
    fn rms(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
        (sum_sq / samples.len() as f32).sqrt()
    }
}

impl Default for EnergyScorer {
    fn default() -> Self {
        Self::new(0.1)
    }
}

impl SpeechScorer for EnergyScorer {
    fn score(&mut self, chunk: &AudioChunk) -> Result<f32> {
        Ok((Self::rms(&chunk.samples) / self.full_scale_rms).clamp(0.0, 1.0))
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn silent_chunk(len: usize) -> AudioChunk {
        AudioChunk::wire(vec![0.0f32; len])
    }

    fn loud_chunk(amplitude: f32, len: usize) -> AudioChunk {
        AudioChunk::wire(vec![amplitude; len])
    }

    #[test]
    fn silence_scores_zero() {
        let mut scorer = EnergyScorer::default();
        assert_relative_eq!(scorer.score(&silent_chunk(512)).unwrap(), 0.0);
    }

    #[test]
    fn loud_audio_saturates_at_one() {
        let mut scorer = EnergyScorer::default();
        assert_relative_eq!(scorer.score(&loud_chunk(0.5, 512)).unwrap(), 1.0);
    }

    #[test]
    fn quiet_audio_scores_proportionally() {
        let mut scorer = EnergyScorer::new(0.1);
        // Constant amplitude 0.05 has RMS 0.05 → probability 0.5.
        let p = scorer.score(&loud_chunk(0.05, 512)).unwrap();
        assert_relative_eq!(p, 0.5, epsilon = 1e-5);
    }

    #[test]
    fn empty_chunk_scores_zero() {
        let mut scorer = EnergyScorer::default();
        assert_relative_eq!(scorer.score(&silent_chunk(0)).unwrap(), 0.0);
    }

    #[test]
    fn rms_of_square_wave() {
        // A square wave at ±0.5 has RMS 0.5.
        let samples: Vec<f32> = (0..256)
            .map(|i| if i % 2 == 0 { 0.5 } else { -0.5 })
            .collect();
        let rms = EnergyScorer::rms(&samples);
        assert!((rms - 0.5).abs() < 1e-5, "rms={rms}");
    }
}
