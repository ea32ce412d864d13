//! Validated VAD tuning parameters.
//!
//! One canonical key set is used for the config file, the admin API and
//! every in-process consumer; renaming a field here renames it everywhere.
//! Sessions snapshot the config at creation — later updates only affect
//! sessions accepted afterwards.

use serde::{Deserialize, Serialize};

/// Tuning parameters for the per-session VAD state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VadConfig {
    /// Speech probability threshold in [0.0, 1.0].
    pub threshold: f32,
    /// Utterances shorter than this skip recognition (ms).
    pub min_speech_duration_ms: u32,
    /// Utterances longer than this are truncated (seconds).
    pub max_speech_duration_s: f32,
    /// Audio retained before the detected speech start (ms).
    pub prefix_speech_pad_ms: u32,
    /// Trailing silence that closes an utterance (ms).
    pub silence_duration_ms: u32,
    /// Samples per VAD frame (512 at 16 kHz ≈ 32 ms).
    pub chunk_size: usize,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            min_speech_duration_ms: 250,
            max_speech_duration_s: 30.0,
            prefix_speech_pad_ms: 300,
            silence_duration_ms: 500,
            chunk_size: 512,
        }
    }
}

impl VadConfig {
    /// Clamp every field into its valid range.
    pub fn sanitize(&mut self) {
        self.threshold = if self.threshold.is_finite() {
            self.threshold.clamp(0.0, 1.0)
        } else {
            Self::default().threshold
        };
        self.max_speech_duration_s = if self.max_speech_duration_s.is_finite() {
            self.max_speech_duration_s.max(0.1)
        } else {
            Self::default().max_speech_duration_s
        };
        self.chunk_size = self.chunk_size.max(1);
    }

    pub fn min_speech_duration_s(&self) -> f32 {
        self.min_speech_duration_ms as f32 / 1000.0
    }

    pub fn prefix_speech_pad_s(&self) -> f32 {
        self.prefix_speech_pad_ms as f32 / 1000.0
    }

    pub fn silence_duration_s(&self) -> f32 {
        self.silence_duration_ms as f32 / 1000.0
    }

    pub fn min_speech_samples(&self, sample_rate: u32) -> usize {
        (sample_rate as f32 * self.min_speech_duration_s()) as usize
    }

    pub fn max_speech_samples(&self, sample_rate: u32) -> usize {
        (sample_rate as f32 * self.max_speech_duration_s) as usize
    }

    pub fn prefix_pad_samples(&self, sample_rate: u32) -> usize {
        (sample_rate as f32 * self.prefix_speech_pad_s()) as usize
    }

    /// Consecutive non-speech frames required to close an utterance.
    pub fn silence_frames_limit(&self, sample_rate: u32) -> u32 {
        (sample_rate as u64 * self.silence_duration_ms as u64 / (self.chunk_size as u64 * 1000))
            as u32
    }

    /// Audio staging capacity: the longest utterance plus its prefix pad
    /// and the trailing silence window.
    pub fn audio_ring_capacity(&self, sample_rate: u32) -> usize {
        let seconds =
            self.max_speech_duration_s + self.prefix_speech_pad_s() + self.silence_duration_s();
        ((sample_rate as f32 * seconds) as usize).max(self.chunk_size)
    }

    /// Apply a partial update, clamping each supplied value.
    pub fn apply_update(&mut self, update: &VadConfigUpdate) {
        if let Some(v) = update.threshold {
            self.threshold = v;
        }
        if let Some(v) = update.min_speech_duration_ms {
            self.min_speech_duration_ms = v.max(0) as u32;
        }
        if let Some(v) = update.max_speech_duration_s {
            self.max_speech_duration_s = v;
        }
        if let Some(v) = update.prefix_speech_pad_ms {
            self.prefix_speech_pad_ms = v.max(0) as u32;
        }
        if let Some(v) = update.silence_duration_ms {
            self.silence_duration_ms = v.max(0) as u32;
        }
        if let Some(v) = update.chunk_size {
            self.chunk_size = v.max(1) as usize;
        }
        self.sanitize();
    }
}

/// Partial update as accepted by the admin surface. Fields left out keep
/// their current value; supplied values are clamped, never rejected.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VadConfigUpdate {
    pub threshold: Option<f32>,
    pub min_speech_duration_ms: Option<i64>,
    pub max_speech_duration_s: Option<f32>,
    pub prefix_speech_pad_ms: Option<i64>,
    pub silence_duration_ms: Option<i64>,
    pub chunk_size: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn defaults_match_the_documented_tuning() {
        let cfg = VadConfig::default();
        assert_relative_eq!(cfg.threshold, 0.5);
        assert_eq!(cfg.min_speech_duration_ms, 250);
        assert_relative_eq!(cfg.max_speech_duration_s, 30.0);
        assert_eq!(cfg.prefix_speech_pad_ms, 300);
        assert_eq!(cfg.silence_duration_ms, 500);
        assert_eq!(cfg.chunk_size, 512);
    }

    #[test]
    fn sanitize_clamps_every_field() {
        let mut cfg = VadConfig {
            threshold: 3.2,
            min_speech_duration_ms: 0,
            max_speech_duration_s: 0.0,
            prefix_speech_pad_ms: 0,
            silence_duration_ms: 0,
            chunk_size: 0,
        };
        cfg.sanitize();
        assert_relative_eq!(cfg.threshold, 1.0);
        assert_relative_eq!(cfg.max_speech_duration_s, 0.1);
        assert_eq!(cfg.chunk_size, 1);
    }

    #[test]
    fn derived_accessors_convert_to_seconds_and_samples() {
        let cfg = VadConfig::default();
        assert_relative_eq!(cfg.min_speech_duration_s(), 0.25);
        assert_relative_eq!(cfg.prefix_speech_pad_s(), 0.3);
        assert_relative_eq!(cfg.silence_duration_s(), 0.5);
        assert_eq!(cfg.min_speech_samples(16_000), 4_000);
        assert_eq!(cfg.max_speech_samples(16_000), 480_000);
        assert_eq!(cfg.prefix_pad_samples(16_000), 4_800);
        // floor(16000 * 500 / (512 * 1000)) = 15
        assert_eq!(cfg.silence_frames_limit(16_000), 15);
    }

    #[test]
    fn audio_ring_capacity_covers_utterance_pad_and_silence() {
        let cfg = VadConfig::default();
        // 30.0 + 0.3 + 0.5 seconds at 16 kHz
        assert_eq!(cfg.audio_ring_capacity(16_000), 492_800);
    }

    #[test]
    fn partial_update_clamps_negative_and_out_of_range_values() {
        let mut cfg = VadConfig::default();
        cfg.apply_update(&VadConfigUpdate {
            threshold: Some(-0.4),
            min_speech_duration_ms: Some(-100),
            max_speech_duration_s: Some(0.01),
            chunk_size: Some(-5),
            ..Default::default()
        });
        assert_relative_eq!(cfg.threshold, 0.0);
        assert_eq!(cfg.min_speech_duration_ms, 0);
        assert_relative_eq!(cfg.max_speech_duration_s, 0.1);
        assert_eq!(cfg.chunk_size, 1);
        // Untouched fields keep their values.
        assert_eq!(cfg.silence_duration_ms, 500);
    }

    #[test]
    fn unknown_and_missing_keys_are_tolerated_on_load() {
        let cfg: VadConfig = serde_json::from_str(
            r#"{"threshold": 0.7, "last_updated": "2026-01-01T00:00:00", "bogus": 1}"#,
        )
        .expect("partial document should deserialize");
        assert_relative_eq!(cfg.threshold, 0.7);
        assert_eq!(cfg.chunk_size, 512);
    }
}
