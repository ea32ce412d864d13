//! Voice Activity Detection (VAD) abstraction.
//!
//! The `SpeechScorer` trait is the primary extensibility point: swap in
//! `EnergyScorer` (default), a neural scorer, or any future model without
//! touching the pipeline. `VadEngine` wraps whichever scorer is installed
//! and degrades scorer failures to silence so one bad frame can never
//! stall a live session.

pub mod config;
pub mod energy;

pub use config::{VadConfig, VadConfigUpdate};
pub use energy::EnergyScorer;

use tracing::warn;

use crate::buffering::chunk::AudioChunk;
use crate::error::Result;

/// Trait for all per-frame speech scorers.
///
/// Implementors may be stateful (smoothing windows, RNN hidden states, etc.).
pub trait SpeechScorer: Send + 'static {
    /// Return the probability in [0.0, 1.0] that `chunk` contains speech.
    ///
    /// The chunk always holds exactly the configured frame size at the
    /// wire sample rate; framing is the pipeline's responsibility.
    fn score(&mut self, chunk: &AudioChunk) -> Result<f32>;

    /// Reset any internal state (e.g. smoothing windows, hidden states).
    fn reset(&mut self);
}

/// Wrapper around the installed scorer with fail-to-silence semantics.
///
/// Scorer errors are logged and reported as probability 0.0 — a broken
/// scorer must degrade to "no speech", never block ingestion.
pub struct VadEngine {
    scorer: Box<dyn SpeechScorer>,
}

impl VadEngine {
    pub fn new(scorer: Box<dyn SpeechScorer>) -> Self {
        Self { scorer }
    }

    /// Score one frame; out-of-range outputs are clamped to [0, 1].
    pub fn score(&mut self, chunk: &AudioChunk) -> f32 {
        match self.scorer.score(chunk) {
            Ok(p) => p.clamp(0.0, 1.0),
            Err(e) => {
                warn!(error = %e, "VAD scoring failed; treating frame as silence");
                0.0
            }
        }
    }

    pub fn reset(&mut self) {
        self.scorer.reset();
    }
}
