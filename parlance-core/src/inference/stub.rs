//! `StubBackend` — placeholder backend that echoes metadata without real
//! inference. Lets the full transport/pipeline/event path be exercised
//! end-to-end before a real model backend is wired in.

use tracing::debug;

use crate::buffering::chunk::AudioChunk;
use crate::error::Result;
use crate::inference::{RecognitionBackend, Transcription};

/// Echo-style stub backend.
///
/// For every utterance it returns
/// `"[stub: <N> samples, <D>s]"` with full confidence.
pub struct StubBackend {
    utterance_count: u32,
}

impl StubBackend {
    pub fn new() -> Self {
        Self { utterance_count: 0 }
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RecognitionBackend for StubBackend {
    fn warm_up(&mut self) -> Result<()> {
        debug!("StubBackend::warm_up — no-op");
        Ok(())
    }

    fn recognize(
        &mut self,
        audio: &AudioChunk,
        language: Option<&str>,
        _prompt: Option<&str>,
    ) -> Result<Transcription> {
        self.utterance_count += 1;

        Ok(Transcription {
            text: format!(
                "[stub: {} samples, {:.2}s]",
                audio.samples.len(),
                audio.duration_secs()
            ),
            language: language.map(ToOwned::to_owned),
            confidence: Some(1.0),
        })
    }
}
