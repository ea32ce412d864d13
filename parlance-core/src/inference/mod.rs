//! Recognition backend abstraction.
//!
//! The `RecognitionBackend` trait decouples the pipeline from any specific
//! engine (stub echo, whisper bindings, a remote service, ...). Backends
//! run on dedicated worker threads owned by [`Recognizer`]; the ingest
//! task never waits on one.
//!
//! `&mut self` on `recognize` intentionally expresses that decoders are
//! stateful — beam search caches, KV caches, etc. Each worker thread owns
//! its backend exclusively, so no further synchronisation is needed.

pub mod stub;
pub mod worker;

pub use stub::StubBackend;
pub use worker::{RecognitionJob, Recognizer};

use crate::buffering::chunk::AudioChunk;
use crate::error::Result;

/// Contract for speech recognition backends.
pub trait RecognitionBackend: Send + 'static {
    /// One-time warm-up: load weights, pre-allocate caches, run a dummy
    /// inference. Called once before the worker starts draining jobs.
    ///
    /// # Errors
    /// Returns an error if model files are missing or corrupt.
    fn warm_up(&mut self) -> Result<()>;

    /// Transcribe one utterance of mono f32 audio.
    ///
    /// # Parameters
    /// - `audio`: the extracted utterance at the wire sample rate.
    /// - `language`: ISO-639-1 hint, or `None` for auto-detection.
    /// - `prompt`: optional decoding context supplied by the client.
    fn recognize(
        &mut self,
        audio: &AudioChunk,
        language: Option<&str>,
        prompt: Option<&str>,
    ) -> Result<Transcription>;
}

/// Output of one recognition pass.
#[derive(Debug, Clone)]
pub struct Transcription {
    /// Recognised text.
    pub text: String,
    /// Language the backend detected or was pinned to.
    pub language: Option<String>,
    /// Backend confidence in [0.0, 1.0], if available.
    pub confidence: Option<f32>,
}
