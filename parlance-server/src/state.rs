//! Shared application state, injected into every handler via axum's
//! `State` extractor.

use std::sync::Arc;
use std::time::Duration;

use parlance_core::{AudioSink, Recognizer, SessionRegistry, SpeechScorer};

use crate::settings::{AudioLogConfigStore, VadConfigStore};

/// Builds a fresh scorer for each accepted session (scorers are stateful).
pub type ScorerFactory = Arc<dyn Fn() -> Box<dyn SpeechScorer> + Send + Sync>;

/// Shared server state — cheap to clone, handed to every request.
#[derive(Clone)]
pub struct AppState {
    /// Live-session map; the admin surface reads its size.
    pub registry: Arc<SessionRegistry>,
    /// Recognition worker pool handle.
    pub recognizer: Recognizer,
    /// Per-session VAD scorer factory.
    pub scorer_factory: ScorerFactory,
    /// Persisted VAD tuning; sessions snapshot it at accept.
    pub vad_store: Arc<VadConfigStore>,
    /// Persisted capture settings, shared with the sink worker.
    pub audio_log_store: Arc<AudioLogConfigStore>,
    /// Utterance capture writer.
    pub sink: AudioSink,
    /// Whether the VAD scorer initialised successfully.
    pub vad_model_loaded: bool,
    /// Whether the recognition backend warmed up successfully.
    pub recognition_model_loaded: bool,
    /// `false` closes each session after its first recognition result.
    pub continuous_recognition: bool,
    /// Handshake + inter-frame receive timeout; `None` waits forever.
    pub receive_timeout: Option<Duration>,
}
