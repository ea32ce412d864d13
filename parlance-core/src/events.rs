//! Events emitted back to the client over the session transport.
//!
//! `SessionEvent` is the in-process form produced by the pipeline and the
//! recognition worker; the per-connection writer stamps it with a
//! monotonic timestamp and serialises the resulting `WireEvent` as one
//! JSON text frame. Events travel over a single channel per session, so
//! the wire order always matches the order of the triggering transitions.

use serde::{Deserialize, Serialize};

/// In-process event, produced on the ingest task or a recognition worker.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A speech onset was detected; `buffer_size` is the staged sample
    /// count at detection time.
    SpeechStart {
        session_id: u64,
        speech_id: String,
        buffer_size: usize,
    },
    /// The utterance closed after the trailing-silence window (or the
    /// max-duration cut). The staging buffer has been drained.
    SpeechEnd {
        session_id: u64,
        speech_id: String,
        buffer_size: usize,
    },
    /// The recognition backend finished (or failed) for one utterance.
    RecognitionResult {
        session_id: u64,
        speech_id: String,
        result: RecognitionPayload,
    },
}

impl SessionEvent {
    pub fn session_id(&self) -> u64 {
        match self {
            Self::SpeechStart { session_id, .. }
            | Self::SpeechEnd { session_id, .. }
            | Self::RecognitionResult { session_id, .. } => *session_id,
        }
    }

    pub fn is_recognition_result(&self) -> bool {
        matches!(self, Self::RecognitionResult { .. })
    }

    /// Convert into the client-facing JSON shape, stamping `timestamp`
    /// (seconds since the session's scheduling reference).
    pub fn into_wire(self, timestamp: f64) -> WireEvent {
        match self {
            Self::SpeechStart {
                session_id,
                speech_id,
                buffer_size,
            } => WireEvent::VadResult {
                session_id,
                speech_id: Some(speech_id),
                speech_detected: true,
                speech_ended: false,
                buffer_size,
                timestamp,
            },
            Self::SpeechEnd {
                session_id,
                speech_id,
                buffer_size,
            } => WireEvent::VadResult {
                session_id,
                speech_id: Some(speech_id),
                speech_detected: false,
                speech_ended: true,
                buffer_size,
                timestamp,
            },
            Self::RecognitionResult {
                session_id,
                speech_id,
                result,
            } => WireEvent::RecognitionResult {
                session_id,
                speech_id: Some(speech_id),
                result,
                timestamp,
            },
        }
    }
}

/// Result payload carried by a `recognition_result` event.
///
/// Backend failures still produce a payload — with empty text and the
/// `error` marker set — so the client always hears back once per
/// dispatched utterance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionPayload {
    /// Recognised text (empty on failure).
    pub text: String,
    /// Language the backend detected or was pinned to, or null.
    pub language: Option<String>,
    /// Backend confidence in [0.0, 1.0], or null.
    pub confidence: Option<f32>,
    /// Set when the backend failed; the session continues regardless.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Client-facing JSON event.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireEvent {
    VadResult {
        session_id: u64,
        speech_id: Option<String>,
        speech_detected: bool,
        speech_ended: bool,
        buffer_size: usize,
        timestamp: f64,
    },
    RecognitionResult {
        session_id: u64,
        speech_id: Option<String>,
        result: RecognitionPayload,
        timestamp: f64,
    },
}
