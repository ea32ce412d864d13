//! # parlance-core
//!
//! Reusable streaming speech-recognition engine.
//!
//! ## Architecture
//!
//! ```text
//! Transport payload → decode (f32/PCM16) → audio ring + chunk framing
//!                                               │
//!                                     VAD score per 512-sample frame
//!                                               │
//!                               IDLE ⇄ IN_SPEECH state machine
//!                                               │
//!                        utterance → Recognizer worker (own thread)
//!                                               │
//!                    mpsc::UnboundedSender<SessionEvent> → writer task
//! ```
//!
//! Ingestion is strictly non-blocking: recognition and capture I/O run on
//! dedicated workers, and every per-frame failure degrades instead of
//! ending the session.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod buffering;
pub mod error;
pub mod events;
pub mod inference;
pub mod session;
pub mod sink;
pub mod vad;

// Convenience re-exports for downstream crates
pub use audio::WIRE_SAMPLE_RATE;
pub use error::ParlanceError;
pub use events::{RecognitionPayload, SessionEvent, WireEvent};
pub use inference::{RecognitionBackend, Recognizer, StubBackend, Transcription};
pub use session::{SessionPipeline, SessionRegistry};
pub use sink::{AudioLogConfig, AudioSink, CaptureMetadata, SharedAudioLogConfig};
pub use vad::{EnergyScorer, SpeechScorer, VadConfig, VadConfigUpdate, VadEngine};
