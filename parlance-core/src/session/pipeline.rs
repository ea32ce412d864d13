//! Per-session streaming pipeline: decoding, chunk framing, the VAD state
//! machine, utterance assembly and event dispatch.
//!
//! ## Pipeline stages (per transport payload)
//!
//! ```text
//! 1. Decode payload bytes → Vec<f32>  (float32/PCM16 auto-detect)
//! 2. Append to audio_ring (rolling utterance window)
//! 3. Prepend chunk_ring residual, slice into chunk_size frames
//! 4. Score each frame → drive the IDLE / IN_SPEECH state machine
//! 5. On utterance end: extract samples, hand to sink + recognizer,
//!    emit SpeechEnd
//! ```
//!
//! Everything here runs on the session's ingestion task. VAD scoring and
//! ring operations are pure CPU work; recognition and capture I/O happen
//! on their own workers, so `ingest` never blocks on them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::audio::{decode_payload, WIRE_SAMPLE_RATE};
use crate::buffering::{chunk::AudioChunk, ring::SampleRing};
use crate::events::SessionEvent;
use crate::inference::{RecognitionJob, Recognizer};
use crate::sink::AudioSink;
use crate::vad::{VadConfig, VadEngine};

/// Where the session currently is in the utterance lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SpeechState {
    Idle,
    InSpeech {
        speech_id: Uuid,
        /// Offset into the audio ring where the utterance (including its
        /// prefix pad) begins.
        start_index: usize,
    },
}

/// The per-session streaming pipeline. Exclusively owned by one
/// ingestion task; no internal locking.
pub struct SessionPipeline {
    session_id: u64,
    cfg: VadConfig,
    vad: VadEngine,
    recognizer: Recognizer,
    sink: Option<AudioSink>,
    events: mpsc::UnboundedSender<SessionEvent>,

    /// Rolling utterance window (pad + speech + trailing silence).
    audio_ring: SampleRing,
    /// Sub-frame remainder carried between payloads.
    chunk_ring: SampleRing,

    state: SpeechState,
    silence_counter: u32,

    // Derived from `cfg` once at construction.
    silence_frames_limit: u32,
    prefix_pad_samples: usize,
    min_speech_samples: usize,
    max_speech_samples: usize,

    language: Option<String>,
    prompt: Option<String>,

    /// Shared with queued recognition jobs; set on close so late
    /// completions are suppressed.
    cancelled: Arc<AtomicBool>,
}

impl SessionPipeline {
    pub fn new(
        session_id: u64,
        mut cfg: VadConfig,
        vad: VadEngine,
        recognizer: Recognizer,
        sink: Option<AudioSink>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        cfg.sanitize();
        let sample_rate = WIRE_SAMPLE_RATE;

        let audio_ring = SampleRing::new(cfg.audio_ring_capacity(sample_rate));
        let chunk_ring = SampleRing::new(cfg.chunk_size);
        let silence_frames_limit = cfg.silence_frames_limit(sample_rate);
        let prefix_pad_samples = cfg.prefix_pad_samples(sample_rate);
        let min_speech_samples = cfg.min_speech_samples(sample_rate);
        let max_speech_samples = cfg.max_speech_samples(sample_rate);

        info!(
            session_id,
            audio_ring_capacity = audio_ring.capacity(),
            chunk_size = cfg.chunk_size,
            silence_frames_limit,
            "session pipeline created"
        );

        Self {
            session_id,
            cfg,
            vad,
            recognizer,
            sink,
            events,
            audio_ring,
            chunk_ring,
            state: SpeechState::Idle,
            silence_counter: 0,
            silence_frames_limit,
            prefix_pad_samples,
            min_speech_samples,
            max_speech_samples,
            language: None,
            prompt: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set the language hint. An empty string means auto-detect.
    pub fn set_language(&mut self, code: &str) {
        self.language = if code.is_empty() {
            None
        } else {
            Some(code.to_string())
        };
    }

    /// Set the decoding prompt. An empty string means no prompt.
    pub fn set_prompt(&mut self, text: &str) {
        self.prompt = if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        };
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn is_in_speech(&self) -> bool {
        matches!(self.state, SpeechState::InSpeech { .. })
    }

    /// Samples currently staged in the rolling utterance window.
    pub fn buffered_samples(&self) -> usize {
        self.audio_ring.len()
    }

    /// Sub-frame samples waiting for the next payload.
    pub fn pending_chunk_samples(&self) -> usize {
        self.chunk_ring.len()
    }

    /// Push one transport payload through the pipeline.
    ///
    /// Undecodable payloads are logged and dropped; every other per-frame
    /// failure degrades without ending the session.
    pub fn ingest(&mut self, payload: &[u8]) {
        let samples = match decode_payload(payload) {
            Ok(s) => s,
            Err(e) => {
                warn!(
                    session_id = self.session_id,
                    error = %e,
                    "dropping undecodable audio payload"
                );
                return;
            }
        };
        if samples.is_empty() {
            return;
        }

        self.audio_ring.put_bulk(&samples);
        self.process_samples(&samples);
    }

    /// Release resources and mark in-flight recognition as abandoned.
    pub fn close(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        self.audio_ring.clear();
        self.chunk_ring.clear();
        self.state = SpeechState::Idle;
        self.silence_counter = 0;
        self.vad.reset();
        debug!(session_id = self.session_id, "session pipeline closed");
    }

    /// Frame the new samples (with any residual from the previous call)
    /// and run the state machine over each full frame.
    fn process_samples(&mut self, samples: &[f32]) {
        let chunk_size = self.cfg.chunk_size;

        let pending = self.chunk_ring.len();
        let owned;
        let data: &[f32] = if pending > 0 {
            let mut joined = self.chunk_ring.get_bulk(pending);
            joined.extend_from_slice(samples);
            owned = joined;
            &owned
        } else {
            samples
        };

        let full_frames = data.len() / chunk_size;
        for i in 0..full_frames {
            let frame = &data[i * chunk_size..(i + 1) * chunk_size];
            // Samples of this payload that later frames will still score;
            // the idle trim must not drop them.
            let unscored_tail = data.len() - (i + 1) * chunk_size;
            self.process_frame(frame, unscored_tail);
        }

        let rest = &data[full_frames * chunk_size..];
        if !rest.is_empty() {
            self.chunk_ring.put_bulk(rest);
        }
    }

    fn process_frame(&mut self, frame: &[f32], unscored_tail: usize) {
        // Max-duration cut first: a speaker who never pauses must not grow
        // the staging window past the configured ceiling.
        if let SpeechState::InSpeech { speech_id, start_index } = self.state.clone() {
            if self.audio_ring.len() >= self.max_speech_samples {
                warn!(
                    session_id = self.session_id,
                    speech_id = %speech_id,
                    buffered = self.audio_ring.len(),
                    "max speech duration reached; forcing utterance end"
                );
                self.finish_utterance(speech_id, start_index);
            }
        }

        let chunk = AudioChunk::wire(frame.to_vec());
        let prob = self.vad.score(&chunk);
        let is_speech = prob > self.cfg.threshold;

        match (self.state.clone(), is_speech) {
            // Transition: silence → speech
            (SpeechState::Idle, true) => {
                let speech_id = Uuid::new_v4();
                let start_index = self.audio_ring.len().saturating_sub(self.prefix_pad_samples);
                self.silence_counter = 0;
                self.state = SpeechState::InSpeech {
                    speech_id,
                    start_index,
                };

                info!(
                    session_id = self.session_id,
                    speech_id = %speech_id,
                    probability = prob,
                    "speech started"
                );
                self.emit(SessionEvent::SpeechStart {
                    session_id: self.session_id,
                    speech_id: speech_id.to_string(),
                    buffer_size: self.audio_ring.len(),
                });
            }

            // Continuing silence: keep only the prefix pad (plus whatever
            // of this payload is still unscored) staged.
            (SpeechState::Idle, false) => {
                let keep = self.prefix_pad_samples + unscored_tail;
                let excess = self.audio_ring.len().saturating_sub(keep);
                if excess > 0 {
                    self.audio_ring.discard(excess);
                }
            }

            // Continuing speech
            (SpeechState::InSpeech { .. }, true) => {
                self.silence_counter = 0;
            }

            // Silence inside an utterance
            (
                SpeechState::InSpeech {
                    speech_id,
                    start_index,
                },
                false,
            ) => {
                self.silence_counter += 1;
                if self.silence_counter >= self.silence_frames_limit {
                    info!(
                        session_id = self.session_id,
                        speech_id = %speech_id,
                        silence_frames = self.silence_counter,
                        "speech ended"
                    );
                    self.finish_utterance(speech_id, start_index);
                }
            }
        }
    }

    /// Close out the current utterance: extract its samples, emit
    /// SpeechEnd, dispatch recognition and reset to IDLE.
    fn finish_utterance(&mut self, speech_id: Uuid, start_index: usize) {
        self.audio_ring.discard(start_index);
        let utterance = self.audio_ring.get_bulk(self.audio_ring.len());

        // SpeechEnd must be queued before the job is handed to the worker,
        // or a fast backend could deliver the result ahead of it.
        self.emit(SessionEvent::SpeechEnd {
            session_id: self.session_id,
            speech_id: speech_id.to_string(),
            buffer_size: self.audio_ring.len(),
        });

        self.dispatch_utterance(speech_id, utterance);

        // The id must stay set until SpeechEnd is on the wire queue.
        self.state = SpeechState::Idle;
        self.silence_counter = 0;
        self.audio_ring.clear();
        self.chunk_ring.clear();
    }

    fn dispatch_utterance(&mut self, speech_id: Uuid, mut samples: Vec<f32>) {
        if samples.len() < self.min_speech_samples {
            info!(
                session_id = self.session_id,
                speech_id = %speech_id,
                samples = samples.len(),
                min = self.min_speech_samples,
                "utterance too short; skipping recognition"
            );
            return;
        }

        if samples.len() > self.max_speech_samples {
            info!(
                session_id = self.session_id,
                speech_id = %speech_id,
                samples = samples.len(),
                max = self.max_speech_samples,
                "utterance too long; truncating"
            );
            samples.truncate(self.max_speech_samples);
        }

        if let Some(sink) = &self.sink {
            sink.save(&samples, self.session_id);
        }

        debug!(
            session_id = self.session_id,
            speech_id = %speech_id,
            samples = samples.len(),
            "dispatching utterance to recognizer"
        );
        self.recognizer.submit(RecognitionJob {
            session_id: self.session_id,
            speech_id: speech_id.to_string(),
            audio: AudioChunk::wire(samples),
            language: self.language.clone(),
            prompt: self.prompt.clone(),
            events: self.events.clone(),
            cancelled: Arc::clone(&self.cancelled),
        });
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            warn!(
                session_id = self.session_id,
                "event channel closed; dropping event"
            );
        }
    }
}
