//! Asynchronous recognition worker pool.
//!
//! Transcription is CPU/GPU-heavy and must never stall ingestion, so jobs
//! are handed to dedicated OS threads over unbounded channels and results
//! come back as `RecognitionResult` events on the session's event channel.
//!
//! ## Ordering
//!
//! Jobs are routed to a worker by `session_id % pool_size`. Each worker
//! drains its queue strictly in order, so completions for one session are
//! always delivered in submission order, whatever the pool size.
//!
//! ## Cancellation
//!
//! Every job carries the session's cancellation flag. Workers re-check it
//! after inference so results for a closed session are dropped instead of
//! being written to a dead transport.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{unbounded, Sender};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::buffering::chunk::AudioChunk;
use crate::error::Result;
use crate::events::{RecognitionPayload, SessionEvent};
use crate::inference::RecognitionBackend;

/// One queued transcription request.
pub struct RecognitionJob {
    pub session_id: u64,
    pub speech_id: String,
    pub audio: AudioChunk,
    pub language: Option<String>,
    pub prompt: Option<String>,
    /// The session's event channel; the completion is enqueued here.
    pub events: mpsc::UnboundedSender<SessionEvent>,
    /// Set by `SessionPipeline::close`; suppresses late completions.
    pub cancelled: Arc<AtomicBool>,
}

/// Cloneable handle to the recognition worker pool.
#[derive(Clone)]
pub struct Recognizer {
    queues: Arc<Vec<Sender<RecognitionJob>>>,
}

impl Recognizer {
    /// Warm up each backend and spawn one worker thread per backend.
    ///
    /// # Errors
    /// Fails if any backend's `warm_up` fails; no threads are left running
    /// in that case beyond those whose queues are immediately dropped.
    pub fn spawn(backends: Vec<Box<dyn RecognitionBackend>>) -> Result<Self> {
        assert!(!backends.is_empty(), "recognizer pool needs at least one backend");

        let mut queues = Vec::with_capacity(backends.len());
        for (worker_idx, mut backend) in backends.into_iter().enumerate() {
            backend.warm_up()?;

            let (tx, rx) = unbounded::<RecognitionJob>();
            queues.push(tx);

            thread::Builder::new()
                .name(format!("recognizer-{worker_idx}"))
                .spawn(move || {
                    info!(worker = worker_idx, "recognition worker started");
                    while let Ok(job) = rx.recv() {
                        run_job(backend.as_mut(), job);
                    }
                    info!(worker = worker_idx, "recognition worker stopped");
                })
                .map_err(|e| crate::error::ParlanceError::Recognition(e.to_string()))?;
        }

        Ok(Self {
            queues: Arc::new(queues),
        })
    }

    /// Convenience constructor for a single-backend pool.
    pub fn spawn_single(backend: Box<dyn RecognitionBackend>) -> Result<Self> {
        Self::spawn(vec![backend])
    }

    /// Enqueue a job. Never blocks; per-session FIFO is preserved by
    /// session-affine routing.
    pub fn submit(&self, job: RecognitionJob) {
        let idx = (job.session_id % self.queues.len() as u64) as usize;
        if self.queues[idx].send(job).is_err() {
            error!(worker = idx, "recognition worker is gone; dropping job");
        }
    }

    pub fn pool_size(&self) -> usize {
        self.queues.len()
    }
}

fn run_job(backend: &mut dyn RecognitionBackend, job: RecognitionJob) {
    if job.cancelled.load(Ordering::Acquire) {
        debug!(
            session_id = job.session_id,
            speech_id = %job.speech_id,
            "session closed before inference; dropping job"
        );
        return;
    }

    let samples = job.audio.samples.len();
    let result = backend.recognize(&job.audio, job.language.as_deref(), job.prompt.as_deref());

    let payload = match result {
        Ok(t) => {
            info!(
                session_id = job.session_id,
                speech_id = %job.speech_id,
                samples,
                text_len = t.text.len(),
                "recognition complete"
            );
            RecognitionPayload {
                text: t.text,
                language: t.language,
                confidence: t.confidence,
                error: None,
            }
        }
        Err(e) => {
            error!(
                session_id = job.session_id,
                speech_id = %job.speech_id,
                error = %e,
                "recognition failed"
            );
            RecognitionPayload {
                text: String::new(),
                language: None,
                confidence: None,
                error: Some(e.to_string()),
            }
        }
    };

    // Re-check after the (slow) inference: the session may have closed.
    if job.cancelled.load(Ordering::Acquire) {
        debug!(
            session_id = job.session_id,
            speech_id = %job.speech_id,
            "session closed during inference; suppressing completion"
        );
        return;
    }

    if job
        .events
        .send(SessionEvent::RecognitionResult {
            session_id: job.session_id,
            speech_id: job.speech_id,
            result: payload,
        })
        .is_err()
    {
        warn!(session_id = job.session_id, "event channel closed; completion dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParlanceError;
    use crate::inference::Transcription;
    use std::time::{Duration, Instant};

    struct DelayBackend {
        delay: Duration,
    }

    impl RecognitionBackend for DelayBackend {
        fn warm_up(&mut self) -> Result<()> {
            Ok(())
        }

        fn recognize(
            &mut self,
            audio: &AudioChunk,
            _language: Option<&str>,
            _prompt: Option<&str>,
        ) -> Result<Transcription> {
            thread::sleep(self.delay);
            Ok(Transcription {
                text: format!("len={}", audio.samples.len()),
                language: None,
                confidence: None,
            })
        }
    }

    struct FailingBackend;

    impl RecognitionBackend for FailingBackend {
        fn warm_up(&mut self) -> Result<()> {
            Ok(())
        }

        fn recognize(
            &mut self,
            _audio: &AudioChunk,
            _language: Option<&str>,
            _prompt: Option<&str>,
        ) -> Result<Transcription> {
            Err(ParlanceError::Recognition("intentional test failure".into()))
        }
    }

    fn job(
        session_id: u64,
        speech_id: &str,
        samples: usize,
        events: &mpsc::UnboundedSender<SessionEvent>,
        cancelled: &Arc<AtomicBool>,
    ) -> RecognitionJob {
        RecognitionJob {
            session_id,
            speech_id: speech_id.into(),
            audio: AudioChunk::wire(vec![0.1; samples]),
            language: None,
            prompt: None,
            events: events.clone(),
            cancelled: Arc::clone(cancelled),
        }
    }

    fn recv_event(
        rx: &mut mpsc::UnboundedReceiver<SessionEvent>,
        timeout: Duration,
    ) -> SessionEvent {
        let start = Instant::now();
        loop {
            match rx.try_recv() {
                Ok(ev) => return ev,
                Err(_) => {
                    if start.elapsed() >= timeout {
                        panic!("timed out waiting for recognition event");
                    }
                    thread::sleep(Duration::from_millis(5));
                }
            }
        }
    }

    #[test]
    fn completions_for_one_session_arrive_in_submission_order() {
        let recognizer = Recognizer::spawn_single(Box::new(DelayBackend {
            delay: Duration::from_millis(20),
        }))
        .unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancelled = Arc::new(AtomicBool::new(false));

        recognizer.submit(job(1, "first", 100, &tx, &cancelled));
        recognizer.submit(job(1, "second", 200, &tx, &cancelled));

        let first = recv_event(&mut rx, Duration::from_secs(2));
        let second = recv_event(&mut rx, Duration::from_secs(2));

        match (first, second) {
            (
                SessionEvent::RecognitionResult {
                    speech_id: id_a,
                    result: res_a,
                    ..
                },
                SessionEvent::RecognitionResult {
                    speech_id: id_b, ..
                },
            ) => {
                assert_eq!(id_a, "first");
                assert_eq!(id_b, "second");
                assert_eq!(res_a.text, "len=100");
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[test]
    fn backend_failure_becomes_an_error_marked_result() {
        let recognizer = Recognizer::spawn_single(Box::new(FailingBackend)).unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancelled = Arc::new(AtomicBool::new(false));
        recognizer.submit(job(4, "boom", 100, &tx, &cancelled));

        match recv_event(&mut rx, Duration::from_secs(2)) {
            SessionEvent::RecognitionResult { result, .. } => {
                assert!(result.text.is_empty());
                assert!(result.error.as_deref().unwrap_or("").contains("intentional"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn cancelled_jobs_are_suppressed() {
        let recognizer = Recognizer::spawn_single(Box::new(DelayBackend {
            delay: Duration::from_millis(5),
        }))
        .unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancelled = Arc::new(AtomicBool::new(true));
        recognizer.submit(job(2, "late", 100, &tx, &cancelled));

        thread::sleep(Duration::from_millis(100));
        assert!(rx.try_recv().is_err(), "cancelled completion must not be delivered");
    }
}
