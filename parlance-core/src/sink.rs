//! Best-effort capture of dispatched utterances to disk.
//!
//! The ingest task only clones the samples and enqueues them; a dedicated
//! writer thread does all filesystem work. Each capture produces a raw
//! float32-LE file plus a JSON sidecar, and occasionally triggers a
//! retention sweep that deletes the oldest captures beyond `max_files`.
//! Nothing here can fail a session: every error is logged and swallowed.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::SystemTime;

use chrono::Local;
use crossbeam_channel::{unbounded, Sender};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::audio::WIRE_SAMPLE_RATE;
use crate::error::{ParlanceError, Result};

/// Probability of running the retention sweep after a capture.
const CLEANUP_PROBABILITY: f64 = 0.1;

/// Capture settings, shared read-mostly with the admin surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioLogConfig {
    /// Master switch for utterance capture.
    pub enabled: bool,
    /// Directory receiving `.raw` + `.meta` pairs.
    pub output_dir: String,
    /// Oldest captures beyond this count are deleted by the sweep.
    pub max_files: usize,
}

impl Default for AudioLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            output_dir: "audio_logs".into(),
            max_files: 1000,
        }
    }
}

impl AudioLogConfig {
    pub fn ensure_output_dir(&self) -> Result<()> {
        if self.enabled {
            fs::create_dir_all(&self.output_dir)?;
        }
        Ok(())
    }
}

/// Shared handle to the live capture settings.
pub type SharedAudioLogConfig = Arc<RwLock<AudioLogConfig>>;

/// Sidecar metadata written next to every capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureMetadata {
    pub filename: String,
    pub session_id: u64,
    pub timestamp: String,
    pub sample_rate: u32,
    pub channels: u32,
    pub data_type: String,
    pub duration_seconds: f64,
    pub samples: usize,
}

struct SaveJob {
    samples: Vec<f32>,
    session_id: u64,
}

/// Cloneable handle to the capture writer thread.
#[derive(Clone)]
pub struct AudioSink {
    tx: Sender<SaveJob>,
    cfg: SharedAudioLogConfig,
}

impl AudioSink {
    /// Spawn the writer thread. The sink stays usable for the process
    /// lifetime; dropping every handle stops the thread.
    ///
    /// # Errors
    /// Fails if the OS refuses to create the writer thread.
    pub fn spawn(cfg: SharedAudioLogConfig) -> Result<Self> {
        let (tx, rx) = unbounded::<SaveJob>();
        let worker_cfg = Arc::clone(&cfg);

        thread::Builder::new()
            .name("audio-sink".into())
            .spawn(move || {
                while let Ok(job) = rx.recv() {
                    let snapshot = worker_cfg.read().clone();
                    if !snapshot.enabled {
                        continue;
                    }
                    match write_capture(&snapshot, &job) {
                        Ok(path) => debug!(
                            session_id = job.session_id,
                            path = %path.display(),
                            samples = job.samples.len(),
                            "utterance captured"
                        ),
                        Err(e) => error!(
                            session_id = job.session_id,
                            error = %e,
                            "failed to capture utterance"
                        ),
                    }
                }
            })
            .map_err(|e| ParlanceError::Sink(e.to_string()))?;

        Ok(Self { tx, cfg })
    }

    /// Queue an utterance for capture. Non-blocking; a disabled config or
    /// a dead writer drops the job silently.
    pub fn save(&self, samples: &[f32], session_id: u64) {
        if !self.cfg.read().enabled {
            return;
        }
        let job = SaveJob {
            samples: samples.to_vec(),
            session_id,
        };
        if self.tx.send(job).is_err() {
            warn!(session_id, "audio sink thread is gone; capture dropped");
        }
    }

    pub fn config(&self) -> SharedAudioLogConfig {
        Arc::clone(&self.cfg)
    }
}

fn write_capture(cfg: &AudioLogConfig, job: &SaveJob) -> Result<PathBuf> {
    fs::create_dir_all(&cfg.output_dir)?;

    let timestamp = Local::now().format("%Y%m%d_%H%M%S_%3f").to_string();
    let filename = format!("audio_{timestamp}_session_{}.raw", job.session_id);
    let path = Path::new(&cfg.output_dir).join(&filename);

    let mut bytes = Vec::with_capacity(job.samples.len() * 4);
    for sample in &job.samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    fs::write(&path, bytes)?;

    let metadata = CaptureMetadata {
        filename,
        session_id: job.session_id,
        timestamp,
        sample_rate: WIRE_SAMPLE_RATE,
        channels: 1,
        data_type: "float32".into(),
        duration_seconds: job.samples.len() as f64 / WIRE_SAMPLE_RATE as f64,
        samples: job.samples.len(),
    };
    let meta_path = path.with_extension("meta");
    let sidecar = serde_json::to_string_pretty(&metadata)
        .map_err(|e| ParlanceError::Sink(e.to_string()))?;
    fs::write(&meta_path, sidecar.as_bytes())?;

    if rand::random::<f64>() < CLEANUP_PROBABILITY {
        cleanup_old_captures(cfg);
    }

    Ok(path)
}

/// Delete the oldest `.raw` captures (and their sidecars) beyond
/// `max_files`, ordered by creation time.
pub fn cleanup_old_captures(cfg: &AudioLogConfig) {
    let dir = Path::new(&cfg.output_dir);
    if !dir.exists() {
        return;
    }

    let mut files: Vec<(PathBuf, SystemTime)> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .flatten()
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "raw"))
            .filter_map(|e| {
                let meta = e.metadata().ok()?;
                let created = meta.created().or_else(|_| meta.modified()).ok()?;
                Some((e.path(), created))
            })
            .collect(),
        Err(e) => {
            error!(error = %e, dir = %dir.display(), "retention sweep failed to list captures");
            return;
        }
    };

    if files.len() <= cfg.max_files {
        return;
    }

    files.sort_by_key(|(_, created)| *created);
    let excess = files.len() - cfg.max_files;
    for (path, _) in files.into_iter().take(excess) {
        match fs::remove_file(&path) {
            Ok(()) => {
                let _ = fs::remove_file(path.with_extension("meta"));
                info!(path = %path.display(), "deleted old capture");
            }
            Err(e) => error!(path = %path.display(), error = %e, "failed to delete old capture"),
        }
    }
}
