//! Admin HTTP surface: health, live config, captured-audio browsing.

use std::io::Cursor;
use std::path::PathBuf;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Local};
use serde_json::{json, Value};
use tracing::{error, warn};

use parlance_core::{CaptureMetadata, VadConfigUpdate, WIRE_SAMPLE_RATE};

use crate::settings::AudioLogConfigUpdate;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/continuous", get(continuous))
        .route("/config/vad", get(get_vad_config).post(update_vad_config))
        .route("/config/vad/reset", post(reset_vad_config))
        .route(
            "/config/audio-log",
            get(get_audio_log_config).post(update_audio_log_config),
        )
        .route("/logs/audio/list", get(list_audio_logs))
        .route("/logs/audio/play/:filename", get(play_audio_file))
        .route("/logs/audio/info/:filename", get(audio_file_info))
        .route("/logs/audio/download/:filename", get(download_audio_file))
}

/// Error shape mirrored to clients as `{"detail": ...}`.
struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    fn forbidden(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, detail)
    }

    fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail)
    }

    fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, detail)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let audio_log = state.audio_log_store.snapshot();
    Json(json!({
        "status": "healthy",
        "active_sessions": state.registry.len(),
        "vad_model_loaded": state.vad_model_loaded,
        "recognition_model_loaded": state.recognition_model_loaded,
        "audio_logging_enabled": audio_log.enabled,
        "audio_log_dir": audio_log.output_dir,
        "vad_config": state.vad_store.snapshot(),
        "continuous_recognition": state.continuous_recognition,
    }))
}

async fn continuous(State(state): State<AppState>) -> String {
    if state.continuous_recognition {
        "true".into()
    } else {
        "false".into()
    }
}

async fn get_vad_config(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "config": state.vad_store.snapshot(),
        "descriptions": {
            "threshold": "Speech detection confidence threshold (0.0-1.0)",
            "min_speech_duration_ms": "Ignore speech shorter than this (ms)",
            "max_speech_duration_s": "Cut speech longer than this (sec)",
            "prefix_speech_pad_ms": "Helps prevent cutting off beginning of speech (ms)",
            "silence_duration_ms": "Speech considered finished after this silence",
            "chunk_size": "Number of samples per VAD frame (32ms@16kHz=512)",
        },
    }))
}

async fn update_vad_config(
    State(state): State<AppState>,
    Json(update): Json<VadConfigUpdate>,
) -> Json<Value> {
    let (old, new) = state.vad_store.update(&update);
    Json(json!({
        "status": "success",
        "message": "VAD configuration updated and saved",
        "old_config": old,
        "new_config": new,
        "active_sessions": state.registry.len(),
    }))
}

async fn reset_vad_config(State(state): State<AppState>) -> Json<Value> {
    let (old, new) = state.vad_store.reset();
    Json(json!({
        "status": "success",
        "message": "VAD configuration reset to defaults and saved",
        "old_config": old,
        "new_config": new,
        "active_sessions": state.registry.len(),
    }))
}

async fn get_audio_log_config(State(state): State<AppState>) -> Json<Value> {
    let cfg = state.audio_log_store.snapshot();
    Json(json!({
        "enabled": cfg.enabled,
        "output_dir": cfg.output_dir,
        "max_files": cfg.max_files,
    }))
}

async fn update_audio_log_config(
    State(state): State<AppState>,
    Json(update): Json<AudioLogConfigUpdate>,
) -> Json<Value> {
    let new = state.audio_log_store.update(&update);
    Json(json!({
        "status": "success",
        "message": "Audio log configuration updated and saved",
        "config": {
            "enabled": new.enabled,
            "output_dir": new.output_dir,
            "max_files": new.max_files,
        },
    }))
}

async fn list_audio_logs(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let cfg = state.audio_log_store.snapshot();
    if !cfg.enabled {
        return Err(ApiError::forbidden("Audio logging is disabled"));
    }

    let dir = PathBuf::from(&cfg.output_dir);
    if !dir.exists() {
        return Ok(Json(json!({ "files": [], "total": 0, "total_size_bytes": 0 })));
    }

    let mut entries: Vec<(PathBuf, std::fs::Metadata)> = std::fs::read_dir(&dir)
        .map_err(|e| ApiError::internal(e.to_string()))?
        .flatten()
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "raw"))
        .filter_map(|e| {
            let meta = e.metadata().ok()?;
            Some((e.path(), meta))
        })
        .collect();
    // Newest first.
    entries.sort_by_key(|(_, meta)| {
        std::cmp::Reverse(meta.created().or_else(|_| meta.modified()).ok())
    });

    let mut files = Vec::with_capacity(entries.len());
    let mut total_size = 0u64;
    for (path, meta) in entries {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        total_size += meta.len();

        let mut info = json!({
            "filename": filename,
            "size_bytes": meta.len(),
            "created_at": system_time_iso(meta.created().or_else(|_| meta.modified())),
            "modified_at": system_time_iso(meta.modified()),
            "has_metadata": path.with_extension("meta").exists(),
        });

        if let Some(sidecar) = read_sidecar(&path) {
            info["session_id"] = json!(sidecar.session_id);
            info["duration_seconds"] = json!(sidecar.duration_seconds);
            info["samples"] = json!(sidecar.samples);
            info["sample_rate"] = json!(sidecar.sample_rate);
        }
        files.push(info);
    }

    Ok(Json(json!({
        "files": files,
        "total": files.len(),
        "total_size_bytes": total_size,
    })))
}

async fn play_audio_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let path = capture_path(&state, &filename)?;
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| ApiError::not_found("Audio file not found"))?;
    if bytes.is_empty() {
        return Err(ApiError::bad_request("Empty audio file"));
    }

    let sample_rate = read_sidecar(&path)
        .map(|m| m.sample_rate)
        .unwrap_or(WIRE_SAMPLE_RATE);
    let samples = raw_to_samples(&bytes);

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| ApiError::internal(format!("WAV encoding failed: {e}")))?;
        for sample in &samples {
            let pcm = (sample.clamp(-1.0, 1.0) * 32767.0) as i16;
            writer
                .write_sample(pcm)
                .map_err(|e| ApiError::internal(format!("WAV encoding failed: {e}")))?;
        }
        writer
            .finalize()
            .map_err(|e| ApiError::internal(format!("WAV encoding failed: {e}")))?;
    }
    let wav = cursor.into_inner();
    let wav_name = filename.replace(".raw", ".wav");

    Ok((
        [
            (header::CONTENT_TYPE, "audio/wav".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{wav_name}\""),
            ),
            (header::CACHE_CONTROL, "no-cache".to_string()),
        ],
        wav,
    )
        .into_response())
}

async fn audio_file_info(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let path = capture_path(&state, &filename)?;
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| ApiError::not_found("Audio file not found"))?;
    let meta = std::fs::metadata(&path).map_err(|e| ApiError::internal(e.to_string()))?;

    let samples = raw_to_samples(&bytes);
    let sidecar = read_sidecar(&path);
    let sample_rate = sidecar
        .as_ref()
        .map(|m| m.sample_rate)
        .unwrap_or(WIRE_SAMPLE_RATE);

    let (min, max, mean, rms) = sample_stats(&samples);
    Ok(Json(json!({
        "filename": filename,
        "file_size_bytes": meta.len(),
        "expected_samples": meta.len() / 4,
        "metadata": sidecar,
        "audio_stats": {
            "samples": samples.len(),
            "duration_seconds": samples.len() as f64 / sample_rate as f64,
            "min_value": min,
            "max_value": max,
            "mean_value": mean,
            "rms_value": rms,
        },
        "created_at": system_time_iso(meta.created().or_else(|_| meta.modified())),
        "is_valid": !samples.is_empty() && meta.len() % 4 == 0,
    })))
}

async fn download_audio_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let path = capture_path(&state, &filename)?;
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| ApiError::not_found("File not found"))?;

    Ok((
        [
            (
                header::CONTENT_TYPE,
                "application/octet-stream".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Validate the filename and resolve it inside the capture directory.
fn capture_path(state: &AppState, filename: &str) -> Result<PathBuf, ApiError> {
    let cfg = state.audio_log_store.snapshot();
    if !cfg.enabled {
        return Err(ApiError::forbidden("Audio logging is disabled"));
    }
    if !filename.ends_with(".raw")
        || filename.contains("..")
        || filename.contains('/')
        || filename.contains('\\')
    {
        warn!(filename, "rejected capture filename");
        return Err(ApiError::bad_request("Invalid filename"));
    }
    Ok(PathBuf::from(&cfg.output_dir).join(filename))
}

fn read_sidecar(raw_path: &std::path::Path) -> Option<CaptureMetadata> {
    let raw = std::fs::read_to_string(raw_path.with_extension("meta")).ok()?;
    match serde_json::from_str(&raw) {
        Ok(meta) => Some(meta),
        Err(e) => {
            error!(path = %raw_path.display(), error = %e, "unreadable capture sidecar");
            None
        }
    }
}

fn raw_to_samples(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

fn sample_stats(samples: &[f32]) -> (f32, f32, f32, f32) {
    if samples.is_empty() {
        return (0.0, 0.0, 0.0, 0.0);
    }
    let min = samples.iter().copied().fold(f32::INFINITY, f32::min);
    let max = samples.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mean = samples.iter().sum::<f32>() / samples.len() as f32;
    let rms = (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt();
    (min, max, mean, rms)
}

fn system_time_iso(time: std::io::Result<std::time::SystemTime>) -> Value {
    match time {
        Ok(t) => json!(DateTime::<Local>::from(t).to_rfc3339()),
        Err(_) => Value::Null,
    }
}
