//! Persisted configuration stores (JSON documents under `config/`, plus a
//! key-value env file).
//!
//! Load semantics follow one rule everywhere: a missing file means
//! "defaults, then persist them"; a malformed file means "log, keep
//! defaults in memory"; unknown keys are tolerated and missing keys
//! default. Saves stamp `last_updated` but otherwise write exactly the
//! canonical key set the in-memory types declare.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use parking_lot::RwLock;
use parlance_core::sink::SharedAudioLogConfig;
use parlance_core::{AudioLogConfig, VadConfig, VadConfigUpdate};
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info};

/// Persisted VAD tuning parameters.
pub struct VadConfigStore {
    path: PathBuf,
    current: RwLock<VadConfig>,
}

impl VadConfigStore {
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut existed = false;
        let mut cfg = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<VadConfig>(&raw) {
                Ok(cfg) => {
                    existed = true;
                    info!(path = %path.display(), "VAD configuration loaded");
                    cfg
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "failed to parse VAD configuration; using defaults");
                    VadConfig::default()
                }
            },
            Err(_) => {
                info!(path = %path.display(), "VAD config file not found; using defaults");
                VadConfig::default()
            }
        };
        cfg.sanitize();

        let store = Self {
            path,
            current: RwLock::new(cfg),
        };
        if !existed {
            store.save();
        }
        store
    }

    pub fn snapshot(&self) -> VadConfig {
        self.current.read().clone()
    }

    /// Apply a partial update, persist, and return (old, new).
    pub fn update(&self, update: &VadConfigUpdate) -> (VadConfig, VadConfig) {
        let (old, new) = {
            let mut guard = self.current.write();
            let old = guard.clone();
            guard.apply_update(update);
            (old, guard.clone())
        };
        self.save();
        info!(?old, ?new, "VAD configuration updated");
        (old, new)
    }

    /// Restore defaults, persist, and return (old, new).
    pub fn reset(&self) -> (VadConfig, VadConfig) {
        let (old, new) = {
            let mut guard = self.current.write();
            let old = guard.clone();
            *guard = VadConfig::default();
            (old, guard.clone())
        };
        self.save();
        info!("VAD configuration reset to defaults");
        (old, new)
    }

    fn save(&self) {
        let snapshot = self.snapshot();
        if let Err(e) = save_with_timestamp(&self.path, &snapshot) {
            error!(path = %self.path.display(), error = %e, "failed to save VAD configuration");
        }
    }
}

/// Persisted capture settings; the inner value is shared with the sink
/// worker so admin updates take effect immediately.
pub struct AudioLogConfigStore {
    path: PathBuf,
    current: SharedAudioLogConfig,
}

/// Partial update accepted by `POST /config/audio-log`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AudioLogConfigUpdate {
    pub enabled: Option<bool>,
    pub output_dir: Option<String>,
    pub max_files: Option<usize>,
}

impl AudioLogConfigStore {
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut existed = false;
        let cfg = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<AudioLogConfig>(&raw) {
                Ok(cfg) => {
                    existed = true;
                    info!(path = %path.display(), "audio log configuration loaded");
                    cfg
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "failed to parse audio log configuration; using defaults");
                    AudioLogConfig::default()
                }
            },
            Err(_) => {
                info!(path = %path.display(), "audio log config file not found; using defaults");
                AudioLogConfig::default()
            }
        };

        let store = Self {
            path,
            current: Arc::new(RwLock::new(cfg)),
        };
        if !existed {
            store.save();
        }
        store
    }

    /// Handle to the live value, for wiring into `AudioSink::spawn`.
    pub fn shared(&self) -> SharedAudioLogConfig {
        Arc::clone(&self.current)
    }

    pub fn snapshot(&self) -> AudioLogConfig {
        self.current.read().clone()
    }

    /// Apply a partial update, ensure the output directory, persist.
    pub fn update(&self, update: &AudioLogConfigUpdate) -> AudioLogConfig {
        let new = {
            let mut guard = self.current.write();
            if let Some(enabled) = update.enabled {
                guard.enabled = enabled;
            }
            if let Some(ref dir) = update.output_dir {
                guard.output_dir = dir.clone();
            }
            if let Some(max_files) = update.max_files {
                guard.max_files = max_files;
            }
            guard.clone()
        };
        if let Err(e) = new.ensure_output_dir() {
            error!(error = %e, "failed to create audio log directory");
        }
        self.save();
        info!(?new, "audio log configuration updated");
        new
    }

    fn save(&self) {
        let snapshot = self.snapshot();
        if let Err(e) = save_with_timestamp(&self.path, &snapshot) {
            error!(path = %self.path.display(), error = %e, "failed to save audio log configuration");
        }
    }
}

/// Serialize `value` and add a `last_updated` stamp alongside the
/// canonical keys.
fn save_with_timestamp<T: serde::Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let mut doc = serde_json::to_value(value)?;
    if let Value::Object(ref mut map) = doc {
        map.insert(
            "last_updated".into(),
            Value::String(Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()),
        );
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(&doc)?)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// App env file (config/app-config.env)
// ---------------------------------------------------------------------------

/// Key-value settings that must exist before tracing is initialised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppEnvConfig {
    pub log_level: String,
    pub recognition_model: String,
}

impl Default for AppEnvConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            recognition_model: "stub".into(),
        }
    }
}

impl AppEnvConfig {
    /// Parse `KEY=VALUE` lines; unknown keys and comments are ignored.
    pub fn load(path: &Path) -> Self {
        let mut cfg = Self::default();
        let Ok(raw) = fs::read_to_string(path) else {
            return cfg;
        };
        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            match key.trim() {
                "LOG_LEVEL" => cfg.log_level = value.trim().to_string(),
                "RECOGNITION_MODEL" => cfg.recognition_model = value.trim().to_string(),
                _ => {}
            }
        }
        cfg
    }

    /// Load the file, writing defaults first when it does not exist.
    pub fn load_or_create(path: &Path) -> Self {
        if !path.exists() {
            let cfg = Self::default();
            if let Err(e) = cfg.save(path) {
                error!(path = %path.display(), error = %e, "failed to write default app config");
            }
            return cfg;
        }
        Self::load(path)
    }

    /// Rewrite the two known keys, keeping any other lines intact.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let existing = fs::read_to_string(path).unwrap_or_default();
        let mut lines: Vec<String> = existing
            .lines()
            .filter(|l| {
                let key = l.split_once('=').map(|(k, _)| k.trim());
                !matches!(key, Some("LOG_LEVEL") | Some("RECOGNITION_MODEL"))
            })
            .map(ToOwned::to_owned)
            .collect();
        lines.push(format!("LOG_LEVEL={}", self.log_level));
        lines.push(format!("RECOGNITION_MODEL={}", self.recognition_model));

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, lines.join("\n") + "\n")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vad_store_persists_defaults_when_file_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vad-config.json");
        let store = VadConfigStore::load(&path);

        assert!(path.exists());
        assert_eq!(store.snapshot(), VadConfig::default());
    }

    #[test]
    fn saved_document_uses_the_canonical_key_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vad-config.json");
        let _store = VadConfigStore::load(&path);

        let doc: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let map = doc.as_object().unwrap();
        for key in [
            "threshold",
            "min_speech_duration_ms",
            "max_speech_duration_s",
            "prefix_speech_pad_ms",
            "silence_duration_ms",
            "chunk_size",
            "last_updated",
        ] {
            assert!(map.contains_key(key), "missing canonical key {key}");
        }
        // The historical misspelling must never come back.
        assert!(!map.contains_key("speech_pad_ms"));
    }

    #[test]
    fn update_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vad-config.json");
        let store = VadConfigStore::load(&path);

        let (old, new) = store.update(&VadConfigUpdate {
            threshold: Some(0.8),
            prefix_speech_pad_ms: Some(200),
            ..Default::default()
        });
        assert!((old.threshold - 0.5).abs() < 1e-6);
        assert!((new.threshold - 0.8).abs() < 1e-6);
        assert_eq!(new.prefix_speech_pad_ms, 200);

        // A fresh store sees the persisted values.
        let reloaded = VadConfigStore::load(&path);
        assert_eq!(reloaded.snapshot(), new);
    }

    #[test]
    fn reset_restores_defaults_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vad-config.json");
        let store = VadConfigStore::load(&path);
        store.update(&VadConfigUpdate {
            chunk_size: Some(1024),
            ..Default::default()
        });

        let (_, new) = store.reset();
        assert_eq!(new, VadConfig::default());
        assert_eq!(VadConfigStore::load(&path).snapshot(), VadConfig::default());
    }

    #[test]
    fn malformed_vad_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vad-config.json");
        fs::write(&path, "{ not json").unwrap();

        let store = VadConfigStore::load(&path);
        assert_eq!(store.snapshot(), VadConfig::default());
    }

    #[test]
    fn audio_log_update_is_visible_through_the_shared_handle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio-log-config.json");
        let store = AudioLogConfigStore::load(&path);
        let shared = store.shared();

        let target = dir.path().join("captures");
        store.update(&AudioLogConfigUpdate {
            enabled: Some(true),
            output_dir: Some(target.to_string_lossy().into_owned()),
            max_files: Some(5),
        });

        let live = shared.read().clone();
        assert!(live.enabled);
        assert_eq!(live.max_files, 5);
        assert!(target.exists(), "output dir must be created on update");
    }

    #[test]
    fn env_file_round_trips_and_preserves_unknown_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app-config.env");
        fs::write(&path, "# comment\nCUSTOM=keepme\nLOG_LEVEL=debug\n").unwrap();

        let mut cfg = AppEnvConfig::load(&path);
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.recognition_model, "stub");

        cfg.recognition_model = "whisper-large".into();
        cfg.save(&path).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("CUSTOM=keepme"));
        assert!(raw.contains("LOG_LEVEL=debug"));
        assert!(raw.contains("RECOGNITION_MODEL=whisper-large"));
    }

    #[test]
    fn load_or_create_writes_defaults_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app-config.env");
        let cfg = AppEnvConfig::load_or_create(&path);
        assert_eq!(cfg, AppEnvConfig::default());
        assert!(path.exists());
    }
}
