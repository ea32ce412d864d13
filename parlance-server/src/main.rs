//! Parlance server binary — composition root.
//!
//! Wires the persisted configuration stores, the recognition worker pool,
//! the capture sink and the session registry into an axum router serving
//! the `/ws/audio` streaming endpoint plus the admin HTTP surface.

mod admin;
mod settings;
mod state;
mod ws;

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use clap::Parser;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use parlance_core::{
    AudioSink, EnergyScorer, RecognitionBackend, Recognizer, SessionRegistry, SpeechScorer,
    StubBackend,
};

use settings::{AppEnvConfig, AudioLogConfigStore, VadConfigStore};
use state::AppState;

const CONFIG_DIR: &str = "config";
const VAD_CONFIG_PATH: &str = "config/vad-config.json";
const AUDIO_LOG_CONFIG_PATH: &str = "config/audio-log-config.json";
const APP_ENV_PATH: &str = "config/app-config.env";

#[derive(Debug, Parser)]
#[command(name = "parlance-server", about = "Real-time streaming speech-recognition server")]
struct Args {
    /// Bind address.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Bind port.
    #[arg(long, default_value_t = 8000)]
    port: u16,

    /// Keep sessions open after a recognition result; `false` closes each
    /// session right after its first result.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    continuous: bool,

    /// Receive timeout in seconds for the handshake and audio frames.
    /// Unset means wait forever.
    #[arg(long)]
    receive_timeout_secs: Option<u64>,

    /// Recognition worker pool size.
    #[arg(long, default_value_t = 1)]
    recognition_workers: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    fs::create_dir_all(CONFIG_DIR).context("failed to create config directory")?;
    let env_cfg = AppEnvConfig::load_or_create(Path::new(APP_ENV_PATH));

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(env_cfg.log_level.to_ascii_lowercase()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(model = %env_cfg.recognition_model, "recognition model selected");

    let vad_store = Arc::new(VadConfigStore::load(VAD_CONFIG_PATH));
    let audio_log_store = Arc::new(AudioLogConfigStore::load(AUDIO_LOG_CONFIG_PATH));
    if let Err(e) = audio_log_store.snapshot().ensure_output_dir() {
        warn!(error = %e, "failed to create the audio log directory");
    }
    let sink = AudioSink::spawn(audio_log_store.shared())
        .context("failed to start the audio capture sink")?;

    let pool_size = args.recognition_workers.max(1);
    let backends = (0..pool_size)
        .map(|_| make_backend(&env_cfg.recognition_model))
        .collect();
    let recognizer = Recognizer::spawn(backends).context("failed to start recognition workers")?;

    let state = AppState {
        registry: Arc::new(SessionRegistry::new()),
        recognizer,
        scorer_factory: Arc::new(|| Box::new(EnergyScorer::default()) as Box<dyn SpeechScorer>),
        vad_store,
        audio_log_store,
        sink,
        vad_model_loaded: true,
        recognition_model_loaded: true,
        continuous_recognition: args.continuous,
        receive_timeout: args.receive_timeout_secs.map(Duration::from_secs),
    };

    let app = Router::new()
        .merge(ws::routes())
        .merge(admin::routes())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(
        addr = %addr,
        continuous = args.continuous,
        recognition_workers = pool_size,
        "parlance server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

fn make_backend(model: &str) -> Box<dyn RecognitionBackend> {
    match model {
        "" | "stub" => Box::new(StubBackend::new()),
        other => {
            warn!(model = other, "unknown recognition model; using the stub backend");
            Box::new(StubBackend::new())
        }
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}
