//! WebSocket transport adapter: handshake, ingest loop, event writer.
//!
//! Per connection:
//! 1. one text handshake frame `{"lang": ..., "prompt": ...}`;
//! 2. binary audio frames forwarded to the session pipeline;
//! 3. a writer task that serialises session events as JSON text frames.
//!
//! The writer owns the send half exclusively. In single-shot mode
//! (`continuous_recognition = false`) the writer also initiates the close
//! right after the first recognition result goes out — the ingest loop is
//! never relied on to observe that state.

use std::time::{Duration, Instant};

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{info, warn};

use parlance_core::error::{ParlanceError, Result};
use parlance_core::{SessionEvent, SessionPipeline, VadEngine};

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/ws/audio", get(ws_audio))
}

/// Language/prompt negotiation sent as the first frame.
#[derive(Debug, Deserialize)]
struct Handshake {
    #[serde(default)]
    lang: String,
    #[serde(default)]
    prompt: String,
}

async fn ws_audio(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_session(socket, state))
}

async fn handle_session(socket: WebSocket, state: AppState) {
    let session_id = state.registry.register();
    info!(session_id, "websocket session established");

    if let Err(e) = run_session(socket, &state, session_id).await {
        warn!(session_id, error = %e, "session ended with error");
    }

    state.registry.deregister(session_id);
    info!(session_id, "websocket session closed");
}

async fn run_session(mut socket: WebSocket, state: &AppState, session_id: u64) -> Result<()> {
    let hello = match recv_handshake(&mut socket, state.receive_timeout).await {
        Ok(h) => h,
        Err(e) => {
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::PROTOCOL,
                    reason: "handshake failed".into(),
                })))
                .await;
            return Err(e);
        }
    };
    info!(session_id, lang = %hello.lang, prompt_len = hello.prompt.len(), "handshake received");

    let (event_tx, event_rx) = mpsc::unbounded_channel::<SessionEvent>();
    let mut pipeline = SessionPipeline::new(
        session_id,
        state.vad_store.snapshot(),
        VadEngine::new((state.scorer_factory)()),
        state.recognizer.clone(),
        Some(state.sink.clone()),
        event_tx,
    );
    pipeline.set_language(&hello.lang);
    pipeline.set_prompt(&hello.prompt);

    let (ws_tx, mut ws_rx) = socket.split();
    let writer = tokio::spawn(write_events(
        ws_tx,
        event_rx,
        session_id,
        state.continuous_recognition,
    ));

    let outcome = loop {
        let msg = match state.receive_timeout {
            Some(limit) => match timeout(limit, ws_rx.next()).await {
                Ok(msg) => msg,
                Err(_) => {
                    break Err(ParlanceError::Protocol(
                        "timed out waiting for an audio frame".into(),
                    ))
                }
            },
            None => ws_rx.next().await,
        };

        match msg {
            Some(Ok(Message::Binary(payload))) => pipeline.ingest(&payload),
            Some(Ok(Message::Text(_))) => {
                warn!(session_id, "ignoring unexpected text frame after handshake");
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
            Some(Ok(Message::Close(_))) | None => break Ok(()),
            Some(Err(e)) => break Err(ParlanceError::Protocol(e.to_string())),
        }
    };

    // Mark in-flight recognition as abandoned, then let the writer drain
    // whatever was already queued.
    pipeline.close();
    drop(pipeline);
    let _ = writer.await;

    outcome
}

async fn recv_handshake(
    socket: &mut WebSocket,
    receive_timeout: Option<Duration>,
) -> Result<Handshake> {
    loop {
        let msg = match receive_timeout {
            Some(limit) => timeout(limit, socket.recv()).await.map_err(|_| {
                ParlanceError::Protocol("timed out waiting for the handshake frame".into())
            })?,
            None => socket.recv().await,
        };

        match msg {
            Some(Ok(Message::Text(raw))) => {
                return serde_json::from_str::<Handshake>(&raw)
                    .map_err(|e| ParlanceError::Protocol(format!("malformed handshake: {e}")));
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(_)) => {
                return Err(ParlanceError::Protocol(
                    "expected a text handshake frame".into(),
                ))
            }
            Some(Err(e)) => return Err(ParlanceError::Protocol(e.to_string())),
            None => {
                return Err(ParlanceError::Protocol(
                    "connection closed before handshake".into(),
                ))
            }
        }
    }
}

/// Drain session events onto the socket, in trigger order, stamping each
/// with seconds since the session started.
async fn write_events(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
    session_id: u64,
    continuous_recognition: bool,
) {
    let started = Instant::now();

    while let Some(event) = events.recv().await {
        let is_result = event.is_recognition_result();
        let wire = event.into_wire(started.elapsed().as_secs_f64());
        let frame = match serde_json::to_string(&wire) {
            Ok(json) => json,
            Err(e) => {
                warn!(session_id, error = %e, "failed to serialize event; dropping it");
                continue;
            }
        };

        if let Err(e) = ws_tx.send(Message::Text(frame)).await {
            warn!(session_id, error = %e, "failed to send event; stopping writer");
            break;
        }

        if is_result && !continuous_recognition {
            info!(session_id, "single-shot recognition complete; closing session");
            let _ = ws_tx
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::NORMAL,
                    reason: "recognition complete".into(),
                })))
                .await;
            break;
        }
    }
}
