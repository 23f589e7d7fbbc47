// src/transport/ws.rs

//! WebSocket transport.
//!
//! Each connection gets one task that multiplexes three streams:
//! - inbound frames (registration requests) → runtime events
//! - the broadcast hub (registry updates/removals) → socket
//! - its private reply channel (snapshot, build output) → socket

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::engine::RuntimeEvent;
use crate::transport::events::{ClientEvent, Hub, Reply, ServerEvent};

#[derive(Debug, Clone)]
struct WsState {
    hub: Hub,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
}

/// Router upgrading `/` and `/ws` to WebSocket connections.
pub fn router(hub: Hub, runtime_tx: mpsc::Sender<RuntimeEvent>) -> Router {
    let state = Arc::new(WsState { hub, runtime_tx });
    Router::new()
        .route("/", get(ws_upgrade))
        .route("/ws", get(ws_upgrade))
        .with_state(state)
}

/// Bind `addr` and serve observers until the listener fails.
pub async fn serve(addr: &str, hub: Hub, runtime_tx: mpsc::Sender<RuntimeEvent>) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding websocket server to {addr}"))?;
    info!(%addr, "websocket server listening");

    axum::serve(listener, router(hub, runtime_tx))
        .await
        .context("websocket server")
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<WsState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn handle_ws(mut socket: WebSocket, state: Arc<WsState>) {
    let mut broadcasts = state.hub.subscribe();
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<ServerEvent>();

    if state
        .runtime_tx
        .send(RuntimeEvent::Connected {
            reply: reply_tx.clone(),
        })
        .await
        .is_err()
    {
        debug!("runtime gone; dropping connection");
        return;
    }
    debug!("observer connected");

    loop {
        tokio::select! {
            frame = socket.recv() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if !handle_frame(&state, text.as_str(), &reply_tx).await {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(error = %e, "websocket receive failed");
                    break;
                }
            },

            Some(event) = reply_rx.recv() => {
                if send_event(&mut socket, &event).await.is_err() {
                    break;
                }
            }

            event = broadcasts.recv() => match event {
                Ok(event) => {
                    if send_event(&mut socket, &event).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "observer lagging; registry events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    debug!("observer disconnected");
}

/// Returns `false` once the runtime is gone.
async fn handle_frame(state: &WsState, text: &str, reply: &Reply) -> bool {
    match serde_json::from_str::<ClientEvent>(text) {
        Ok(ClientEvent::Register { location }) => {
            info!(%location, "registration requested");
            state
                .runtime_tx
                .send(RuntimeEvent::RegisterRequested {
                    location,
                    reply: reply.clone(),
                })
                .await
                .is_ok()
        }
        Err(e) => {
            warn!(error = %e, "unrecognised frame");
            let _ = reply.send(ServerEvent::BuildOutput {
                program: String::new(),
                msg: format!("invalid request: {e}"),
            });
            true
        }
    }
}

async fn send_event(socket: &mut WebSocket, event: &ServerEvent) -> Result<()> {
    let json = serde_json::to_string(event).context("encoding event")?;
    socket
        .send(Message::Text(json.into()))
        .await
        .context("websocket send")
}
