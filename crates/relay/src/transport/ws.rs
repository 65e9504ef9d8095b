// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Viewer push channel.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;

use crate::state::RelayState;

/// `GET /`, `GET /ws`: WebSocket upgrade for a viewer.
pub async fn ws_handler(
    State(state): State<Arc<RelayState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_viewer(state, socket))
}

/// Per-viewer loop: cached stats first, then every broadcast frame as it arrives.
///
/// Client messages are ignored; the channel is push-only.
async fn handle_viewer(state: Arc<RelayState>, socket: WebSocket) {
    let viewer = uuid::Uuid::new_v4();
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Subscribe before backfilling so nothing slips between the two.
    let mut rx = state.broadcaster.subscribe();
    tracing::debug!(viewer = %viewer, viewers = state.broadcaster.subscriber_count(), "viewer connected");

    for frame in state.broadcaster.backfill() {
        if ws_tx.send(Message::Text(frame.to_string().into())).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => {
                let _ = ws_tx.send(Message::Close(None)).await;
                break;
            }
            frame = rx.recv() => {
                let frame = match frame {
                    Ok(f) => f,
                    Err(RecvError::Lagged(n)) => {
                        tracing::debug!(viewer = %viewer, skipped = n, "viewer lagged, skipping frames");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                if ws_tx.send(Message::Text(frame.to_string().into())).await.is_err() {
                    break;
                }
            }
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
        }
    }

    tracing::debug!(viewer = %viewer, "viewer disconnected");
}
