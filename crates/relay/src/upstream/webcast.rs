// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connector for a webcast gateway.
//!
//! Connecting is two steps: an HTTP bootstrap (`GET /api/v1/live/{id}/room`)
//! that resolves the room and its event socket, then a WebSocket that streams
//! `{"type": ..., "data": ...}` frames decoded as [`RawEvent`]s.

use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use reqwest::header::{HeaderValue, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue as WsHeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::identifier::StreamIdentifier;
use crate::upstream::{RawEvent, RawUpstreamError, UpstreamConnector, UpstreamLink};

/// Header carrying the signing/API key.
const API_KEY_HEADER: &str = "x-api-key";

/// Events buffered between the socket reader and the session forwarder.
const EVENT_BUFFER: usize = 256;

const INITIAL_FETCH_MESSAGE: &str = "Failed to retrieve the initial room data";

/// Room bootstrap returned by the gateway.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub room_id: String,
    #[serde(default)]
    pub is_live: bool,
    pub socket_url: String,
}

/// Gateway-backed [`UpstreamConnector`].
pub struct WebcastConnector {
    base_url: String,
    api_key: Option<String>,
    client: Client,
    connect_timeout: Duration,
}

impl WebcastConnector {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        connect_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(connect_timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Ok(Self { base_url, api_key, client, connect_timeout })
    }

    fn room_url(&self, identifier: &StreamIdentifier) -> String {
        format!("{}/api/v1/live/{}/room", self.base_url, identifier)
    }

    async fn fetch_room(&self, identifier: &StreamIdentifier) -> Result<RoomInfo, RawUpstreamError> {
        let mut req = self.client.get(self.room_url(identifier));
        if let Some(ref key) = self.api_key {
            req = req.header(API_KEY_HEADER, key);
        }

        let resp = req.send().await.map_err(transport_error)?;
        let status = resp.status();
        if !status.is_success() {
            let retry_after = resp.headers().get(RETRY_AFTER).and_then(parse_retry_after);
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error(status, retry_after, &body));
        }

        let room: RoomInfo = resp.json().await.map_err(|e| {
            RawUpstreamError::new(INITIAL_FETCH_MESSAGE)
                .named("InitialFetchError")
                .wrapping(RawUpstreamError::new(e.to_string()))
        })?;
        if !room.is_live {
            return Err(RawUpstreamError::new(format!("{INITIAL_FETCH_MESSAGE}: room is offline"))
                .named("InitialFetchError"));
        }
        Ok(room)
    }

    async fn open(&self, identifier: &StreamIdentifier) -> Result<UpstreamLink, RawUpstreamError> {
        let room = self.fetch_room(identifier).await?;
        tracing::debug!(identifier = %identifier, room_id = %room.room_id, "room resolved");

        let mut request = room
            .socket_url
            .as_str()
            .into_client_request()
            .map_err(|e| RawUpstreamError::new(format!("invalid socket url: {e}")))?;
        if let Some(ref key) = self.api_key {
            if let Ok(value) = WsHeaderValue::from_str(key) {
                request.headers_mut().insert(API_KEY_HEADER, value);
            }
        }

        let (ws, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| RawUpstreamError::new(format!("event socket connect failed: {e}")))?;

        let (tx, events) = mpsc::channel(EVENT_BUFFER);
        let cancel = CancellationToken::new();
        spawn_reader(identifier.clone(), ws, tx, cancel.clone());
        Ok(UpstreamLink { events, cancel })
    }
}

impl UpstreamConnector for WebcastConnector {
    fn connect<'a>(
        &'a self,
        identifier: &'a StreamIdentifier,
    ) -> BoxFuture<'a, Result<UpstreamLink, RawUpstreamError>> {
        Box::pin(async move {
            tracing::info!(identifier = %identifier, "connecting to live");
            match tokio::time::timeout(self.connect_timeout, self.open(identifier)).await {
                Ok(result) => result,
                Err(_) => Err(RawUpstreamError::new("Connection timeout").named("TimeoutError")),
            }
        })
    }
}

type EventSocket =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Read frames until the socket closes or `cancel` fires.
fn spawn_reader(
    identifier: StreamIdentifier,
    ws: EventSocket,
    tx: mpsc::Sender<RawEvent>,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        let (mut write, mut read) = ws.split();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let Some(event) = parse_frame(&text) else {
                                tracing::debug!(identifier = %identifier, "skipping unrecognized frame");
                                continue;
                            };
                            if tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            tracing::info!(identifier = %identifier, "event socket closed by upstream");
                            break;
                        }
                        Some(Err(e)) => {
                            tracing::warn!(identifier = %identifier, err = %e, "event socket error");
                            break;
                        }
                        _ => {} // ping/pong/binary ignored
                    }
                }
            }
        }
        cancel.cancel();
    });
}

/// Decode one text frame from the event socket.
pub fn parse_frame(text: &str) -> Option<RawEvent> {
    serde_json::from_str(text).ok()
}

fn transport_error(e: reqwest::Error) -> RawUpstreamError {
    if e.is_timeout() {
        RawUpstreamError::new(format!("Connection timeout: {e}")).named("TimeoutError")
    } else {
        RawUpstreamError::new(format!("{INITIAL_FETCH_MESSAGE}: {e}")).named("InitialFetchError")
    }
}

/// `Retry-After` is either delta-seconds or an HTTP date; only the former is honored.
fn parse_retry_after(value: &HeaderValue) -> Option<u64> {
    value.to_str().ok()?.trim().parse::<u64>().ok().map(|secs| secs.saturating_mul(1000))
}

/// Build the raw error for a non-success bootstrap response.
///
/// A JSON error body from the gateway is kept as the wrapped exception so its
/// own name and retry hint survive classification.
pub fn status_error(status: StatusCode, retry_after_ms: Option<u64>, body: &str) -> RawUpstreamError {
    let mut outer = match status {
        StatusCode::TOO_MANY_REQUESTS => {
            RawUpstreamError::new("429 Too Many Requests").named("RateLimitError")
        }
        StatusCode::NOT_FOUND => RawUpstreamError::new("User not found").named("UserNotFoundError"),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            RawUpstreamError::new(format!("Connection timeout ({status})")).named("TimeoutError")
        }
        _ => RawUpstreamError::new(format!("{INITIAL_FETCH_MESSAGE} ({status})"))
            .named("InitialFetchError"),
    };
    outer.retry_after_ms = retry_after_ms;
    match serde_json::from_str::<RawUpstreamError>(body) {
        Ok(inner) if inner != RawUpstreamError::default() => outer.wrapping(inner),
        _ => outer,
    }
}

#[cfg(test)]
#[path = "webcast_tests.rs"]
mod tests;
