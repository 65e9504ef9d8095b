// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Viewer-facing event types and the fan-out hub that pushes them.
//!
//! Every upstream event is translated into a [`NormalizedEvent`] before it
//! leaves the relay. On the wire an event is
//! `{"type": "<kind>", "timestamp": "<rfc3339>", "data": {...}}` where the shape
//! of `data` is fixed per kind.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::identifier::StreamIdentifier;

/// Frames buffered per subscriber before a slow viewer starts skipping.
const BROADCAST_CAPACITY: usize = 512;

// -- Wire-format event types -------------------------------------------------

/// Closed set of event kinds pushed to viewers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    Chat,
    Gift,
    Follow,
    Like,
    Share,
    Stats,
    StreamEnd,
    Error,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Gift => "gift",
            Self::Follow => "follow",
            Self::Like => "like",
            Self::Share => "share",
            Self::Stats => "stats",
            Self::StreamEnd => "streamEnd",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayload {
    pub user_id: String,
    pub nickname: String,
    pub comment: String,
    pub profile_picture_url: Option<String>,
    /// Live session the comment was posted in.
    pub identifier: StreamIdentifier,
    /// Handle of the commenter, when upstream provides it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftPayload {
    pub user_id: String,
    pub nickname: String,
    pub gift_name: String,
    pub gift_id: String,
    pub repeat_count: u32,
    pub profile_picture_url: Option<String>,
}

/// Payload shared by `follow` and `share`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPayload {
    pub user_id: String,
    pub nickname: String,
    pub profile_picture_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikePayload {
    pub user_id: String,
    pub nickname: String,
    pub like_count: u32,
    pub profile_picture_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewer_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_like_count: Option<u64>,
    pub identifier: StreamIdentifier,
}

impl StatsPayload {
    /// Overlay the counters present in `newer` onto `self`.
    fn merge(&mut self, newer: &StatsPayload) {
        if newer.viewer_count.is_some() {
            self.viewer_count = newer.viewer_count;
        }
        if newer.total_like_count.is_some() {
            self.total_like_count = newer.total_like_count;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamEndPayload {
    pub identifier: StreamIdentifier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub error: String,
    pub identifier: StreamIdentifier,
}

/// Per-kind payload of a [`NormalizedEvent`].
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    Chat(ChatPayload),
    Gift(GiftPayload),
    Follow(UserPayload),
    Like(LikePayload),
    Share(UserPayload),
    Stats(StatsPayload),
    StreamEnd(StreamEndPayload),
    Error(ErrorPayload),
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Chat(_) => EventKind::Chat,
            Self::Gift(_) => EventKind::Gift,
            Self::Follow(_) => EventKind::Follow,
            Self::Like(_) => EventKind::Like,
            Self::Share(_) => EventKind::Share,
            Self::Stats(_) => EventKind::Stats,
            Self::StreamEnd(_) => EventKind::StreamEnd,
            Self::Error(_) => EventKind::Error,
        }
    }
}

/// One event in transit from an upstream session to viewers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireEvent", try_from = "WireEvent")]
pub struct NormalizedEvent {
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

impl NormalizedEvent {
    pub fn new(payload: EventPayload) -> Self {
        Self { timestamp: Utc::now(), payload }
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}

#[derive(Serialize, Deserialize)]
struct WireEvent {
    #[serde(rename = "type")]
    kind: EventKind,
    timestamp: DateTime<Utc>,
    data: serde_json::Value,
}

impl From<NormalizedEvent> for WireEvent {
    fn from(event: NormalizedEvent) -> Self {
        let kind = event.kind();
        let data = match &event.payload {
            EventPayload::Chat(p) => serde_json::to_value(p),
            EventPayload::Gift(p) => serde_json::to_value(p),
            EventPayload::Follow(p) | EventPayload::Share(p) => serde_json::to_value(p),
            EventPayload::Like(p) => serde_json::to_value(p),
            EventPayload::Stats(p) => serde_json::to_value(p),
            EventPayload::StreamEnd(p) => serde_json::to_value(p),
            EventPayload::Error(p) => serde_json::to_value(p),
        };
        Self { kind, timestamp: event.timestamp, data: data.unwrap_or_default() }
    }
}

impl TryFrom<WireEvent> for NormalizedEvent {
    type Error = serde_json::Error;

    fn try_from(wire: WireEvent) -> Result<Self, Self::Error> {
        let data = wire.data;
        let payload = match wire.kind {
            EventKind::Chat => EventPayload::Chat(serde_json::from_value(data)?),
            EventKind::Gift => EventPayload::Gift(serde_json::from_value(data)?),
            EventKind::Follow => EventPayload::Follow(serde_json::from_value(data)?),
            EventKind::Like => EventPayload::Like(serde_json::from_value(data)?),
            EventKind::Share => EventPayload::Share(serde_json::from_value(data)?),
            EventKind::Stats => EventPayload::Stats(serde_json::from_value(data)?),
            EventKind::StreamEnd => EventPayload::StreamEnd(serde_json::from_value(data)?),
            EventKind::Error => EventPayload::Error(serde_json::from_value(data)?),
        };
        Ok(Self { timestamp: wire.timestamp, payload })
    }
}

// -- Fan-out hub -------------------------------------------------------------

/// Fans normalized events out to every connected viewer.
///
/// Events are serialized once and pushed through a `broadcast` channel; each
/// viewer connection holds its own receiver, so joins and leaves never block
/// the sender. Delivery is best-effort: viewers that fall behind skip frames
/// and closed viewers are simply gone.
pub struct Broadcaster {
    tx: broadcast::Sender<Arc<str>>,
    stats: RwLock<HashMap<StreamIdentifier, StatsPayload>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { tx, stats: RwLock::new(HashMap::new()) }
    }

    /// Subscribe to serialized event frames.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<str>> {
        self.tx.subscribe()
    }

    /// Number of currently subscribed viewers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Start caching counters for `identifier`. Stats for identifiers that
    /// are not tracked are relayed but never cached.
    pub fn track(&self, identifier: &StreamIdentifier) {
        self.stats.write().entry(identifier.clone()).or_insert_with(|| StatsPayload {
            viewer_count: None,
            total_like_count: None,
            identifier: identifier.clone(),
        });
    }

    /// Push an event to every current subscriber.
    ///
    /// Returns the number of subscribers the frame was handed to.
    pub fn broadcast(&self, event: &NormalizedEvent) -> usize {
        if let EventPayload::Stats(ref stats) = event.payload {
            if let Some(cached) = self.stats.write().get_mut(&stats.identifier) {
                cached.merge(stats);
            }
        }

        let frame: Arc<str> = match serde_json::to_string(event) {
            Ok(json) => json.into(),
            Err(e) => {
                tracing::warn!(kind = %event.kind(), err = %e, "failed to serialize event");
                return 0;
            }
        };
        // send() only fails when nobody is listening.
        self.tx.send(frame).unwrap_or(0)
    }

    /// Latest known counters per identifier, as `stats` frames for a joining viewer.
    pub fn backfill(&self) -> Vec<Arc<str>> {
        let stats = self.stats.read();
        let mut cached: Vec<&StatsPayload> = stats
            .values()
            .filter(|p| p.viewer_count.is_some() || p.total_like_count.is_some())
            .collect();
        cached.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        cached
            .into_iter()
            .filter_map(|payload| {
                let event = NormalizedEvent::new(EventPayload::Stats(payload.clone()));
                serde_json::to_string(&event).ok().map(Arc::from)
            })
            .collect()
    }

    /// Drop cached counters for an identifier that is no longer relayed.
    pub fn forget(&self, identifier: &StreamIdentifier) {
        self.stats.write().remove(identifier);
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
