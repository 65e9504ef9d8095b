// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Boundary to the upstream live-session provider.
//!
//! A connector establishes one session per identifier and hands back an
//! [`UpstreamLink`]: a channel of [`RawEvent`]s plus the token that tears the
//! session down. Raw failures are [`RawUpstreamError`]s and are classified
//! exactly once, in [`classify`], before anything downstream looks at them.

pub mod adapter;
pub mod classify;
pub mod webcast;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::identifier::StreamIdentifier;

pub use classify::RawUpstreamError;

/// Establishes upstream live sessions.
pub trait UpstreamConnector: Send + Sync {
    /// Connect to the live session for `identifier`.
    ///
    /// On success the returned link is already streaming; cancelling its token
    /// closes the upstream session.
    fn connect<'a>(
        &'a self,
        identifier: &'a StreamIdentifier,
    ) -> BoxFuture<'a, Result<UpstreamLink, RawUpstreamError>>;
}

/// A live upstream session.
pub struct UpstreamLink {
    pub events: mpsc::Receiver<RawEvent>,
    pub cancel: CancellationToken,
}

/// Closed set of events an upstream session emits, in provider field naming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum RawEvent {
    Chat(RawChat),
    Gift(RawGift),
    Follow(RawUser),
    Like(RawLike),
    Share(RawUser),
    RoomUser(RawRoomUser),
    StreamEnd,
    Error(RawUpstreamError),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawUser {
    pub user_id: String,
    pub unique_id: Option<String>,
    pub nickname: String,
    pub profile_picture_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawChat {
    #[serde(flatten)]
    pub user: RawUser,
    pub comment: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawGift {
    #[serde(flatten)]
    pub user: RawUser,
    pub gift_id: String,
    pub gift_name: String,
    pub repeat_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawLike {
    #[serde(flatten)]
    pub user: RawUser,
    pub like_count: u32,
    /// Running like total for the whole live, when the provider sends it.
    pub total_like_count: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawRoomUser {
    pub viewer_count: u64,
}
