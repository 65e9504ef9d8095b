// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session client: forwards one upstream session's events to viewers.

use std::sync::Arc;

use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use crate::events::{
    Broadcaster, ChatPayload, ErrorPayload, EventPayload, GiftPayload, LikePayload,
    NormalizedEvent, StatsPayload, StreamEndPayload, UserPayload,
};
use crate::identifier::StreamIdentifier;
use crate::upstream::{classify, RawEvent, RawUser, UpstreamLink};

/// One connected upstream session.
///
/// Owns the forwarding task that turns [`RawEvent`]s into
/// [`NormalizedEvent`]s and hands them to the [`Broadcaster`] in arrival
/// order. Disconnecting cancels the link token, which stops both the upstream
/// reader and the forwarder; the receiver is dropped with the task so no
/// callback outlives the client. Events still buffered when the token is
/// cancelled are discarded.
pub struct SessionClient {
    identifier: StreamIdentifier,
    cancel: CancellationToken,
}

impl SessionClient {
    /// Start forwarding events from `link`.
    pub fn attach(
        identifier: StreamIdentifier,
        link: UpstreamLink,
        broadcaster: Arc<Broadcaster>,
    ) -> Self {
        let UpstreamLink { mut events, cancel } = link;
        let task_cancel = cancel.clone();
        let task_id = identifier.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = task_cancel.cancelled() => break,
                    raw = events.recv() => {
                        let Some(raw) = raw else {
                            tracing::debug!(identifier = %task_id, "upstream event stream closed");
                            break;
                        };
                        for event in normalize(&task_id, raw) {
                            if task_cancel.is_cancelled() {
                                break;
                            }
                            broadcaster.broadcast(&event);
                        }
                    }
                }
            }
            // Closing the stream ends the session either way.
            task_cancel.cancel();
        });

        Self { identifier, cancel }
    }

    /// Close the upstream session. Safe to call any number of times.
    pub fn disconnect(&self) {
        if !self.cancel.is_cancelled() {
            tracing::info!(identifier = %self.identifier, "disconnecting upstream session");
            self.cancel.cancel();
        }
    }

    /// Resolves once the session has ended, for any reason.
    pub fn closed(&self) -> WaitForCancellationFutureOwned {
        self.cancel.clone().cancelled_owned()
    }
}

impl Drop for SessionClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Translate one raw upstream event into the viewer-facing events it produces.
pub fn normalize(identifier: &StreamIdentifier, raw: RawEvent) -> Vec<NormalizedEvent> {
    let payloads = match raw {
        RawEvent::Chat(chat) => vec![EventPayload::Chat(ChatPayload {
            user_id: chat.user.user_id,
            nickname: chat.user.nickname,
            comment: chat.comment,
            profile_picture_url: chat.user.profile_picture_url,
            identifier: identifier.clone(),
            unique_id: chat.user.unique_id,
        })],
        RawEvent::Gift(gift) => vec![EventPayload::Gift(GiftPayload {
            user_id: gift.user.user_id,
            nickname: gift.user.nickname,
            gift_name: gift.gift_name,
            gift_id: gift.gift_id,
            repeat_count: gift.repeat_count,
            profile_picture_url: gift.user.profile_picture_url,
        })],
        RawEvent::Follow(user) => vec![EventPayload::Follow(user_payload(user))],
        RawEvent::Share(user) => vec![EventPayload::Share(user_payload(user))],
        RawEvent::Like(like) => {
            let mut out = vec![EventPayload::Like(LikePayload {
                user_id: like.user.user_id,
                nickname: like.user.nickname,
                like_count: like.like_count,
                profile_picture_url: like.user.profile_picture_url,
            })];
            if let Some(total) = like.total_like_count {
                out.push(EventPayload::Stats(StatsPayload {
                    viewer_count: None,
                    total_like_count: Some(total),
                    identifier: identifier.clone(),
                }));
            }
            out
        }
        RawEvent::RoomUser(room) => vec![EventPayload::Stats(StatsPayload {
            viewer_count: Some(room.viewer_count),
            total_like_count: None,
            identifier: identifier.clone(),
        })],
        RawEvent::StreamEnd => {
            tracing::info!(identifier = %identifier, "live ended");
            vec![EventPayload::StreamEnd(StreamEndPayload { identifier: identifier.clone() })]
        }
        RawEvent::Error(raw) => {
            let classified = classify::classify(&raw);
            tracing::warn!(identifier = %identifier, kind = %classified.kind, err = %classified.message, "upstream session error");
            vec![EventPayload::Error(ErrorPayload {
                error: classified.message,
                identifier: identifier.clone(),
            })]
        }
    };
    payloads.into_iter().map(NormalizedEvent::new).collect()
}

fn user_payload(user: RawUser) -> UserPayload {
    UserPayload {
        user_id: user.user_id,
        nickname: user.nickname,
        profile_picture_url: user.profile_picture_url,
    }
}

#[cfg(test)]
#[path = "adapter_tests.rs"]
mod tests;
