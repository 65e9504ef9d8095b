// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use serde::Serialize;

use crate::upstream::classify::ErrorKind;

/// Lifecycle of one identifier's upstream connection.
///
/// ```text
/// Idle -> RateLimited -> Connecting -> Connected -> Disconnected
///                            |
///                            v
///                         Failed -> Retrying -> Connecting ...
///                            |
///                            v
///                    Idle (explicit) | Abandoned (retries exhausted)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ConnectionState {
    Idle,
    /// Waiting out the tracker before the next attempt.
    RateLimited { wait_ms: u64 },
    /// Connect in flight. `attempt` is the 0-based retry count.
    Connecting { attempt: u32 },
    Connected,
    /// The upstream session ended on its own.
    Disconnected,
    Failed { kind: ErrorKind },
    /// A retry is scheduled `delay_ms` from when the state was entered.
    Retrying { attempt: u32, delay_ms: u64 },
    /// Retries exhausted; needs a fresh explicit start.
    Abandoned,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::RateLimited { .. } => "rate_limited",
            Self::Connecting { .. } => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Failed { .. } => "failed",
            Self::Retrying { .. } => "retrying",
            Self::Abandoned => "abandoned",
        }
    }

    /// States in which an attempt chain is still in progress.
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Connecting { .. } | Self::Failed { .. } | Self::Retrying { .. }
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
