// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backoff computation and fire-and-forget retry timers.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Base of the exponential backoff.
pub const BASE_DELAY: Duration = Duration::from_millis(1000);

/// Cap on the exponential term and on server-suggested delays.
pub const MAX_DELAY: Duration = Duration::from_millis(60_000);

/// No computed retry fires sooner than this.
pub const MIN_DELAY: Duration = Duration::from_millis(1000);

/// Added on top of a server-suggested delay.
pub const SERVER_HINT_BUFFER: Duration = Duration::from_millis(500);

/// Uniform jitter applied to the exponential term, as a fraction of it.
pub const JITTER_RATIO: f64 = 0.2;

/// Per-retry step of the default rate-limit backoff.
pub const RATE_LIMIT_BACKOFF_STEP: Duration = Duration::from_millis(30_000);

/// Delay before retry number `retry_count` (0-based).
///
/// A positive server hint always wins: `min(hint + 500ms, MAX_DELAY)`.
/// Otherwise `min(BASE_DELAY * 2^retry_count, MAX_DELAY)` with ±20% jitter,
/// floored at [`MIN_DELAY`].
pub fn compute_delay(retry_count: u32, server_suggested_ms: Option<u64>) -> Duration {
    let jitter = rand::rng().random_range(-1.0..=1.0);
    compute_delay_with_jitter(retry_count, server_suggested_ms, jitter)
}

/// [`compute_delay`] with the jitter draw supplied (`-1.0..=1.0`).
pub fn compute_delay_with_jitter(
    retry_count: u32,
    server_suggested_ms: Option<u64>,
    jitter: f64,
) -> Duration {
    let max_ms = MAX_DELAY.as_millis() as u64;
    if let Some(hint) = server_suggested_ms.filter(|ms| *ms > 0) {
        let buffered = hint.saturating_add(SERVER_HINT_BUFFER.as_millis() as u64);
        return Duration::from_millis(buffered.min(max_ms));
    }

    let factor = 1u64.checked_shl(retry_count).unwrap_or(u64::MAX);
    let exponential = (BASE_DELAY.as_millis() as u64).saturating_mul(factor).min(max_ms) as f64;
    let jittered = (exponential + exponential * JITTER_RATIO * jitter.clamp(-1.0, 1.0)).floor();
    Duration::from_millis((jittered as u64).max(MIN_DELAY.as_millis() as u64))
}

/// Backoff applied after a rate-limit classification on retry `retry_count`.
///
/// The larger of the server hint and `30s * (retry_count + 1)`.
pub fn rate_limit_backoff(retry_count: u32, server_suggested_ms: Option<u64>) -> Duration {
    let escalating = RATE_LIMIT_BACKOFF_STEP.saturating_mul(retry_count.saturating_add(1));
    let suggested = Duration::from_millis(server_suggested_ms.unwrap_or(0));
    escalating.max(suggested)
}

/// Run `task` after `delay` without blocking the caller.
///
/// The timer is not cancelled when a newer attempt is scheduled; `task` must
/// re-check that it is still wanted before acting. Shutdown drops it.
pub fn schedule<F>(delay: Duration, shutdown: &CancellationToken, task: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let shutdown = shutdown.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = shutdown.cancelled() => {}
            _ = tokio::time::sleep(delay) => task.await,
        }
    })
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
