// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-identifier attempt bookkeeping that gates new connection attempts.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::identifier::StreamIdentifier;

/// Minimum gap between two attempts for the same identifier.
pub const MIN_DELAY_BETWEEN_ATTEMPTS: Duration = Duration::from_millis(2000);

/// Attempt history for one identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRecord {
    pub last_attempt_at: Instant,
    pub attempt_count: u32,
    /// Set by a rate-limit classification; never earlier than `last_attempt_at`.
    pub backoff_until: Option<Instant>,
}

/// Outcome of [`RateLimitTracker::can_attempt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptCheck {
    pub allowed: bool,
    pub wait: Duration,
}

impl AttemptCheck {
    fn allowed() -> Self {
        Self { allowed: true, wait: Duration::ZERO }
    }

    fn wait(wait: Duration) -> Self {
        Self { allowed: false, wait }
    }

    pub fn wait_ms(&self) -> u64 {
        self.wait.as_millis() as u64
    }
}

/// Pure bookkeeping: no timers, no I/O.
#[derive(Debug)]
pub struct RateLimitTracker {
    min_gap: Duration,
    records: HashMap<StreamIdentifier, RateLimitRecord>,
}

impl RateLimitTracker {
    pub fn new(min_gap: Duration) -> Self {
        Self { min_gap, records: HashMap::new() }
    }

    pub fn can_attempt(&self, identifier: &StreamIdentifier, now: Instant) -> AttemptCheck {
        let Some(record) = self.records.get(identifier) else {
            return AttemptCheck::allowed();
        };

        let since_last = now.saturating_duration_since(record.last_attempt_at);
        if since_last < self.min_gap {
            return AttemptCheck::wait(self.min_gap - since_last);
        }

        match record.backoff_until {
            Some(until) if now < until => AttemptCheck::wait(until - now),
            _ => AttemptCheck::allowed(),
        }
    }

    pub fn record_attempt(&mut self, identifier: &StreamIdentifier, now: Instant) {
        self.records
            .entry(identifier.clone())
            .and_modify(|r| {
                r.last_attempt_at = now;
                r.attempt_count = r.attempt_count.saturating_add(1);
            })
            .or_insert(RateLimitRecord { last_attempt_at: now, attempt_count: 1, backoff_until: None });
    }

    /// Block attempts until `now + duration`. Returns the new deadline.
    pub fn apply_backoff(
        &mut self,
        identifier: &StreamIdentifier,
        now: Instant,
        duration: Duration,
    ) -> Instant {
        let until = now + duration;
        let record = self.records.entry(identifier.clone()).or_insert(RateLimitRecord {
            last_attempt_at: now,
            attempt_count: 0,
            backoff_until: None,
        });
        record.backoff_until = Some(until.max(record.last_attempt_at));
        until
    }

    pub fn clear(&mut self, identifier: &StreamIdentifier) {
        self.records.remove(identifier);
    }

    pub fn record(&self, identifier: &StreamIdentifier) -> Option<RateLimitRecord> {
        self.records.get(identifier).copied()
    }

    /// Drop records that no longer restrict anything at `now`.
    ///
    /// A pruned identifier is admitted exactly as it would have been with its
    /// record in place.
    pub fn prune(&mut self, now: Instant) {
        let min_gap = self.min_gap;
        self.records.retain(|_, r| {
            now.saturating_duration_since(r.last_attempt_at) < min_gap
                || r.backoff_until.is_some_and(|until| now < until)
        });
    }
}

impl Default for RateLimitTracker {
    fn default() -> Self {
        Self::new(MIN_DELAY_BETWEEN_ATTEMPTS)
    }
}

#[cfg(test)]
#[path = "tracker_tests.rs"]
mod tests;
