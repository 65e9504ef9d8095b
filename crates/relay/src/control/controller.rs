// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection controller: the single entry point for starting and stopping
//! upstream sessions.
//!
//! Registry, tracker, and per-identifier state live behind one lock that is
//! only held for bookkeeping, never across the settle delay or the upstream
//! connect. Each identifier progresses independently.

use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use crate::control::registry::{SessionEntry, SessionRegistry};
use crate::control::retry;
use crate::control::state::ConnectionState;
use crate::control::tracker::{RateLimitRecord, RateLimitTracker, MIN_DELAY_BETWEEN_ATTEMPTS};
use crate::error::StartError;
use crate::events::Broadcaster;
use crate::identifier::StreamIdentifier;
use crate::upstream::adapter::SessionClient;
use crate::upstream::classify::{classify, ClassifiedError, ErrorKind};
use crate::upstream::UpstreamConnector;

/// Default retry budget for automatic chains.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default settle delay before the first attempt of a chain.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(1000);

/// Controller tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlSettings {
    pub max_retries: u32,
    pub min_attempt_gap: Duration,
    pub settle_delay: Duration,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            min_attempt_gap: MIN_DELAY_BETWEEN_ATTEMPTS,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

/// State carried by one automatic attempt chain.
#[derive(Debug, Clone)]
pub struct RetryContext {
    pub identifier: StreamIdentifier,
    pub retry_count: u32,
    pub max_retries: u32,
    /// Registry generation the chain was started under.
    pub generation: u64,
    pub last_error: Option<ClassifiedError>,
}

struct Inner {
    registry: SessionRegistry,
    tracker: RateLimitTracker,
    states: IndexMap<StreamIdentifier, ConnectionState>,
}

impl Inner {
    fn set_state(&mut self, identifier: &StreamIdentifier, next: ConnectionState) {
        let prev = self.states.insert(identifier.clone(), next);
        if prev != Some(next) {
            tracing::debug!(
                identifier = %identifier,
                prev = prev.map(|s| s.as_str()).unwrap_or("none"),
                next = %next,
                "connection state changed"
            );
        }
    }

    /// Drop everything the controller holds for an identifier with no session
    /// and no pending attempt. Outstanding timers for it become stale.
    fn release(&mut self, identifier: &StreamIdentifier) {
        self.registry.forget(identifier);
        if let Some(prev) = self.states.shift_remove(identifier) {
            tracing::debug!(identifier = %identifier, prev = %prev, "connection state released");
        }
    }
}

pub struct ConnectionController {
    inner: Mutex<Inner>,
    connector: Arc<dyn UpstreamConnector>,
    broadcaster: Arc<Broadcaster>,
    settings: ControlSettings,
    shutdown: CancellationToken,
}

impl ConnectionController {
    pub fn new(
        connector: Arc<dyn UpstreamConnector>,
        broadcaster: Arc<Broadcaster>,
        settings: ControlSettings,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                registry: SessionRegistry::new(),
                tracker: RateLimitTracker::new(settings.min_attempt_gap),
                states: IndexMap::new(),
            }),
            connector,
            broadcaster,
            settings,
            shutdown,
        })
    }

    /// Explicit start: a single attempt whose outcome is reported to the caller.
    ///
    /// Any existing session for the identifier is replaced and any pending
    /// automatic retry is superseded. Failures leave the identifier idle and
    /// untracked.
    pub async fn start_session(
        self: &Arc<Self>,
        identifier: &StreamIdentifier,
    ) -> Result<(), StartError> {
        let generation = {
            let mut inner = self.inner.lock().await;
            if self.shutdown.is_cancelled() {
                return Err(StartError::ShuttingDown);
            }
            let now = Instant::now();
            inner.tracker.prune(now);
            let check = inner.tracker.can_attempt(identifier, now);
            if !check.allowed {
                tracing::info!(identifier = %identifier, wait_ms = check.wait_ms(), "start refused by rate limiting");
                return Err(StartError::Throttled { wait_ms: check.wait_ms() });
            }
            inner.tracker.record_attempt(identifier, now);
            let generation = inner.registry.bump(identifier);
            if let Some(old) = inner.registry.remove(identifier) {
                tracing::info!(identifier = %identifier, "replacing existing session");
                old.client.disconnect();
            }
            inner.set_state(identifier, ConnectionState::Connecting { attempt: 0 });
            generation
        };

        let error = match self.connect_once(identifier, generation, 0).await {
            Ok(()) => return Ok(()),
            Err(StartError::Upstream(error)) => error,
            Err(other) => return Err(other),
        };
        tracing::warn!(identifier = %identifier, kind = %error.kind, err = %error.message, "start failed");

        let mut inner = self.inner.lock().await;
        if inner.registry.is_current(identifier, generation) {
            inner.release(identifier);
        }
        if error.kind == ErrorKind::RateLimited {
            let backoff = retry::rate_limit_backoff(0, error.retry_after_ms);
            inner.tracker.apply_backoff(identifier, Instant::now(), backoff);
            tracing::warn!(identifier = %identifier, backoff_ms = backoff.as_millis() as u64, "upstream rate limiting detected, backing off");
            return Err(StartError::RateLimited { backoff_ms: backoff.as_millis() as u64, error });
        }
        Err(StartError::Upstream(error))
    }

    /// Automatic start: a background chain with bounded retries.
    ///
    /// Returns the generation the chain runs under. Failures never escape the
    /// chain; they are logged and either retried or abandoned.
    pub async fn spawn_auto_start(self: &Arc<Self>, identifier: StreamIdentifier) -> u64 {
        let generation = self.inner.lock().await.registry.bump(&identifier);
        tracing::info!(identifier = %identifier, "starting automatic connection");
        let ctx = RetryContext {
            identifier,
            retry_count: 0,
            max_retries: self.settings.max_retries,
            generation,
            last_error: None,
        };
        self.schedule_attempt(ctx, Duration::ZERO);
        generation
    }

    /// Stop relaying `identifier`. Returns `false` when no session was registered.
    ///
    /// Always supersedes pending retries for the identifier, even when there
    /// was nothing to disconnect. Afterwards the controller holds no
    /// generation or state for it.
    pub async fn stop_session(&self, identifier: &StreamIdentifier) -> bool {
        let mut inner = self.inner.lock().await;
        inner.tracker.prune(Instant::now());
        let pending = inner.states.get(identifier).is_some_and(ConnectionState::is_pending);
        let entry = inner.registry.remove(identifier);
        inner.release(identifier);
        drop(inner);

        match entry {
            Some(entry) => {
                entry.client.disconnect();
                self.broadcaster.forget(identifier);
                tracing::info!(identifier = %identifier, "stopped listening");
                true
            }
            None => {
                if pending {
                    tracing::info!(identifier = %identifier, "cancelled pending connection attempts");
                }
                false
            }
        }
    }

    /// Identifiers with a registered session, in registration order.
    pub async fn list_active(&self) -> Vec<StreamIdentifier> {
        self.inner.lock().await.registry.identifiers()
    }

    pub async fn state(&self, identifier: &StreamIdentifier) -> ConnectionState {
        self.inner.lock().await.states.get(identifier).copied().unwrap_or(ConnectionState::Idle)
    }

    /// Every identifier the controller has seen, with its current state.
    pub async fn states(&self) -> Vec<(StreamIdentifier, ConnectionState)> {
        let inner = self.inner.lock().await;
        inner.states.iter().map(|(id, state)| (id.clone(), *state)).collect()
    }

    pub async fn rate_limit_record(&self, identifier: &StreamIdentifier) -> Option<RateLimitRecord> {
        self.inner.lock().await.tracker.record(identifier)
    }

    /// Disconnect every session. Pending retries are superseded.
    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        let drained = inner.registry.drain();
        for entry in &drained {
            entry.client.disconnect();
            inner.release(&entry.identifier);
        }
        tracing::info!(sessions = drained.len(), "disconnected all upstream sessions");
    }

    fn schedule_attempt(self: &Arc<Self>, ctx: RetryContext, delay: Duration) {
        let this = Arc::clone(self);
        retry::schedule(delay, &self.shutdown, this.run_attempt(ctx));
    }

    /// One step of an automatic chain. Re-validates its generation first so a
    /// superseded timer is a no-op.
    async fn run_attempt(self: Arc<Self>, mut ctx: RetryContext) {
        let identifier = ctx.identifier.clone();
        {
            let mut inner = self.inner.lock().await;
            if !inner.registry.is_current(&identifier, ctx.generation) {
                tracing::debug!(identifier = %identifier, "attempt superseded, dropping");
                return;
            }
            let now = Instant::now();
            let check = inner.tracker.can_attempt(&identifier, now);
            if !check.allowed {
                inner.set_state(&identifier, ConnectionState::RateLimited { wait_ms: check.wait_ms() });
                drop(inner);
                tracing::info!(identifier = %identifier, wait_ms = check.wait_ms(), "rate limiting active, deferring attempt");
                self.schedule_attempt(ctx, check.wait);
                return;
            }
            inner.tracker.record_attempt(&identifier, now);
            if let Some(old) = inner.registry.remove(&identifier) {
                old.client.disconnect();
            }
        }

        let error = match self.connect_once(&identifier, ctx.generation, ctx.retry_count).await {
            Ok(()) => return,
            Err(StartError::Upstream(error)) => error,
            Err(other) => {
                tracing::debug!(identifier = %identifier, reason = %other, "attempt chain ended");
                return;
            }
        };
        tracing::warn!(
            identifier = %identifier,
            kind = %error.kind,
            err = %error.message,
            retry = ctx.retry_count,
            "connection attempt failed"
        );
        if error.kind == ErrorKind::InitialFetchFailure {
            tracing::warn!(identifier = %identifier, "live data unavailable: not live right now, or the name is misspelled");
        }

        let mut inner = self.inner.lock().await;
        if !inner.registry.is_current(&identifier, ctx.generation) {
            return;
        }
        if error.kind == ErrorKind::RateLimited {
            let backoff = retry::rate_limit_backoff(ctx.retry_count, error.retry_after_ms);
            inner.tracker.apply_backoff(&identifier, Instant::now(), backoff);
            tracing::warn!(identifier = %identifier, backoff_ms = backoff.as_millis() as u64, "upstream rate limiting detected, backing off");
        }

        if ctx.retry_count < ctx.max_retries {
            let delay = retry::compute_delay(ctx.retry_count, error.retry_after_ms);
            let delay_ms = delay.as_millis() as u64;
            if let Some(hint) = error.retry_after_ms {
                tracing::info!(identifier = %identifier, suggested_ms = hint, "upstream suggested a retry delay");
            }
            ctx.retry_count += 1;
            ctx.last_error = Some(error);
            inner.set_state(&identifier, ConnectionState::Retrying { attempt: ctx.retry_count, delay_ms });
            drop(inner);
            tracing::info!(
                identifier = %identifier,
                attempt = ctx.retry_count,
                max_retries = ctx.max_retries,
                delay_ms,
                "retry scheduled"
            );
            self.schedule_attempt(ctx, delay);
        } else {
            inner.tracker.clear(&identifier);
            inner.registry.forget(&identifier);
            inner.set_state(&identifier, ConnectionState::Abandoned);
            drop(inner);
            tracing::error!(
                identifier = %identifier,
                attempts = ctx.retry_count + 1,
                "giving up; the relay keeps running and the session can be started through the API"
            );
        }
    }

    /// Settle (first attempt only), connect, and register the session if this
    /// attempt is still the current one for the identifier.
    async fn connect_once(
        self: &Arc<Self>,
        identifier: &StreamIdentifier,
        generation: u64,
        retry_count: u32,
    ) -> Result<(), StartError> {
        if retry_count == 0 && !self.settings.settle_delay.is_zero() {
            tracing::debug!(
                identifier = %identifier,
                delay_ms = self.settings.settle_delay.as_millis() as u64,
                "settling before first attempt"
            );
            tokio::select! {
                _ = self.shutdown.cancelled() => return Err(StartError::ShuttingDown),
                _ = tokio::time::sleep(self.settings.settle_delay) => {}
            }
        }

        {
            let mut inner = self.inner.lock().await;
            if !inner.registry.is_current(identifier, generation) {
                return Err(StartError::Superseded);
            }
            inner.set_state(identifier, ConnectionState::Connecting { attempt: retry_count });
        }

        let link = match self.connector.connect(identifier).await {
            Ok(link) => link,
            Err(raw) => {
                let error = classify(&raw);
                let mut inner = self.inner.lock().await;
                if inner.registry.is_current(identifier, generation) {
                    inner.set_state(identifier, ConnectionState::Failed { kind: error.kind });
                }
                return Err(StartError::Upstream(error));
            }
        };

        let mut inner = self.inner.lock().await;
        if self.shutdown.is_cancelled() {
            link.cancel.cancel();
            return Err(StartError::ShuttingDown);
        }
        if !inner.registry.is_current(identifier, generation) {
            drop(inner);
            tracing::info!(identifier = %identifier, "connect finished after being superseded, closing it");
            link.cancel.cancel();
            return Err(StartError::Superseded);
        }

        self.broadcaster.track(identifier);
        let client = SessionClient::attach(identifier.clone(), link, Arc::clone(&self.broadcaster));
        let closed = client.closed();
        let entry = SessionEntry { identifier: identifier.clone(), client, generation };
        if let Some(stale) = inner.registry.insert(entry) {
            stale.client.disconnect();
        }
        inner.tracker.clear(identifier);
        inner.set_state(identifier, ConnectionState::Connected);
        drop(inner);

        tracing::info!(identifier = %identifier, "listening to live");
        self.watch_session(identifier.clone(), generation, closed);
        Ok(())
    }

    /// Mark the session disconnected when upstream ends it on its own.
    fn watch_session(
        self: &Arc<Self>,
        identifier: StreamIdentifier,
        generation: u64,
        closed: WaitForCancellationFutureOwned,
    ) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            closed.await;
            let mut inner = this.inner.lock().await;
            let ours = inner.registry.get(&identifier).is_some_and(|e| e.generation == generation);
            if ours && inner.states.get(&identifier) == Some(&ConnectionState::Connected) {
                inner.set_state(&identifier, ConnectionState::Disconnected);
                tracing::info!(identifier = %identifier, "upstream session ended");
            }
        });
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
