// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: a scriptable upstream connector and builders.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::control::{ConnectionController, ControlSettings};
use crate::events::Broadcaster;
use crate::identifier::StreamIdentifier;
use crate::state::RelayState;
use crate::upstream::{RawEvent, RawUpstreamError, UpstreamConnector, UpstreamLink};

/// What one `connect` call on a [`MockConnector`] does.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    Connect,
    Fail(RawUpstreamError),
}

/// The far end of a link handed out by a [`MockConnector`].
#[derive(Debug, Clone)]
pub struct MockLink {
    pub identifier: StreamIdentifier,
    pub events: mpsc::Sender<RawEvent>,
    pub cancel: CancellationToken,
}

/// Connector whose outcomes are scripted per call.
///
/// Outcomes are consumed in order; once the script runs out every call gets
/// the fallback outcome.
pub struct MockConnector {
    script: Mutex<VecDeque<MockOutcome>>,
    fallback: MockOutcome,
    latency: Duration,
    attempts: AtomicUsize,
    links: Mutex<Vec<MockLink>>,
}

impl MockConnector {
    /// Every call connects.
    pub fn connecting() -> Self {
        Self::with_fallback(MockOutcome::Connect)
    }

    /// Every call fails with `error`.
    pub fn failing(error: RawUpstreamError) -> Self {
        Self::with_fallback(MockOutcome::Fail(error))
    }

    fn with_fallback(fallback: MockOutcome) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            latency: Duration::ZERO,
            attempts: AtomicUsize::new(0),
            links: Mutex::new(Vec::new()),
        }
    }

    /// Queue outcomes ahead of the fallback.
    pub fn script(self, outcomes: impl IntoIterator<Item = MockOutcome>) -> Self {
        self.script.lock().extend(outcomes);
        self
    }

    /// Delay every call by `latency` before resolving.
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of `connect` calls so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn links(&self) -> Vec<MockLink> {
        self.links.lock().clone()
    }

    pub fn last_link(&self) -> Option<MockLink> {
        self.links.lock().last().cloned()
    }

    fn next_outcome(&self) -> MockOutcome {
        self.script.lock().pop_front().unwrap_or_else(|| self.fallback.clone())
    }
}

impl UpstreamConnector for MockConnector {
    fn connect<'a>(
        &'a self,
        identifier: &'a StreamIdentifier,
    ) -> BoxFuture<'a, Result<UpstreamLink, RawUpstreamError>> {
        Box::pin(async move {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            match self.next_outcome() {
                MockOutcome::Fail(error) => Err(error),
                MockOutcome::Connect => {
                    let (tx, rx) = mpsc::channel(64);
                    let cancel = CancellationToken::new();
                    self.links.lock().push(MockLink {
                        identifier: identifier.clone(),
                        events: tx,
                        cancel: cancel.clone(),
                    });
                    Ok(UpstreamLink { events: rx, cancel })
                }
            }
        })
    }
}

/// Settings with no settle delay, for tests that don't exercise it.
pub fn quick_settings() -> ControlSettings {
    ControlSettings { settle_delay: Duration::ZERO, ..ControlSettings::default() }
}

/// Controller wired to `connector` with a fresh broadcaster.
pub fn controller(
    connector: Arc<MockConnector>,
    settings: ControlSettings,
) -> (Arc<ConnectionController>, Arc<Broadcaster>, CancellationToken) {
    let broadcaster = Arc::new(Broadcaster::new());
    let shutdown = CancellationToken::new();
    let controller =
        ConnectionController::new(connector, Arc::clone(&broadcaster), settings, shutdown.clone());
    (controller, broadcaster, shutdown)
}

/// Full relay state around `connector`, as the HTTP layer sees it.
pub fn relay_state(connector: Arc<MockConnector>, settings: ControlSettings) -> Arc<RelayState> {
    let (controller, broadcaster, shutdown) = controller(connector, settings);
    Arc::new(RelayState::new(controller, broadcaster, shutdown))
}

pub fn ident(raw: &str) -> anyhow::Result<StreamIdentifier> {
    StreamIdentifier::parse(raw).ok_or_else(|| anyhow::anyhow!("invalid identifier {raw:?}"))
}
