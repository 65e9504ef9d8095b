// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::control::ConnectionController;
use crate::events::Broadcaster;

/// Shared state for both the control surface and the push channel.
pub struct RelayState {
    pub controller: Arc<ConnectionController>,
    pub broadcaster: Arc<Broadcaster>,
    pub shutdown: CancellationToken,
}

impl RelayState {
    pub fn new(
        controller: Arc<ConnectionController>,
        broadcaster: Arc<Broadcaster>,
        shutdown: CancellationToken,
    ) -> Self {
        Self { controller, broadcaster, shutdown }
    }
}
