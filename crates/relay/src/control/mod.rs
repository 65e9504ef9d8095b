// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection lifecycle: rate limiting, retry scheduling, the session
//! registry, and the controller that ties them together.

pub mod controller;
pub mod registry;
pub mod retry;
pub mod state;
pub mod tracker;

pub use controller::{ConnectionController, ControlSettings, RetryContext};
pub use state::ConnectionState;
