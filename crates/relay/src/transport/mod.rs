// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP control surface and WebSocket push channel.
//!
//! The two are served on separate listeners and share one [`RelayState`].

pub mod http;
pub mod ws;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::RelayState;

/// Build the control-surface `Router`.
pub fn build_router(state: Arc<RelayState>) -> Router {
    Router::new()
        // Health
        .route("/health", get(http::health))
        .route("/api/v1/health", get(http::health))
        // Session control
        .route("/api/v1/live/start", post(http::start))
        .route("/api/v1/live/stop", post(http::stop))
        .route("/api/v1/live/active", get(http::active))
        .route("/api/v1/live/states", get(http::states))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Build the push-channel `Router`: any upgrade on `/` or `/ws` joins the feed.
pub fn build_push_router(state: Arc<RelayState>) -> Router {
    Router::new()
        .route("/", get(ws::ws_handler))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
}
