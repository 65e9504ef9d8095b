// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Liverelay: relays live-stream events from an upstream provider to viewers.

pub mod config;
pub mod control;
pub mod error;
pub mod events;
pub mod feed;
pub mod identifier;
pub mod state;
pub mod test_support;
pub mod transport;
pub mod upstream;
pub mod watch;

use std::future::IntoFuture;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::RelayConfig;
use crate::control::ConnectionController;
use crate::events::Broadcaster;
use crate::identifier::StreamIdentifier;
use crate::state::RelayState;
use crate::transport::{build_push_router, build_router};
use crate::upstream::webcast::WebcastConnector;

/// Run the relay until shutdown.
pub async fn run(config: RelayConfig) -> anyhow::Result<()> {
    let _ = rustls::crypto::ring::default_provider().install_default();

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    let connector = Arc::new(WebcastConnector::new(
        config.upstream_url.clone(),
        config.api_key.clone(),
        config.connect_timeout(),
    )?);
    let broadcaster = Arc::new(Broadcaster::new());
    let controller = ConnectionController::new(
        connector,
        Arc::clone(&broadcaster),
        config.control_settings(),
        shutdown.clone(),
    );
    let state =
        Arc::new(RelayState::new(Arc::clone(&controller), broadcaster, shutdown.clone()));

    let http_listener = TcpListener::bind(config.http_addr()).await?;
    let push_listener = TcpListener::bind(config.push_addr()).await?;
    tracing::info!("control surface listening on {}", http_listener.local_addr()?);
    tracing::info!("push channel listening on {}", push_listener.local_addr()?);
    if config.api_key.is_none() {
        tracing::warn!("no upstream API key configured; upstream may throttle aggressively");
    }

    match config.default_identifier.as_deref().map(StreamIdentifier::parse) {
        Some(Some(identifier)) => {
            controller.spawn_auto_start(identifier).await;
        }
        Some(None) => tracing::warn!("ignoring empty default identifier"),
        None => {}
    }

    let http = axum::serve(http_listener, build_router(Arc::clone(&state)))
        .with_graceful_shutdown(shutdown.clone().cancelled_owned());
    let push = axum::serve(push_listener, build_push_router(state))
        .with_graceful_shutdown(shutdown.clone().cancelled_owned());
    let served = tokio::try_join!(http.into_future(), push.into_future());

    shutdown.cancel();
    controller.shutdown().await;
    served?;
    Ok(())
}

/// Cancel `shutdown` on SIGTERM or SIGINT.
fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
        let mut sigint =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).ok();

        tokio::select! {
            _ = async {
                if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await }
            } => {
                tracing::info!("received SIGTERM");
            }
            _ = async {
                if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await }
            } => {
                tracing::info!("received SIGINT");
            }
            _ = shutdown.cancelled() => return,
        }
        shutdown.cancel();
    });
}
