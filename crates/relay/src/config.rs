// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use crate::control::ControlSettings;

/// Configuration for the live relay.
#[derive(Debug, Clone, clap::Args)]
pub struct RelayConfig {
    /// Host to bind both listeners on.
    #[arg(long, default_value = "0.0.0.0", env = "RELAY_HOST")]
    pub host: String,

    /// Port for the HTTP control surface.
    #[arg(long, default_value_t = 3001, env = "RELAY_PORT")]
    pub port: u16,

    /// Port for the viewer push channel (WebSocket).
    #[arg(long, default_value_t = 3002, env = "RELAY_WS_PORT")]
    pub ws_port: u16,

    /// Live identifier to start listening to at boot (with automatic retries).
    #[arg(long, env = "RELAY_DEFAULT_IDENTIFIER")]
    pub default_identifier: Option<String>,

    /// Base URL of the upstream webcast gateway.
    #[arg(long, default_value = "http://127.0.0.1:8790", env = "RELAY_UPSTREAM_URL")]
    pub upstream_url: String,

    /// Signing/API key forwarded to the upstream gateway.
    #[arg(long, env = "RELAY_UPSTREAM_API_KEY")]
    pub api_key: Option<String>,

    /// Retry budget for automatic connection chains.
    #[arg(long, default_value_t = 5, env = "RELAY_MAX_RETRIES")]
    pub max_retries: u32,

    /// Minimum gap between two connection attempts for the same identifier, in milliseconds.
    #[arg(long, default_value_t = 2000, env = "RELAY_MIN_ATTEMPT_GAP_MS")]
    pub min_attempt_gap_ms: u64,

    /// Settle delay before the first connection attempt of a chain, in milliseconds.
    #[arg(long, default_value_t = 1000, env = "RELAY_SETTLE_MS")]
    pub settle_ms: u64,

    /// Upstream connect timeout in milliseconds.
    #[arg(long, default_value_t = 15000, env = "RELAY_CONNECT_TIMEOUT_MS")]
    pub connect_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "RELAY_LOG_LEVEL")]
    pub log_level: String,

    /// Log format (text or json).
    #[arg(long, default_value = "text", env = "RELAY_LOG_FORMAT")]
    pub log_format: String,
}

impl RelayConfig {
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn push_addr(&self) -> String {
        format!("{}:{}", self.host, self.ws_port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn control_settings(&self) -> ControlSettings {
        ControlSettings {
            max_retries: self.max_retries,
            min_attempt_gap: Duration::from_millis(self.min_attempt_gap_ms),
            settle_delay: Duration::from_millis(self.settle_ms),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
