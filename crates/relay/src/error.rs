// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::upstream::classify::ClassifiedError;

/// Error codes for the relay control API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelayError {
    BadRequest,
    NotFound,
    RateLimited,
    Conflict,
    UpstreamError,
    Unavailable,
    Internal,
}

impl RelayError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::NotFound => 404,
            Self::RateLimited => 429,
            Self::Conflict => 409,
            Self::UpstreamError => 500,
            Self::Unavailable => 503,
            Self::Internal => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::NotFound => "NOT_FOUND",
            Self::RateLimited => "RATE_LIMITED",
            Self::Conflict => "CONFLICT",
            Self::UpstreamError => "UPSTREAM_ERROR",
            Self::Unavailable => "UNAVAILABLE",
            Self::Internal => "INTERNAL",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn to_error_body(&self, message: impl Into<String>) -> ErrorResponse {
        ErrorResponse { error: message.into(), code: self.as_str().to_owned() }
    }

    pub fn to_http_response(
        &self,
        message: impl Into<String>,
    ) -> (StatusCode, Json<ErrorResponse>) {
        (self.status_code(), Json(self.to_error_body(message)))
    }
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flat error envelope: human-readable `error` plus machine-readable `code`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Why a start request did not produce a registered session.
#[derive(Debug, Clone, PartialEq)]
pub enum StartError {
    /// The local rate-limit tracker refused the attempt.
    Throttled { wait_ms: u64 },
    /// Upstream reported rate limiting; a backoff of `backoff_ms` was applied.
    RateLimited { backoff_ms: u64, error: ClassifiedError },
    /// Upstream refused or failed the connection.
    Upstream(ClassifiedError),
    /// A newer start or a stop for the same identifier took over while connecting.
    Superseded,
    /// The relay is shutting down.
    ShuttingDown,
}

impl StartError {
    /// API error code this outcome maps to.
    pub fn code(&self) -> RelayError {
        match self {
            Self::Throttled { .. } | Self::RateLimited { .. } => RelayError::RateLimited,
            Self::Upstream(_) => RelayError::UpstreamError,
            Self::Superseded => RelayError::Conflict,
            Self::ShuttingDown => RelayError::Unavailable,
        }
    }
}

impl fmt::Display for StartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Throttled { wait_ms } => write!(f, "rate limiting active, retry in {wait_ms}ms"),
            Self::RateLimited { backoff_ms, error } => {
                write!(f, "{error} (backing off {backoff_ms}ms)")
            }
            Self::Upstream(error) => write!(f, "{error}"),
            Self::Superseded => f.write_str("superseded by a newer request"),
            Self::ShuttingDown => f.write_str("relay is shutting down"),
        }
    }
}

impl std::error::Error for StartError {}
