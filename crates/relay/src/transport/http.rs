// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for the control surface.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::control::ConnectionState;
use crate::error::{RelayError, StartError};
use crate::identifier::StreamIdentifier;
use crate::state::RelayState;
use crate::upstream::classify::ErrorKind;

// -- Request/Response types ---------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub active_connections: usize,
}

/// Body of start and stop requests. `uniqueId` is accepted for older clients.
#[derive(Debug, Default, Deserialize)]
pub struct IdentifierRequest {
    #[serde(default, alias = "uniqueId")]
    pub identifier: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<StreamIdentifier>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitedResponse {
    pub error: String,
    pub message: String,
    pub retry_after_ms: u64,
    pub identifier: StreamIdentifier,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartFailureResponse {
    pub error: String,
    pub details: String,
    pub error_kind: ErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub suggestions: Vec<String>,
    pub identifier: StreamIdentifier,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveResponse {
    pub active_connections: Vec<StreamIdentifier>,
}

#[derive(Debug, Serialize)]
pub struct StateEntry {
    pub identifier: StreamIdentifier,
    #[serde(flatten)]
    pub state: ConnectionState,
}

#[derive(Debug, Serialize)]
pub struct StatesResponse {
    pub states: Vec<StateEntry>,
}

// -- Handlers -----------------------------------------------------------------

/// `GET /health`, `GET /api/v1/health`
pub async fn health(State(s): State<Arc<RelayState>>) -> impl IntoResponse {
    let active = s.controller.list_active().await;
    Json(HealthResponse {
        status: "ok".to_owned(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        active_connections: active.len(),
    })
}

/// `POST /api/v1/live/start`: explicit single-attempt start.
pub async fn start(
    State(s): State<Arc<RelayState>>,
    Json(req): Json<IdentifierRequest>,
) -> Response {
    let Some(identifier) = req.identifier.as_deref().and_then(StreamIdentifier::parse) else {
        return RelayError::BadRequest.to_http_response("identifier is required").into_response();
    };

    match s.controller.start_session(&identifier).await {
        Ok(()) => Json(SuccessResponse {
            success: true,
            message: format!("Started listening to @{identifier}"),
            identifier: Some(identifier),
        })
        .into_response(),
        Err(e) => start_failure(identifier, e),
    }
}

fn start_failure(identifier: StreamIdentifier, err: StartError) -> Response {
    let code = err.code();
    match err {
        StartError::Throttled { wait_ms } => (
            code.status_code(),
            Json(RateLimitedResponse {
                error: "Rate limited".to_owned(),
                message: format!(
                    "Too many connection attempts for @{identifier}; wait {}s before trying again",
                    wait_ms.div_ceil(1000)
                ),
                retry_after_ms: wait_ms,
                identifier,
            }),
        )
            .into_response(),
        StartError::RateLimited { backoff_ms, error } => (
            code.status_code(),
            Json(RateLimitedResponse {
                error: error.user_message().to_owned(),
                message: error.message,
                retry_after_ms: backoff_ms,
                identifier,
            }),
        )
            .into_response(),
        StartError::Upstream(error) => {
            let suggestions = error.suggestions(identifier.as_str());
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(StartFailureResponse {
                    error: error.user_message().to_owned(),
                    details: error.message,
                    error_kind: error.kind,
                    retry_after_ms: error.retry_after_ms,
                    suggestions,
                    identifier,
                }),
            )
                .into_response()
        }
        StartError::Superseded | StartError::ShuttingDown => {
            code.to_http_response(err.to_string()).into_response()
        }
    }
}

/// `POST /api/v1/live/stop`
pub async fn stop(
    State(s): State<Arc<RelayState>>,
    Json(req): Json<IdentifierRequest>,
) -> Response {
    let Some(identifier) = req.identifier.as_deref().and_then(StreamIdentifier::parse) else {
        return RelayError::BadRequest.to_http_response("identifier is required").into_response();
    };

    if s.controller.stop_session(&identifier).await {
        Json(SuccessResponse {
            success: true,
            message: format!("Stopped listening to @{identifier}"),
            identifier: None,
        })
        .into_response()
    } else {
        RelayError::NotFound
            .to_http_response(format!("No active connection for @{identifier}"))
            .into_response()
    }
}

/// `GET /api/v1/live/active`
pub async fn active(State(s): State<Arc<RelayState>>) -> impl IntoResponse {
    Json(ActiveResponse { active_connections: s.controller.list_active().await })
}

/// `GET /api/v1/live/states`
pub async fn states(State(s): State<Arc<RelayState>>) -> impl IntoResponse {
    let states = s
        .controller
        .states()
        .await
        .into_iter()
        .map(|(identifier, state)| StateEntry { identifier, state })
        .collect();
    Json(StatesResponse { states })
}
