// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Classification of raw upstream failures.
//!
//! Providers report failures inconsistently: the real error may sit under an
//! `exception` wrapper, a type name may or may not be present, and a retry
//! hint may appear at either level. [`classify`] reduces all of that to a
//! [`ClassifiedError`] once; nothing downstream inspects raw shapes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A retry hint above this is treated as a rate-limit signal on its own.
pub const RATE_LIMIT_HINT_THRESHOLD_MS: u64 = 5000;

/// Failure as reported by an upstream provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawUpstreamError {
    pub message: Option<String>,
    /// Type name of the error (e.g. `InitialFetchError`).
    pub name: Option<String>,
    /// Explicit kind label, when the provider sets one.
    pub kind: Option<String>,
    #[serde(alias = "retryAfter")]
    pub retry_after_ms: Option<u64>,
    pub stack: Option<String>,
    /// Wrapped underlying error.
    pub exception: Option<WrappedError>,
}

/// Contents of an `exception` wrapper: a nested error or a bare message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WrappedError {
    Error(Box<RawUpstreamError>),
    Text(String),
}

impl RawUpstreamError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: Some(message.into()), ..Self::default() }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_retry_after_ms(mut self, ms: u64) -> Self {
        self.retry_after_ms = Some(ms);
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn wrapping(mut self, inner: RawUpstreamError) -> Self {
        self.exception = Some(WrappedError::Error(Box::new(inner)));
        self
    }

    fn nested(&self) -> Option<&RawUpstreamError> {
        match self.exception {
            Some(WrappedError::Error(ref inner)) => Some(inner),
            _ => None,
        }
    }

    fn nested_text(&self) -> Option<&str> {
        match self.exception {
            Some(WrappedError::Text(ref text)) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for RawUpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message.as_deref().unwrap_or("unknown upstream error"))
    }
}

impl std::error::Error for RawUpstreamError {}

/// Closed set of upstream failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RateLimited,
    InitialFetchFailure,
    NotFound,
    Timeout,
    Unknown,
}

impl ErrorKind {
    /// Wire-format string for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::InitialFetchFailure => "initial_fetch_failure",
            Self::NotFound => "not_found",
            Self::Timeout => "timeout",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upstream failure after classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), retry_after_ms: None }
    }

    /// Short user-facing summary for this failure.
    pub fn user_message(&self) -> &'static str {
        match self.kind {
            ErrorKind::RateLimited => "Upstream is rate limiting requests",
            ErrorKind::InitialFetchFailure => "Could not retrieve the live data",
            ErrorKind::NotFound => "User not found",
            ErrorKind::Timeout => "Connection timeout",
            ErrorKind::Unknown => "Failed to start listening",
        }
    }

    /// Hints for the caller on how to get the start to succeed.
    pub fn suggestions(&self, identifier: &str) -> Vec<String> {
        let mut out = match self.kind {
            ErrorKind::InitialFetchFailure => vec![
                format!("Check that \"{identifier}\" is currently live"),
                format!("Check that the username \"{identifier}\" is spelled correctly (without the @)"),
                "Make sure the live is publicly accessible".to_owned(),
                "If the live just started, wait a few seconds and try again".to_owned(),
            ],
            ErrorKind::NotFound => vec![
                format!("The username \"{identifier}\" does not exist or is incorrect"),
                "Check the spelling of the username (without the @)".to_owned(),
            ],
            ErrorKind::Timeout => vec![
                "The connection to the upstream provider expired".to_owned(),
                "Check the network connection".to_owned(),
                "Try again in a few moments".to_owned(),
            ],
            ErrorKind::RateLimited | ErrorKind::Unknown => vec![],
        };
        if self.kind == ErrorKind::InitialFetchFailure {
            if let Some(ms) = self.retry_after_ms {
                out.push(format!("Upstream suggests waiting {} second(s) before retrying", ms.div_ceil(1000)));
            }
        }
        out
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ClassifiedError {}

/// Classify a raw upstream failure.
///
/// Kind resolution order: explicit `kind` label, rate-limit signals (message
/// pattern or a retry hint above [`RATE_LIMIT_HINT_THRESHOLD_MS`]), type name
/// (nested before outer), message text, stack text, then `Unknown`.
/// Message and retry hint both prefer the nested error over the wrapper.
pub fn classify(raw: &RawUpstreamError) -> ClassifiedError {
    let nested = raw.nested();

    let message = nested
        .and_then(|n| n.message.clone())
        .or_else(|| raw.nested_text().map(str::to_owned))
        .or_else(|| raw.message.clone())
        .unwrap_or_else(|| "unknown upstream error".to_owned());

    let retry_after_ms = nested
        .and_then(|n| n.retry_after_ms)
        .filter(|ms| *ms > 0)
        .or(raw.retry_after_ms.filter(|ms| *ms > 0));

    let outer_message = raw.message.as_deref().unwrap_or_default();
    let kind = [raw.kind.as_deref(), nested.and_then(|n| n.kind.as_deref())]
        .into_iter()
        .flatten()
        .find_map(kind_from_label)
        .or_else(|| {
            let hinted = retry_after_ms.is_some_and(|ms| ms > RATE_LIMIT_HINT_THRESHOLD_MS);
            (hinted || is_rate_limit_text(&message) || is_rate_limit_text(outer_message))
                .then_some(ErrorKind::RateLimited)
        })
        .or_else(|| {
            [nested.and_then(|n| n.name.as_deref()), raw.name.as_deref()]
                .into_iter()
                .flatten()
                .find_map(kind_from_label)
        })
        .or_else(|| kind_from_text(&message))
        .or_else(|| kind_from_text(outer_message))
        .or_else(|| {
            [nested.and_then(|n| n.stack.as_deref()), raw.stack.as_deref()]
                .into_iter()
                .flatten()
                .find_map(kind_from_stack)
        })
        .unwrap_or(ErrorKind::Unknown);

    ClassifiedError { kind, message, retry_after_ms }
}

/// Map an explicit kind label or an error type name to a kind.
fn kind_from_label(label: &str) -> Option<ErrorKind> {
    let squashed: String = label
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if squashed.contains("ratelimit") || squashed.contains("toomanyrequests") {
        Some(ErrorKind::RateLimited)
    } else if squashed.contains("initialfetch") {
        Some(ErrorKind::InitialFetchFailure)
    } else if squashed.contains("notfound")
        || squashed.contains("invaliduser")
        || squashed.contains("invaliduniqueid")
    {
        Some(ErrorKind::NotFound)
    } else if squashed.contains("timeout") || squashed.contains("timedout") {
        Some(ErrorKind::Timeout)
    } else {
        None
    }
}

fn is_rate_limit_text(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("rate limit")
        || lower.contains("rate_limit")
        || lower.contains("too many requests")
        || lower.contains("429")
}

fn kind_from_text(text: &str) -> Option<ErrorKind> {
    let lower = text.to_lowercase();
    if lower.contains("failed to retrieve the initial room data") {
        Some(ErrorKind::InitialFetchFailure)
    } else if lower.contains("user not found") || lower.contains("invalid user") {
        Some(ErrorKind::NotFound)
    } else if lower.contains("timeout") || lower.contains("timed out") {
        Some(ErrorKind::Timeout)
    } else {
        None
    }
}

/// Stack traces lead with `TypeName: message`; try the type name, then the text.
fn kind_from_stack(stack: &str) -> Option<ErrorKind> {
    let head = stack.lines().next().unwrap_or_default();
    let type_name = head.split(':').next().unwrap_or_default();
    kind_from_label(type_name)
        .or_else(|| is_rate_limit_text(stack).then_some(ErrorKind::RateLimited))
        .or_else(|| kind_from_text(stack))
}

#[cfg(test)]
#[path = "classify_tests.rs"]
mod tests;
