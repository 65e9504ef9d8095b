// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Normalized key naming one live session.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of one upstream live session.
///
/// Construction normalizes the raw input: surrounding whitespace and any
/// leading `@` are stripped and the handle is lowercased, so `" @Alice"` and
/// `"alice"` name the same session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StreamIdentifier(String);

impl StreamIdentifier {
    /// Normalize `raw` into an identifier. Returns `None` when nothing is left.
    pub fn parse(raw: &str) -> Option<Self> {
        let handle = raw.trim().trim_start_matches('@').trim();
        if handle.is_empty() {
            return None;
        }
        Some(Self(handle.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StreamIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for StreamIdentifier {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw).ok_or_else(|| format!("invalid stream identifier: {raw:?}"))
    }
}

impl From<StreamIdentifier> for String {
    fn from(id: StreamIdentifier) -> Self {
        id.0
    }
}

#[cfg(test)]
#[path = "identifier_tests.rs"]
mod tests;
