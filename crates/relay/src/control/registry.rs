// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifier → live session mapping, with per-identifier generations.
//!
//! Every explicit start and automatic chain takes a fresh generation for its
//! identifier; a stop forgets the identifier's generation entirely. Work
//! started under an older generation (a retry timer, a connect still in
//! flight) compares its generation before acting and backs off when it has
//! been superseded, so a stale attempt can never resurrect a stopped session
//! or register a second client.
//!
//! Generations come from one registry-wide counter and are never reused, so a
//! forgotten identifier (which reads as generation 0) cannot be matched by any
//! outstanding work, even after it is started again.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::identifier::StreamIdentifier;
use crate::upstream::adapter::SessionClient;

/// The single active session for an identifier.
pub struct SessionEntry {
    pub identifier: StreamIdentifier,
    pub client: SessionClient,
    pub generation: u64,
}

#[derive(Default)]
pub struct SessionRegistry {
    entries: IndexMap<StreamIdentifier, SessionEntry>,
    generations: HashMap<StreamIdentifier, u64>,
    last_generation: u64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new generation for `identifier`, invalidating older ones.
    pub fn bump(&mut self, identifier: &StreamIdentifier) -> u64 {
        self.last_generation += 1;
        self.generations.insert(identifier.clone(), self.last_generation);
        self.last_generation
    }

    /// Drop the generation for `identifier`, superseding any work still holding one.
    pub fn forget(&mut self, identifier: &StreamIdentifier) {
        self.generations.remove(identifier);
    }

    pub fn generation(&self, identifier: &StreamIdentifier) -> u64 {
        self.generations.get(identifier).copied().unwrap_or(0)
    }

    pub fn is_current(&self, identifier: &StreamIdentifier, generation: u64) -> bool {
        self.generation(identifier) == generation
    }

    /// Insert `entry`, returning whatever it replaced.
    pub fn insert(&mut self, entry: SessionEntry) -> Option<SessionEntry> {
        self.entries.insert(entry.identifier.clone(), entry)
    }

    pub fn remove(&mut self, identifier: &StreamIdentifier) -> Option<SessionEntry> {
        self.entries.shift_remove(identifier)
    }

    pub fn get(&self, identifier: &StreamIdentifier) -> Option<&SessionEntry> {
        self.entries.get(identifier)
    }

    /// Identifiers in registration order.
    pub fn identifiers(&self) -> Vec<StreamIdentifier> {
        self.entries.keys().cloned().collect()
    }

    /// Remove every entry, forgetting each generation.
    pub fn drain(&mut self) -> Vec<SessionEntry> {
        let drained: Vec<SessionEntry> = self.entries.drain(..).map(|(_, e)| e).collect();
        for entry in &drained {
            self.forget(&entry.identifier);
        }
        drained
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
