// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Viewer-side model of the push channel: a display log plus live counters.

use std::collections::VecDeque;

use crate::events::{EventPayload, NormalizedEvent};

/// Entries kept before the oldest are evicted.
pub const DEFAULT_FEED_CAPACITY: usize = 500;

/// One rendered line of the viewer feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    pub seq: u64,
    pub event: NormalizedEvent,
}

/// What applying an event changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedUpdate {
    /// A new entry was appended to the display log.
    Appended,
    /// Only the counters moved.
    Counters,
}

/// Rolling display log for viewers.
///
/// `stats` events never enter the log; they only refresh the viewer and like
/// counters. Every other kind is appended in arrival order.
#[derive(Debug, Clone)]
pub struct ViewerFeed {
    entries: VecDeque<FeedEntry>,
    capacity: usize,
    next_seq: u64,
    viewer_count: Option<u64>,
    like_count: Option<u64>,
}

impl ViewerFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
            next_seq: 0,
            viewer_count: None,
            like_count: None,
        }
    }

    pub fn apply(&mut self, event: NormalizedEvent) -> FeedUpdate {
        if let EventPayload::Stats(ref stats) = event.payload {
            if stats.viewer_count.is_some() {
                self.viewer_count = stats.viewer_count;
            }
            if stats.total_like_count.is_some() {
                self.like_count = stats.total_like_count;
            }
            return FeedUpdate::Counters;
        }

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.next_seq += 1;
        self.entries.push_back(FeedEntry { seq: self.next_seq, event });
        FeedUpdate::Appended
    }

    pub fn entries(&self) -> impl Iterator<Item = &FeedEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&FeedEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn viewer_count(&self) -> Option<u64> {
        self.viewer_count
    }

    pub fn like_count(&self) -> Option<u64> {
        self.like_count
    }

    /// Empty the log and reset both counters.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.viewer_count = None;
        self.like_count = None;
    }

    /// One-line status summary of the counters.
    pub fn status_line(&self) -> String {
        let fmt = |v: Option<u64>| v.map_or_else(|| "-".to_owned(), |n| n.to_string());
        format!("viewers: {}  likes: {}", fmt(self.viewer_count), fmt(self.like_count))
    }
}

impl Default for ViewerFeed {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}

/// Render an entry as a single terminal line.
pub fn render_entry(entry: &FeedEntry) -> String {
    let time = entry.event.timestamp.format("%H:%M:%S");
    let body = match &entry.event.payload {
        EventPayload::Chat(p) => format!("{}: {}", p.nickname, p.comment),
        EventPayload::Gift(p) => format!("{} sent {} x{}", p.nickname, p.gift_name, p.repeat_count),
        EventPayload::Follow(p) => format!("{} followed", p.nickname),
        EventPayload::Like(p) => format!("{} liked x{}", p.nickname, p.like_count),
        EventPayload::Share(p) => format!("{} shared the live", p.nickname),
        EventPayload::StreamEnd(p) => format!("live of {} ended", p.identifier),
        EventPayload::Error(p) => format!("error on {}: {}", p.identifier, p.error),
        EventPayload::Stats(p) => format!(
            "stats for {}: viewers={:?} likes={:?}",
            p.identifier, p.viewer_count, p.total_like_count
        ),
    };
    format!("[{time}] {:<9} {body}", entry.event.kind().as_str())
}

#[cfg(test)]
#[path = "feed_tests.rs"]
mod tests;
