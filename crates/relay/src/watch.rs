// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal viewer for a relay's push channel.

use std::io::Write;

use futures_util::StreamExt;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::events::NormalizedEvent;
use crate::feed::{render_entry, FeedUpdate, ViewerFeed, DEFAULT_FEED_CAPACITY};

/// Connect to `url` and print the feed until the relay closes or `shutdown` fires.
///
/// Messages are printed as log lines; counter updates reprint the status line.
pub async fn run(url: &str, shutdown: CancellationToken) -> anyhow::Result<()> {
    let (stream, _) = tokio_tungstenite::connect_async(url).await?;
    let (_, mut frames) = stream.split();
    tracing::info!(url, "watching relay feed");

    let mut feed = ViewerFeed::new(DEFAULT_FEED_CAPACITY);
    let mut out = std::io::stdout();

    loop {
        let msg = tokio::select! {
            _ = shutdown.cancelled() => break,
            msg = frames.next() => msg,
        };
        let text = match msg {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
        };
        let event: NormalizedEvent = match serde_json::from_str(text.as_str()) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(err = %e, "skipping unrecognized frame");
                continue;
            }
        };

        let line = match feed.apply(event) {
            FeedUpdate::Appended => feed.latest().map(render_entry),
            FeedUpdate::Counters => Some(feed.status_line()),
        };
        if let Some(line) = line {
            writeln!(out, "{line}")?;
        }
    }

    tracing::info!(messages = feed.len(), "feed closed");
    Ok(())
}
