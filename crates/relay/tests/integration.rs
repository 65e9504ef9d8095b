// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end tests for the push channel over a real socket.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use liverelay::events::NormalizedEvent;
use liverelay::feed::{FeedUpdate, ViewerFeed};
use liverelay::identifier::StreamIdentifier;
use liverelay::state::RelayState;
use liverelay::test_support::{ident, quick_settings, relay_state, MockConnector, MockLink};
use liverelay::transport::build_push_router;
use liverelay::upstream::{RawChat, RawEvent, RawLike, RawRoomUser, RawUser};

type Viewer = futures_util::stream::SplitStream<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
>;

async fn serve_push(state: Arc<RelayState>) -> anyhow::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let router = build_push_router(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok(format!("ws://{addr}/ws"))
}

async fn join(url: &str) -> anyhow::Result<Viewer> {
    let (stream, _) = tokio_tungstenite::connect_async(url).await?;
    let (_, rx) = stream.split();
    Ok(rx)
}

async fn next_event(viewer: &mut Viewer) -> anyhow::Result<NormalizedEvent> {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), viewer.next())
            .await?
            .ok_or_else(|| anyhow::anyhow!("push channel closed"))??;
        if let Message::Text(text) = msg {
            return Ok(serde_json::from_str(text.as_str())?);
        }
    }
}

async fn start(
    state: &RelayState,
    connector: &MockConnector,
    identifier: &StreamIdentifier,
) -> anyhow::Result<MockLink> {
    state.controller.start_session(identifier).await?;
    connector.last_link().ok_or_else(|| anyhow::anyhow!("connector handed out no link"))
}

fn user(id: &str) -> RawUser {
    RawUser { user_id: id.to_owned(), nickname: format!("{id}-nick"), ..RawUser::default() }
}

/// Wait until the push listener has subscribed `n` viewers.
async fn wait_for_viewers(state: &RelayState, n: usize) -> anyhow::Result<()> {
    tokio::time::timeout(Duration::from_secs(5), async {
        while state.broadcaster.subscriber_count() < n {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await?;
    Ok(())
}

#[tokio::test]
async fn viewers_receive_events_in_order() -> anyhow::Result<()> {
    let connector = Arc::new(MockConnector::connecting());
    let state = relay_state(Arc::clone(&connector), quick_settings());
    let url = serve_push(Arc::clone(&state)).await?;

    let mut first = join(&url).await?;
    let mut second = join(&url).await?;
    wait_for_viewers(&state, 2).await?;

    let link = start(&state, &connector, &ident("alice")?).await?;
    link.events
        .send(RawEvent::Chat(RawChat { user: user("u1"), comment: "hello".into() }))
        .await?;
    link.events
        .send(RawEvent::Like(RawLike { user: user("u2"), like_count: 3, total_like_count: Some(40) }))
        .await?;

    for viewer in [&mut first, &mut second] {
        let kinds = [
            next_event(viewer).await?.kind(),
            next_event(viewer).await?.kind(),
            next_event(viewer).await?.kind(),
        ];
        assert_eq!(kinds.map(|k| k.as_str()), ["chat", "like", "stats"]);
    }
    Ok(())
}

#[tokio::test]
async fn late_viewer_gets_cached_stats_only() -> anyhow::Result<()> {
    let connector = Arc::new(MockConnector::connecting());
    let state = relay_state(Arc::clone(&connector), quick_settings());
    let url = serve_push(Arc::clone(&state)).await?;

    // An early viewer lets us know the events have been broadcast.
    let mut early = join(&url).await?;
    wait_for_viewers(&state, 1).await?;

    let link = start(&state, &connector, &ident("alice")?).await?;
    link.events
        .send(RawEvent::Chat(RawChat { user: user("u1"), comment: "missed".into() }))
        .await?;
    link.events.send(RawEvent::RoomUser(RawRoomUser { viewer_count: 120 })).await?;
    next_event(&mut early).await?;
    next_event(&mut early).await?;

    let mut late = join(&url).await?;
    let mut feed = ViewerFeed::default();
    let update = feed.apply(next_event(&mut late).await?);

    assert_eq!(update, FeedUpdate::Counters);
    assert_eq!(feed.viewer_count(), Some(120));
    assert!(feed.is_empty());
    Ok(())
}

#[tokio::test]
async fn stopping_clears_cached_stats() -> anyhow::Result<()> {
    let connector = Arc::new(MockConnector::connecting());
    let state = relay_state(Arc::clone(&connector), quick_settings());
    let alice = ident("alice")?;

    let link = start(&state, &connector, &alice).await?;
    let mut rx = state.broadcaster.subscribe();
    link.events.send(RawEvent::RoomUser(RawRoomUser { viewer_count: 7 })).await?;
    tokio::time::timeout(Duration::from_secs(5), rx.recv()).await??;
    assert_eq!(state.broadcaster.backfill().len(), 1);

    assert!(state.controller.stop_session(&alice).await);
    assert!(state.broadcaster.backfill().is_empty());
    assert!(link.cancel.is_cancelled());
    Ok(())
}
