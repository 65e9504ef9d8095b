// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn id(raw: &str) -> anyhow::Result<StreamIdentifier> {
    StreamIdentifier::parse(raw).ok_or_else(|| anyhow::anyhow!("bad identifier {raw:?}"))
}

fn chat(identifier: &StreamIdentifier, comment: &str) -> NormalizedEvent {
    NormalizedEvent::new(EventPayload::Chat(ChatPayload {
        user_id: "42".into(),
        nickname: "Ann".into(),
        comment: comment.into(),
        profile_picture_url: None,
        identifier: identifier.clone(),
        unique_id: Some("ann".into()),
    }))
}

fn stats(
    identifier: &StreamIdentifier,
    viewers: Option<u64>,
    likes: Option<u64>,
) -> NormalizedEvent {
    NormalizedEvent::new(EventPayload::Stats(StatsPayload {
        viewer_count: viewers,
        total_like_count: likes,
        identifier: identifier.clone(),
    }))
}

// ── wire format ───────────────────────────────────────────────────────

#[test]
fn chat_serializes_with_type_timestamp_and_data() -> anyhow::Result<()> {
    let alice = id("alice")?;
    let value = serde_json::to_value(chat(&alice, "hello"))?;

    assert_eq!(value["type"], "chat");
    assert!(value["timestamp"].is_string());
    assert_eq!(value["data"]["userId"], "42");
    assert_eq!(value["data"]["nickname"], "Ann");
    assert_eq!(value["data"]["comment"], "hello");
    assert_eq!(value["data"]["identifier"], "alice");
    assert_eq!(value["data"]["uniqueId"], "ann");
    Ok(())
}

#[test]
fn stream_end_uses_camel_case_kind() -> anyhow::Result<()> {
    let event = NormalizedEvent::new(EventPayload::StreamEnd(StreamEndPayload {
        identifier: id("alice")?,
    }));
    let value = serde_json::to_value(&event)?;
    assert_eq!(value["type"], "streamEnd");
    assert_eq!(value["data"]["identifier"], "alice");
    Ok(())
}

#[test]
fn stats_omits_absent_counters() -> anyhow::Result<()> {
    let value = serde_json::to_value(stats(&id("alice")?, Some(12), None))?;
    assert_eq!(value["data"]["viewerCount"], 12);
    assert!(value["data"].get("totalLikeCount").is_none());
    Ok(())
}

#[test]
fn decodes_frame_from_the_wire() -> anyhow::Result<()> {
    let frame = r#"{"type":"gift","timestamp":"2026-01-02T03:04:05Z","data":{
        "userId":"7","nickname":"Bo","giftName":"Rose","giftId":"5655",
        "repeatCount":3,"profilePictureUrl":"https://cdn/p.png"}}"#;
    let event: NormalizedEvent = serde_json::from_str(frame)?;
    assert_eq!(event.kind(), EventKind::Gift);
    let EventPayload::Gift(gift) = event.payload else {
        anyhow::bail!("expected gift payload");
    };
    assert_eq!(gift.gift_name, "Rose");
    assert_eq!(gift.repeat_count, 3);
    Ok(())
}

#[test]
fn rejects_payload_that_does_not_match_kind() {
    let frame = r#"{"type":"like","timestamp":"2026-01-02T03:04:05Z","data":{"identifier":"x"}}"#;
    assert!(serde_json::from_str::<NormalizedEvent>(frame).is_err());
}

// ── broadcaster ───────────────────────────────────────────────────────

#[tokio::test]
async fn broadcast_reaches_every_subscriber_in_order() -> anyhow::Result<()> {
    let hub = Broadcaster::new();
    let mut a = hub.subscribe();
    let mut b = hub.subscribe();
    let alice = id("alice")?;

    assert_eq!(hub.broadcast(&chat(&alice, "one")), 2);
    assert_eq!(hub.broadcast(&chat(&alice, "two")), 2);

    for rx in [&mut a, &mut b] {
        let first: serde_json::Value = serde_json::from_str(&rx.recv().await?)?;
        let second: serde_json::Value = serde_json::from_str(&rx.recv().await?)?;
        assert_eq!(first["data"]["comment"], "one");
        assert_eq!(second["data"]["comment"], "two");
    }
    Ok(())
}

#[test]
fn broadcast_without_subscribers_is_a_noop() -> anyhow::Result<()> {
    let hub = Broadcaster::new();
    assert_eq!(hub.broadcast(&chat(&id("alice")?, "nobody")), 0);
    Ok(())
}

#[test]
fn dropped_subscriber_is_not_counted() -> anyhow::Result<()> {
    let hub = Broadcaster::new();
    let keep = hub.subscribe();
    let gone = hub.subscribe();
    drop(gone);

    assert_eq!(hub.subscriber_count(), 1);
    assert_eq!(hub.broadcast(&chat(&id("alice")?, "hi")), 1);
    drop(keep);
    Ok(())
}

#[test]
fn backfill_merges_partial_stats() -> anyhow::Result<()> {
    let hub = Broadcaster::new();
    let alice = id("alice")?;
    hub.track(&alice);
    hub.broadcast(&stats(&alice, Some(10), None));
    hub.broadcast(&stats(&alice, None, Some(250)));
    hub.broadcast(&stats(&alice, Some(11), None));

    let frames = hub.backfill();
    assert_eq!(frames.len(), 1);
    let value: serde_json::Value = serde_json::from_str(&frames[0])?;
    assert_eq!(value["type"], "stats");
    assert_eq!(value["data"]["viewerCount"], 11);
    assert_eq!(value["data"]["totalLikeCount"], 250);
    Ok(())
}

#[test]
fn forget_drops_cached_stats() -> anyhow::Result<()> {
    let hub = Broadcaster::new();
    let alice = id("alice")?;
    let bob = id("bob")?;
    hub.track(&alice);
    hub.track(&bob);
    hub.broadcast(&stats(&alice, Some(1), None));
    hub.broadcast(&stats(&bob, Some(2), None));

    hub.forget(&alice);
    let frames = hub.backfill();
    assert_eq!(frames.len(), 1);
    assert!(frames[0].contains("\"bob\""));
    Ok(())
}

#[test]
fn chat_does_not_touch_stats_cache() -> anyhow::Result<()> {
    let hub = Broadcaster::new();
    let alice = id("alice")?;
    hub.track(&alice);
    hub.broadcast(&chat(&alice, "hi"));
    assert!(hub.backfill().is_empty());
    Ok(())
}

#[tokio::test]
async fn untracked_stats_are_relayed_but_not_cached() -> anyhow::Result<()> {
    let hub = Broadcaster::new();
    let mut rx = hub.subscribe();
    hub.broadcast(&stats(&id("alice")?, Some(5), None));

    let frame: serde_json::Value = serde_json::from_str(&rx.recv().await?)?;
    assert_eq!(frame["data"]["viewerCount"], 5);
    assert!(hub.backfill().is_empty());
    Ok(())
}

#[test]
fn stats_arriving_after_forget_are_not_cached() -> anyhow::Result<()> {
    let hub = Broadcaster::new();
    let alice = id("alice")?;
    hub.track(&alice);
    hub.broadcast(&stats(&alice, Some(3), None));

    hub.forget(&alice);
    hub.broadcast(&stats(&alice, Some(4), Some(9)));
    assert!(hub.backfill().is_empty());

    hub.track(&alice);
    hub.broadcast(&stats(&alice, Some(6), None));
    let frames = hub.backfill();
    assert_eq!(frames.len(), 1);
    let value: serde_json::Value = serde_json::from_str(&frames[0])?;
    assert_eq!(value["data"]["viewerCount"], 6);
    assert!(value["data"].get("totalLikeCount").is_none());
    Ok(())
}
