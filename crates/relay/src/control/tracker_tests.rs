// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use tokio::time::Instant;

use super::*;

fn id(raw: &str) -> anyhow::Result<StreamIdentifier> {
    StreamIdentifier::parse(raw).ok_or_else(|| anyhow::anyhow!("bad identifier {raw:?}"))
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[test]
fn unknown_identifier_is_always_allowed() -> anyhow::Result<()> {
    let tracker = RateLimitTracker::default();
    let check = tracker.can_attempt(&id("alice")?, Instant::now());
    assert!(check.allowed);
    assert_eq!(check.wait_ms(), 0);
    Ok(())
}

#[test]
fn second_attempt_within_min_gap_is_refused_with_remaining_wait() -> anyhow::Result<()> {
    let mut tracker = RateLimitTracker::default();
    let alice = id("alice")?;
    let t0 = Instant::now();
    tracker.record_attempt(&alice, t0);

    let check = tracker.can_attempt(&alice, t0 + ms(500));
    assert!(!check.allowed);
    assert_eq!(check.wait, ms(1500));

    assert!(tracker.can_attempt(&alice, t0 + ms(2000)).allowed);
    Ok(())
}

#[test]
fn gap_is_per_identifier() -> anyhow::Result<()> {
    let mut tracker = RateLimitTracker::default();
    let t0 = Instant::now();
    tracker.record_attempt(&id("alice")?, t0);
    assert!(tracker.can_attempt(&id("bob")?, t0).allowed);
    Ok(())
}

#[test]
fn backoff_blocks_until_deadline() -> anyhow::Result<()> {
    let mut tracker = RateLimitTracker::default();
    let alice = id("alice")?;
    let t0 = Instant::now();
    tracker.record_attempt(&alice, t0);
    let until = tracker.apply_backoff(&alice, t0 + ms(100), ms(30_000));
    assert_eq!(until, t0 + ms(30_100));

    let check = tracker.can_attempt(&alice, t0 + ms(10_100));
    assert!(!check.allowed);
    assert_eq!(check.wait, ms(20_000));
    assert!(tracker.can_attempt(&alice, t0 + ms(30_100)).allowed);
    Ok(())
}

#[test]
fn backoff_deadline_never_precedes_last_attempt() -> anyhow::Result<()> {
    let mut tracker = RateLimitTracker::default();
    let alice = id("alice")?;
    let t0 = Instant::now();
    tracker.apply_backoff(&alice, t0, ms(60_000));

    let record = tracker.record(&alice).ok_or_else(|| anyhow::anyhow!("record missing"))?;
    assert_eq!(record.attempt_count, 0);
    assert!(record.backoff_until.is_some_and(|until| until >= record.last_attempt_at));
    Ok(())
}

#[test]
fn record_attempt_counts_and_clear_forgets() -> anyhow::Result<()> {
    let mut tracker = RateLimitTracker::default();
    let alice = id("alice")?;
    let t0 = Instant::now();
    tracker.record_attempt(&alice, t0);
    tracker.record_attempt(&alice, t0 + ms(3000));

    let record = tracker.record(&alice).ok_or_else(|| anyhow::anyhow!("record missing"))?;
    assert_eq!(record.attempt_count, 2);
    assert_eq!(record.last_attempt_at, t0 + ms(3000));

    tracker.clear(&alice);
    assert!(tracker.record(&alice).is_none());
    assert!(tracker.can_attempt(&alice, t0 + ms(3001)).allowed);
    Ok(())
}

#[test]
fn prune_keeps_only_restricting_records() -> anyhow::Result<()> {
    let mut tracker = RateLimitTracker::default();
    let (alice, bob, carol) = (id("alice")?, id("bob")?, id("carol")?);
    let t0 = Instant::now();
    tracker.record_attempt(&alice, t0);
    tracker.record_attempt(&bob, t0);
    tracker.apply_backoff(&bob, t0, ms(30_000));
    tracker.record_attempt(&carol, t0 + ms(4000));

    tracker.prune(t0 + ms(5000));
    assert!(tracker.record(&alice).is_none());
    assert!(tracker.record(&bob).is_some());
    assert!(tracker.record(&carol).is_some());
    assert!(tracker.can_attempt(&alice, t0 + ms(5000)).allowed);
    assert!(!tracker.can_attempt(&carol, t0 + ms(5000)).allowed);

    tracker.prune(t0 + ms(30_000));
    assert!(tracker.record(&bob).is_none());
    assert!(tracker.record(&carol).is_none());
    Ok(())
}

proptest::proptest! {
    #[test]
    fn never_two_attempts_within_min_gap(offsets in proptest::collection::vec(0u64..10_000, 1..40)) {
        let mut tracker = RateLimitTracker::default();
        let Some(alice) = StreamIdentifier::parse("alice") else {
            return Ok(());
        };
        let t0 = Instant::now();
        let mut times: Vec<u64> = offsets;
        times.sort_unstable();

        let mut accepted: Vec<u64> = Vec::new();
        for t in times {
            if tracker.can_attempt(&alice, t0 + ms(t)).allowed {
                tracker.record_attempt(&alice, t0 + ms(t));
                accepted.push(t);
            }
        }
        for pair in accepted.windows(2) {
            proptest::prop_assert!(pair[1] - pair[0] >= 2000);
        }
    }
}
