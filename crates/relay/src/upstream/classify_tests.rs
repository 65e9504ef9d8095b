// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    rate_limit_text = { "rate limit exceeded", ErrorKind::RateLimited },
    too_many = { "Too Many Requests", ErrorKind::RateLimited },
    http_429 = { "Request failed with status code 429", ErrorKind::RateLimited },
    initial_fetch = { "Failed to retrieve the initial room data.", ErrorKind::InitialFetchFailure },
    user_not_found = { "User not found", ErrorKind::NotFound },
    invalid_user = { "Invalid user", ErrorKind::NotFound },
    conn_timeout = { "Connection timeout", ErrorKind::Timeout },
    timed_out = { "socket timed out", ErrorKind::Timeout },
    other = { "something broke", ErrorKind::Unknown },
    empty = { "", ErrorKind::Unknown },
)]
fn classify_by_message(message: &str, expected: ErrorKind) {
    assert_eq!(classify(&RawUpstreamError::new(message)).kind, expected);
}

#[yare::parameterized(
    initial_fetch = { "InitialFetchError", ErrorKind::InitialFetchFailure },
    rate_limit = { "RateLimitError", ErrorKind::RateLimited },
    user_offline_not_found = { "UserNotFoundError", ErrorKind::NotFound },
    invalid_unique_id = { "InvalidUniqueIdError", ErrorKind::NotFound },
    timeout = { "TimeoutError", ErrorKind::Timeout },
    generic = { "Error", ErrorKind::Unknown },
)]
fn classify_by_type_name(name: &str, expected: ErrorKind) {
    let raw = RawUpstreamError::new("opaque failure").named(name);
    assert_eq!(classify(&raw).kind, expected);
}

#[test]
fn explicit_kind_wins_over_everything() {
    let raw = RawUpstreamError::new("429 too many requests")
        .named("InitialFetchError")
        .with_kind("timeout")
        .with_retry_after_ms(30_000);
    assert_eq!(classify(&raw).kind, ErrorKind::Timeout);
}

#[test]
fn unrecognized_kind_label_falls_through() {
    let raw = RawUpstreamError::new("User not found").with_kind("weird");
    assert_eq!(classify(&raw).kind, ErrorKind::NotFound);
}

#[test]
fn nested_type_name_is_used_when_outer_is_generic() {
    let raw = RawUpstreamError::new("wrapper")
        .named("Error")
        .wrapping(RawUpstreamError::new("opaque").named("InitialFetchError"));
    let classified = classify(&raw);
    assert_eq!(classified.kind, ErrorKind::InitialFetchFailure);
    assert_eq!(classified.message, "opaque");
}

#[test]
fn nested_text_exception_supplies_message() -> anyhow::Result<()> {
    let raw: RawUpstreamError =
        serde_json::from_str(r#"{"message":"wrapper","exception":"User not found"}"#)?;
    let classified = classify(&raw);
    assert_eq!(classified.message, "User not found");
    assert_eq!(classified.kind, ErrorKind::NotFound);
    Ok(())
}

#[test]
fn large_retry_hint_alone_means_rate_limited() {
    let raw = RawUpstreamError::new("opaque").with_retry_after_ms(RATE_LIMIT_HINT_THRESHOLD_MS + 1);
    let classified = classify(&raw);
    assert_eq!(classified.kind, ErrorKind::RateLimited);
    assert_eq!(classified.retry_after_ms, Some(RATE_LIMIT_HINT_THRESHOLD_MS + 1));
}

#[test]
fn small_retry_hint_is_kept_but_does_not_imply_rate_limit() {
    let raw = RawUpstreamError::new("opaque").with_retry_after_ms(RATE_LIMIT_HINT_THRESHOLD_MS);
    let classified = classify(&raw);
    assert_eq!(classified.kind, ErrorKind::Unknown);
    assert_eq!(classified.retry_after_ms, Some(RATE_LIMIT_HINT_THRESHOLD_MS));
}

#[test]
fn rate_limit_signal_beats_type_name() {
    let raw = RawUpstreamError::new("opaque")
        .named("InitialFetchError")
        .with_retry_after_ms(12_000);
    assert_eq!(classify(&raw).kind, ErrorKind::RateLimited);
}

#[test]
fn nested_retry_hint_wins_over_outer() {
    let raw = RawUpstreamError::new("outer")
        .with_retry_after_ms(1000)
        .wrapping(RawUpstreamError::new("inner").with_retry_after_ms(3000));
    assert_eq!(classify(&raw).retry_after_ms, Some(3000));
}

#[test]
fn zero_retry_hint_is_ignored() {
    let raw = RawUpstreamError::new("outer")
        .with_retry_after_ms(2000)
        .wrapping(RawUpstreamError::new("inner").with_retry_after_ms(0));
    assert_eq!(classify(&raw).retry_after_ms, Some(2000));
}

#[test]
fn stack_trace_is_the_last_resort() {
    let raw = RawUpstreamError::new("opaque")
        .with_stack("InitialFetchError: bootstrap failed\n    at fetchRoom (room.js:10)");
    assert_eq!(classify(&raw).kind, ErrorKind::InitialFetchFailure);

    let raw = RawUpstreamError::new("opaque").with_stack("Error: x\n  while waiting: timed out");
    assert_eq!(classify(&raw).kind, ErrorKind::Timeout);
}

#[test]
fn missing_message_gets_placeholder() {
    let classified = classify(&RawUpstreamError::default());
    assert_eq!(classified.kind, ErrorKind::Unknown);
    assert_eq!(classified.message, "unknown upstream error");
}

#[test]
fn deserializes_legacy_retry_after_field() -> anyhow::Result<()> {
    let raw: RawUpstreamError = serde_json::from_str(
        r#"{"message":"wrapped","exception":{"name":"InitialFetchError","message":"no room","retryAfter":4000}}"#,
    )?;
    let classified = classify(&raw);
    assert_eq!(classified.kind, ErrorKind::InitialFetchFailure);
    assert_eq!(classified.retry_after_ms, Some(4000));
    Ok(())
}

#[test]
fn initial_fetch_suggestions_mention_identifier_and_hint() {
    let mut err = ClassifiedError::new(ErrorKind::InitialFetchFailure, "no room");
    err.retry_after_ms = Some(2500);
    let suggestions = err.suggestions("alice");
    assert_eq!(suggestions.len(), 5);
    assert!(suggestions[0].contains("alice"));
    assert!(suggestions[4].contains("3 second"));
}

#[test]
fn unknown_has_no_suggestions() {
    assert!(ClassifiedError::new(ErrorKind::Unknown, "x").suggestions("alice").is_empty());
}

#[test]
fn as_str_matches_serde() -> anyhow::Result<()> {
    let kinds = [
        ErrorKind::RateLimited,
        ErrorKind::InitialFetchFailure,
        ErrorKind::NotFound,
        ErrorKind::Timeout,
        ErrorKind::Unknown,
    ];
    for kind in &kinds {
        let json = serde_json::to_string(kind)?;
        assert_eq!(kind.as_str(), json.trim_matches('"'));
        assert_eq!(kind.to_string(), json.trim_matches('"'));
    }
    Ok(())
}
