use std::path::PathBuf;
use std::sync::Arc;

use tf_adapters::FakeSessionAdapter;
use tf_core::{FakeClock, SessionId, SessionLifecycle, SessionStatus};

use super::*;
use crate::activity::FakeActivitySource;

fn session(
    adapter: FakeSessionAdapter,
    cache: Arc<SessionCache<FakeActivitySource>>,
    clock: FakeClock,
) -> Session<FakeSessionAdapter, FakeActivitySource, FakeClock> {
    Session::with_clock(
        SessionId::new("demo"),
        "Demo".to_string(),
        PathBuf::from("/tmp"),
        "claude".to_string(),
        Vec::new(),
        0,
        adapter,
        cache,
        clock,
    )
}

#[tokio::test]
async fn get_status_before_start_is_inactive() {
    let adapter = FakeSessionAdapter::new();
    let source = FakeActivitySource::new();
    let cache = Arc::new(SessionCache::new(source));
    let clock = FakeClock::new();
    let s = session(adapter, cache, clock);

    assert_eq!(s.get_status().await, SessionStatus::Inactive);
}

#[tokio::test]
async fn acknowledge_before_first_poll_is_legal() {
    let adapter = FakeSessionAdapter::new();
    let source = FakeActivitySource::new();
    let cache = Arc::new(SessionCache::new(source));
    let clock = FakeClock::new();
    let s = session(adapter, cache, clock);

    // Must not panic even though the tracker has never been polled.
    s.acknowledge();
    assert!(s.tracker().is_acknowledged());
}

#[tokio::test]
async fn start_then_dead_target_marks_inactive_and_flips_lifecycle() {
    let adapter = FakeSessionAdapter::new();
    let source = FakeActivitySource::new();
    let cache = Arc::new(SessionCache::new(source));
    let clock = FakeClock::new();
    let s = session(adapter.clone(), cache, clock);

    s.start().await.unwrap();
    // FakeSessionAdapter assigns ids as `fake-<n>`, starting at 1.
    adapter.kill_silently("fake-1");

    assert_eq!(s.get_status().await, SessionStatus::Inactive);
    assert_eq!(s.lifecycle(), SessionLifecycle::Error);
}

#[tokio::test]
async fn sustained_activity_after_start_promotes_to_active() {
    let adapter = FakeSessionAdapter::new();
    let source = FakeActivitySource::new();
    let cache = Arc::new(SessionCache::with_ttl(
        source.clone(),
        std::time::Duration::ZERO,
    ));
    let clock = FakeClock::new();
    let s = session(adapter.clone(), cache, clock.clone());

    s.start().await.unwrap();
    source.set("fake-1", 100);
    assert_eq!(s.get_status().await, SessionStatus::Waiting);

    source.set("fake-1", 101);
    clock.advance(std::time::Duration::from_millis(400));
    assert_eq!(s.get_status().await, SessionStatus::Waiting);

    source.set("fake-1", 102);
    assert_eq!(s.get_status().await, SessionStatus::Active);
}

#[tokio::test]
async fn tool_classification_prefers_command_string() {
    let adapter = FakeSessionAdapter::new();
    let source = FakeActivitySource::new();
    let cache = Arc::new(SessionCache::new(source));
    let clock = FakeClock::new();
    let s = session(adapter, cache, clock);

    assert_eq!(s.tool().await, tf_core::ToolKind::Claude);
}

#[tokio::test]
async fn tool_classification_caches_until_ttl_expires() {
    let adapter = FakeSessionAdapter::new();
    let source = FakeActivitySource::new();
    let cache = Arc::new(SessionCache::new(source));
    let clock = FakeClock::new();
    let s = Session::with_clock(
        SessionId::new("demo"),
        "Demo".to_string(),
        PathBuf::from("/tmp"),
        "some-other-tool".to_string(),
        Vec::new(),
        0,
        adapter.clone(),
        cache,
        clock.clone(),
    );
    s.start().await.unwrap();

    assert_eq!(s.tool().await, tf_core::ToolKind::Other);
    let calls_before = adapter.calls().len();

    // Still within TTL: no new capture call should be made.
    clock.advance(TOOL_CLASSIFICATION_TTL / 2);
    assert_eq!(s.tool().await, tf_core::ToolKind::Other);
    assert_eq!(adapter.calls().len(), calls_before);

    // Past TTL: re-derivation happens (still Other, but a fresh capture call).
    clock.advance(TOOL_CLASSIFICATION_TTL);
    assert_eq!(s.tool().await, tf_core::ToolKind::Other);
    assert!(adapter.calls().len() > calls_before);
}

#[tokio::test]
async fn kill_without_start_reports_not_started() {
    let adapter = FakeSessionAdapter::new();
    let source = FakeActivitySource::new();
    let cache = Arc::new(SessionCache::new(source));
    let clock = FakeClock::new();
    let s = session(adapter, cache, clock);

    let err = s.kill().await.unwrap_err();
    assert!(matches!(err, TrackerError::NotStarted(_)));
}
