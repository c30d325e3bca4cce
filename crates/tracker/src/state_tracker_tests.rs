use std::time::Duration;

use tf_core::{FakeClock, SessionStatus};

use super::*;

fn tracker() -> (StateTracker<FakeClock>, FakeClock) {
    let clock = FakeClock::new();
    (StateTracker::with_clock(clock.clone()), clock)
}

#[test]
fn first_poll_initializes_and_returns_waiting() {
    let (t, _clock) = tracker();
    assert_eq!(t.poll_primary(100, None), SessionStatus::Waiting);
}

#[test]
fn spike_filter_never_reports_active_for_a_single_change() {
    let (t, clock) = tracker();
    assert_eq!(t.poll_primary(100, None), SessionStatus::Waiting);

    // A single timestamp change opens the spike window; while it's open the
    // tracker must echo the last stable status, never flash `Active`.
    let during_window = t.poll_primary(101, None);
    assert_ne!(during_window, SessionStatus::Active);

    // Hold the timestamp constant for longer than the spike window: the
    // spike is filtered silently, still never `Active`.
    clock.advance(Duration::from_millis(1100));
    for _ in 0..3 {
        assert_ne!(t.poll_primary(101, None), SessionStatus::Active);
    }
}

#[test]
fn two_changes_within_spike_window_promote_to_active_exactly_once() {
    let (t, clock) = tracker();
    t.poll_primary(100, None);

    t.poll_primary(101, None); // opens the window
    clock.advance(Duration::from_millis(400));
    assert_eq!(t.poll_primary(102, None), SessionStatus::Active);

    // Cooldown holds it Active for activity_cooldown even with no further
    // change.
    clock.advance(ACTIVITY_COOLDOWN - Duration::from_millis(1));
    assert_eq!(t.poll_primary(102, None), SessionStatus::Active);
}

#[test]
fn cooldown_elapses_into_waiting_when_unacknowledged() {
    let (t, clock) = tracker();
    t.poll_primary(100, None);
    t.poll_primary(101, None);
    clock.advance(Duration::from_millis(400));
    assert_eq!(t.poll_primary(102, None), SessionStatus::Active);

    clock.advance(ACTIVITY_COOLDOWN + Duration::from_millis(1));
    assert_eq!(t.poll_primary(102, None), SessionStatus::Waiting);
}

#[test]
fn cooldown_elapses_into_idle_when_acknowledged() {
    let (t, clock) = tracker();
    t.poll_primary(100, None);
    t.poll_primary(101, None);
    clock.advance(Duration::from_millis(400));
    t.poll_primary(102, None);
    t.acknowledge();

    clock.advance(ACTIVITY_COOLDOWN + Duration::from_millis(1));
    assert_eq!(t.poll_primary(102, None), SessionStatus::Idle);
}

#[test]
fn busy_indicator_promotes_to_active_immediately() {
    let (t, _clock) = tracker();
    t.poll_primary(100, None);
    assert_eq!(
        t.poll_primary(100, Some("thinking (1200 tokens · esc to interrupt)")),
        SessionStatus::Active
    );
    assert!(!t.is_acknowledged());
}

#[test]
fn acknowledge_grace_suppresses_a_change_arriving_within_the_window() {
    let (t, clock) = tracker();
    t.poll_fallback("frame one");
    clock.advance(ACTIVITY_COOLDOWN + Duration::from_millis(1));
    t.poll_fallback("frame one"); // stable, unacknowledged -> waiting
    t.acknowledge_with_snapshot();

    clock.advance(Duration::from_millis(100));
    t.poll_fallback("frame two"); // content changed, but within grace

    clock.advance(Duration::from_millis(150)); // still < 300ms since ack
    assert!(t.is_acknowledged());
    assert_eq!(t.poll_fallback("frame two"), SessionStatus::Idle);
}

#[test]
fn acknowledge_grace_expires_after_window() {
    let (t, clock) = tracker();
    t.poll_fallback("frame one");
    clock.advance(ACTIVITY_COOLDOWN + Duration::from_millis(1));
    t.poll_fallback("frame one");
    t.acknowledge_with_snapshot();

    clock.advance(ACKNOWLEDGE_GRACE + Duration::from_millis(1));
    assert_eq!(t.poll_fallback("frame two"), SessionStatus::Active);
    assert!(!t.is_acknowledged());
}

#[test]
fn mark_inactive_overrides_last_stable_status() {
    let (t, _clock) = tracker();
    t.poll_primary(100, None);
    assert_eq!(t.mark_inactive(), SessionStatus::Inactive);
    assert_eq!(t.last_stable_status(), SessionStatus::Inactive);
}

#[test]
fn reset_acknowledged_forces_next_stable_poll_to_waiting() {
    let (t, clock) = tracker();
    t.poll_primary(100, None);
    t.poll_primary(101, None);
    clock.advance(Duration::from_millis(400));
    t.poll_primary(102, None);
    t.acknowledge();
    clock.advance(ACTIVITY_COOLDOWN + Duration::from_millis(1));
    assert_eq!(t.poll_primary(102, None), SessionStatus::Idle);

    t.reset_acknowledged();
    assert_eq!(t.poll_primary(102, None), SessionStatus::Waiting);
}

#[test]
fn signal_file_activity_promotes_and_clears_acknowledged() {
    let (t, _clock) = tracker();
    t.poll_primary(100, None);
    t.acknowledge();
    t.signal_file_activity();
    assert!(!t.is_acknowledged());
    assert_eq!(t.last_stable_status(), SessionStatus::Active);
}

#[test]
fn last_change_time_is_monotone_non_decreasing() {
    let (t, clock) = tracker();
    t.poll_primary(100, None);
    let first = t.inner.lock().last_change_time;

    t.poll_primary(101, None);
    clock.advance(Duration::from_millis(400));
    t.poll_primary(102, None); // sustained -> active, advances last_change_time
    let second = t.inner.lock().last_change_time;
    assert!(second >= first);

    clock.advance(ACTIVITY_COOLDOWN + Duration::from_millis(1));
    t.poll_primary(102, None); // cooldown elapses, no further change
    let third = t.inner.lock().last_change_time;
    assert!(third >= second);
}
