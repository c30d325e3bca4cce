// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `StateTracker` — the per-session activity state machine (spec.md §3,
//! §4.4). Classifies a session as `active | waiting | idle | inactive` from
//! an activity timestamp (cheap) or, on failure, a normalized-content hash
//! (expensive), with spike filtering, cooldown, and an acknowledge grace
//! window to eliminate flicker.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tf_core::{Clock, SessionStatus, SystemClock};

use crate::busy;
use crate::normalize;

pub const ACTIVITY_COOLDOWN: Duration = Duration::from_secs(2);
pub const SPIKE_WINDOW: Duration = Duration::from_secs(1);
pub const ACKNOWLEDGE_GRACE: Duration = Duration::from_millis(300);
pub const SUSTAINED_THRESHOLD: u32 = 2;

struct Inner {
    initialized: bool,
    last_hash: String,
    last_change_time: Instant,
    acknowledged: bool,
    acknowledged_at: Option<Instant>,
    last_activity_timestamp: Option<i64>,
    activity_check_start: Option<Instant>,
    activity_change_count: u32,
    last_stable_status: SessionStatus,
}

/// The per-session status state machine. Allocated lazily by `Session` so
/// that "acknowledge before first poll" is legal (spec.md §3).
pub struct StateTracker<C: Clock = SystemClock> {
    clock: C,
    inner: Mutex<Inner>,
}

impl StateTracker<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for StateTracker<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> StateTracker<C> {
    pub fn with_clock(clock: C) -> Self {
        let now = clock.now();
        Self {
            inner: Mutex::new(Inner {
                initialized: false,
                last_hash: String::new(),
                last_change_time: now,
                acknowledged: false,
                acknowledged_at: None,
                last_activity_timestamp: None,
                activity_check_start: None,
                activity_change_count: 0,
                last_stable_status: SessionStatus::Waiting,
            }),
            clock,
        }
    }

    /// Cheap pre-check, run without the lock held across any I/O: whether
    /// the expensive busy-indicator content capture is worth performing
    /// this tick (spec.md §4.4 step 3).
    pub fn should_check_busy_indicator(&self, current_ts: i64) -> bool {
        let inner = self.inner.lock();
        !inner.initialized
            || inner.last_activity_timestamp != Some(current_ts)
            || self.cooldown_active(&inner)
            || inner.activity_check_start.is_some()
    }

    /// Primary path (spec.md §4.4 steps 2-9). `busy_content`, when present,
    /// is the already-captured recent pane output to run the busy-indicator
    /// check against (only captured by the caller when
    /// `should_check_busy_indicator` said to).
    pub fn poll_primary(&self, current_ts: i64, busy_content: Option<&str>) -> SessionStatus {
        let mut inner = self.inner.lock();
        let now = self.clock.now();

        if let Some(content) = busy_content {
            if busy::is_busy(content) {
                inner.initialized = true;
                inner.last_activity_timestamp = Some(current_ts);
                inner.last_change_time = now;
                inner.acknowledged = false;
                inner.last_stable_status = SessionStatus::Active;
                return SessionStatus::Active;
            }
        }

        if !inner.initialized {
            inner.initialized = true;
            inner.last_activity_timestamp = Some(current_ts);
            inner.acknowledged = false;
            inner.last_change_time = saturating_sub(now, ACTIVITY_COOLDOWN);
            inner.last_stable_status = SessionStatus::Waiting;
            return SessionStatus::Waiting;
        }

        let timestamp_changed = inner.last_activity_timestamp != Some(current_ts);
        inner.last_activity_timestamp = Some(current_ts);

        if timestamp_changed {
            let window_open = inner
                .activity_check_start
                .map(|start| now.duration_since(start) < SPIKE_WINDOW)
                .unwrap_or(false);

            if !window_open {
                inner.activity_check_start = Some(now);
                inner.activity_change_count = 1;
            } else {
                inner.activity_change_count += 1;
                if inner.activity_change_count >= SUSTAINED_THRESHOLD {
                    inner.activity_check_start = None;
                    inner.activity_change_count = 0;
                    if Self::grace_active(&inner, now) {
                        // Swallowed: treated as if no sustained change occurred.
                    } else {
                        inner.last_change_time = now;
                        inner.acknowledged = false;
                        inner.last_stable_status = SessionStatus::Active;
                        return SessionStatus::Active;
                    }
                }
            }
        } else if let Some(start) = inner.activity_check_start {
            if now.duration_since(start) >= SPIKE_WINDOW {
                // Single-change window expired without a second change: the
                // spike is filtered silently.
                inner.activity_check_start = None;
                inner.activity_change_count = 0;
            }
        }

        if inner.activity_check_start.is_some() {
            return inner.last_stable_status;
        }

        if self.cooldown_active(&inner) {
            inner.last_stable_status = SessionStatus::Active;
            return SessionStatus::Active;
        }

        let status = if inner.acknowledged {
            SessionStatus::Idle
        } else {
            SessionStatus::Waiting
        };
        inner.last_stable_status = status;
        status
    }

    /// Fallback path (spec.md §4.4), used only when reading the activity
    /// timestamp fails. Hashes normalized content and drives the same
    /// cooldown/acknowledge state machine.
    pub fn poll_fallback(&self, raw_content: &str) -> SessionStatus {
        let hash = hash_content(raw_content);

        let mut inner = self.inner.lock();
        let now = self.clock.now();

        if !inner.initialized {
            inner.initialized = true;
            inner.last_hash = hash;
            inner.acknowledged = false;
            inner.last_change_time = saturating_sub(now, ACTIVITY_COOLDOWN);
            inner.last_stable_status = SessionStatus::Waiting;
            return SessionStatus::Waiting;
        }

        let changed = inner.last_hash != hash;
        inner.last_hash = hash;

        if changed && !Self::grace_active(&inner, now) {
            inner.acknowledged = false;
            inner.last_change_time = now;
        }
        // Within grace: the change is swallowed entirely (bookkeeping
        // untouched) so a post-acknowledge output burst cannot yank the
        // state back to waiting.

        if self.cooldown_active(&inner) {
            inner.last_stable_status = SessionStatus::Active;
            return SessionStatus::Active;
        }

        let status = if inner.acknowledged {
            SessionStatus::Idle
        } else {
            SessionStatus::Waiting
        };
        inner.last_stable_status = status;
        status
    }

    /// The underlying terminal session does not exist (spec.md §4.4 step 1).
    pub fn mark_inactive(&self) -> SessionStatus {
        let mut inner = self.inner.lock();
        inner.last_stable_status = SessionStatus::Inactive;
        SessionStatus::Inactive
    }

    pub fn last_stable_status(&self) -> SessionStatus {
        self.inner.lock().last_stable_status
    }

    pub fn is_acknowledged(&self) -> bool {
        self.inner.lock().acknowledged
    }

    /// Marks the session acknowledged; the next stable poll yields `idle`.
    pub fn acknowledge(&self) {
        self.inner.lock().acknowledged = true;
    }

    /// Same as `acknowledge`, but also forces the cooldown to already be
    /// elapsed. Does no capture of its own — the original expensive capture
    /// here was the root cause of multi-second detach delays.
    pub fn acknowledge_with_snapshot(&self) {
        let mut inner = self.inner.lock();
        let now = self.clock.now();
        inner.acknowledged = true;
        inner.acknowledged_at = Some(now);
        inner.last_change_time = saturating_sub(now, ACTIVITY_COOLDOWN);
    }

    /// Clears the acknowledge bit so the next stable poll yields `waiting`.
    pub fn reset_acknowledged(&self) {
        self.inner.lock().acknowledged = false;
    }

    /// Event-driven promotion path from the log watcher.
    pub fn signal_file_activity(&self) {
        let mut inner = self.inner.lock();
        let now = self.clock.now();
        inner.last_change_time = now;
        inner.acknowledged = false;
        inner.last_stable_status = SessionStatus::Active;
    }

    fn cooldown_active(&self, inner: &Inner) -> bool {
        self.clock.now().duration_since(inner.last_change_time) < ACTIVITY_COOLDOWN
    }

    fn grace_active(inner: &Inner, now: Instant) -> bool {
        inner
            .acknowledged_at
            .map(|at| now.duration_since(at) < ACKNOWLEDGE_GRACE)
            .unwrap_or(false)
    }
}

fn saturating_sub(instant: Instant, duration: Duration) -> Instant {
    instant.checked_sub(duration).unwrap_or(instant)
}

fn hash_content(raw: &str) -> String {
    let normalized = normalize::normalize(raw.as_bytes());
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
#[path = "state_tracker_tests.rs"]
mod tests;
