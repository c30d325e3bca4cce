// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Batch activity-timestamp source and the process-wide [`SessionCache`]
//! that front it (spec.md §3 `SessionCache`, §4.4 step 2, §5).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::process::Command;

/// A source of upstream terminal "last activity" wall-clock timestamps,
/// refreshed in one batch command rather than one round-trip per session
/// (spec.md §3, §5 `SessionCache`).
#[async_trait]
pub trait ActivityTimestampSource: Send + Sync + 'static {
    /// Returns every known session's last-activity unix timestamp in one
    /// shot.
    async fn fetch_all(&self) -> HashMap<String, i64>;
}

/// Reads every tmux session's `#{session_activity}` in a single
/// `list-sessions` call.
#[derive(Clone, Default)]
pub struct TmuxActivitySource;

#[async_trait]
impl ActivityTimestampSource for TmuxActivitySource {
    async fn fetch_all(&self) -> HashMap<String, i64> {
        let output = Command::new("tmux")
            .args(["list-sessions", "-F", "#{session_name} #{session_activity}"])
            .output()
            .await;

        let Ok(output) = output else {
            return HashMap::new();
        };
        if !output.status.success() {
            return HashMap::new();
        }

        let text = String::from_utf8_lossy(&output.stdout);
        let mut map = HashMap::new();
        for line in text.lines() {
            if let Some((name, ts)) = line.rsplit_once(' ') {
                if let Ok(ts) = ts.parse::<i64>() {
                    map.insert(name.to_string(), ts);
                }
            }
        }
        map
    }
}

#[cfg(any(test, feature = "test-support"))]
#[derive(Clone, Default)]
pub struct FakeActivitySource {
    entries: std::sync::Arc<parking_lot::Mutex<HashMap<String, i64>>>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeActivitySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, name: &str, ts: i64) {
        self.entries.lock().insert(name.to_string(), ts);
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl ActivityTimestampSource for FakeActivitySource {
    async fn fetch_all(&self) -> HashMap<String, i64> {
        self.entries.lock().clone()
    }
}

/// Process-wide cache of `session_name -> activity_timestamp`, refreshed
/// atomically from a single batch command; reads are valid for 2s
/// (spec.md §5).
pub struct SessionCache<S: ActivityTimestampSource> {
    source: S,
    state: RwLock<CacheState>,
    ttl: Duration,
}

struct CacheState {
    entries: HashMap<String, i64>,
    refreshed_at: Option<Instant>,
}

impl<S: ActivityTimestampSource> SessionCache<S> {
    pub fn new(source: S) -> Self {
        Self::with_ttl(source, Duration::from_secs(2))
    }

    pub fn with_ttl(source: S, ttl: Duration) -> Self {
        Self {
            source,
            state: RwLock::new(CacheState {
                entries: HashMap::new(),
                refreshed_at: None,
            }),
            ttl,
        }
    }

    /// Returns `name`'s cached activity timestamp, refreshing the whole
    /// cache first if the last refresh is older than the TTL.
    pub async fn activity_timestamp(&self, name: &str) -> Option<i64> {
        if self.is_stale() {
            self.refresh().await;
        }
        self.state.read().entries.get(name).copied()
    }

    fn is_stale(&self) -> bool {
        match self.state.read().refreshed_at {
            None => true,
            Some(at) => at.elapsed() >= self.ttl,
        }
    }

    async fn refresh(&self) {
        let entries = self.source.fetch_all().await;
        let mut state = self.state.write();
        state.entries = entries;
        state.refreshed_at = Some(Instant::now());
    }
}

#[cfg(test)]
#[path = "activity_tests.rs"]
mod tests;
