// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `Session` — binds a [`SessionAdapter`]-backed terminal target to a
//! lazily-allocated [`StateTracker`], a cached [`ToolKind`] classification,
//! and a coarse [`SessionLifecycle`] (spec.md §3, §6 control surface).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tf_adapters::SessionAdapter;
use tf_core::{Clock, SessionId, SessionLifecycle, SessionStatus, SystemClock, ToolKind};
use tokio::sync::Mutex as AsyncMutex;

use crate::activity::{ActivityTimestampSource, SessionCache};
use crate::error::TrackerError;
use crate::state_tracker::StateTracker;

/// How many of the most recently captured lines are read for the busy
/// check and the fallback hash (spec.md §4.5 operates on the last 10/5 of
/// whatever is captured here).
const RECENT_CONTENT_LINES: u32 = 200;

/// How long a tool classification is trusted before being re-derived
/// (spec.md §3: "cached for a TTL"). Not numerically specified by the
/// source; chosen generously since a session's tool essentially never
/// changes mid-life — see DESIGN.md.
pub const TOOL_CLASSIFICATION_TTL: Duration = Duration::from_secs(60);

/// A managed terminal session: identity, the adapter used to drive its
/// backing terminal, and the lazily-allocated activity state machine that
/// classifies it.
pub struct Session<A, S, C = SystemClock>
where
    A: SessionAdapter,
    S: ActivityTimestampSource,
    C: Clock,
{
    id: SessionId,
    display_name: String,
    work_dir: PathBuf,
    command: String,
    env: Vec<(String, String)>,
    created_at: i64,
    adapter: A,
    cache: Arc<SessionCache<S>>,
    clock: C,
    target: AsyncMutex<Option<String>>,
    tracker: Mutex<Option<Arc<StateTracker<C>>>>,
    lifecycle: Mutex<SessionLifecycle>,
    tool_cache: Mutex<Option<(ToolKind, Instant)>>,
}

impl<A, S> Session<A, S, SystemClock>
where
    A: SessionAdapter,
    S: ActivityTimestampSource,
{
    pub fn new(
        id: SessionId,
        display_name: String,
        work_dir: PathBuf,
        command: String,
        env: Vec<(String, String)>,
        created_at: i64,
        adapter: A,
        cache: Arc<SessionCache<S>>,
    ) -> Self {
        Self::with_clock(
            id,
            display_name,
            work_dir,
            command,
            env,
            created_at,
            adapter,
            cache,
            SystemClock,
        )
    }
}

impl<A, S, C> Session<A, S, C>
where
    A: SessionAdapter,
    S: ActivityTimestampSource,
    C: Clock,
{
    #[allow(clippy::too_many_arguments)]
    pub fn with_clock(
        id: SessionId,
        display_name: String,
        work_dir: PathBuf,
        command: String,
        env: Vec<(String, String)>,
        created_at: i64,
        adapter: A,
        cache: Arc<SessionCache<S>>,
        clock: C,
    ) -> Self {
        Self {
            id,
            display_name,
            work_dir,
            command,
            env,
            created_at,
            adapter,
            cache,
            clock,
            target: AsyncMutex::new(None),
            tracker: Mutex::new(None),
            lifecycle: Mutex::new(SessionLifecycle::Running),
            tool_cache: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn work_dir(&self) -> &PathBuf {
        &self.work_dir
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn lifecycle(&self) -> SessionLifecycle {
        *self.lifecycle.lock()
    }

    /// The state tracker, allocated on first access. Lazily allocating this
    /// (rather than in `new`) is what makes `Acknowledge()` before the first
    /// `GetStatus()` poll legal (spec.md §3).
    fn tracker(&self) -> Arc<StateTracker<C>> {
        let mut guard = self.tracker.lock();
        if let Some(tracker) = guard.as_ref() {
            return Arc::clone(tracker);
        }
        let tracker = Arc::new(StateTracker::with_clock(self.clock.clone()));
        *guard = Some(Arc::clone(&tracker));
        tracker
    }

    async fn target(&self) -> Result<String, TrackerError> {
        self.target
            .lock()
            .await
            .clone()
            .ok_or_else(|| TrackerError::NotStarted(self.id.to_string()))
    }

    /// Spawns the backing terminal target via the adapter.
    pub async fn start(&self) -> Result<(), TrackerError> {
        let target = self
            .adapter
            .spawn(self.id.as_str(), &self.work_dir, &self.command, &self.env)
            .await?;
        *self.target.lock().await = Some(target);
        *self.lifecycle.lock() = SessionLifecycle::Running;
        Ok(())
    }

    /// Destroys the backing terminal target. Killing an already-dead
    /// target is not an error (adapter contract).
    pub async fn kill(&self) -> Result<(), TrackerError> {
        let target = self.target().await?;
        self.adapter.kill(&target).await?;
        Ok(())
    }

    /// Rebinds to the same tmux target (respawn-pane), reusing the
    /// existing target id rather than allocating a fresh one.
    pub async fn respawn_pane(&self) -> Result<(), TrackerError> {
        let target = self.target().await?;
        self.adapter
            .respawn_pane(&target, &self.work_dir, &self.command, &self.env)
            .await?;
        *self.lifecycle.lock() = SessionLifecycle::Running;
        Ok(())
    }

    pub async fn send_keys(&self, input: &str) -> Result<(), TrackerError> {
        let target = self.target().await?;
        self.adapter.send(&target, input).await?;
        Ok(())
    }

    pub async fn send_literal(&self, text: &str) -> Result<(), TrackerError> {
        let target = self.target().await?;
        self.adapter.send_literal(&target, text).await?;
        Ok(())
    }

    pub async fn send_enter(&self) -> Result<(), TrackerError> {
        let target = self.target().await?;
        self.adapter.send_enter(&target).await?;
        Ok(())
    }

    pub async fn send_ctrl_c(&self) -> Result<(), TrackerError> {
        let target = self.target().await?;
        self.adapter.send_ctrl_c(&target).await?;
        Ok(())
    }

    pub async fn send_ctrl_u(&self) -> Result<(), TrackerError> {
        let target = self.target().await?;
        self.adapter.send_ctrl_u(&target).await?;
        Ok(())
    }

    pub async fn capture_pane(&self, lines: u32) -> Result<String, TrackerError> {
        let target = self.target().await?;
        Ok(self.adapter.capture_output(&target, lines).await?)
    }

    pub async fn get_environment(&self, key: &str) -> Result<Option<String>, TrackerError> {
        let target = self.target().await?;
        Ok(self.adapter.get_environment(&target, key).await?)
    }

    pub async fn set_environment(&self, key: &str, value: &str) -> Result<(), TrackerError> {
        let target = self.target().await?;
        self.adapter.set_environment(&target, key, value).await?;
        Ok(())
    }

    /// Classifies the bound command's tool, caching the result for
    /// [`TOOL_CLASSIFICATION_TTL`]. Re-detected from the command string
    /// first, falling back to captured content only when the command
    /// string is ambiguous (spec.md §3).
    pub async fn tool(&self) -> ToolKind {
        if let Some((kind, detected_at)) = *self.tool_cache.lock() {
            if self.clock.now().duration_since(detected_at) < TOOL_CLASSIFICATION_TTL {
                return kind;
            }
        }

        let from_command = ToolKind::from_command(&self.command);
        let kind = if from_command != ToolKind::Other {
            from_command
        } else {
            match self.capture_pane(RECENT_CONTENT_LINES).await {
                Ok(content) => ToolKind::from_content(&content),
                Err(_) => ToolKind::Other,
            }
        };

        *self.tool_cache.lock() = Some((kind, self.clock.now()));
        kind
    }

    /// Classifies the session's current activity status (spec.md §4.4).
    ///
    /// Step 1: if the underlying terminal is confirmed gone, returns
    /// `Inactive` and flips the session's lifecycle to `Error` (spec.md §7
    /// "sessions that lose their upstream terminal transition to error").
    /// Any other liveness-check failure is treated as transient and falls
    /// through to the timestamp/content state machine below.
    pub async fn get_status(&self) -> SessionStatus {
        let target = match self.target.lock().await.clone() {
            Some(target) => target,
            None => return self.tracker().mark_inactive(),
        };

        if let Ok(false) = self.adapter.is_alive(&target).await {
            *self.lifecycle.lock() = SessionLifecycle::Error;
            return self.tracker().mark_inactive();
        }

        let tracker = self.tracker();
        match self.cache.activity_timestamp(&target).await {
            Some(current_ts) => {
                let busy_content = if tracker.should_check_busy_indicator(current_ts) {
                    self.adapter
                        .capture_output(&target, RECENT_CONTENT_LINES)
                        .await
                        .ok()
                } else {
                    None
                };
                tracker.poll_primary(current_ts, busy_content.as_deref())
            }
            None => match self.adapter.capture_output(&target, RECENT_CONTENT_LINES).await {
                Ok(content) => tracker.poll_fallback(&content),
                Err(_) => tracker.last_stable_status(),
            },
        }
    }

    pub fn acknowledge(&self) {
        self.tracker().acknowledge();
    }

    pub fn acknowledge_with_snapshot(&self) {
        self.tracker().acknowledge_with_snapshot();
    }

    pub fn reset_acknowledged(&self) {
        self.tracker().reset_acknowledged();
    }

    /// Event-driven promotion path from the [`crate::log_watcher::LogWatcher`].
    pub fn signal_file_activity(&self) {
        self.tracker().signal_file_activity();
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
