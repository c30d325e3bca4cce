// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session management adapters — the tmux-facing half of the control
//! surface a `Session` wraps.

mod tmux;

pub use tmux::TmuxAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeSession, FakeSessionAdapter, SessionCall};

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Errors from session operations
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("spawn failed: {0}")]
    SpawnFailed(String),
    #[error("command failed: {0}")]
    CommandFailed(String),
}

/// Adapter for managing terminal sessions (tmux panes).
///
/// One implementation is shared by every `Session`; the adapter itself
/// is stateless, all per-session state lives in the `Session` that holds
/// a reference to it.
#[async_trait]
pub trait SessionAdapter: Clone + Send + Sync + 'static {
    /// Spawn a new session, returning the backend-assigned target id.
    async fn spawn(
        &self,
        name: &str,
        cwd: &Path,
        cmd: &str,
        env: &[(String, String)],
    ) -> Result<String, SessionError>;

    /// Respawn the pane in place, reusing the same target id. Used when
    /// restarting a session bound to the same tmux target rather than a
    /// fresh one.
    async fn respawn_pane(
        &self,
        id: &str,
        cwd: &Path,
        cmd: &str,
        env: &[(String, String)],
    ) -> Result<(), SessionError>;

    /// Send input, interpreting any key names it contains.
    async fn send(&self, id: &str, input: &str) -> Result<(), SessionError>;

    /// Send literal text to a session (no key-name interpretation).
    async fn send_literal(&self, id: &str, text: &str) -> Result<(), SessionError>;

    /// Send the Enter key to a session.
    async fn send_enter(&self, id: &str) -> Result<(), SessionError>;

    /// Send Ctrl-C to a session.
    async fn send_ctrl_c(&self, id: &str) -> Result<(), SessionError>;

    /// Send Ctrl-U to a session (clear the current input line).
    async fn send_ctrl_u(&self, id: &str) -> Result<(), SessionError>;

    /// Kill a session. Killing an already-dead session is not an error.
    async fn kill(&self, id: &str) -> Result<(), SessionError>;

    /// Check if a session is alive.
    async fn is_alive(&self, id: &str) -> Result<bool, SessionError>;

    /// Capture recent output from a session.
    async fn capture_output(&self, id: &str, lines: u32) -> Result<String, SessionError>;

    /// Read an environment variable from the running pane (used to detect
    /// `CLAUDE_SESSION_ID` / `GEMINI_SESSION_ID`).
    async fn get_environment(&self, id: &str, key: &str) -> Result<Option<String>, SessionError>;

    /// Set an environment variable on the running pane.
    async fn set_environment(
        &self,
        id: &str,
        key: &str,
        value: &str,
    ) -> Result<(), SessionError>;
}
