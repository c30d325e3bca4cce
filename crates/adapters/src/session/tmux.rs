// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tmux session adapter

use super::{SessionAdapter, SessionError};
use crate::subprocess::{run_with_timeout, TMUX_TIMEOUT};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

/// Tmux-based session adapter
#[derive(Clone, Default)]
pub struct TmuxAdapter;

impl TmuxAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SessionAdapter for TmuxAdapter {
    async fn spawn(
        &self,
        name: &str,
        cwd: &Path,
        cmd: &str,
        env: &[(String, String)],
    ) -> Result<String, SessionError> {
        // Precondition: cwd must exist
        if !cwd.exists() {
            return Err(SessionError::SpawnFailed(format!(
                "working directory does not exist: {}",
                cwd.display()
            )));
        }

        let session_id = format!("tf-{}", name);

        // Check if session already exists and clean it up
        let mut has_session_cmd = Command::new("tmux");
        has_session_cmd.args(["has-session", "-t", &session_id]);
        let existing = run_with_timeout(has_session_cmd, TMUX_TIMEOUT, "tmux has-session").await;

        if existing.map(|o| o.status.success()).unwrap_or(false) {
            tracing::warn!(session_id, "session already exists, killing first");
            let mut kill_cmd = Command::new("tmux");
            kill_cmd.args(["kill-session", "-t", &session_id]);
            let _ = run_with_timeout(kill_cmd, TMUX_TIMEOUT, "tmux kill-session").await;
        }

        let mut tmux_cmd = Command::new("tmux");
        tmux_cmd
            .arg("new-session")
            .arg("-d")
            .arg("-s")
            .arg(&session_id)
            .arg("-c")
            .arg(cwd);

        for (key, value) in env {
            tmux_cmd.arg("-e").arg(format!("{}={}", key, value));
        }

        tmux_cmd.arg(cmd);

        let output = run_with_timeout(tmux_cmd, TMUX_TIMEOUT, "tmux new-session")
            .await
            .map_err(SessionError::SpawnFailed)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::error!(session_id, stderr = %stderr, "tmux spawn failed");
            return Err(SessionError::SpawnFailed(stderr.to_string()));
        }

        if !output.stderr.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(session_id, stderr = %stderr, "tmux spawn stderr (non-fatal)");
        }

        Ok(session_id)
    }

    async fn respawn_pane(
        &self,
        id: &str,
        cwd: &Path,
        cmd: &str,
        env: &[(String, String)],
    ) -> Result<(), SessionError> {
        for (key, value) in env {
            self.set_environment(id, key, value).await?;
        }

        let mut tmux_cmd = Command::new("tmux");
        tmux_cmd
            .args(["respawn-pane", "-k", "-t", id, "-c"])
            .arg(cwd)
            .arg(cmd);
        let output = run_with_timeout(tmux_cmd, TMUX_TIMEOUT, "tmux respawn-pane")
            .await
            .map_err(SessionError::CommandFailed)?;

        if !output.status.success() {
            return Err(SessionError::NotFound(id.to_string()));
        }

        Ok(())
    }

    async fn send(&self, id: &str, input: &str) -> Result<(), SessionError> {
        let mut cmd = Command::new("tmux");
        cmd.arg("send-keys").arg("-t").arg(id).arg(input);
        let output = run_with_timeout(cmd, TMUX_TIMEOUT, "tmux send-keys")
            .await
            .map_err(SessionError::CommandFailed)?;

        if !output.status.success() {
            return Err(SessionError::NotFound(id.to_string()));
        }

        Ok(())
    }

    async fn send_literal(&self, id: &str, text: &str) -> Result<(), SessionError> {
        // -l = literal mode (no key name interpretation)
        // -- = end of options (handles text starting with -)
        let mut cmd = Command::new("tmux");
        cmd.args(["send-keys", "-t", id, "-l", "--", text]);
        let output = run_with_timeout(cmd, TMUX_TIMEOUT, "tmux send-keys")
            .await
            .map_err(SessionError::CommandFailed)?;

        if !output.status.success() {
            return Err(SessionError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn send_enter(&self, id: &str) -> Result<(), SessionError> {
        let mut cmd = Command::new("tmux");
        cmd.args(["send-keys", "-t", id, "Enter"]);
        let output = run_with_timeout(cmd, TMUX_TIMEOUT, "tmux send-keys")
            .await
            .map_err(SessionError::CommandFailed)?;

        if !output.status.success() {
            return Err(SessionError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn send_ctrl_c(&self, id: &str) -> Result<(), SessionError> {
        let mut cmd = Command::new("tmux");
        cmd.args(["send-keys", "-t", id, "C-c"]);
        let output = run_with_timeout(cmd, TMUX_TIMEOUT, "tmux send-keys")
            .await
            .map_err(SessionError::CommandFailed)?;

        if !output.status.success() {
            return Err(SessionError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn send_ctrl_u(&self, id: &str) -> Result<(), SessionError> {
        let mut cmd = Command::new("tmux");
        cmd.args(["send-keys", "-t", id, "C-u"]);
        let output = run_with_timeout(cmd, TMUX_TIMEOUT, "tmux send-keys")
            .await
            .map_err(SessionError::CommandFailed)?;

        if !output.status.success() {
            return Err(SessionError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn kill(&self, id: &str) -> Result<(), SessionError> {
        let mut cmd = Command::new("tmux");
        cmd.arg("kill-session").arg("-t").arg(id);
        let output = run_with_timeout(cmd, TMUX_TIMEOUT, "tmux kill-session")
            .await
            .map_err(SessionError::CommandFailed)?;

        if !output.status.success() {
            // Session might already be dead, which is fine
        }

        Ok(())
    }

    async fn is_alive(&self, id: &str) -> Result<bool, SessionError> {
        let mut cmd = Command::new("tmux");
        cmd.arg("has-session").arg("-t").arg(id);
        let output = run_with_timeout(cmd, TMUX_TIMEOUT, "tmux has-session")
            .await
            .map_err(SessionError::CommandFailed)?;

        Ok(output.status.success())
    }

    async fn capture_output(&self, id: &str, lines: u32) -> Result<String, SessionError> {
        let mut cmd = Command::new("tmux");
        cmd.arg("capture-pane")
            .arg("-t")
            .arg(id)
            .arg("-p")
            .arg("-S")
            .arg(format!("-{}", lines));
        let output = run_with_timeout(cmd, TMUX_TIMEOUT, "tmux capture-pane")
            .await
            .map_err(SessionError::CommandFailed)?;

        if !output.status.success() {
            return Err(SessionError::NotFound(id.to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn get_environment(&self, id: &str, key: &str) -> Result<Option<String>, SessionError> {
        let mut cmd = Command::new("tmux");
        cmd.args(["show-environment", "-t", id, key]);
        let output = run_with_timeout(cmd, TMUX_TIMEOUT, "tmux show-environment")
            .await
            .map_err(SessionError::CommandFailed)?;

        if !output.status.success() {
            // tmux exits non-zero both for "session gone" and "var unset";
            // distinguish via is_alive so we don't misreport a dead session
            // as merely having an unset variable.
            if !self.is_alive(id).await? {
                return Err(SessionError::NotFound(id.to_string()));
            }
            return Ok(None);
        }

        let line = String::from_utf8_lossy(&output.stdout);
        let line = line.trim();
        match line.split_once('=') {
            Some((_, value)) => Ok(Some(value.to_string())),
            None => Ok(None),
        }
    }

    async fn set_environment(
        &self,
        id: &str,
        key: &str,
        value: &str,
    ) -> Result<(), SessionError> {
        let mut cmd = Command::new("tmux");
        cmd.args(["set-environment", "-t", id, key, value]);
        let output = run_with_timeout(cmd, TMUX_TIMEOUT, "tmux set-environment")
            .await
            .map_err(SessionError::CommandFailed)?;

        if !output.status.success() {
            return Err(SessionError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "tmux_tests.rs"]
mod tests;
