// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

/// Root state directory: `AGENTDECK_STATE_DIR` > `XDG_STATE_HOME/agent-deck`
/// > `~/.local/state/agent-deck`.
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("AGENTDECK_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("agent-deck");
    }
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".local/state/agent-deck")
}

/// Reconciliation tick interval, overridable via `AGENTDECK_RECONCILE_MS`.
/// Defaults to the 2s user-activity window spec.md §5 already fixes for
/// status suppression — there's no independently specified cadence for
/// instance-id reconciliation, so this borrows that figure.
pub fn reconcile_interval() -> Duration {
    std::env::var("AGENTDECK_RECONCILE_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(2))
}
