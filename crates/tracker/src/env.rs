// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the tracker crate.

use std::path::PathBuf;

/// `<home>/.agent-deck/logs` (spec.md §6), honoring `HOME`. Overridable via
/// `AGENTDECK_LOG_DIR` so tests don't touch a real home directory.
pub fn log_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("AGENTDECK_LOG_DIR") {
        return PathBuf::from(dir);
    }
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".agent-deck").join("logs")
}

/// `CLAUDE_CONFIG_DIR`, falling back to `~/.claude` (spec.md §6).
pub fn claude_config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CLAUDE_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".claude")
}

/// `AGENTDECK_DEBUG=1` enables verbose tracing (spec.md §6).
pub fn debug_enabled() -> bool {
    std::env::var("AGENTDECK_DEBUG")
        .map(|v| v == "1")
        .unwrap_or(false)
}
