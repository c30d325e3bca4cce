// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the adapters crate.

/// `AGENTDECK_DEBUG=1` enables verbose tracing of tmux/subprocess calls
/// (spec.md §6, "Environment variables consumed").
pub fn debug_enabled() -> bool {
    std::env::var("AGENTDECK_DEBUG")
        .map(|v| v == "1")
        .unwrap_or(false)
}
