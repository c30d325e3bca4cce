// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the mcp crate.

use std::path::PathBuf;

/// Directory sockets are created in. Spec.md §6 fixes this at `/tmp`;
/// overridable so tests don't collide with a real pool's sockets on the
/// same machine.
pub fn socket_dir() -> PathBuf {
    std::env::var("AGENTDECK_MCP_SOCKET_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

/// `AGENTDECK_DEBUG=1` enables verbose tracing (spec.md §6).
pub fn debug_enabled() -> bool {
    std::env::var("AGENTDECK_DEBUG")
        .map(|v| v == "1")
        .unwrap_or(false)
}
