// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the socket multiplexer.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from a single [`crate::SocketProxy`].
#[derive(Debug, Error)]
pub enum SocketProxyError {
    #[error("failed to spawn {name}: {source}")]
    SpawnFailure {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("spawning {name} did not complete within {timeout_ms}ms")]
    SpawnTimeout { name: String, timeout_ms: u64 },

    #[error("failed to bind listener at {path}: {source}")]
    ListenerBindFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("socket for {0} is not accepting connections")]
    SocketDead(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors from [`crate::Pool`] operations.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("mcp not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Proxy(#[from] SocketProxyError),
}

/// Errors from MCP manifest emission.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Pooling was required for `name` but it did not become ready within
    /// `deadline_ms` and stdio fallback is disabled (spec.md §7:
    /// `PolicyViolation`).
    #[error("mcp {name} did not become ready within {deadline_ms}ms and stdio fallback is disabled")]
    PolicyViolation { name: String, deadline_ms: u64 },

    /// The manifest names an MCP with no catalog definition to fall back to.
    #[error("no stdio definition found for mcp {0}")]
    UndefinedMcp(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
