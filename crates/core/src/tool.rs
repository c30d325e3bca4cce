// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool classification for an `Instance`'s bound command.
//!
//! Re-detected from the command string first, then from captured pane
//! content if the command string is ambiguous (spec.md §3, Session's
//! "Tool classification" field).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which upstream agent tool a session is running, if recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Claude,
    Gemini,
    Other,
}

impl ToolKind {
    /// Classify from the command string used to spawn the session.
    /// Falls back to `Other` rather than guessing.
    pub fn from_command(command: &str) -> Self {
        let first_word = command.split_whitespace().next().unwrap_or("");
        let basename = first_word.rsplit('/').next().unwrap_or(first_word);
        match basename {
            "claude" => ToolKind::Claude,
            "gemini" => ToolKind::Gemini,
            _ => ToolKind::Other,
        }
    }

    /// Classify from captured pane content, when the command string alone
    /// was ambiguous (spec.md §3, Session's "Tool classification" field).
    /// A weaker signal than `from_command`; only consulted when that one
    /// comes back `Other`.
    pub fn from_content(content: &str) -> Self {
        let folded = content.to_lowercase();
        if folded.contains("claude") {
            ToolKind::Claude
        } else if folded.contains("gemini") {
            ToolKind::Gemini
        } else {
            ToolKind::Other
        }
    }

    /// The environment variable this tool's capture-resume command writes
    /// the upstream session id to (spec.md §4.6).
    pub fn session_env_var(self) -> Option<&'static str> {
        match self {
            ToolKind::Claude => Some("CLAUDE_SESSION_ID"),
            ToolKind::Gemini => Some("GEMINI_SESSION_ID"),
            ToolKind::Other => None,
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ToolKind::Claude => "claude",
            ToolKind::Gemini => "gemini",
            ToolKind::Other => "other",
        };
        write!(f, "{s}")
    }
}
