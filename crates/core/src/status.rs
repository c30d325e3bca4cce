// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status enums returned by the activity tracker.
//!
//! Two orthogonal enums, not one: `SessionStatus` is the activity-derived
//! status domain from `StateTracker::get_status` (active/waiting/idle/
//! inactive); `SessionLifecycle` is the coarser running/error distinction a
//! `Session` carries once its underlying terminal is confirmed gone. See
//! DESIGN.md for why these are kept separate rather than merged into one
//! five-way enum.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Activity-derived status of a tracked terminal session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Sustained output activity was just confirmed; within cooldown.
    Active,
    /// Cooldown elapsed, content change not yet acknowledged by the user.
    Waiting,
    /// Cooldown elapsed and the user has acknowledged the current state.
    Idle,
    /// The underlying terminal session does not exist.
    Inactive,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Active => "active",
            SessionStatus::Waiting => "waiting",
            SessionStatus::Idle => "idle",
            SessionStatus::Inactive => "inactive",
        };
        write!(f, "{s}")
    }
}

/// Coarse lifecycle of a `Session`, layered above `SessionStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionLifecycle {
    /// The session's terminal exists (or has never been checked and spawn
    /// has not failed).
    Running,
    /// The session lost its upstream terminal and has not been restarted.
    /// Surfaced to the UI collaborator as a banner with restart/delete
    /// actions (spec.md §7).
    Error,
}

impl Default for SessionLifecycle {
    fn default() -> Self {
        SessionLifecycle::Running
    }
}
