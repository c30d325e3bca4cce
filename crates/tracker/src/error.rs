// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the activity tracker.

use thiserror::Error;

/// Errors surfaced by [`crate::session::Session`] and [`crate::instance::InstanceManager`].
///
/// Capture/activity-read failures are non-fatal by design (spec.md §4.4,
/// §7): they drive the primary path to fall back rather than propagate,
/// so they only reach a caller through [`TrackerError::CaptureFailure`]
/// when even the fallback path has nothing to report.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("session adapter error: {0}")]
    Session(#[from] tf_adapters::SessionError),

    #[error("capture failed for {session}: {reason}")]
    CaptureFailure { session: String, reason: String },

    #[error("session not started: {0}")]
    NotStarted(String),

    #[error("instance not found: {0}")]
    InstanceNotFound(tf_core::InstanceId),

    #[error("log watch failed: {0}")]
    Watch(#[from] notify::Error),
}
