// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `Instance` and `InstanceManager` — binds a [`crate::session::Session`] to
//! one logical fleet-manager task and keeps upstream Claude/Gemini session
//! ids exclusive across all instances (spec.md §3, §4.6).

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tf_adapters::SessionAdapter;
use tf_core::{InstanceId, ToolKind};

/// A logical fleet-manager task bound to one session (spec.md §3).
#[derive(Debug, Clone)]
pub struct Instance {
    pub id: InstanceId,
    pub title: String,
    pub project_path: PathBuf,
    pub group_path: Option<String>,
    pub parent_id: Option<InstanceId>,
    pub tool: ToolKind,
    pub command: String,
    pub created_at: i64,
    pub claude_session_id: Option<String>,
    pub gemini_session_id: Option<String>,
    pub session_id_detected_at: Option<i64>,
    pub loaded_mcp_names: Vec<String>,
}

impl Instance {
    /// The upstream session id for whichever tool this instance runs, if
    /// one has been detected.
    pub fn upstream_session_id(&self) -> Option<&str> {
        match self.tool {
            ToolKind::Claude => self.claude_session_id.as_deref(),
            ToolKind::Gemini => self.gemini_session_id.as_deref(),
            ToolKind::Other => None,
        }
    }

    /// Clears the upstream session id (spec.md §4.6 step 2: "clear the
    /// later instance's ID").
    pub fn clear_upstream_session_id(&mut self) {
        match self.tool {
            ToolKind::Claude => self.claude_session_id = None,
            ToolKind::Gemini => self.gemini_session_id = None,
            ToolKind::Other => {}
        }
        self.session_id_detected_at = None;
    }

    fn set_upstream_session_id(&mut self, id: String, detected_at: i64) {
        match self.tool {
            ToolKind::Claude => self.claude_session_id = Some(id),
            ToolKind::Gemini => self.gemini_session_id = Some(id),
            ToolKind::Other => return,
        }
        self.session_id_detected_at = Some(detected_at);
    }

    /// Snapshot of the MCP set active when this instance started or was
    /// last restarted, compared against current config to flag pending or
    /// stale entries. `stale` are names loaded but no longer enabled;
    /// `pending` are names enabled but not yet loaded.
    pub fn mcp_drift(&self, currently_enabled: &[String]) -> McpDrift {
        let loaded: HashSet<&str> = self.loaded_mcp_names.iter().map(String::as_str).collect();
        let enabled: HashSet<&str> = currently_enabled.iter().map(String::as_str).collect();
        McpDrift {
            stale: loaded.difference(&enabled).map(|s| s.to_string()).collect(),
            pending: enabled.difference(&loaded).map(|s| s.to_string()).collect(),
        }
    }
}

/// Result of comparing an instance's `loaded_mcp_names` snapshot against
/// the currently enabled set (spec.md §3 `Instance.loaded_mcp_names`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct McpDrift {
    pub stale: Vec<String>,
    pub pending: Vec<String>,
}

/// Detects an instance's upstream session id, two-tier (spec.md §4.6):
/// consult the tmux environment variable the capture-resume command wrote,
/// falling back to scanning per-project session files.
#[async_trait]
pub trait SessionIdDetector: Send + Sync + 'static {
    /// `target_id` is the instance's bound session's backing terminal
    /// target (the id `SessionAdapter::spawn` returned). `exclude` is the
    /// set of ids already claimed by another instance this pass.
    async fn detect(
        &self,
        instance: &Instance,
        target_id: &str,
        exclude: &HashSet<String>,
    ) -> Option<(String, i64)>;
}

/// The two-tier detector described by spec.md §4.6: tmux environment
/// variable first, then the newest matching per-project session file
/// modified at or after the instance's `created_at`.
pub struct TmuxEnvDetector<A: SessionAdapter> {
    adapter: A,
    session_dir_for: Box<dyn Fn(&Path) -> PathBuf + Send + Sync>,
}

impl<A: SessionAdapter> TmuxEnvDetector<A> {
    /// `session_dir_for` maps a project path to the directory holding that
    /// tool's per-project session files (a detail of the upstream agent's
    /// on-disk format, out of scope for this spec beyond "scanning" it).
    pub fn new(
        adapter: A,
        session_dir_for: impl Fn(&Path) -> PathBuf + Send + Sync + 'static,
    ) -> Self {
        Self {
            adapter,
            session_dir_for: Box::new(session_dir_for),
        }
    }
}

#[async_trait]
impl<A: SessionAdapter> SessionIdDetector for TmuxEnvDetector<A> {
    async fn detect(
        &self,
        instance: &Instance,
        target_id: &str,
        exclude: &HashSet<String>,
    ) -> Option<(String, i64)> {
        if let Some(var) = instance.tool.session_env_var() {
            if let Ok(Some(value)) = self.adapter.get_environment(target_id, var).await {
                if !value.is_empty() && !exclude.contains(&value) {
                    return Some((value, unix_now()));
                }
            }
        }

        scan_session_files(&(self.session_dir_for)(&instance.project_path), instance.created_at, exclude)
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Scans `dir` for the newest file (by mtime, stem as session id) modified
/// at or after `created_at` and not already in `exclude`.
fn scan_session_files(dir: &Path, created_at: i64, exclude: &HashSet<String>) -> Option<(String, i64)> {
    let entries = std::fs::read_dir(dir).ok()?;
    let mut newest: Option<(String, i64)> = None;

    for entry in entries.flatten() {
        let path = entry.path();
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if exclude.contains(stem) {
            continue;
        }
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        let Ok(modified) = metadata.modified() else {
            continue;
        };
        let modified_ts = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        if modified_ts < created_at {
            continue;
        }
        if newest.as_ref().map(|(_, ts)| modified_ts > *ts).unwrap_or(true) {
            newest = Some((stem.to_string(), modified_ts));
        }
    }

    newest
}

/// Pure dedup pass over already-sorted-by-`created_at` instances (spec.md
/// §4.6 steps 1-3): walks oldest-first, clearing any later instance whose
/// upstream session id collides with an earlier one. Returns the set of
/// ids that survive.
fn assign_exclusive_ids(instances: &mut [Instance]) -> HashSet<String> {
    let mut order: Vec<usize> = (0..instances.len()).collect();
    order.sort_by_key(|&i| instances[i].created_at);

    let mut used = HashSet::new();
    for idx in order {
        let Some(sid) = instances[idx].upstream_session_id().map(str::to_string) else {
            continue;
        };
        if sid.is_empty() {
            continue;
        }
        if used.contains(&sid) {
            // Collision: this instance is the later one in creation order
            // among the ones seen so far, so it yields (spec.md §4.6 step 2,
            // "DedupCollision", handled silently per spec.md §7).
            instances[idx].clear_upstream_session_id();
        } else {
            used.insert(sid);
        }
    }
    used
}

/// Drives the full dedup + re-detect pass across a fleet of instances
/// (spec.md §4.6).
pub struct InstanceManager<D: SessionIdDetector> {
    detector: D,
}

impl<D: SessionIdDetector> InstanceManager<D> {
    pub fn new(detector: D) -> Self {
        Self { detector }
    }

    /// Reconciles `instances` in place. `target_ids` maps each instance to
    /// its bound session's backing terminal target id (needed to query the
    /// tmux environment variable tier of detection); instances absent from
    /// the map are skipped during re-detection (no live session to query).
    pub async fn reconcile(
        &self,
        instances: &mut [Instance],
        target_ids: &std::collections::HashMap<InstanceId, String>,
    ) {
        let mut used = assign_exclusive_ids(instances);

        let mut order: Vec<usize> = (0..instances.len()).collect();
        order.sort_by_key(|&i| instances[i].created_at);

        for idx in order {
            if instances[idx].upstream_session_id().is_some() {
                continue;
            }
            let Some(target_id) = target_ids.get(&instances[idx].id) else {
                continue;
            };
            if let Some((sid, detected_at)) = self.detector.detect(&instances[idx], target_id, &used).await {
                if used.contains(&sid) {
                    continue;
                }
                instances[idx].set_upstream_session_id(sid.clone(), detected_at);
                used.insert(sid);
            }
        }
    }
}

#[cfg(test)]
#[path = "instance_tests.rs"]
mod tests;
