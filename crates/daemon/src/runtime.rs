// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `Daemon` — bootstraps and owns the process-lifetime infrastructure: the
//! MCP [`Pool`], the pipe-log [`LogWatcher`], and the upstream-session
//! [`InstanceManager`] (SPEC_FULL.md §2 `tf-daemon` row).
//!
//! This crate does not discover or create instances itself — populating
//! `Daemon::instances` is the job of whatever fleet manager embeds this
//! binary's library half. The reconciliation tick here is a no-op until
//! that caller has rows to hand it.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;

use tf_adapters::TmuxAdapter;
use tf_core::InstanceId;
use tf_mcp::{Pool, PoolConfig};
use tf_tracker::{Instance, InstanceManager, LogWatcher, TmuxEnvDetector};

use crate::error::DaemonError;

pub struct Daemon {
    pub pool: Arc<Pool>,
    pub log_watcher: Arc<LogWatcher>,
    pub instances: Arc<RwLock<Vec<Instance>>>,
    instance_manager: InstanceManager<TmuxEnvDetector<TmuxAdapter>>,
    cancel: CancellationToken,
}

impl Daemon {
    pub fn bootstrap(pool_config: PoolConfig) -> Result<Self, DaemonError> {
        let cancel = CancellationToken::new();
        let pool = Arc::new(Pool::new(pool_config));
        let log_watcher = Arc::new(LogWatcher::spawn(cancel.child_token())?);
        let detector = TmuxEnvDetector::new(TmuxAdapter::new(), claude_session_dir_for);
        let instance_manager = InstanceManager::new(detector);

        Ok(Self {
            pool,
            log_watcher,
            instances: Arc::new(RwLock::new(Vec::new())),
            instance_manager,
            cancel,
        })
    }

    /// Registers sockets left behind by a previous process (spec.md's
    /// `DiscoverExistingSockets`) — call once at startup.
    pub async fn discover_existing_sockets(&self) -> usize {
        self.pool.discover_existing_sockets().await
    }

    /// One reconciliation pass over currently-known instances (spec.md
    /// §4.6). `target_ids` maps each live instance to its bound session's
    /// backing terminal target id.
    pub async fn reconcile(&self, target_ids: &HashMap<InstanceId, String>) {
        let mut snapshot = self.instances.read().clone();
        self.instance_manager.reconcile(&mut snapshot, target_ids).await;
        *self.instances.write() = snapshot;
    }

    /// Cancels every background task and stops every owned child process.
    pub async fn shutdown(&self) {
        info!("daemon shutting down");
        self.log_watcher.shutdown().await;
        self.pool.shutdown().await;
        self.cancel.cancel();
    }
}

fn claude_session_dir_for(project: &std::path::Path) -> PathBuf {
    let _ = project;
    tf_tracker::env::claude_config_dir().join("projects")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bootstrap_starts_with_no_instances_and_an_idle_reconcile() {
        let daemon = Daemon::bootstrap(PoolConfig::default()).unwrap();
        daemon.reconcile(&HashMap::new()).await;
        assert!(daemon.instances.read().is_empty());
        daemon.shutdown().await;
    }
}
