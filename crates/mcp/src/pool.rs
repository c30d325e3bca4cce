// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `Pool` — owns the set of [`SocketProxy`] instances, applies pooling
//! policy, and discovers sockets owned by other processes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tf_core::McpName;
use tokio::sync::RwLock as AsyncRwLock;
use tokio_util::sync::CancellationToken;

use crate::env;
use crate::error::PoolError;
use crate::socket_proxy::{socket_alive, ProxyStatus, SocketProxy, LIVENESS_TIMEOUT};

/// Pooling policy (spec.md §3): `ShouldPool(name)` is
/// `enabled ∧ ((pool_all ∧ name ∉ exclude) ∨ (¬pool_all ∧ name ∈ pool_list))`.
///
/// `Deserialize` so this can be loaded straight out of the project's TOML
/// config (SPEC_FULL.md §1 "Configuration"); every field defaults to its
/// `Default` value so a config file only needs to mention what it overrides.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub enabled: bool,
    pub pool_all: bool,
    pub exclude: HashSet<String>,
    pub pool_list: HashSet<String>,
    pub fallback_to_stdio: bool,
}

impl PoolConfig {
    pub fn should_pool(&self, name: &str) -> bool {
        if !self.enabled {
            return false;
        }
        if self.pool_all {
            !self.exclude.contains(name)
        } else {
            self.pool_list.contains(name)
        }
    }
}

/// Owns every [`SocketProxy`] this process has started or discovered.
pub struct Pool {
    proxies: AsyncRwLock<HashMap<McpName, Arc<SocketProxy>>>,
    config: PoolConfig,
    root_cancel: CancellationToken,
}

impl Pool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            proxies: AsyncRwLock::new(HashMap::new()),
            config,
            root_cancel: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn should_pool(&self, name: &str) -> bool {
        self.config.should_pool(name)
    }

    /// Idempotent: if a proxy named `name` already exists, returns success
    /// without modification. Otherwise reserves the name under a brief
    /// write-lock, then spawns outside any lock (spec.md §5: blocking ops
    /// must not be performed while holding the pool lock).
    pub async fn start(
        &self,
        name: McpName,
        command: String,
        args: Vec<String>,
        env: Vec<(String, String)>,
    ) -> Result<Arc<SocketProxy>, PoolError> {
        if let Some(existing) = self.proxies.read().await.get(&name) {
            return Ok(Arc::clone(existing));
        }

        let socket_dir = crate::env::socket_dir();
        let proxy = Arc::new(SocketProxy::new_owned(
            name.clone(),
            &socket_dir,
            command,
            args,
            env,
            self.root_cancel.child_token(),
        ));

        {
            let mut proxies = self.proxies.write().await;
            if let Some(existing) = proxies.get(&name) {
                return Ok(Arc::clone(existing));
            }
            proxies.insert(name.clone(), Arc::clone(&proxy));
        }

        if let Err(e) = proxy.start().await {
            self.proxies.write().await.remove(&name);
            return Err(e.into());
        }

        Ok(proxy)
    }

    /// True iff a proxy exists, its status is Running, and its socket
    /// accepts a connection within 500ms. A Running-but-dead socket
    /// triggers `restart_proxy` and returns the post-restart liveness.
    pub async fn is_running(&self, name: &str) -> bool {
        let proxy = match self.proxies.read().await.get(name) {
            Some(p) => Arc::clone(p),
            None => return false,
        };

        if proxy.status().await != ProxyStatus::Running {
            return false;
        }

        if socket_alive(proxy.socket_path(), LIVENESS_TIMEOUT).await {
            return true;
        }

        match self.restart_proxy(name).await {
            Ok(restarted) => socket_alive(restarted.socket_path(), LIVENESS_TIMEOUT).await,
            Err(_) => false,
        }
    }

    /// Returns the socket path for a named proxy, if one exists (regardless
    /// of status; spec.md §4.1 `GetSocketPath`).
    pub async fn socket_path(&self, name: &str) -> Option<std::path::PathBuf> {
        self.proxies
            .read()
            .await
            .get(name)
            .map(|p| p.socket_path().to_path_buf())
    }

    /// Stops the existing proxy, deletes its socket file, and constructs +
    /// starts a fresh proxy with the same spawn parameters.
    pub async fn restart_proxy(&self, name: &str) -> Result<Arc<SocketProxy>, PoolError> {
        let existing = self
            .proxies
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| PoolError::NotFound(name.to_string()))?;

        existing.stop().await?;

        let Some(spawn) = existing.spawn_params() else {
            // External proxies have nothing to restart; report it alive or
            // dead based on the foreign socket's own state.
            return Ok(existing);
        };

        let socket_dir = env::socket_dir();
        let fresh = Arc::new(SocketProxy::new_owned(
            McpName::new(name),
            &socket_dir,
            spawn.command,
            spawn.args,
            spawn.env,
            self.root_cancel.child_token(),
        ));
        fresh.start().await?;

        self.proxies
            .write()
            .await
            .insert(McpName::new(name), Arc::clone(&fresh));

        Ok(fresh)
    }

    /// Cancels the root context and stops every proxy. Idempotent.
    pub async fn shutdown(&self) {
        self.root_cancel.cancel();
        let proxies: Vec<Arc<SocketProxy>> = self.proxies.read().await.values().cloned().collect();
        for proxy in proxies {
            let _ = proxy.stop().await;
        }
    }

    /// Scans `agentdeck-mcp-*.sock` in the socket directory, skips names
    /// already known, filters to alive sockets, and registers each as an
    /// external proxy. Returns the count registered.
    pub async fn discover_existing_sockets(&self) -> usize {
        let socket_dir = env::socket_dir();
        let entries = match std::fs::read_dir(&socket_dir) {
            Ok(entries) => entries,
            Err(_) => return 0,
        };

        let mut discovered = 0usize;
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(file_name) = path.file_name().and_then(|f| f.to_str()) else {
                continue;
            };
            let Some(name) = file_name
                .strip_prefix("agentdeck-mcp-")
                .and_then(|rest| rest.strip_suffix(".sock"))
            else {
                continue;
            };

            if self.proxies.read().await.contains_key(name) {
                continue;
            }
            if !socket_alive(&path, LIVENESS_TIMEOUT).await {
                continue;
            }

            let mcp_name = McpName::new(name);
            let proxy = Arc::new(SocketProxy::new_external(mcp_name.clone(), path));
            let mut proxies = self.proxies.write().await;
            if proxies.contains_key(&mcp_name) {
                continue;
            }
            proxies.insert(mcp_name, proxy);
            discovered += 1;
        }

        discovered
    }

    pub async fn get(&self, name: &str) -> Option<Arc<SocketProxy>> {
        self.proxies.read().await.get(name).cloned()
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
