// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `LogWatcher` — one filesystem-watcher task fanning out per-path write
//! events to the owning session's [`crate::session::Session::signal_file_activity`]
//! (spec.md §2, §5 "filesystem watcher goroutine fanning out per-path events
//! to session callbacks").

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::activity::ActivityTimestampSource;
use crate::error::TrackerError;
use crate::session::Session;
use tf_adapters::SessionAdapter;
use tf_core::Clock;

type ActivityCallback = Arc<dyn Fn() + Send + Sync>;

/// Watches `<home>/.agent-deck/logs/<session_name>.log` pipe-pane files
/// (spec.md §6) and calls back into whichever session registered that path
/// the moment a write is observed.
pub struct LogWatcher {
    callbacks: Arc<RwLock<HashMap<PathBuf, ActivityCallback>>>,
    watcher: AsyncMutex<RecommendedWatcher>,
    cancel: CancellationToken,
    fanout: AsyncMutex<Option<JoinHandle<()>>>,
}

impl LogWatcher {
    /// Starts the one fan-out task for the process (spec.md §5). Consults
    /// `cancel` on every iteration; cancelling it is the sole shutdown
    /// signal, matching every other long-lived task in this workspace.
    pub fn spawn(cancel: CancellationToken) -> Result<Self, TrackerError> {
        let callbacks: Arc<RwLock<HashMap<PathBuf, ActivityCallback>>> =
            Arc::new(RwLock::new(HashMap::new()));

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<notify::Result<notify::Event>>();
        let watcher = notify::recommended_watcher(move |event| {
            let _ = tx.send(event);
        })?;

        let task_callbacks = Arc::clone(&callbacks);
        let task_cancel = cancel.clone();
        let fanout = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => return,
                    received = rx.recv() => {
                        let Some(received) = received else { return };
                        let Ok(event) = received else { continue };
                        if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                            continue;
                        }
                        let callbacks = task_callbacks.read();
                        for path in &event.paths {
                            if let Some(callback) = callbacks.get(path) {
                                callback();
                            }
                        }
                    }
                }
            }
        });

        Ok(Self {
            callbacks,
            watcher: AsyncMutex::new(watcher),
            cancel,
            fanout: AsyncMutex::new(Some(fanout)),
        })
    }

    /// Registers a raw activity callback for `path`, starting the OS-level
    /// watch if this is the first registration for it.
    pub async fn watch(&self, path: &Path, on_activity: ActivityCallback) -> Result<(), TrackerError> {
        self.callbacks.write().insert(path.to_path_buf(), on_activity);
        self.watcher
            .lock()
            .await
            .watch(path, RecursiveMode::NonRecursive)?;
        Ok(())
    }

    /// Convenience wrapper binding a path directly to a session's
    /// `signal_file_activity`.
    pub async fn watch_session<A, S, C>(
        &self,
        path: &Path,
        session: Arc<Session<A, S, C>>,
    ) -> Result<(), TrackerError>
    where
        A: SessionAdapter,
        S: ActivityTimestampSource,
        C: Clock,
    {
        self.watch(path, Arc::new(move || session.signal_file_activity()))
            .await
    }

    /// Stops watching `path` and drops its callback.
    pub async fn unwatch(&self, path: &Path) -> Result<(), TrackerError> {
        self.callbacks.write().remove(path);
        // A path that was never watched (or already removed) is not an
        // error here: `unwatch` is idempotent from the caller's view.
        let _ = self.watcher.lock().await.unwatch(path);
        Ok(())
    }

    pub fn watched_count(&self) -> usize {
        self.callbacks.read().len()
    }

    /// Cancels the fan-out task and waits for it to exit.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.fanout.lock().await.take() {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
#[path = "log_watcher_tests.rs"]
mod tests;
