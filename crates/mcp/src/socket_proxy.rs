// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `SocketProxy` — one MCP child process wrapped behind one Unix socket,
//! using an accept-loop/reader-loop/writer-loop split with `nc -U <socket>`
//! / signal-0 style liveness probing (see DESIGN.md for grounding).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tf_adapters::subprocess::MCP_SPAWN_TIMEOUT;
use tf_core::McpName;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{Mutex as AsyncMutex, RwLock as AsyncRwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::SocketProxyError;

/// Liveness probe timeout (spec.md §6: "Alive = accepts a connection
/// within 500 ms").
pub const LIVENESS_TIMEOUT: Duration = Duration::from_millis(500);

/// Lifecycle status of a [`SocketProxy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyStatus {
    Starting,
    Running,
    Stopped,
}

/// A client connection id of the form `<name>-client-<counter>`.
pub type ClientId = String;

/// Spawn parameters for an owned proxy, retained so [`crate::Pool`] can
/// rebuild an identical proxy on restart.
#[derive(Debug, Clone)]
pub struct SpawnParams {
    pub command: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

enum Mode {
    /// Owns the child process and binds the listener itself.
    Owned {
        spawn: SpawnParams,
        child: AsyncMutex<Option<Child>>,
        stdin: AsyncMutex<Option<ChildStdin>>,
    },
    /// Fronts a socket owned by another process. `Start`/`Stop` are no-ops
    /// with respect to processes and listeners (spec.md §4.1).
    External,
}

struct ClientHandle {
    write_half: AsyncMutex<OwnedWriteHalf>,
}

/// One pooled MCP child process (or a reference to a foreign-owned socket),
/// multiplexed behind a Unix socket.
pub struct SocketProxy {
    name: McpName,
    socket_path: PathBuf,
    mode: Mode,
    status: AsyncMutex<ProxyStatus>,
    clients: AsyncRwLock<HashMap<ClientId, ClientHandle>>,
    request_map: parking_lot::Mutex<HashMap<Value, ClientId>>,
    next_client_id: AtomicU64,
    cancel: CancellationToken,
    tasks: AsyncMutex<Vec<JoinHandle<()>>>,
    log_path: PathBuf,
}

impl SocketProxy {
    /// Derive the deterministic socket path for an MCP name (spec.md §6).
    pub fn socket_path_for(dir: &Path, name: &str) -> PathBuf {
        dir.join(format!("agentdeck-mcp-{name}.sock"))
    }

    /// Construct a proxy that owns and spawns its own child process.
    pub fn new_owned(
        name: McpName,
        socket_dir: &Path,
        command: String,
        args: Vec<String>,
        env: Vec<(String, String)>,
        cancel: CancellationToken,
    ) -> Self {
        let socket_path = Self::socket_path_for(socket_dir, name.as_str());
        let log_path = socket_dir.join(format!("agentdeck-mcp-{}.log", name.as_str()));
        Self {
            name,
            socket_path,
            mode: Mode::Owned {
                spawn: SpawnParams { command, args, env },
                child: AsyncMutex::new(None),
                stdin: AsyncMutex::new(None),
            },
            status: AsyncMutex::new(ProxyStatus::Starting),
            clients: AsyncRwLock::new(HashMap::new()),
            request_map: parking_lot::Mutex::new(HashMap::new()),
            next_client_id: AtomicU64::new(0),
            cancel,
            tasks: AsyncMutex::new(Vec::new()),
            log_path,
        }
    }

    /// Construct a proxy that only points at a socket owned by another
    /// process (registered-external mode, spec.md §4.1).
    pub fn new_external(name: McpName, socket_path: PathBuf) -> Self {
        let log_path = socket_path.with_extension("log");
        Self {
            name,
            socket_path,
            mode: Mode::External,
            status: AsyncMutex::new(ProxyStatus::Running),
            clients: AsyncRwLock::new(HashMap::new()),
            request_map: parking_lot::Mutex::new(HashMap::new()),
            next_client_id: AtomicU64::new(0),
            cancel: CancellationToken::new(),
            tasks: AsyncMutex::new(Vec::new()),
            log_path,
        }
    }

    pub fn name(&self) -> &McpName {
        &self.name
    }

    /// The spawn parameters for an owned proxy, used by `Pool::restart_proxy`
    /// to rebuild an identical proxy. `None` for external proxies.
    pub fn spawn_params(&self) -> Option<SpawnParams> {
        match &self.mode {
            Mode::Owned { spawn, .. } => Some(spawn.clone()),
            Mode::External => None,
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self.mode, Mode::External)
    }

    /// Returns the socket path regardless of status (spec.md §4.1).
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub async fn status(&self) -> ProxyStatus {
        *self.status.lock().await
    }

    /// Live client count, for observability.
    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Spawn the child (if owned), bind the listener, and start the
    /// accept/broadcast workers. Status transitions Starting -> Running
    /// only after both workers are launched.
    pub async fn start(self: &Arc<Self>) -> Result<(), SocketProxyError> {
        match &self.mode {
            Mode::External => {
                *self.status.lock().await = ProxyStatus::Running;
                Ok(())
            }
            Mode::Owned { spawn, child, stdin } => {
                let mut cmd = Command::new(&spawn.command);
                cmd.args(&spawn.args);
                for (k, v) in &spawn.env {
                    cmd.env(k, v);
                }
                cmd.stdin(std::process::Stdio::piped());
                cmd.stdout(std::process::Stdio::piped());
                cmd.stderr(std::process::Stdio::piped());

                let mut spawned = match tokio::time::timeout(MCP_SPAWN_TIMEOUT, async { cmd.spawn() }).await {
                    Ok(Ok(child)) => child,
                    Ok(Err(source)) => {
                        let _ = std::fs::remove_file(&self.socket_path);
                        return Err(SocketProxyError::SpawnFailure {
                            name: self.name.to_string(),
                            source,
                        });
                    }
                    Err(_elapsed) => {
                        let _ = std::fs::remove_file(&self.socket_path);
                        return Err(SocketProxyError::SpawnTimeout {
                            name: self.name.to_string(),
                            timeout_ms: MCP_SPAWN_TIMEOUT.as_millis() as u64,
                        });
                    }
                };

                let child_stdin = spawned.stdin.take();
                let child_stdout = spawned.stdout.take();
                let child_stderr = spawned.stderr.take();

                *stdin.lock().await = child_stdin;
                *child.lock().await = Some(spawned);

                if self.socket_path.exists() {
                    let _ = std::fs::remove_file(&self.socket_path);
                }
                let listener = UnixListener::bind(&self.socket_path).map_err(|source| {
                    SocketProxyError::ListenerBindFailure {
                        path: self.socket_path.clone(),
                        source,
                    }
                })?;

                let mut tasks = Vec::new();

                if let Some(stdout) = child_stdout {
                    let this = Arc::clone(self);
                    tasks.push(tokio::spawn(async move {
                        this.broadcast_loop(stdout).await;
                    }));
                }

                if let Some(stderr) = child_stderr {
                    let log_path = self.log_path.clone();
                    let cancel = self.cancel.clone();
                    tasks.push(tokio::spawn(async move {
                        Self::drain_stderr(stderr, log_path, cancel).await;
                    }));
                }

                {
                    let this = Arc::clone(self);
                    tasks.push(tokio::spawn(async move {
                        this.accept_loop(listener).await;
                    }));
                }

                *self.tasks.lock().await = tasks;
                *self.status.lock().await = ProxyStatus::Running;
                Ok(())
            }
        }
    }

    async fn accept_loop(self: Arc<Self>, listener: UnixListener) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::debug!(mcp = %self.name, "accept loop cancelled");
                    return;
                }
                accepted = listener.accept() => {
                    let Ok((stream, _addr)) = accepted else {
                        tracing::warn!(mcp = %self.name, "accept failed");
                        continue;
                    };
                    let client_id = format!(
                        "{}-client-{}",
                        self.name,
                        self.next_client_id.fetch_add(1, Ordering::SeqCst)
                    );
                    let (read_half, write_half) = stream.into_split();
                    self.clients.write().await.insert(
                        client_id.clone(),
                        ClientHandle { write_half: AsyncMutex::new(write_half) },
                    );
                    tracing::info!(mcp = %self.name, client = %client_id, "client connected");

                    let this = Arc::clone(&self);
                    tokio::spawn(async move {
                        this.client_reader(client_id, read_half).await;
                    });
                }
            }
        }
    }

    async fn client_reader(
        self: Arc<Self>,
        client_id: ClientId,
        read_half: tokio::net::unix::OwnedReadHalf,
    ) {
        let mut reader = BufReader::new(read_half);
        let mut line = String::new();
        loop {
            line.clear();
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = reader.read_line(&mut line) => {
                    match result {
                        Ok(0) => break,
                        Ok(_) => {
                            let trimmed = line.trim_end_matches(['\n', '\r']);
                            if trimmed.is_empty() {
                                continue;
                            }
                            if let Ok(parsed) = serde_json::from_str::<Value>(trimmed) {
                                if let Some(id) = parsed.get("id").filter(|v| !v.is_null()) {
                                    self.request_map.lock().insert(id.clone(), client_id.clone());
                                }
                            }
                            if let Err(e) = self.write_to_child(trimmed).await {
                                tracing::warn!(mcp = %self.name, error = %e, "forward to child failed");
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::debug!(mcp = %self.name, client = %client_id, error = %e, "client read error");
                            break;
                        }
                    }
                }
            }
        }
        self.clients.write().await.remove(&client_id);
        tracing::info!(mcp = %self.name, client = %client_id, "client disconnected");
    }

    async fn write_to_child(&self, line: &str) -> std::io::Result<()> {
        match &self.mode {
            Mode::Owned { stdin, .. } => {
                let mut guard = stdin.lock().await;
                if let Some(stdin) = guard.as_mut() {
                    stdin.write_all(line.as_bytes()).await?;
                    stdin.write_all(b"\n").await?;
                    stdin.flush().await?;
                }
                Ok(())
            }
            Mode::External => Ok(()),
        }
    }

    async fn broadcast_loop(self: Arc<Self>, stdout: tokio::process::ChildStdout) {
        let mut reader = BufReader::new(stdout);
        let mut line = String::new();
        loop {
            line.clear();
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                result = reader.read_line(&mut line) => {
                    match result {
                        Ok(0) => {
                            tracing::debug!(mcp = %self.name, "child stdout EOF");
                            return;
                        }
                        Ok(_) => {
                            let trimmed = line.trim_end_matches(['\n', '\r']).to_string();
                            if trimmed.is_empty() {
                                continue;
                            }
                            self.route_or_broadcast(&trimmed).await;
                        }
                        Err(e) => {
                            tracing::warn!(mcp = %self.name, error = %e, "child stdout read error");
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn route_or_broadcast(&self, line: &str) {
        let parsed: Option<Value> = serde_json::from_str(line).ok();
        let Some(parsed) = parsed else {
            self.broadcast(line).await;
            return;
        };

        match parsed.get("id").filter(|v| !v.is_null()) {
            None => self.broadcast(line).await,
            Some(id) => {
                let target = self.request_map.lock().remove(id);
                match target {
                    Some(client_id) => {
                        if !self.write_to_client(&client_id, line).await {
                            // Client gone (spec.md §4.1: fall back to broadcast).
                            self.broadcast(line).await;
                        }
                    }
                    None => self.broadcast(line).await,
                }
            }
        }
    }

    /// Writes to a single client. Returns `false` if the client is unknown
    /// or the write failed (treated as `ClientGone`, swallowed here).
    async fn write_to_client(&self, client_id: &str, line: &str) -> bool {
        let clients = self.clients.read().await;
        let Some(handle) = clients.get(client_id) else {
            return false;
        };
        let mut write_half = handle.write_half.lock().await;
        let mut payload = line.as_bytes().to_vec();
        payload.push(b'\n');
        write_half.write_all(&payload).await.is_ok()
    }

    async fn broadcast(&self, line: &str) {
        let clients = self.clients.read().await;
        let mut payload = line.as_bytes().to_vec();
        payload.push(b'\n');
        for (client_id, handle) in clients.iter() {
            let mut write_half = handle.write_half.lock().await;
            if let Err(e) = write_half.write_all(&payload).await {
                tracing::debug!(mcp = %self.name, client = %client_id, error = %e, "broadcast write failed");
            }
        }
    }

    async fn drain_stderr(
        stderr: tokio::process::ChildStderr,
        log_path: PathBuf,
        cancel: CancellationToken,
    ) {
        let Ok(mut file) = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .await
        else {
            tracing::warn!(path = %log_path.display(), "failed to open mcp stderr log");
            return;
        };
        let mut reader = BufReader::new(stderr);
        let mut line = String::new();
        loop {
            line.clear();
            tokio::select! {
                _ = cancel.cancelled() => return,
                result = reader.read_line(&mut line) => {
                    match result {
                        Ok(0) => return,
                        Ok(_) => {
                            if file.write_all(line.as_bytes()).await.is_err() {
                                return;
                            }
                        }
                        Err(_) => return,
                    }
                }
            }
        }
    }

    /// Cancels the subtree, closes the listener and child stdin, sends
    /// SIGTERM to an owned process, waits for exit, deletes the socket
    /// file, and marks the proxy Stopped. Idempotent.
    pub async fn stop(&self) -> Result<(), SocketProxyError> {
        {
            let mut status = self.status.lock().await;
            if *status == ProxyStatus::Stopped {
                return Ok(());
            }
            *status = ProxyStatus::Stopped;
        }

        self.cancel.cancel();

        for handle in self.tasks.lock().await.drain(..) {
            let _ = tokio::time::timeout(Duration::from_secs(2), handle).await;
        }

        if let Mode::Owned { child, stdin, .. } = &self.mode {
            *stdin.lock().await = None;

            let mut child_guard = child.lock().await;
            if let Some(mut child) = child_guard.take() {
                if let Some(pid) = child.id() {
                    let _ = Command::new("kill")
                        .arg("-TERM")
                        .arg(pid.to_string())
                        .output()
                        .await;
                }
                let _ = tokio::time::timeout(Duration::from_secs(5), child.wait()).await;
            }
        }

        let _ = std::fs::remove_file(&self.socket_path);

        Ok(())
    }

    /// `Ok(())` iff the child is alive (signal-0 probe for owned proxies)
    /// and the socket file exists.
    pub async fn health_check(&self) -> Result<(), SocketProxyError> {
        if !self.socket_path.exists() {
            return Err(SocketProxyError::SocketDead(self.name.to_string()));
        }
        if let Mode::Owned { child, .. } = &self.mode {
            let mut guard = child.lock().await;
            let Some(child) = guard.as_mut() else {
                return Err(SocketProxyError::SocketDead(self.name.to_string()));
            };
            let Some(pid) = child.id() else {
                return Err(SocketProxyError::SocketDead(self.name.to_string()));
            };
            let alive = Command::new("kill")
                .arg("-0")
                .arg(pid.to_string())
                .status()
                .await
                .map(|s| s.success())
                .unwrap_or(false);
            if !alive {
                return Err(SocketProxyError::SocketDead(self.name.to_string()));
            }
        }
        Ok(())
    }
}

/// Connect-with-timeout liveness probe (spec.md §6: "accepts a connection
/// within 500 ms").
pub async fn socket_alive(path: &Path, timeout: Duration) -> bool {
    if !path.exists() {
        return false;
    }
    matches!(
        tokio::time::timeout(timeout, UnixStream::connect(path)).await,
        Ok(Ok(_))
    )
}

#[cfg(test)]
#[path = "socket_proxy_tests.rs"]
mod tests;
