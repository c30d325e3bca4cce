// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Emits the on-disk MCP manifest (`.mcp.json` / the global `.claude.json`)
//! that agent processes consume, choosing socket vs stdio transport per
//! entry (spec.md §4.3).

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tempfile::NamedTempFile;

use crate::error::ManifestError;
use crate::pool::Pool;
use crate::socket_proxy::{socket_alive, SocketProxy, LIVENESS_TIMEOUT};

/// How long to busy-wait for a not-yet-running pooled socket before falling
/// back (spec.md §4.3 step 1a, §5 "socket-ready busy-wait").
const SOCKET_READY_DEADLINE: Duration = Duration::from_secs(3);
const SOCKET_READY_POLL: Duration = Duration::from_millis(100);

/// Catalog definition for one MCP server, as found in user/project config.
#[derive(Debug, Clone)]
pub struct McpDefinition {
    pub command: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

/// One entry in an emitted `.mcp.json`: either a socket proxy (via `nc -U`)
/// or a direct stdio spawn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ManifestEntry {
    Socket {
        command: String,
        args: Vec<String>,
    },
    Stdio {
        #[serde(rename = "type")]
        kind: String,
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: BTreeMap<String, String>,
    },
}

impl ManifestEntry {
    fn socket(socket_path: &Path) -> Self {
        ManifestEntry::Socket {
            command: "nc".to_string(),
            args: vec!["-U".to_string(), socket_path.display().to_string()],
        }
    }

    fn stdio(def: &McpDefinition) -> Self {
        ManifestEntry::Stdio {
            kind: "stdio".to_string(),
            command: def.command.clone(),
            args: def.args.clone(),
            env: def.env.iter().cloned().collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct McpManifest {
    #[serde(rename = "mcpServers")]
    mcp_servers: BTreeMap<String, ManifestEntry>,
}

/// Resolves one named entry's transport, applying the three-branch decision
/// tree from spec.md §4.3.
async fn resolve_entry(
    name: &str,
    def: &McpDefinition,
    pool: Option<&Pool>,
    fallback_to_stdio: bool,
) -> Result<ManifestEntry, ManifestError> {
    match pool {
        Some(pool) if pool.should_pool(name) => {
            let proxy = pool.get(name).await;
            let ready_socket_path = match &proxy {
                Some(p) if wait_for_ready(p).await => Some(p.socket_path().to_path_buf()),
                _ => None,
            };
            if let Some(socket_path) = ready_socket_path {
                Ok(ManifestEntry::socket(&socket_path))
            } else if fallback_to_stdio {
                Ok(ManifestEntry::stdio(def))
            } else {
                Err(ManifestError::PolicyViolation {
                    name: name.to_string(),
                    deadline_ms: SOCKET_READY_DEADLINE.as_millis() as u64,
                })
            }
        }
        Some(_) => Ok(ManifestEntry::stdio(def)),
        None => {
            let socket_path = crate::socket_proxy::SocketProxy::socket_path_for(
                &crate::env::socket_dir(),
                name,
            );
            if socket_alive(&socket_path, LIVENESS_TIMEOUT).await {
                Ok(ManifestEntry::socket(&socket_path))
            } else if fallback_to_stdio {
                Ok(ManifestEntry::stdio(def))
            } else {
                Err(ManifestError::PolicyViolation {
                    name: name.to_string(),
                    deadline_ms: SOCKET_READY_DEADLINE.as_millis() as u64,
                })
            }
        }
    }
}

/// Busy-waits up to [`SOCKET_READY_DEADLINE`] for a pooled proxy to report
/// Running + alive (spec.md §4.3 step 1a).
async fn wait_for_ready(proxy: &SocketProxy) -> bool {
    let deadline = tokio::time::Instant::now() + SOCKET_READY_DEADLINE;
    loop {
        if socket_alive(proxy.socket_path(), LIVENESS_TIMEOUT).await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(SOCKET_READY_POLL).await;
    }
}

/// Writes `<project>/.mcp.json` atomically (temp file + rename) for the
/// given enabled names, resolving each against `catalog`.
pub async fn write_project_manifest(
    project_path: &Path,
    enabled: &[String],
    catalog: &BTreeMap<String, McpDefinition>,
    pool: Option<&Pool>,
    fallback_to_stdio: bool,
) -> Result<(), ManifestError> {
    let mut mcp_servers = BTreeMap::new();
    for name in enabled {
        let def = catalog
            .get(name)
            .ok_or_else(|| ManifestError::UndefinedMcp(name.clone()))?;
        let entry = resolve_entry(name, def, pool, fallback_to_stdio).await?;
        mcp_servers.insert(name.clone(), entry);
    }

    let manifest = McpManifest { mcp_servers };
    let body = serde_json::to_string_pretty(&manifest)?;
    atomic_write(&project_path.join(".mcp.json"), body.as_bytes())?;
    Ok(())
}

/// Updates only the `mcpServers` field of the global config file, preserving
/// every other top-level key, written back atomically with 0600 permissions
/// (spec.md §6).
pub async fn update_global_manifest(
    global_config_path: &Path,
    enabled: &[String],
    catalog: &BTreeMap<String, McpDefinition>,
    pool: Option<&Pool>,
    fallback_to_stdio: bool,
) -> Result<(), ManifestError> {
    let mut root: Map<String, Value> = if global_config_path.exists() {
        let raw = std::fs::read_to_string(global_config_path)?;
        match serde_json::from_str::<Value>(&raw)? {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    } else {
        Map::new()
    };

    let mut mcp_servers = BTreeMap::new();
    for name in enabled {
        let def = catalog
            .get(name)
            .ok_or_else(|| ManifestError::UndefinedMcp(name.clone()))?;
        let entry = resolve_entry(name, def, pool, fallback_to_stdio).await?;
        mcp_servers.insert(name.clone(), entry);
    }

    root.insert("mcpServers".to_string(), serde_json::to_value(&mcp_servers)?);

    let body = serde_json::to_string_pretty(&Value::Object(root))?;
    atomic_write_with_mode(global_config_path, body.as_bytes(), 0o600)?;
    Ok(())
}

fn atomic_write(path: &Path, contents: &[u8]) -> Result<(), ManifestError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    std::io::Write::write_all(&mut tmp, contents)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(unix)]
fn atomic_write_with_mode(path: &Path, contents: &[u8], mode: u32) -> Result<(), ManifestError> {
    use std::os::unix::fs::PermissionsExt;

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    std::io::Write::write_all(&mut tmp, contents)?;
    tmp.as_file().set_permissions(std::fs::Permissions::from_mode(mode))?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(not(unix))]
fn atomic_write_with_mode(path: &Path, contents: &[u8], _mode: u32) -> Result<(), ManifestError> {
    atomic_write(path, contents)
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
