// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration: fixed on-disk paths under [`crate::env::state_dir`]
//! plus the MCP pooling policy, loaded from `<state_dir>/config.toml` when
//! present (SPEC_FULL.md §1 "Configuration").

use std::path::{Path, PathBuf};

use thiserror::Error;

use tf_mcp::PoolConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub state_dir: PathBuf,
    pub lock_path: PathBuf,
    pub version_path: PathBuf,
    pub log_path: PathBuf,
    pub config_path: PathBuf,
    pub pool: PoolConfig,
}

impl Config {
    /// Loads the user-level daemon config. There is one daemon per user;
    /// all state lives under a fixed directory, not per-project.
    pub fn load() -> Result<Self, ConfigError> {
        let state_dir = crate::env::state_dir();
        let config_path = state_dir.join("config.toml");
        let pool = load_pool_config(&config_path)?;

        Ok(Self {
            lock_path: state_dir.join("daemon.pid"),
            version_path: state_dir.join("daemon.version"),
            log_path: state_dir.join("daemon.log"),
            config_path,
            pool,
            state_dir,
        })
    }
}

/// A missing config file is not an error — `PoolConfig::default()` disables
/// pooling entirely, matching the `enabled` field's `Default` of `false`.
fn load_pool_config(path: &Path) -> Result<PoolConfig, ConfigError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(PoolConfig::default()),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
