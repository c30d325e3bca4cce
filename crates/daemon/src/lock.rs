// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-instance advisory lock, an exclusive `flock` on the daemon's pid
//! file. Held for the life of the returned `File`; dropping it releases
//! the lock.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use fs2::FileExt;

use crate::error::DaemonError;

pub fn acquire(lock_path: &Path) -> Result<File, DaemonError> {
    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut lock_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .open(lock_path)?;

    lock_file
        .try_lock_exclusive()
        .map_err(DaemonError::LockFailed)?;

    lock_file.set_len(0)?;
    write!(lock_file, "{}", std::process::id())?;
    lock_file.flush()?;
    Ok(lock_file)
}
