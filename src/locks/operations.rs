//! Run lock acquisition and inspection.

use super::guard::LockGuard;
use super::metadata::LockMetadata;
use crate::context::RunContext;
use crate::error::{Result, RunnerError};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;
use tracing::warn;

/// Acquire the exclusive run lock for a base directory.
///
/// A stale lock (holder process gone) is removed and acquisition retried
/// once. Fails with `LockError` when a live holder exists.
pub fn acquire_run_lock(ctx: &RunContext, action: &str) -> Result<LockGuard> {
    let path = ctx.run_lock_path();
    let metadata = LockMetadata::new(action);

    if let Some(guard) = try_create(&path, &metadata)? {
        return Ok(guard);
    }

    let existing = LockMetadata::from_file(&path).ok();
    match existing {
        Some(held) if held.is_stale() => {
            warn!(
                path = %path.display(),
                owner = %held.owner,
                pid = ?held.pid,
                "removing stale run lock"
            );
            fs::remove_file(&path).map_err(|e| {
                RunnerError::LockError(format!(
                    "failed to remove stale lock '{}': {}",
                    path.display(),
                    e
                ))
            })?;
            try_create(&path, &metadata)?.ok_or_else(|| held_error(&path, None))
        }
        held => Err(held_error(&path, held.as_ref())),
    }
}

/// Metadata of the current run lock, if one exists and is readable.
pub fn read_run_lock(ctx: &RunContext) -> Option<LockMetadata> {
    LockMetadata::from_file(ctx.run_lock_path()).ok()
}

/// Create the lock file exclusively. `None` means it already exists.
fn try_create(path: &Path, metadata: &LockMetadata) -> Result<Option<LockGuard>> {
    if let Some(parent) = path.parent()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| {
            RunnerError::UserError(format!(
                "failed to create directory '{}': {}",
                parent.display(),
                e
            ))
        })?;
    }

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(None),
        Err(e) => {
            return Err(RunnerError::LockError(format!(
                "failed to acquire lock '{}': {}",
                path.display(),
                e
            )));
        }
    };

    let json = metadata.to_json()?;
    if let Err(e) = file.write_all(json.as_bytes()).and_then(|_| file.sync_all()) {
        let _ = fs::remove_file(path);
        return Err(RunnerError::LockError(format!(
            "failed to write lock metadata: {}",
            e
        )));
    }

    Ok(Some(LockGuard::new(path.to_path_buf())))
}

fn held_error(path: &Path, held: Option<&LockMetadata>) -> RunnerError {
    let detail = match held {
        Some(meta) => format!(
            "\nLock: {} (created {} ago by {}, pid {})\nAction: {}",
            path.display(),
            meta.age_string(),
            meta.owner,
            meta.pid.map(|p| p.to_string()).unwrap_or_else(|| "?".to_string()),
            meta.action
        ),
        None => format!("\nLock: {}", path.display()),
    };
    RunnerError::LockError(format!(
        "another isotask command is using this base directory{}",
        detail
    ))
}
