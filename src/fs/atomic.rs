//! Atomic filesystem operations.
//!
//! Writes go to a temporary sibling (`.{filename}.{pid}.tmp`), are synced, and
//! are then renamed over the target. `std::fs::rename` replaces an existing
//! destination on every supported platform, so no platform-specific branch is
//! needed. Source and destination always share a directory, hence a volume.

use crate::error::{Result, RunnerError};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Atomically write bytes to a file, creating parent directories as needed.
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| {
            RunnerError::UserError(format!(
                "failed to create parent directory '{}': {}",
                parent.display(),
                e
            ))
        })?;
    }

    let temp_path = temp_path_for(path)?;
    write_and_sync(&temp_path, content)?;

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        RunnerError::UserError(format!(
            "failed to atomically replace '{}': {}",
            path.display(),
            e
        ))
    })?;

    #[cfg(unix)]
    if let Some(parent) = path.parent()
        && let Ok(dir) = File::open(parent)
    {
        let _ = dir.sync_all();
    }

    Ok(())
}

/// Atomically write a string to a file.
pub fn atomic_write_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    atomic_write(path, content.as_bytes())
}

/// Clear the write permission bits on a file.
pub fn mark_read_only<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    let mut perms = fs::metadata(path)
        .map_err(|e| {
            RunnerError::UserError(format!("failed to stat '{}': {}", path.display(), e))
        })?
        .permissions();
    perms.set_readonly(true);
    fs::set_permissions(path, perms).map_err(|e| {
        RunnerError::UserError(format!(
            "failed to mark '{}' read-only: {}",
            path.display(),
            e
        ))
    })
}

/// Remove a directory and everything in it, then recreate it empty.
pub fn reset_dir<P: AsRef<Path>>(dir: P) -> Result<()> {
    let dir = dir.as_ref();
    remove_tree(dir)?;
    fs::create_dir_all(dir).map_err(|e| {
        RunnerError::UserError(format!(
            "failed to create directory '{}': {}",
            dir.display(),
            e
        ))
    })
}

/// Remove a directory and everything in it. Missing directories are fine.
///
/// Read-only files inside are handled: on Windows they are made writable
/// first, since deletion is refused otherwise.
pub fn remove_tree<P: AsRef<Path>>(dir: P) -> Result<()> {
    let dir = dir.as_ref();
    if !dir.exists() {
        return Ok(());
    }
    #[cfg(windows)]
    clear_readonly_recursive(dir);
    fs::remove_dir_all(dir).map_err(|e| {
        RunnerError::UserError(format!(
            "failed to remove directory '{}': {}",
            dir.display(),
            e
        ))
    })
}

#[cfg(windows)]
fn clear_readonly_recursive(dir: &Path) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            clear_readonly_recursive(&path);
        } else if let Ok(meta) = fs::metadata(&path) {
            let mut perms = meta.permissions();
            #[allow(clippy::permissions_set_readonly_false)]
            perms.set_readonly(false);
            let _ = fs::set_permissions(&path, perms);
        }
    }
}

fn temp_path_for(target: &Path) -> Result<PathBuf> {
    let parent = target.parent().unwrap_or(Path::new("."));
    let filename = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            RunnerError::UserError(format!("invalid file path '{}'", target.display()))
        })?;

    Ok(parent.join(format!(".{}.{}.tmp", filename, std::process::id())))
}

fn write_and_sync(path: &Path, content: &[u8]) -> Result<()> {
    let mut file = File::create(path).map_err(|e| {
        RunnerError::UserError(format!(
            "failed to create temporary file '{}': {}",
            path.display(),
            e
        ))
    })?;

    file.write_all(content)
        .and_then(|_| file.sync_all())
        .map_err(|e| {
            let _ = fs::remove_file(path);
            RunnerError::UserError(format!(
                "failed to write temporary file '{}': {}",
                path.display(),
                e
            ))
        })
}
