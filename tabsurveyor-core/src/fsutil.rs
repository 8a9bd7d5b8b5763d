//! Atomic file replacement.
//!
//! Content goes to a uniquely named temporary file in the target's directory,
//! is synced, and is then renamed over the target. A failure at any step
//! leaves the previous content of the target untouched.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::{PipelineError, Result};

/// Writes `contents` to `path` atomically, creating parent directories.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|e| {
        PipelineError::io(format!("Failed to create directory {}", parent.display()), e)
    })?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| PipelineError::invalid_argument(format!("Invalid file path {}", path.display())))?;
    let temp_path = parent.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

    let written = write_and_sync(&temp_path, contents).and_then(|()| {
        fs::rename(&temp_path, path).map_err(|e| {
            PipelineError::io(format!("Failed to replace {}", path.display()), e)
        })
    });

    if written.is_err() {
        // Best effort; the temp file may not exist yet
        let _ = fs::remove_file(&temp_path);
    }
    written
}

fn write_and_sync(temp_path: &Path, contents: &[u8]) -> Result<()> {
    let mut file = File::create(temp_path).map_err(|e| {
        PipelineError::io(format!("Failed to create {}", temp_path.display()), e)
    })?;
    file.write_all(contents)
        .map_err(|e| PipelineError::io(format!("Failed to write {}", temp_path.display()), e))?;
    file.sync_all()
        .map_err(|e| PipelineError::io(format!("Failed to sync {}", temp_path.display()), e))?;
    Ok(())
}
