//! File persistence helpers.
//!
//! Handles loading and saving JSON state with atomic replace and restrictive
//! permissions.

use serde::{Serialize, de::DeserializeOwned};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::error::StoreError;

/// File name of the auth profile store inside an agent directory.
pub const AUTH_PROFILES_FILE: &str = "auth-profiles.json";

// ============================================================================
// Default Paths
// ============================================================================

/// Returns the default agent directory.
///
/// - macOS: `~/Library/Application Support/credwarden/agent`
/// - Linux: `~/.config/credwarden/agent`
/// - Windows: `%APPDATA%\credwarden\agent`
pub fn default_agent_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        dirs::home_dir()
            .map(|h| h.join("Library").join("Application Support").join("credwarden").join("agent"))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    #[cfg(not(target_os = "macos"))]
    {
        dirs::config_dir()
            .map(|c| c.join("credwarden").join("agent"))
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Returns the auth profile store path for an agent directory.
pub fn auth_store_path(agent_dir: &Path) -> PathBuf {
    agent_dir.join(AUTH_PROFILES_FILE)
}

// ============================================================================
// Security: File Permissions
// ============================================================================

/// Sets restrictive file permissions (0o600) on Unix systems.
#[cfg(unix)]
async fn set_restrictive_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = tokio::fs::metadata(path).await?;
    let mut perms = metadata.permissions();
    perms.set_mode(0o600); // Owner read/write only
    tokio::fs::set_permissions(path, perms).await?;
    Ok(())
}

/// Sets restrictive directory permissions (0o700) on Unix systems.
#[cfg(unix)]
async fn set_restrictive_dir_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = tokio::fs::metadata(path).await?;
    let mut perms = metadata.permissions();
    perms.set_mode(0o700); // Owner read/write/execute only
    tokio::fs::set_permissions(path, perms).await?;
    Ok(())
}

/// No-op for non-Unix systems.
#[cfg(not(unix))]
async fn set_restrictive_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

/// No-op for non-Unix systems.
#[cfg(not(unix))]
async fn set_restrictive_dir_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

// ============================================================================
// File Operations
// ============================================================================

/// Distinguishes concurrent temp files written by one process.
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Temp file next to `path`, unique per process and write.
fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map_or_else(|| "store".into(), |n| n.to_string_lossy().into_owned());
    let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(".{file_name}.{}.{seq}.tmp", std::process::id()))
}

/// Ensures a directory exists with secure permissions.
pub async fn ensure_dir(path: &Path) -> Result<(), StoreError> {
    if !path.exists() {
        debug!(path = %path.display(), "Creating directory");
        tokio::fs::create_dir_all(path).await?;
        set_restrictive_dir_permissions(path).await?;
    }
    Ok(())
}

/// Saves data to a JSON file.
///
/// Writes a temp file in the same directory, then renames it over `path`, so
/// a crash mid-write never leaves a truncated file.
pub async fn save_json<T: Serialize>(path: &Path, data: &T) -> Result<(), StoreError> {
    debug!(path = %path.display(), "Saving JSON file");

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent).await?;
    }

    let json = serde_json::to_string_pretty(data)?;

    let temp_path = temp_path_for(path);
    if let Err(e) = write_then_rename(&temp_path, path, &json).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e);
    }

    debug!(path = %path.display(), "JSON file saved");
    Ok(())
}

async fn write_then_rename(temp_path: &Path, path: &Path, json: &str) -> Result<(), StoreError> {
    tokio::fs::write(temp_path, json).await?;
    set_restrictive_permissions(temp_path).await?;
    tokio::fs::rename(temp_path, path).await?;
    Ok(())
}

/// Renames a damaged file to `<name>.corrupt-<epoch ms>` next to it and
/// returns the new path.
pub async fn move_aside(path: &Path, now_ms: i64) -> Result<PathBuf, StoreError> {
    let file_name = path
        .file_name()
        .map_or_else(|| "store".into(), |n| n.to_string_lossy().into_owned());
    let target = path.with_file_name(format!("{file_name}.corrupt-{now_ms}"));
    tokio::fs::rename(path, &target).await?;
    Ok(target)
}

/// Temp paths the next `count` saves of `path` in this process would use.
#[cfg(test)]
pub(crate) fn upcoming_temp_paths(path: &Path, count: u64) -> Vec<PathBuf> {
    let file_name = path
        .file_name()
        .map_or_else(|| "store".into(), |n| n.to_string_lossy().into_owned());
    let start = TEMP_COUNTER.load(Ordering::Relaxed);
    (start..start + count)
        .map(|seq| path.with_file_name(format!(".{file_name}.{}.{seq}.tmp", std::process::id())))
        .collect()
}

/// Loads data from a JSON file.
pub async fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    debug!(path = %path.display(), "Loading JSON file");

    let content = tokio::fs::read_to_string(path).await?;
    let data = serde_json::from_str(&content)?;

    debug!(path = %path.display(), "JSON file loaded");
    Ok(data)
}

/// Loads data from a JSON file, returning `Ok(None)` when it does not exist.
pub async fn load_json_if_exists<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    match load_json(path).await {
        Ok(data) => Ok(Some(data)),
        Err(StoreError::Io(e)) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

// ============================================================================
// Tests
// ============================================================================
