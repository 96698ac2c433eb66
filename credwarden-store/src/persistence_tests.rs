//! Persistence round-trip and edge case tests.
//!
//! Tests file I/O operations and the on-disk auth profile store layout.

use std::path::PathBuf;
use tempfile::TempDir;

use credwarden_core::{AuthProfileStore, Credential, FailureReason, RecoveryPolicy};

use crate::persistence::{auth_store_path, ensure_dir, load_json, load_json_if_exists, save_json};

fn sample_store() -> AuthProfileStore {
    let mut store = AuthProfileStore::new();
    store.upsert_profile(
        "bifrost:fuel",
        "bifrost",
        Credential::ApiKey {
            key: "vk-123".to_string(),
        },
    );
    store.record_failure(
        "bifrost:fuel",
        FailureReason::Billing,
        None,
        &RecoveryPolicy::default(),
        chrono::Utc::now(),
    );
    store
}

// ============================================================================
// JSON Persistence Tests
// ============================================================================

#[tokio::test]
async fn test_save_and_load_store_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let file_path = auth_store_path(temp_dir.path());

    let store = sample_store();
    save_json(&file_path, &store).await.unwrap();

    let loaded: AuthProfileStore = load_json(&file_path).await.unwrap();
    assert_eq!(loaded, store);
}

#[tokio::test]
async fn test_saved_store_uses_documented_field_names() {
    let temp_dir = TempDir::new().unwrap();
    let file_path = auth_store_path(temp_dir.path());
    save_json(&file_path, &sample_store()).await.unwrap();

    let raw: serde_json::Value = load_json(&file_path).await.unwrap();
    let stats = &raw["usageStats"]["bifrost:fuel"];
    assert_eq!(raw["version"], 1);
    assert_eq!(raw["profiles"]["bifrost:fuel"]["type"], "api_key");
    assert_eq!(stats["errorCount"], 1);
    assert_eq!(stats["failureCounts"]["billing"], 1);
    assert_eq!(stats["disabledReason"], "billing");
    assert!(stats["disabledUntil"].is_i64());
}

#[tokio::test]
async fn test_save_creates_parent_directories() {
    let temp_dir = TempDir::new().unwrap();
    let nested_path = temp_dir.path().join("deeply").join("nested").join("auth-profiles.json");

    let result = save_json(&nested_path, &serde_json::json!({"key": "value"})).await;
    assert!(result.is_ok());
    assert!(nested_path.exists());
}

#[tokio::test]
async fn test_save_leaves_no_temp_files() {
    let temp_dir = TempDir::new().unwrap();
    let file_path = auth_store_path(temp_dir.path());

    save_json(&file_path, &sample_store()).await.unwrap();
    save_json(&file_path, &sample_store()).await.unwrap();

    let entries: Vec<_> = std::fs::read_dir(temp_dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(entries, vec![std::ffi::OsString::from("auth-profiles.json")]);
}

#[tokio::test]
async fn test_load_nonexistent_file() {
    let file_path = PathBuf::from("/nonexistent/path/auth-profiles.json");

    let result: Result<AuthProfileStore, _> = load_json(&file_path).await;
    assert!(result.is_err());

    let missing: Option<AuthProfileStore> = load_json_if_exists(&file_path).await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_load_invalid_json_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let file_path = auth_store_path(temp_dir.path());
    tokio::fs::write(&file_path, "{\"version\": ").await.unwrap();

    let result: Result<Option<AuthProfileStore>, _> = load_json_if_exists(&file_path).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_ensure_dir_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let dir_path = temp_dir.path().join("agent");

    ensure_dir(&dir_path).await.unwrap();
    ensure_dir(&dir_path).await.unwrap();

    assert!(dir_path.is_dir());
}
