//! Integration tests for the persisted failure recorder.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use credwarden_core::{
    AuthProfileStore, BillingRecoveryMode, Credential, FailureOutcome, FailureReason,
};
use credwarden_store::{
    AuthStoreHandle, AuthStoreRegistry, EngineConfig, EnsureOptions, KeychainApi, KeychainError,
    auth_store_path, load_json,
};
use tempfile::TempDir;

const MINUTE_MS: i64 = 60_000;
const HOUR_MS: i64 = 60 * MINUTE_MS;

struct NoKeychain;

#[async_trait::async_trait]
impl KeychainApi for NoKeychain {
    async fn get(&self, _service: &str, _account: &str) -> Result<Option<String>, KeychainError> {
        Ok(None)
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 30, 12, 0, 0).unwrap()
}

fn config_with_mode(mode: Option<BillingRecoveryMode>) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.auth.cooldowns.billing_recovery_mode = mode;
    config
}

async fn store_with_profile(dir: &TempDir) -> AuthStoreHandle {
    let handle = AuthStoreHandle::open(dir.path()).await;
    handle
        .upsert_profile(
            "bifrost:fuel",
            "bifrost",
            Credential::ApiKey {
                key: "vk-123".to_string(),
            },
        )
        .await
        .unwrap();
    handle
}

async fn on_disk(dir: &TempDir) -> AuthProfileStore {
    load_json(&auth_store_path(dir.path())).await.unwrap()
}

// ============================================================================
// Billing Recovery Modes
// ============================================================================

#[tokio::test]
async fn test_billing_failure_disables_by_default() {
    let dir = TempDir::new().unwrap();
    let handle = store_with_profile(&dir).await;

    let outcome = handle
        .mark_failure_at("bifrost:fuel", FailureReason::Billing, None, &config_with_mode(None), now())
        .await
        .unwrap();
    assert!(matches!(outcome, Some(FailureOutcome::Disabled { .. })));

    let store = on_disk(&dir).await;
    let stats = store.stats("bifrost:fuel").unwrap();
    let delta = stats.disabled_until().unwrap() - now().timestamp_millis();
    assert!(delta > 4 * HOUR_MS + 30 * MINUTE_MS && delta <= 5 * HOUR_MS + 30 * MINUTE_MS);
    assert!(stats.cooldown_until.is_none());
    assert_eq!(stats.disabled_reason(), Some(FailureReason::Billing));
}

#[tokio::test]
async fn test_billing_failure_retry_mode() {
    let dir = TempDir::new().unwrap();
    let handle = store_with_profile(&dir).await;

    handle
        .mark_failure_at(
            "bifrost:fuel",
            FailureReason::Billing,
            None,
            &config_with_mode(Some(BillingRecoveryMode::Retry)),
            now(),
        )
        .await
        .unwrap();

    let store = on_disk(&dir).await;
    let stats = store.stats("bifrost:fuel").unwrap();
    let delta = stats.cooldown_until.unwrap() - now().timestamp_millis();
    assert!((4 * MINUTE_MS + 30_000..=5 * MINUTE_MS + 30_000).contains(&delta));
    assert!(stats.disabled_until().is_none());
    assert!(stats.disabled_reason().is_none());
}

#[tokio::test]
async fn test_billing_failure_notify_mode() {
    let dir = TempDir::new().unwrap();
    let handle = store_with_profile(&dir).await;

    handle
        .mark_failure_at(
            "bifrost:fuel",
            FailureReason::Billing,
            None,
            &config_with_mode(Some(BillingRecoveryMode::Notify)),
            now(),
        )
        .await
        .unwrap();

    let store = on_disk(&dir).await;
    let stats = store.stats("bifrost:fuel").unwrap();
    assert!(stats.cooldown_until.is_none());
    assert!(stats.disabled_until().is_none());
    assert_eq!(stats.error_count, 1);
    assert_eq!(stats.failure_counts.get("billing"), Some(&1));
}

#[tokio::test]
async fn test_per_provider_billing_backoff_override() {
    let dir = TempDir::new().unwrap();
    let handle = store_with_profile(&dir).await;
    let mut config = EngineConfig::default();
    config
        .auth
        .cooldowns
        .billing_backoff_hours_by_provider
        .insert("bifrost".to_string(), 1.0);

    handle
        .mark_failure_at("bifrost:fuel", FailureReason::Billing, None, &config, now())
        .await
        .unwrap();

    let store = handle.snapshot().await;
    let delta = store.stats("bifrost:fuel").unwrap().disabled_until().unwrap()
        - now().timestamp_millis();
    assert_eq!(delta, HOUR_MS);
}

// ============================================================================
// State Machine
// ============================================================================

#[tokio::test]
async fn test_disabled_profile_recovers_after_window() {
    let dir = TempDir::new().unwrap();
    let handle = store_with_profile(&dir).await;
    handle
        .mark_failure_at("bifrost:fuel", FailureReason::Billing, None, &EngineConfig::default(), now())
        .await
        .unwrap();

    let store = handle.snapshot().await;
    assert!(store.is_profile_temporarily_unavailable("bifrost:fuel", now()));
    assert!(!store.is_profile_temporarily_unavailable("bifrost:fuel", now() + Duration::hours(6)));
    assert!(store.profile("bifrost:fuel").is_some());
}

#[tokio::test]
async fn test_mark_used_clears_cooldown_and_persists() {
    let dir = TempDir::new().unwrap();
    let handle = store_with_profile(&dir).await;
    let config = EngineConfig::default();
    handle
        .mark_failure_at("bifrost:fuel", FailureReason::Auth, None, &config, now())
        .await
        .unwrap();
    assert_eq!(handle.snapshot().await.cooldown_remaining_ms("bifrost:fuel", now()), MINUTE_MS);

    assert!(handle.mark_used_at("bifrost:fuel", None, now()).await.unwrap());
    let store = on_disk(&dir).await;
    assert_eq!(store.cooldown_remaining_ms("bifrost:fuel", now()), 0);
    assert_eq!(store.stats("bifrost:fuel").unwrap().error_count, 1);
}

#[tokio::test]
async fn test_clear_cooldown_keeps_disable_window() {
    let dir = TempDir::new().unwrap();
    let handle = store_with_profile(&dir).await;
    let config = EngineConfig::default();
    handle
        .mark_failure_at("bifrost:fuel", FailureReason::Billing, None, &config, now())
        .await
        .unwrap();
    handle
        .mark_failure_at("bifrost:fuel", FailureReason::RateLimit, None, &config, now())
        .await
        .unwrap();

    assert!(handle.clear_cooldown("bifrost:fuel", None).await.unwrap());
    let store = on_disk(&dir).await;
    let stats = store.stats("bifrost:fuel").unwrap();
    assert!(stats.cooldown_until.is_none());
    assert!(stats.disabled_until().is_some());
}

// ============================================================================
// Concurrency and Recovery
// ============================================================================

#[tokio::test]
async fn test_concurrent_in_process_failures_are_all_counted() {
    let dir = TempDir::new().unwrap();
    let handle = Arc::new(store_with_profile(&dir).await);
    let config = Arc::new(EngineConfig::default());

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let handle = Arc::clone(&handle);
            let config = Arc::clone(&config);
            tokio::spawn(async move {
                handle
                    .mark_failure_at("bifrost:fuel", FailureReason::Unknown, None, &config, now())
                    .await
                    .unwrap();
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    let store = on_disk(&dir).await;
    assert_eq!(store.stats("bifrost:fuel").unwrap().error_count, 16);
}

#[tokio::test]
async fn test_writes_reload_changes_from_other_handles() {
    let dir = TempDir::new().unwrap();
    let first = store_with_profile(&dir).await;
    let second = AuthStoreHandle::open(dir.path()).await;
    let config = EngineConfig::default();

    first
        .mark_failure_at("bifrost:fuel", FailureReason::Auth, None, &config, now())
        .await
        .unwrap();
    second
        .mark_failure_at("bifrost:fuel", FailureReason::Auth, None, &config, now())
        .await
        .unwrap();

    let store = on_disk(&dir).await;
    assert_eq!(store.stats("bifrost:fuel").unwrap().error_count, 2);
}

#[tokio::test]
async fn test_unreadable_store_falls_back_to_empty() {
    let dir = TempDir::new().unwrap();
    tokio::fs::write(auth_store_path(dir.path()), "garbage").await.unwrap();

    let registry = AuthStoreRegistry::new(Arc::new(NoKeychain), Vec::new());
    let handle = registry.ensure(Some(dir.path()), EnsureOptions::default()).await;
    let store = handle.snapshot().await;
    assert!(store.profiles.is_empty());
    assert!(!store.is_profile_temporarily_unavailable("bifrost:fuel", now()));
}
