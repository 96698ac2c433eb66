//! Engine configuration.
//!
//! The JSON layout mirrors the agent config file:
//!
//! ```json
//! {
//!   "auth": {
//!     "cooldowns": {
//!       "billingRecoveryMode": "disable",
//!       "billingBackoffHours": 5,
//!       "billingBackoffHoursByProvider": { "bifrost": 2 },
//!       "billingMaxHours": 24
//!     }
//!   },
//!   "models": { "primary": "anthropic/claude-sonnet-4", "fallbacks": [] }
//! }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use credwarden_core::{
    BillingRecoveryMode, CatalogKeySet, ModelRepair, RecoveryPolicy, normalize_provider_id,
    sanitize_configured_model_ids, sanitize_single_model_id,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::keychain::KeychainSource;

/// Engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Credential handling.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Configured model selection.
    #[serde(default)]
    pub models: ModelsConfig,
}

/// Credential handling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    /// Failure recovery tuning.
    #[serde(default)]
    pub cooldowns: CooldownConfig,
    /// OS keychain entries that may be imported as profiles.
    #[serde(default = "default_keychain_sources")]
    pub keychain_sources: Vec<KeychainSource>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cooldowns: CooldownConfig::default(),
            keychain_sources: default_keychain_sources(),
        }
    }
}

fn default_keychain_sources() -> Vec<KeychainSource> {
    vec![KeychainSource::claude_pro()]
}

/// Failure recovery tuning. Every field is optional; missing, non-positive
/// and non-finite values resolve to the built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CooldownConfig {
    /// Billing failure handling. Unknown values mean `disable`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_recovery_mode: Option<BillingRecoveryMode>,
    /// First billing disable window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_backoff_hours: Option<f64>,
    /// Per-provider override of `billingBackoffHours`.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub billing_backoff_hours_by_provider: HashMap<String, f64>,
    /// Longest billing disable window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_max_hours: Option<f64>,
    /// Window after which recent failures stop growing the backoff.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_window_hours: Option<f64>,
    /// Cooldown used by the `retry` billing mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_cooldown_minutes: Option<f64>,
    /// First cooldown for non-billing failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_base_minutes: Option<f64>,
    /// Longest cooldown for non-billing failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_max_minutes: Option<f64>,
}

/// Accepts positive finite numbers only.
fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

fn hours(value: Option<f64>, fallback: Duration) -> Duration {
    positive(value)
        .and_then(|h| Duration::try_from_secs_f64(h * 3600.0).ok())
        .unwrap_or(fallback)
}

fn minutes(value: Option<f64>, fallback: Duration) -> Duration {
    positive(value)
        .and_then(|m| Duration::try_from_secs_f64(m * 60.0).ok())
        .unwrap_or(fallback)
}

impl CooldownConfig {
    /// Resolves the recovery policy for one provider.
    pub fn recovery_policy(&self, provider: &str) -> RecoveryPolicy {
        let defaults = RecoveryPolicy::default();
        let provider = normalize_provider_id(provider);
        let backoff_override = self
            .billing_backoff_hours_by_provider
            .iter()
            .find(|(key, _)| normalize_provider_id(key) == provider)
            .and_then(|(_, hours)| positive(Some(*hours)));

        RecoveryPolicy {
            billing_recovery_mode: self.billing_recovery_mode.unwrap_or_default(),
            billing_backoff: hours(
                backoff_override.or(self.billing_backoff_hours),
                defaults.billing_backoff,
            ),
            billing_max: hours(self.billing_max_hours, defaults.billing_max),
            retry_cooldown: minutes(self.retry_cooldown_minutes, defaults.retry_cooldown),
            cooldown_base: minutes(self.cooldown_base_minutes, defaults.cooldown_base),
            cooldown_max: minutes(self.cooldown_max_minutes, defaults.cooldown_max),
            failure_window: hours(self.failure_window_hours, defaults.failure_window),
        }
    }
}

/// Configured models.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelsConfig {
    /// Primary `provider/model` id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<String>,
    /// Fallback ids in preference order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallbacks: Vec<String>,
}

/// What [`EngineConfig::sanitize_models`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelsSanitizeReport {
    /// Ids dropped from the config.
    pub removed: Vec<String>,
    /// Ids rewritten to their catalog name.
    pub repaired: Vec<ModelRepair>,
}

impl ModelsSanitizeReport {
    /// Returns true if nothing changed.
    pub fn is_unchanged(&self) -> bool {
        self.removed.is_empty() && self.repaired.is_empty()
    }
}

impl EngineConfig {
    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("credwarden")
            .join("config.json")
    }

    /// Loads configuration from the default path.
    pub fn load() -> Result<Self, StoreError> {
        Self::load_from(&Self::default_path())
    }

    /// Loads configuration from a specific path. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&content)?;

        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Saves configuration to the default path.
    pub fn save(&self) -> Result<(), StoreError> {
        self.save_to(&Self::default_path())
    }

    /// Saves configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        info!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Resolves the recovery policy for one provider.
    pub fn recovery_policy(&self, provider: &str) -> RecoveryPolicy {
        self.auth.cooldowns.recovery_policy(provider)
    }

    /// Rewrites the configured models against the live catalog so that
    /// stale ids are never persisted.
    pub fn sanitize_models(&mut self, catalog: &CatalogKeySet) -> ModelsSanitizeReport {
        let mut report = ModelsSanitizeReport::default();

        if let Some(primary) = self.models.primary.take() {
            let single = sanitize_single_model_id(Some(&primary), catalog);
            if single.id.is_none() {
                report.removed.push(primary);
            }
            report.repaired.extend(single.repaired);
            self.models.primary = single.id;
        }

        let fallbacks = sanitize_configured_model_ids(&self.models.fallbacks, catalog);
        report.removed.extend(fallbacks.removed);
        report.repaired.extend(fallbacks.repaired);
        self.models.fallbacks = fallbacks.configured;

        if !report.is_unchanged() {
            warn!(
                removed = report.removed.len(),
                repaired = report.repaired.len(),
                "Configured models changed after catalog check"
            );
        }
        report
    }
}

// ============================================================================
// Tests
// ============================================================================
