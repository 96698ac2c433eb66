//! Auth profiles, usage statistics, and the persisted profile store.
//!
//! - [`Credential`] - Tagged credential union
//! - [`StoredCredential`] - Credential plus owning provider, as persisted
//! - [`AuthProfile`] - Resolved view of one profile
//! - [`UsageStats`] - Mutable health record for one profile
//! - [`AuthProfileStore`] - The persisted aggregate and its state transitions

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::policy::{CooldownAction, FailureReason, RecoveryPolicy, duration_ms};
use super::provider::normalize_provider_id;

/// Current schema version of `auth-profiles.json`.
pub const AUTH_STORE_VERSION: u32 = 1;

// ============================================================================
// Credentials
// ============================================================================

/// One stored credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Credential {
    /// Static API key.
    #[serde(rename = "api_key")]
    ApiKey {
        /// The key material.
        key: String,
    },
    /// OAuth token pair.
    #[serde(rename = "oauth")]
    OAuth {
        /// Access token.
        access: String,
        /// Refresh token.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        refresh: Option<String>,
        /// Access token expiry (epoch ms).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expires: Option<i64>,
    },
    /// Secret held by the OS credential store.
    #[serde(rename = "system-keychain")]
    SystemKeychain,
}

impl Credential {
    /// Returns the persisted `type` keyword.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ApiKey { .. } => "api_key",
            Self::OAuth { .. } => "oauth",
            Self::SystemKeychain => "system-keychain",
        }
    }
}

/// A credential as stored under its profile id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredential {
    /// Provider the credential belongs to.
    #[serde(default)]
    pub provider: String,
    /// The credential itself.
    #[serde(flatten)]
    pub credential: Credential,
}

/// Resolved view of one auth profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthProfile {
    /// Globally unique id, conventionally `provider:qualifier`.
    pub profile_id: String,
    /// Normalized provider id.
    pub provider: String,
    /// Credential material.
    pub credential: Credential,
}

/// Derives the provider of a profile from its stored field, falling back to
/// the `provider:` prefix of the id.
fn resolve_profile_provider(profile_id: &str, stored: &StoredCredential) -> String {
    if stored.provider.trim().is_empty() {
        let prefix = profile_id.split_once(':').map_or(profile_id, |(p, _)| p);
        normalize_provider_id(prefix)
    } else {
        normalize_provider_id(&stored.provider)
    }
}

// ============================================================================
// Usage Stats
// ============================================================================

/// Long suspension window. `disabledUntil` and `disabledReason` are persisted
/// as a pair; a file carrying only one of them loads as "not disabled".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisabledWindow {
    /// End of the window (epoch ms).
    #[serde(rename = "disabledUntil")]
    pub until: i64,
    /// Why the profile was disabled.
    #[serde(rename = "disabledReason")]
    pub reason: FailureReason,
}

/// Health record for one profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    /// Total failures ever recorded.
    #[serde(default)]
    pub error_count: u32,
    /// Lifetime failure count per reason keyword.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub failure_counts: BTreeMap<String, u32>,
    /// Short backoff end (epoch ms).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_until: Option<i64>,
    /// Long suspension window.
    #[serde(flatten)]
    pub disabled: Option<DisabledWindow>,
    /// Last successful use (epoch ms).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<i64>,
    /// Last profile-wide failure (epoch ms). Anchors the failure window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failure_at: Option<i64>,
    /// Failure count per reason inside the current failure window.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub recent_failure_counts: BTreeMap<String, u32>,
    /// Per-model cooldown end (epoch ms) for model-scoped rate limits.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub model_cooldowns: BTreeMap<String, i64>,
    /// Per-model rate limit count inside the failure window.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub model_error_counts: BTreeMap<String, u32>,
    /// Per-model last rate limit (epoch ms).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub model_last_failure_at: BTreeMap<String, i64>,
}

/// Result of recording one failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureOutcome {
    /// The profile is disabled until the given time.
    Disabled {
        /// Window end (epoch ms).
        until: i64,
    },
    /// The profile is cooling down until the given time.
    CoolingDown {
        /// Cooldown end (epoch ms).
        until: i64,
    },
    /// One model of the profile is cooling down.
    ModelCoolingDown {
        /// Model id.
        model: String,
        /// Cooldown end (epoch ms).
        until: i64,
    },
    /// Counters were updated; availability is unchanged.
    Recorded,
}

fn finite_future(value: Option<i64>, now_ms: i64) -> Option<i64> {
    value.filter(|until| *until > 0 && *until > now_ms)
}

fn expired(last: Option<i64>, now_ms: i64, window_ms: i64) -> bool {
    last.is_some_and(|at| at > 0 && now_ms.saturating_sub(at) > window_ms)
}

impl UsageStats {
    /// Returns the disable window end, if any.
    pub fn disabled_until(&self) -> Option<i64> {
        self.disabled.map(|w| w.until)
    }

    /// Returns the disable reason, if any.
    pub fn disabled_reason(&self) -> Option<FailureReason> {
        self.disabled.map(|w| w.reason)
    }

    /// Returns the lifetime count for a reason.
    pub fn failure_count(&self, reason: FailureReason) -> u32 {
        self.failure_counts.get(reason.as_str()).copied().unwrap_or(0)
    }

    fn recent_count(&self, reason: FailureReason) -> u32 {
        self.recent_failure_counts
            .get(reason.as_str())
            .copied()
            .unwrap_or(0)
    }

    /// Latest of `cooldownUntil` and `disabledUntil`, ignoring unset values.
    pub fn unusable_until(&self) -> Option<i64> {
        [self.cooldown_until, self.disabled_until()]
            .into_iter()
            .flatten()
            .filter(|until| *until > 0)
            .max()
    }

    /// True while either window is in the future.
    pub fn is_unavailable_at(&self, now_ms: i64) -> bool {
        finite_future(self.cooldown_until, now_ms).is_some()
            || finite_future(self.disabled_until(), now_ms).is_some()
    }

    /// Applies one failure. Lifetime counters always move; windows follow the
    /// policy.
    ///
    /// A model-scoped rate limit leaves the profile-wide failure window alone,
    /// so it never grows the backoff of later profile failures.
    pub fn apply_failure(
        &mut self,
        reason: FailureReason,
        model: Option<&str>,
        policy: &RecoveryPolicy,
        now_ms: i64,
    ) -> FailureOutcome {
        let window_ms = duration_ms(policy.failure_window);

        self.error_count = self.error_count.saturating_add(1);
        *self
            .failure_counts
            .entry(reason.as_str().to_string())
            .or_insert(0) += 1;

        if let (FailureReason::RateLimit, Some(model)) = (reason, model) {
            return self.apply_model_rate_limit(model, policy, now_ms, window_ms);
        }

        if expired(self.last_failure_at, now_ms, window_ms) {
            self.recent_failure_counts.clear();
        }
        *self
            .recent_failure_counts
            .entry(reason.as_str().to_string())
            .or_insert(0) += 1;
        self.last_failure_at = Some(now_ms);

        let recent_total = self.recent_failure_counts.values().sum();
        match policy.action_for(reason, self.recent_count(FailureReason::Billing), recent_total) {
            CooldownAction::Disable { duration } => {
                let until = now_ms.saturating_add(duration_ms(duration));
                self.disabled = Some(DisabledWindow { until, reason });
                FailureOutcome::Disabled { until }
            }
            CooldownAction::Retry { duration } => {
                let until = now_ms.saturating_add(duration_ms(duration));
                self.cooldown_until = Some(until);
                self.disabled = None;
                FailureOutcome::CoolingDown { until }
            }
            CooldownAction::Backoff { duration } => {
                let until = now_ms.saturating_add(duration_ms(duration));
                self.cooldown_until = Some(until);
                FailureOutcome::CoolingDown { until }
            }
            CooldownAction::RecordOnly => FailureOutcome::Recorded,
        }
    }

    fn apply_model_rate_limit(
        &mut self,
        model: &str,
        policy: &RecoveryPolicy,
        now_ms: i64,
        window_ms: i64,
    ) -> FailureOutcome {
        let last = self.model_last_failure_at.get(model).copied();
        let base = if expired(last, now_ms, window_ms) {
            0
        } else {
            self.model_error_counts.get(model).copied().unwrap_or(0)
        };
        let next = base.saturating_add(1);
        let until = now_ms.saturating_add(duration_ms(policy.cooldown_duration(next)));

        self.model_cooldowns.insert(model.to_string(), until);
        self.model_error_counts.insert(model.to_string(), next);
        self.model_last_failure_at.insert(model.to_string(), now_ms);

        FailureOutcome::ModelCoolingDown {
            model: model.to_string(),
            until,
        }
    }

    fn forget_model(&mut self, model: &str) {
        self.model_cooldowns.remove(model);
        self.model_error_counts.remove(model);
        self.model_last_failure_at.remove(model);
    }

    fn clear_model_tracking(&mut self) {
        self.model_cooldowns.clear();
        self.model_error_counts.clear();
        self.model_last_failure_at.clear();
    }
}

// ============================================================================
// Auth Profile Store
// ============================================================================

fn default_version() -> u32 {
    AUTH_STORE_VERSION
}

/// The persisted aggregate of credentials and their health.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthProfileStore {
    /// Schema version.
    #[serde(default = "default_version")]
    pub version: u32,
    /// Credentials by profile id.
    #[serde(default)]
    pub profiles: BTreeMap<String, StoredCredential>,
    /// Health records by profile id. Absent means never failed.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub usage_stats: BTreeMap<String, UsageStats>,
}

impl Default for AuthProfileStore {
    fn default() -> Self {
        Self {
            version: AUTH_STORE_VERSION,
            profiles: BTreeMap::new(),
            usage_stats: BTreeMap::new(),
        }
    }
}

impl AuthProfileStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Profiles
    // ========================================================================

    /// Inserts or replaces a profile credential.
    pub fn upsert_profile(
        &mut self,
        profile_id: impl Into<String>,
        provider: &str,
        credential: Credential,
    ) {
        self.profiles.insert(
            profile_id.into(),
            StoredCredential {
                provider: normalize_provider_id(provider),
                credential,
            },
        );
    }

    /// Returns true if the profile exists.
    pub fn has_profile(&self, profile_id: &str) -> bool {
        self.profiles.contains_key(profile_id)
    }

    /// Returns the resolved profile.
    pub fn profile(&self, profile_id: &str) -> Option<AuthProfile> {
        self.profiles.get(profile_id).map(|stored| AuthProfile {
            profile_id: profile_id.to_string(),
            provider: resolve_profile_provider(profile_id, stored),
            credential: stored.credential.clone(),
        })
    }

    /// Returns the normalized provider of a profile.
    pub fn profile_provider(&self, profile_id: &str) -> Option<String> {
        self.profiles
            .get(profile_id)
            .map(|stored| resolve_profile_provider(profile_id, stored))
    }

    /// Lists profile ids whose normalized provider matches, in id order.
    pub fn list_profiles_for_provider(&self, provider: &str) -> Vec<String> {
        let wanted = normalize_provider_id(provider);
        self.profiles
            .iter()
            .filter(|(id, stored)| resolve_profile_provider(id, stored) == wanted)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Returns the usage stats of a profile.
    pub fn stats(&self, profile_id: &str) -> Option<&UsageStats> {
        self.usage_stats.get(profile_id)
    }

    // ========================================================================
    // Availability
    // ========================================================================

    /// Milliseconds until `cooldownUntil`, or 0 when unset or past.
    pub fn cooldown_remaining_ms(&self, profile_id: &str, now: DateTime<Utc>) -> i64 {
        self.stats(profile_id)
            .and_then(|s| s.cooldown_until)
            .map_or(0, |until| (until - now.timestamp_millis()).max(0))
    }

    /// True while the profile is cooling down or disabled.
    pub fn is_profile_temporarily_unavailable(&self, profile_id: &str, now: DateTime<Utc>) -> bool {
        self.cooldown_remaining_ms(profile_id, now) > 0
            || self
                .stats(profile_id)
                .is_some_and(|s| finite_future(s.disabled_until(), now.timestamp_millis()).is_some())
    }

    /// Latest unusable-until timestamp, for status displays.
    pub fn unusable_until_for_display(&self, profile_id: &str) -> Option<i64> {
        self.stats(profile_id).and_then(UsageStats::unusable_until)
    }

    /// Active cooldown end for one model of a profile.
    pub fn model_cooldown_until(
        &self,
        profile_id: &str,
        model: &str,
        now: DateTime<Utc>,
    ) -> Option<i64> {
        let until = self.stats(profile_id)?.model_cooldowns.get(model).copied();
        finite_future(until, now.timestamp_millis())
    }

    /// True if the profile is unavailable overall or for this model.
    pub fn is_profile_in_cooldown_for_model(
        &self,
        profile_id: &str,
        model: &str,
        now: DateTime<Utc>,
    ) -> bool {
        self.is_profile_temporarily_unavailable(profile_id, now)
            || self.model_cooldown_until(profile_id, model, now).is_some()
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Records a failure. Returns `None` when the profile is unknown.
    pub fn record_failure(
        &mut self,
        profile_id: &str,
        reason: FailureReason,
        model: Option<&str>,
        policy: &RecoveryPolicy,
        now: DateTime<Utc>,
    ) -> Option<FailureOutcome> {
        if !self.has_profile(profile_id) {
            debug!(profile_id = %profile_id, "Ignoring failure for unknown profile");
            return None;
        }
        let stats = self.usage_stats.entry(profile_id.to_string()).or_default();
        Some(stats.apply_failure(reason, model, policy, now.timestamp_millis()))
    }

    /// Records a successful call.
    ///
    /// With a model, only that model's cooldown is cleared. Without one, every
    /// window and the recent failure counts are cleared; lifetime counters stay.
    pub fn record_success(
        &mut self,
        profile_id: &str,
        model: Option<&str>,
        now: DateTime<Utc>,
    ) -> bool {
        if !self.has_profile(profile_id) {
            return false;
        }
        let stats = self.usage_stats.entry(profile_id.to_string()).or_default();
        stats.last_used = Some(now.timestamp_millis());
        match model {
            Some(model) => stats.forget_model(model),
            None => {
                stats.cooldown_until = None;
                stats.disabled = None;
                stats.recent_failure_counts.clear();
                stats.clear_model_tracking();
            }
        }
        true
    }

    /// Clears the short cooldown (or one model's cooldown). Disable windows
    /// are left in place.
    pub fn clear_cooldown(&mut self, profile_id: &str, model: Option<&str>) -> bool {
        let Some(stats) = self.usage_stats.get_mut(profile_id) else {
            return false;
        };
        match model {
            Some(model) => stats.forget_model(model),
            None => {
                stats.cooldown_until = None;
                stats.recent_failure_counts.clear();
                stats.clear_model_tracking();
            }
        }
        true
    }
}

// ============================================================================
// Tests
// ============================================================================
