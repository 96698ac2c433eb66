//! Failure reasons and the recovery policy that maps them to cooldowns.
//!
//! - [`FailureReason`] - Classified provider failure
//! - [`BillingRecoveryMode`] - How billing failures are handled
//! - [`RecoveryPolicy`] - Resolved durations for one provider
//! - [`CooldownAction`] - What a failure does to a profile

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CoreError;

// ============================================================================
// Failure Reason
// ============================================================================

/// Provider-reported failure, classified upstream from HTTP status and body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Quota or payment exhausted.
    Billing,
    /// Provider throttling.
    RateLimit,
    /// Credential rejected or expired.
    Auth,
    /// Uncategorized failure.
    Unknown,
}

impl FailureReason {
    /// Returns the keyword used in persisted `failureCounts`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Billing => "billing",
            Self::RateLimit => "rate_limit",
            Self::Auth => "auth",
            Self::Unknown => "unknown",
        }
    }

    /// Returns all reasons.
    pub fn all() -> &'static [FailureReason] {
        &[Self::Billing, Self::RateLimit, Self::Auth, Self::Unknown]
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailureReason {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "billing" => Ok(Self::Billing),
            "rate_limit" => Ok(Self::RateLimit),
            "auth" => Ok(Self::Auth),
            "unknown" => Ok(Self::Unknown),
            other => Err(CoreError::UnknownFailureReason(other.to_string())),
        }
    }
}

// ============================================================================
// Billing Recovery Mode
// ============================================================================

/// Configured handling of billing failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BillingRecoveryMode {
    /// Suspend the profile for the billing window with a visible reason.
    #[default]
    Disable,
    /// Short cooldown, then retry automatically.
    Retry,
    /// Record the failure only; the profile stays retriable.
    Notify,
}

impl BillingRecoveryMode {
    /// Returns the config keyword for this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disable => "disable",
            Self::Retry => "retry",
            Self::Notify => "notify",
        }
    }
}

impl fmt::Display for BillingRecoveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillingRecoveryMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "disable" => Ok(Self::Disable),
            "retry" => Ok(Self::Retry),
            "notify" => Ok(Self::Notify),
            other => Err(CoreError::UnknownRecoveryMode(other.to_string())),
        }
    }
}

/// Unknown or mistyped values fall back to [`BillingRecoveryMode::Disable`].
impl<'de> Deserialize<'de> for BillingRecoveryMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(value
            .as_str()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default())
    }
}

// ============================================================================
// Recovery Policy
// ============================================================================

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(60 * 60);

/// Lower bound for the billing disable window.
const MIN_BILLING_BACKOFF: Duration = MINUTE;

/// Cap on the exponent used for billing backoff doubling.
const MAX_BILLING_EXPONENT: u32 = 10;

/// Cap on the exponent used for regular cooldown growth (1m, 5m, 25m, 125m).
const MAX_COOLDOWN_EXPONENT: u32 = 3;

/// Resolved cooldown durations for one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryPolicy {
    /// Billing failure handling.
    pub billing_recovery_mode: BillingRecoveryMode,
    /// First billing disable window.
    pub billing_backoff: Duration,
    /// Longest billing disable window.
    pub billing_max: Duration,
    /// Cooldown used by [`BillingRecoveryMode::Retry`].
    pub retry_cooldown: Duration,
    /// First cooldown for non-billing failures.
    pub cooldown_base: Duration,
    /// Longest cooldown for non-billing failures.
    pub cooldown_max: Duration,
    /// Failures older than this no longer grow the backoff.
    pub failure_window: Duration,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self {
            billing_recovery_mode: BillingRecoveryMode::Disable,
            billing_backoff: 5 * HOUR,
            billing_max: 24 * HOUR,
            retry_cooldown: 5 * MINUTE,
            cooldown_base: MINUTE,
            cooldown_max: HOUR,
            failure_window: 24 * HOUR,
        }
    }
}

/// Effect of a single failure on a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownAction {
    /// Long suspension with a user-visible reason.
    Disable {
        /// Length of the disable window.
        duration: Duration,
    },
    /// Short cooldown that replaces any disable window.
    Retry {
        /// Length of the cooldown.
        duration: Duration,
    },
    /// Short cooldown; an existing disable window is left alone.
    Backoff {
        /// Length of the cooldown.
        duration: Duration,
    },
    /// Counters only.
    RecordOnly,
}

impl RecoveryPolicy {
    /// Sets the billing recovery mode.
    pub fn with_billing_recovery_mode(mut self, mode: BillingRecoveryMode) -> Self {
        self.billing_recovery_mode = mode;
        self
    }

    /// Resolves what a failure does.
    ///
    /// `recent_billing` and `recent_total` are the failure counts inside the
    /// current failure window, including the failure being recorded.
    pub fn action_for(
        &self,
        reason: FailureReason,
        recent_billing: u32,
        recent_total: u32,
    ) -> CooldownAction {
        match reason {
            FailureReason::Billing => match self.billing_recovery_mode {
                BillingRecoveryMode::Disable => CooldownAction::Disable {
                    duration: self.billing_disable_duration(recent_billing),
                },
                BillingRecoveryMode::Retry => CooldownAction::Retry {
                    duration: self.retry_cooldown,
                },
                BillingRecoveryMode::Notify => CooldownAction::RecordOnly,
            },
            FailureReason::RateLimit | FailureReason::Auth | FailureReason::Unknown => {
                CooldownAction::Backoff {
                    duration: self.cooldown_duration(recent_total),
                }
            }
        }
    }

    /// Cooldown for the `n`th recent failure: `base * 5^(n-1)`, capped.
    pub fn cooldown_duration(&self, failures: u32) -> Duration {
        let exponent = failures.max(1).saturating_sub(1).min(MAX_COOLDOWN_EXPONENT);
        self.cooldown_base
            .saturating_mul(5u32.pow(exponent))
            .min(self.cooldown_max)
    }

    /// Billing disable window for the `n`th recent billing failure:
    /// `base * 2^(n-1)`, capped at `billing_max`.
    pub fn billing_disable_duration(&self, billing_failures: u32) -> Duration {
        let base = self.billing_backoff.max(MIN_BILLING_BACKOFF);
        let max = self.billing_max.max(base);
        let exponent = billing_failures
            .max(1)
            .saturating_sub(1)
            .min(MAX_BILLING_EXPONENT);
        base.saturating_mul(2u32.pow(exponent)).min(max)
    }
}

/// Converts a duration to signed epoch milliseconds, saturating.
pub fn duration_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

// ============================================================================
// Tests
// ============================================================================
