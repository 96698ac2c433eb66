// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # credwarden Core
//!
//! Core types, policies, and pure algorithms for credential health tracking.
//!
//! This crate provides:
//!
//! - Domain models (auth profiles, usage stats, failure reasons, model refs)
//! - The recovery policy that turns a failure into a cooldown or disable window
//! - Provider reset schedules and countdown formatting
//! - Catalog key sets and configured model id sanitization
//! - Trait seams for the model cooldown registry and the model catalog
//!
//! ## Key Types
//!
//! - [`AuthProfileStore`] - Persisted credentials and their usage stats
//! - [`UsageStats`] - Health record for one profile
//! - [`FailureReason`] - `billing`, `rate_limit`, `auth`, `unknown`
//! - [`RecoveryPolicy`] - Resolved cooldown durations
//! - [`ResetSchedule`] - Daily / monthly / none
//! - [`CatalogKeySet`] - Canonical `provider/model` keys

pub mod catalog;
pub mod error;
pub mod models;
pub mod reset;
pub mod sanitize;
pub mod traits;

pub use error::CoreError;

pub use models::{
    // Auth profiles
    AUTH_STORE_VERSION,
    AuthProfile,
    AuthProfileStore,
    Credential,
    DisabledWindow,
    FailureOutcome,
    StoredCredential,
    UsageStats,
    // Policy
    BillingRecoveryMode,
    CooldownAction,
    FailureReason,
    RecoveryPolicy,
    duration_ms,
    // Providers and models
    ModelCatalogEntry,
    ModelRef,
    model_key,
    normalize_provider_id,
};

pub use catalog::CatalogKeySet;
pub use reset::{ResetSchedule, format_reset_countdown, ms_until_reset, reset_schedule};
pub use sanitize::{
    ModelRepair, SanitizeResult, SingleModelSanitize, sanitize_configured_model_ids,
    sanitize_single_model_id,
};
pub use traits::{ModelCatalog, ModelCooldowns, NoModelCooldowns, ProfileHealthSource};
