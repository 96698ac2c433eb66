//! Domain models for credwarden.
//!
//! ## Submodules
//!
//! - [`provider`] - Provider ids, model references, catalog entries
//! - [`policy`] - Failure reasons and the recovery policy
//! - [`auth`] - Auth profiles, usage stats, and the profile store

mod auth;
mod policy;
mod provider;

pub use auth::{
    AUTH_STORE_VERSION, AuthProfile, AuthProfileStore, Credential, DisabledWindow, FailureOutcome,
    StoredCredential, UsageStats,
};
pub use policy::{BillingRecoveryMode, CooldownAction, FailureReason, RecoveryPolicy, duration_ms};
pub use provider::{ModelCatalogEntry, ModelRef, model_key, normalize_provider_id};
