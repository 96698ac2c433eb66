// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # credwarden Store
//!
//! Persisted auth profile stores and the failure recorder.
//!
//! This crate provides:
//!
//! - **AuthStoreRegistry**: One shared store per agent directory
//! - **AuthStoreHandle**: Failure, success and cooldown transitions persisted
//!   to `auth-profiles.json`
//! - **EngineConfig**: Cooldown tuning and configured models
//! - **KeychainApi**: Opt-in import of OS keychain credentials
//! - **Persistence**: Atomic JSON file helpers
//!
//! ## Usage
//!
//! ```ignore
//! use credwarden_core::FailureReason;
//! use credwarden_store::{AuthStoreRegistry, EngineConfig, EnsureOptions};
//!
//! let config = EngineConfig::load()?;
//! let registry = AuthStoreRegistry::from_config(&config);
//! let store = registry.ensure(None, EnsureOptions::default()).await;
//!
//! store
//!     .mark_failure("bifrost:fuel", FailureReason::Billing, None, &config)
//!     .await?;
//! ```

pub mod auth_store;
pub mod config;
pub mod error;
pub mod keychain;
pub mod persistence;

pub use auth_store::{AuthStoreHandle, AuthStoreRegistry, EnsureOptions};
pub use config::{AuthConfig, CooldownConfig, EngineConfig, ModelsConfig, ModelsSanitizeReport};
pub use error::{KeychainError, StoreError};
pub use keychain::{KeychainApi, KeychainSource, SystemKeychain};
pub use persistence::{
    AUTH_PROFILES_FILE, auth_store_path, default_agent_dir, ensure_dir, load_json,
    load_json_if_exists, save_json,
};

#[cfg(test)]
mod persistence_tests;
