// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # credwarden Health
//!
//! Decides which models and providers are worth trying right now.
//!
//! This crate provides:
//!
//! - **Availability**: Provider and model checks plus memoized catalog
//!   filtering over any [`ProfileHealthSource`](credwarden_core::ProfileHealthSource)
//! - **HealthResolver**: The same checks against the shared store of an agent
//!   directory, never prompting the OS keychain
//! - **ModelCooldownRegistry**: In-memory model-level cooldowns
//! - **Catalog**: Catalog key loading and config model sanitization
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use credwarden_health::{HealthResolver, ModelCooldownRegistry};
//! use credwarden_store::AuthStoreRegistry;
//!
//! let resolver = HealthResolver::new(
//!     Arc::new(AuthStoreRegistry::default()),
//!     Arc::new(ModelCooldownRegistry::new()),
//! );
//! let usable = resolver.filter_models(&catalog, None, chrono::Utc::now()).await;
//! ```

pub mod availability;
pub mod catalog;
pub mod cooldown_registry;
pub mod resolver;

pub use availability::{
    ProviderHealthMemo, filter_models_by_operational_health, is_model_operational,
    is_provider_operational,
};
pub use catalog::{StaticCatalog, load_catalog_keys, sanitize_config_models};
pub use cooldown_registry::ModelCooldownRegistry;
pub use resolver::HealthResolver;
