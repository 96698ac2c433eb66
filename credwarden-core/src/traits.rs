//! Trait definitions for credwarden.
//!
//! These are the seams to the collaborators the engine consumes: the
//! model-level cooldown registry, the live model catalog, and the source of
//! profile health used by the availability resolver.

use chrono::{DateTime, Utc};

use crate::error::CoreError;
use crate::models::{AuthProfileStore, ModelCatalogEntry, ModelRef};

/// Transient per-model backoff, independent of any credential.
pub trait ModelCooldowns: Send + Sync {
    /// Returns true while the model should not be tried.
    fn is_model_cooling_down(&self, model: &ModelRef, now: DateTime<Utc>) -> bool;
}

/// Registry that never reports a cooldown.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoModelCooldowns;

impl ModelCooldowns for NoModelCooldowns {
    fn is_model_cooling_down(&self, _model: &ModelRef, _now: DateTime<Utc>) -> bool {
        false
    }
}

/// Supplier of the current model catalog.
pub trait ModelCatalog: Send + Sync {
    /// Lists the models every configured provider currently exposes.
    fn list_models(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<ModelCatalogEntry>, CoreError>> + Send;
}

/// Read access to tracked profile health.
pub trait ProfileHealthSource {
    /// Profile ids tracked for a provider.
    fn tracked_profiles(&self, provider: &str) -> Vec<String>;

    /// Returns true while the profile is cooling down or disabled.
    fn is_profile_unavailable(&self, profile_id: &str, now: DateTime<Utc>) -> bool;
}

impl ProfileHealthSource for AuthProfileStore {
    fn tracked_profiles(&self, provider: &str) -> Vec<String> {
        self.list_profiles_for_provider(provider)
    }

    fn is_profile_unavailable(&self, profile_id: &str, now: DateTime<Utc>) -> bool {
        self.is_profile_temporarily_unavailable(profile_id, now)
    }
}
