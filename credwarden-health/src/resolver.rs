//! Availability checks against the shared auth store of an agent directory.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use credwarden_core::{CoreError, ModelCatalog, ModelCatalogEntry, ModelCooldowns, ModelRef};
use credwarden_store::{AuthStoreHandle, AuthStoreRegistry, EnsureOptions};
use tracing::instrument;

use crate::availability::{
    filter_models_by_operational_health, is_model_operational, is_provider_operational,
};

/// Resolves availability for an agent directory.
///
/// Stores are always ensured with `allow_keychain_prompt = false`, so no
/// check ever waits on an OS prompt. Each check reloads the store file first,
/// so failures recorded by other processes are seen.
pub struct HealthResolver {
    registry: Arc<AuthStoreRegistry>,
    cooldowns: Arc<dyn ModelCooldowns>,
}

impl HealthResolver {
    /// Creates a resolver.
    pub fn new(registry: Arc<AuthStoreRegistry>, cooldowns: Arc<dyn ModelCooldowns>) -> Self {
        Self {
            registry,
            cooldowns,
        }
    }

    async fn store(&self, agent_dir: Option<&Path>) -> Arc<AuthStoreHandle> {
        let handle = self
            .registry
            .ensure(
                agent_dir,
                EnsureOptions {
                    allow_keychain_prompt: false,
                },
            )
            .await;
        handle.refresh().await;
        handle
    }

    /// See [`is_provider_operational`].
    pub async fn is_provider_operational(
        &self,
        provider: &str,
        agent_dir: Option<&Path>,
        now: DateTime<Utc>,
    ) -> bool {
        self.store(agent_dir)
            .await
            .read(|store| is_provider_operational(provider, store, now))
            .await
    }

    /// See [`is_model_operational`].
    pub async fn is_model_operational(
        &self,
        model: &ModelRef,
        agent_dir: Option<&Path>,
        now: DateTime<Utc>,
    ) -> bool {
        let cooldowns = self.cooldowns.as_ref();
        self.store(agent_dir)
            .await
            .read(|store| is_model_operational(model, cooldowns, store, now))
            .await
    }

    /// See [`filter_models_by_operational_health`].
    #[instrument(skip_all, fields(models = models.len()))]
    pub async fn filter_models(
        &self,
        models: &[ModelCatalogEntry],
        agent_dir: Option<&Path>,
        now: DateTime<Utc>,
    ) -> Vec<ModelCatalogEntry> {
        let cooldowns = self.cooldowns.as_ref();
        self.store(agent_dir)
            .await
            .read(|store| filter_models_by_operational_health(models, cooldowns, store, now))
            .await
    }

    /// Lists the catalog and keeps the operational models.
    pub async fn operational_catalog<C: ModelCatalog>(
        &self,
        catalog: &C,
        agent_dir: Option<&Path>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ModelCatalogEntry>, CoreError> {
        let models = catalog.list_models().await?;
        Ok(self.filter_models(&models, agent_dir, now).await)
    }
}
