//! Catalog access.

use credwarden_core::{CatalogKeySet, CoreError, ModelCatalog, ModelCatalogEntry};
use credwarden_store::{EngineConfig, ModelsSanitizeReport};
use tracing::debug;

/// Catalog backed by a fixed list, for offline use and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    entries: Vec<ModelCatalogEntry>,
}

impl StaticCatalog {
    /// Creates a catalog from entries.
    pub fn new(entries: Vec<ModelCatalogEntry>) -> Self {
        Self { entries }
    }
}

impl ModelCatalog for StaticCatalog {
    async fn list_models(&self) -> Result<Vec<ModelCatalogEntry>, CoreError> {
        Ok(self.entries.clone())
    }
}

/// Fetches the catalog and builds its key set.
pub async fn load_catalog_keys<C: ModelCatalog>(catalog: &C) -> Result<CatalogKeySet, CoreError> {
    let entries = catalog.list_models().await?;
    let keys = CatalogKeySet::from_entries(&entries);
    debug!(models = entries.len(), keys = keys.len(), "Loaded catalog keys");
    Ok(keys)
}

/// Checks the configured models against the live catalog before the config
/// is persisted.
pub async fn sanitize_config_models<C: ModelCatalog>(
    catalog: &C,
    config: &mut EngineConfig,
) -> Result<ModelsSanitizeReport, CoreError> {
    let keys = load_catalog_keys(catalog).await?;
    Ok(config.sanitize_models(&keys))
}

#[cfg(test)]
mod tests {
    use super::*;
    use credwarden_store::ModelsConfig;

    #[tokio::test]
    async fn test_load_catalog_keys() {
        let catalog = StaticCatalog::new(vec![
            ModelCatalogEntry::new("anthropic", "claude-sonnet-4"),
            ModelCatalogEntry::new("anthropic", "claude-sonnet-4"),
            ModelCatalogEntry::new("zai", "glm-4.6"),
        ]);
        let keys = load_catalog_keys(&catalog).await.unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains("zai/glm-4.6"));
    }

    #[tokio::test]
    async fn test_sanitize_config_models() {
        let catalog = StaticCatalog::new(vec![
            ModelCatalogEntry::new("anthropic", "claude-3-7-sonnet-thinking"),
        ]);
        let mut config = EngineConfig {
            models: ModelsConfig {
                primary: Some("anthropic/claude-3-7-sonnet".to_string()),
                fallbacks: vec!["openai/gpt-4-turbo".to_string()],
            },
            ..EngineConfig::default()
        };

        let report = sanitize_config_models(&catalog, &mut config).await.unwrap();
        assert_eq!(
            config.models.primary.as_deref(),
            Some("anthropic/claude-3-7-sonnet-thinking")
        );
        assert!(config.models.fallbacks.is_empty());
        assert_eq!(report.removed, vec!["openai/gpt-4-turbo"]);
    }
}
