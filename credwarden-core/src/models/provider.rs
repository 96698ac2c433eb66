//! Provider and model identity types.
//!
//! This module contains the types used to name providers and models:
//! - [`normalize_provider_id`] - Canonical provider ids
//! - [`ModelRef`] - A `provider/model` pair
//! - [`ModelCatalogEntry`] - One model exposed by a provider catalog

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ============================================================================
// Provider Ids
// ============================================================================

/// Provider ids that are spelled differently by users and by the runtime.
const PROVIDER_ALIASES: &[(&str, &str)] = &[
    ("z.ai", "zai"),
    ("z-ai", "zai"),
    ("copilot", "github-copilot"),
    ("google-gemini", "gemini"),
];

/// Normalizes a provider id: trims, lowercases, and resolves known aliases.
///
/// ```
/// use credwarden_core::normalize_provider_id;
///
/// assert_eq!(normalize_provider_id("  Bifrost "), "bifrost");
/// assert_eq!(normalize_provider_id("Z.AI"), "zai");
/// ```
pub fn normalize_provider_id(provider: &str) -> String {
    let normalized = provider.trim().to_lowercase();
    PROVIDER_ALIASES
        .iter()
        .find(|(alias, _)| *alias == normalized)
        .map_or(normalized, |(_, canonical)| (*canonical).to_string())
}

/// Builds the canonical catalog key `provider/model`.
pub fn model_key(provider: &str, model: &str) -> String {
    format!("{provider}/{model}")
}

// ============================================================================
// Model Reference
// ============================================================================

/// A specific model offered by a provider.
///
/// Used as the key for model-level (not profile-level) cooldown tracking.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelRef {
    /// Normalized provider id.
    pub provider: String,
    /// Provider-local model id.
    pub model: String,
}

impl ModelRef {
    /// Creates a model reference, normalizing the provider id.
    pub fn new(provider: &str, model: impl Into<String>) -> Self {
        Self {
            provider: normalize_provider_id(provider),
            model: model.into(),
        }
    }

    /// Returns the canonical `provider/model` key.
    pub fn key(&self) -> String {
        model_key(&self.provider, &self.model)
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

impl FromStr for ModelRef {
    type Err = CoreError;

    /// Parses `provider/model`, splitting on the first `/`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.split_once('/') {
            Some((provider, model)) if !provider.trim().is_empty() && !model.is_empty() => {
                Ok(Self::new(provider, model))
            }
            _ => Err(CoreError::InvalidModelRef(s.to_string())),
        }
    }
}

// ============================================================================
// Catalog Entry
// ============================================================================

/// One model a provider exposes, as reported by the live catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelCatalogEntry {
    /// Provider id as reported by the catalog.
    pub provider: String,
    /// Provider-local model id.
    pub id: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Context window in tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_window: Option<u64>,
    /// Whether the model supports extended reasoning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<bool>,
}

impl ModelCatalogEntry {
    /// Creates an entry with only provider and id set.
    pub fn new(provider: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            id: id.into(),
            name: None,
            context_window: None,
            reasoning: None,
        }
    }

    /// Returns the catalog key `provider/id`.
    pub fn key(&self) -> String {
        model_key(&self.provider, &self.id)
    }

    /// Returns the model reference for this entry.
    pub fn model_ref(&self) -> ModelRef {
        ModelRef::new(&self.provider, self.id.clone())
    }
}

// ============================================================================
// Tests
// ============================================================================
