//! Catalog key sets.

use std::collections::HashSet;

use crate::models::ModelCatalogEntry;

/// Set of canonical `provider/model` keys built from a live catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogKeySet {
    keys: HashSet<String>,
}

impl CatalogKeySet {
    /// Builds the key set for every catalog entry.
    pub fn from_entries(entries: &[ModelCatalogEntry]) -> Self {
        entries.iter().map(ModelCatalogEntry::key).collect()
    }

    /// Returns true if the exact key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Iterates over all keys in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    /// Model parts of every key in the `provider/` namespace.
    pub fn models_for_provider<'a>(&'a self, provider: &'a str) -> impl Iterator<Item = &'a str> {
        self.keys.iter().filter_map(move |key| {
            key.strip_prefix(provider)
                .and_then(|rest| rest.strip_prefix('/'))
        })
    }
}

impl<S: Into<String>> FromIterator<S> for CatalogKeySet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().map(Into::into).collect(),
        }
    }
}
