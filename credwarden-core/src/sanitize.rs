//! Configured model id validation and repair.
//!
//! A model id that a provider renamed or removed must never be re-persisted
//! into user config. Ids are kept on an exact catalog match, repaired only to
//! an unambiguous `-thinking` variant, and dropped otherwise.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::CatalogKeySet;

const THINKING_SUFFIX: &str = "-thinking";

/// One deterministic repair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRepair {
    /// Configured id.
    pub from: String,
    /// Catalog id it was repaired to.
    pub to: String,
}

/// Result of sanitizing a list of configured ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitizeResult {
    /// Ids safe to persist, in input order.
    pub configured: Vec<String>,
    /// Ids dropped because they no longer exist or were ambiguous.
    pub removed: Vec<String>,
    /// Repairs applied.
    pub repaired: Vec<ModelRepair>,
}

/// Result of sanitizing a single optional id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleModelSanitize {
    /// The id to persist, or `None` if it was dropped or absent.
    pub id: Option<String>,
    /// The repair applied, if any.
    pub repaired: Option<ModelRepair>,
}

enum Verdict {
    Keep,
    Repair(String),
    Remove,
}

fn judge(id: &str, catalog: &CatalogKeySet) -> Verdict {
    if catalog.contains(id) {
        return Verdict::Keep;
    }
    match unique_thinking_variant(id, catalog) {
        Some(repaired) => Verdict::Repair(repaired),
        None => Verdict::Remove,
    }
}

/// The `-thinking` variant of `provider/model`, if it is in the catalog and
/// is the only model in the provider namespace starting with `model`.
fn unique_thinking_variant(id: &str, catalog: &CatalogKeySet) -> Option<String> {
    let (provider, model) = id.split_once('/')?;
    if provider.is_empty() || model.is_empty() {
        return None;
    }
    let candidate = format!("{provider}/{model}{THINKING_SUFFIX}");
    if !catalog.contains(&candidate) {
        return None;
    }
    let matches = catalog
        .models_for_provider(provider)
        .filter(|m| m.starts_with(model))
        .take(2)
        .count();
    (matches == 1).then_some(candidate)
}

/// Validates configured ids against the catalog, repairing or removing stale ones.
pub fn sanitize_configured_model_ids<I, S>(configured_ids: I, catalog: &CatalogKeySet) -> SanitizeResult
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut result = SanitizeResult::default();
    for raw in configured_ids {
        let id = raw.as_ref().trim();
        if id.is_empty() {
            continue;
        }
        let kept = match judge(id, catalog) {
            Verdict::Keep => id.to_string(),
            Verdict::Repair(to) => {
                debug!(from = %id, to = %to, "Repaired configured model id");
                result.repaired.push(ModelRepair {
                    from: id.to_string(),
                    to: to.clone(),
                });
                to
            }
            Verdict::Remove => {
                debug!(model = %id, "Removed configured model id missing from catalog");
                result.removed.push(id.to_string());
                continue;
            }
        };
        if !result.configured.contains(&kept) {
            result.configured.push(kept);
        }
    }
    result
}

/// Single-id variant of [`sanitize_configured_model_ids`].
pub fn sanitize_single_model_id(model_id: Option<&str>, catalog: &CatalogKeySet) -> SingleModelSanitize {
    let Some(id) = model_id.map(str::trim).filter(|id| !id.is_empty()) else {
        return SingleModelSanitize::default();
    };
    match judge(id, catalog) {
        Verdict::Keep => SingleModelSanitize {
            id: Some(id.to_string()),
            repaired: None,
        },
        Verdict::Repair(to) => SingleModelSanitize {
            id: Some(to.clone()),
            repaired: Some(ModelRepair {
                from: id.to_string(),
                to,
            }),
        },
        Verdict::Remove => SingleModelSanitize::default(),
    }
}

// ============================================================================
// Tests
// ============================================================================
