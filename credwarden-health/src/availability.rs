//! Provider and model availability.
//!
//! A provider is operational unless every profile tracked for it is cooling
//! down or disabled. A provider with no tracked profiles is operational:
//! missing health data never hides a model.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use credwarden_core::{
    ModelCatalogEntry, ModelCooldowns, ModelRef, ProfileHealthSource, normalize_provider_id,
};
use tracing::{debug, trace};

/// Returns true if the provider has a usable profile or no tracked profiles.
pub fn is_provider_operational<P>(provider: &str, profiles: &P, now: DateTime<Utc>) -> bool
where
    P: ProfileHealthSource + ?Sized,
{
    let provider = normalize_provider_id(provider);
    let tracked = profiles.tracked_profiles(&provider);
    if tracked.is_empty() {
        trace!(provider = %provider, "No tracked profiles, assuming operational");
        return true;
    }
    let operational = tracked
        .iter()
        .any(|id| !profiles.is_profile_unavailable(id, now));
    if !operational {
        debug!(provider = %provider, profiles = tracked.len(), "Every profile unavailable");
    }
    operational
}

/// Returns false while the model itself is cooling down, otherwise defers to
/// [`is_provider_operational`].
pub fn is_model_operational<C, P>(
    model: &ModelRef,
    cooldowns: &C,
    profiles: &P,
    now: DateTime<Utc>,
) -> bool
where
    C: ModelCooldowns + ?Sized,
    P: ProfileHealthSource + ?Sized,
{
    if cooldowns.is_model_cooling_down(model, now) {
        trace!(model = %model, "Model cooling down");
        return false;
    }
    is_provider_operational(&model.provider, profiles, now)
}

/// Provider availability memoized for one evaluation pass.
pub struct ProviderHealthMemo<'a, P: ?Sized> {
    profiles: &'a P,
    now: DateTime<Utc>,
    cache: HashMap<String, bool>,
}

impl<'a, P> ProviderHealthMemo<'a, P>
where
    P: ProfileHealthSource + ?Sized,
{
    /// Creates an empty memo evaluated at `now`.
    pub fn new(profiles: &'a P, now: DateTime<Utc>) -> Self {
        Self {
            profiles,
            now,
            cache: HashMap::new(),
        }
    }

    /// Provider availability, computed at most once per normalized provider.
    pub fn is_operational(&mut self, provider: &str) -> bool {
        let provider = normalize_provider_id(provider);
        if let Some(cached) = self.cache.get(&provider) {
            return *cached;
        }
        let operational = is_provider_operational(&provider, self.profiles, self.now);
        self.cache.insert(provider, operational);
        operational
    }

    /// Number of providers evaluated so far.
    pub fn evaluated(&self) -> usize {
        self.cache.len()
    }
}

/// Keeps the catalog entries whose model is not cooling down and whose
/// provider is operational, in input order.
pub fn filter_models_by_operational_health<C, P>(
    models: &[ModelCatalogEntry],
    cooldowns: &C,
    profiles: &P,
    now: DateTime<Utc>,
) -> Vec<ModelCatalogEntry>
where
    C: ModelCooldowns + ?Sized,
    P: ProfileHealthSource + ?Sized,
{
    let mut memo = ProviderHealthMemo::new(profiles, now);
    let kept: Vec<ModelCatalogEntry> = models
        .iter()
        .filter(|entry| {
            !cooldowns.is_model_cooling_down(&entry.model_ref(), now)
                && memo.is_operational(&entry.provider)
        })
        .cloned()
        .collect();

    debug!(
        total = models.len(),
        kept = kept.len(),
        providers = memo.evaluated(),
        "Filtered models by operational health"
    );
    kept
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use credwarden_core::{
        AuthProfileStore, Credential, FailureReason, NoModelCooldowns, RecoveryPolicy,
    };

    use crate::cooldown_registry::ModelCooldownRegistry;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 30, 12, 0, 0).unwrap()
    }

    fn store(ids: &[&str]) -> AuthProfileStore {
        let mut store = AuthProfileStore::new();
        for id in ids {
            let provider = id.split_once(':').map_or(*id, |(p, _)| p);
            store.upsert_profile(
                *id,
                provider,
                Credential::ApiKey {
                    key: "sk-test".to_string(),
                },
            );
        }
        store
    }

    fn fail(store: &mut AuthProfileStore, id: &str) {
        store.record_failure(id, FailureReason::Billing, None, &RecoveryPolicy::default(), now());
    }

    #[test]
    fn test_untracked_provider_fails_open() {
        assert!(is_provider_operational("mistral", &AuthProfileStore::new(), now()));
    }

    #[test]
    fn test_provider_down_only_when_every_profile_down() {
        let mut store = store(&["bifrost:fuel", "bifrost:backup"]);
        fail(&mut store, "bifrost:fuel");
        assert!(is_provider_operational("bifrost", &store, now()));

        fail(&mut store, "bifrost:backup");
        assert!(!is_provider_operational("bifrost", &store, now()));
        assert!(!is_provider_operational(" Bifrost ", &store, now()));
    }

    #[test]
    fn test_model_cooldown_wins_over_healthy_provider() {
        let store = store(&["google:default"]);
        let cooldowns = ModelCooldownRegistry::new();
        let model = ModelRef::new("google", "gemini-3-flash");
        cooldowns.mark(&model, now() + chrono::Duration::minutes(5));

        assert!(!is_model_operational(&model, &cooldowns, &store, now()));
        assert!(is_model_operational(
            &ModelRef::new("google", "gemini-2.5-pro"),
            &cooldowns,
            &store,
            now()
        ));
    }

    #[test]
    fn test_filter_keeps_order_and_drops_down_providers() {
        let mut store = store(&["bifrost:fuel", "openai:work"]);
        fail(&mut store, "bifrost:fuel");
        let models = vec![
            ModelCatalogEntry::new("openai", "gpt-5"),
            ModelCatalogEntry::new("bifrost", "fuel-large"),
            ModelCatalogEntry::new("mistral", "large"),
            ModelCatalogEntry::new("openai", "gpt-5-mini"),
        ];

        let kept = filter_models_by_operational_health(&models, &NoModelCooldowns, &store, now());
        let keys: Vec<_> = kept.iter().map(ModelCatalogEntry::key).collect();
        assert_eq!(keys, vec!["openai/gpt-5", "mistral/large", "openai/gpt-5-mini"]);
    }

    #[test]
    fn test_memo_normalizes_provider() {
        let store = store(&["zai:default"]);
        let mut memo = ProviderHealthMemo::new(&store, now());
        assert!(memo.is_operational("z.ai"));
        assert!(memo.is_operational("ZAI"));
        assert_eq!(memo.evaluated(), 1);
    }
}
