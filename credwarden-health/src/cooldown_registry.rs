//! In-memory model-level cooldowns.
//!
//! Tracks models that should not be tried for a while regardless of which
//! credential would be used, e.g. after a provider-wide overload on one model.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use credwarden_core::{ModelCooldowns, ModelRef};
use tracing::debug;

/// Thread-safe map of model cooldown deadlines.
#[derive(Debug, Default)]
pub struct ModelCooldownRegistry {
    until: RwLock<HashMap<ModelRef, DateTime<Utc>>>,
}

impl ModelCooldownRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cools a model down until `until`. A later existing deadline is kept.
    pub fn mark(&self, model: &ModelRef, until: DateTime<Utc>) {
        let mut map = self.until.write().unwrap_or_else(PoisonError::into_inner);
        let entry = map.entry(model.clone()).or_insert(until);
        if *entry < until {
            *entry = until;
        }
        debug!(model = %model, until = %entry, "Model cooldown set");
    }

    /// Cools a model down for `duration` from `now`.
    pub fn mark_for(&self, model: &ModelRef, duration: Duration, now: DateTime<Utc>) {
        self.mark(model, now + duration);
    }

    /// Removes a model's cooldown. Returns true if one was present.
    pub fn clear(&self, model: &ModelRef) -> bool {
        self.until
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(model)
            .is_some()
    }

    /// Active cooldown deadline of a model.
    pub fn cooling_until(&self, model: &ModelRef, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.until
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(model)
            .copied()
            .filter(|until| *until > now)
    }

    /// Drops expired entries. Returns how many were removed.
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let mut map = self.until.write().unwrap_or_else(PoisonError::into_inner);
        let before = map.len();
        map.retain(|_, until| *until > now);
        before - map.len()
    }
}

impl ModelCooldowns for ModelCooldownRegistry {
    fn is_model_cooling_down(&self, model: &ModelRef, now: DateTime<Utc>) -> bool {
        self.cooling_until(model, now).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 30, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_mark_and_expire() {
        let registry = ModelCooldownRegistry::new();
        let model = ModelRef::new("google", "gemini-3-flash");
        registry.mark_for(&model, Duration::minutes(2), now());

        assert!(registry.is_model_cooling_down(&model, now()));
        assert!(!registry.is_model_cooling_down(&model, now() + Duration::minutes(2)));
        assert_eq!(registry.prune(now() + Duration::minutes(3)), 1);
    }

    #[test]
    fn test_mark_keeps_later_deadline() {
        let registry = ModelCooldownRegistry::new();
        let model = ModelRef::new("google", "gemini-3-flash");
        registry.mark(&model, now() + Duration::minutes(10));
        registry.mark(&model, now() + Duration::minutes(1));
        assert_eq!(
            registry.cooling_until(&model, now()),
            Some(now() + Duration::minutes(10))
        );
    }

    #[test]
    fn test_clear() {
        let registry = ModelCooldownRegistry::new();
        let model = ModelRef::new("Google", "gemini-3-flash");
        registry.mark_for(&model, Duration::minutes(5), now());
        assert!(registry.clear(&ModelRef::new("google", "gemini-3-flash")));
        assert!(!registry.clear(&model));
        assert!(!registry.is_model_cooling_down(&model, now()));
    }
}
