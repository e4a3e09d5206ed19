//! Named circuit breakers shared across callers

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerBuilder, CircuitStats};
use crate::config::CircuitBreakerSettings;

/// Hands out one breaker per dependency name
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    settings: CircuitBreakerSettings,
    enable_logging: bool,
    breakers: RwLock<HashMap<String, CircuitBreaker>>,
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerSettings::default())
    }
}

impl CircuitBreakerRegistry {
    /// Breakers created by this registry use `settings`
    pub fn new(settings: CircuitBreakerSettings) -> Self {
        Self {
            settings,
            enable_logging: true,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    pub fn enable_logging(mut self, enable: bool) -> Self {
        self.enable_logging = enable;
        self
    }

    /// The breaker named `name`, created with the registry settings if missing
    pub fn get_or_create(&self, name: &str) -> CircuitBreaker {
        if let Some(breaker) = self.breakers.read().get(name) {
            return breaker.clone();
        }

        self.breakers
            .write()
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!("Creating circuit breaker '{}'", name);
                CircuitBreakerBuilder::from_settings(name, &self.settings)
                    .enable_logging(self.enable_logging)
                    .build()
            })
            .clone()
    }

    /// Register a breaker built elsewhere, replacing any with the same name
    pub fn insert(&self, breaker: CircuitBreaker) -> Option<CircuitBreaker> {
        self.breakers
            .write()
            .insert(breaker.name().to_string(), breaker)
    }

    pub fn get(&self, name: &str) -> Option<CircuitBreaker> {
        self.breakers.read().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.breakers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.read().is_empty()
    }

    pub fn reset_all(&self) {
        for breaker in self.breakers.read().values() {
            breaker.reset();
        }
    }

    /// Stats of every breaker, keyed by name
    pub fn all_stats(&self) -> BTreeMap<String, CircuitStats> {
        self.breakers
            .read()
            .iter()
            .map(|(name, breaker)| (name.clone(), breaker.stats()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BitChatError;
    use crate::recovery::CircuitState;

    fn registry() -> CircuitBreakerRegistry {
        CircuitBreakerRegistry::new(CircuitBreakerSettings {
            failure_threshold: 1,
            ..Default::default()
        })
        .enable_logging(false)
    }

    #[tokio::test]
    async fn test_get_or_create_shares_breakers() {
        let registry = registry();
        let first = registry.get_or_create("relay");
        let second = registry.get_or_create("relay");

        let _ = first
            .execute(|| async { Err::<(), _>(BitChatError::offline()) })
            .await;

        assert_eq!(second.state(), CircuitState::Open);
        assert_eq!(registry.len(), 1);
        assert!(registry.get("storage").is_none());
    }

    #[tokio::test]
    async fn test_reset_all_and_stats() {
        let registry = registry();
        for name in ["relay", "peer"] {
            let _ = registry
                .get_or_create(name)
                .execute(|| async { Err::<(), _>(BitChatError::offline()) })
                .await;
        }

        let stats = registry.all_stats();
        assert_eq!(stats.len(), 2);
        assert!(stats.values().all(|s| s.state == CircuitState::Open));

        registry.reset_all();
        assert!(registry
            .all_stats()
            .values()
            .all(|s| s.state == CircuitState::Closed && s.total_calls == 0));
    }

    #[test]
    fn test_insert_replaces() {
        let registry = registry();
        let custom = CircuitBreakerBuilder::new("relay")
            .failure_threshold(9)
            .enable_logging(false)
            .build();

        assert!(registry.insert(custom).is_none());
        assert_eq!(
            registry.get_or_create("relay").config().failure_threshold,
            9
        );
    }
}
