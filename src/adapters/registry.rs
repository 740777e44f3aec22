//! Name-to-adapter lookup built once at startup
//!
//! Iteration order is lexicographic by exchange name, which also fixes the
//! tie-break order of the spread comparison.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{error, info};

use crate::adapters::errors::ExchangeResult;
use crate::adapters::factory::create_adapter;
use crate::adapters::traits::ExchangeAdapter;
use crate::config::AppConfig;

/// Shared handle to one adapter
pub type SharedAdapter = Arc<dyn ExchangeAdapter>;

#[derive(Default, Clone)]
pub struct ExchangeRegistry {
    adapters: BTreeMap<String, SharedAdapter>,
}

impl ExchangeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One adapter per configured exchange; fails if any HTTP client cannot be built
    pub fn from_config(config: &AppConfig) -> ExchangeResult<Self> {
        let mut registry = Self::new();
        for credentials in &config.exchanges {
            registry.register(Arc::new(create_adapter(credentials, &config.settlement_asset)?));
        }
        Ok(registry)
    }

    /// Add or replace the adapter under its own exchange name
    pub fn register(&mut self, adapter: SharedAdapter) {
        self.adapters
            .insert(adapter.exchange_name().to_string(), adapter);
    }

    pub fn get(&self, name: &str) -> Option<&SharedAdapter> {
        self.adapters.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.adapters.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SharedAdapter)> {
        self.adapters.iter()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Check every adapter's credentials; the first failure is returned
    pub async fn validate_all(&self) -> ExchangeResult<()> {
        for (name, adapter) in &self.adapters {
            if let Err(e) = adapter.validate_credentials().await {
                error!(exchange = %name, error = %e, "Credential validation failed");
                return Err(e);
            }
        }
        info!(exchanges = ?self.names(), "All exchange credentials validated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::test_utils::TestMockAdapter;
    use crate::config::create_valid_config;

    #[test]
    fn test_from_config_builds_one_adapter_per_exchange() {
        let registry = ExchangeRegistry::from_config(&create_valid_config()).unwrap();
        assert_eq!(registry.names(), vec!["binance".to_string(), "kucoin".to_string()]);
        assert!(registry.get("okex").is_none());
    }

    #[test]
    fn test_names_are_sorted() {
        let mut registry = ExchangeRegistry::new();
        registry.register(Arc::new(TestMockAdapter::new("ex2")));
        registry.register(Arc::new(TestMockAdapter::new("ex1")));
        assert_eq!(registry.names(), vec!["ex1".to_string(), "ex2".to_string()]);
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_validate_all_stops_on_failure() {
        let mut registry = ExchangeRegistry::new();
        registry.register(Arc::new(TestMockAdapter::new("ex1")));
        registry.register(Arc::new(TestMockAdapter::with_failure("ex2")));
        assert!(registry.validate_all().await.is_err());
    }

    #[tokio::test]
    async fn test_validate_all_ok() {
        let mut registry = ExchangeRegistry::new();
        registry.register(Arc::new(TestMockAdapter::new("ex1")));
        assert!(registry.validate_all().await.is_ok());
    }
}
