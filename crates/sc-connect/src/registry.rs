//! Provider Registry
//!
//! Lists the providers an application supports, so that per-provider
//! results can show an empty bucket for providers the user has not
//! connected yet.

use sc_config::ConnectionsConfig;

pub trait ProviderRegistry: Send + Sync {
    /// Registered provider ids, in display order
    fn registered_provider_ids(&self) -> Vec<String>;

    fn is_registered(&self, provider_id: &str) -> bool {
        self.registered_provider_ids().iter().any(|p| p == provider_id)
    }
}

/// Fixed list of providers, usually taken from configuration
#[derive(Debug, Clone, Default)]
pub struct StaticProviderRegistry {
    provider_ids: Vec<String>,
}

impl StaticProviderRegistry {
    /// Duplicate ids are dropped, keeping the first occurrence
    pub fn new<I, S>(provider_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for id in provider_ids {
            let id = id.into();
            if !unique.contains(&id) {
                unique.push(id);
            }
        }
        Self { provider_ids: unique }
    }

    pub fn from_config(config: &ConnectionsConfig) -> Self {
        Self::new(config.providers.iter().cloned())
    }
}

impl ProviderRegistry for StaticProviderRegistry {
    fn registered_provider_ids(&self) -> Vec<String> {
        self.provider_ids.clone()
    }
}
