//! Provider registry for managing multiple [`ProviderClient`] implementations.
//!
//! The [`ProviderRegistry`] pairs each provider with its [`ProviderConfig`]
//! and hands out the enabled ones in priority order. Lower priority numbers
//! come first; providers with equal priority keep registration order.

use std::sync::Arc;

use metaforge_common::ProviderConfig;

use super::provider::ProviderClient;

struct Entry {
    config: ProviderConfig,
    provider: Arc<dyn ProviderClient>,
}

/// A registry that manages multiple [`ProviderClient`] implementations.
///
/// # Examples
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use metaforge::metadata::ProviderRegistry;
/// use metaforge_common::ProviderConfig;
///
/// let mut registry = ProviderRegistry::new();
/// registry.register(ProviderConfig::new("javbus", 0), Arc::new(javbus));
///
/// for provider in registry.enabled() {
///     let hits = provider.query("ABC-123").await;
/// }
/// ```
pub struct ProviderRegistry {
    entries: Vec<Entry>,
}

impl ProviderRegistry {
    /// Create an empty registry with no providers.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register a provider with its configuration.
    pub fn register(&mut self, config: ProviderConfig, provider: Arc<dyn ProviderClient>) {
        self.entries.push(Entry { config, provider });
        // Stable sort keeps registration order among equal priorities.
        self.entries.sort_by_key(|e| e.config.priority);
    }

    /// Enabled providers, lowest priority number first.
    pub fn enabled(&self) -> Vec<Arc<dyn ProviderClient>> {
        self.entries
            .iter()
            .filter(|e| e.config.enabled)
            .map(|e| e.provider.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
