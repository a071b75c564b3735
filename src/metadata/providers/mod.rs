//! Concrete provider implementations.
//!
//! Each submodule scrapes a single site and implements both
//! [`SiteAdapter`](super::provider::SiteAdapter) and
//! [`ProviderClient`](super::ProviderClient).

use std::sync::Arc;

use metaforge_common::ProviderConfig;
use scraper::ElementRef;
use tracing::{info, warn};

use super::plot::PlotLookup;
use super::provider::SiteConfig;
use super::registry::ProviderRegistry;
use crate::fetch::ThrottledFetcher;

macro_rules! selector {
    ($name:ident, $css:expr) => {
        static $name: std::sync::LazyLock<scraper::Selector> =
            std::sync::LazyLock::new(|| scraper::Selector::parse($css).unwrap());
    };
}

pub mod javbus;
pub mod javdb;

pub use javbus::JavBus;
pub use javdb::JavDb;

/// Provider names this build knows how to construct.
pub const KNOWN_PROVIDERS: &[&str] = &[javbus::NAME, javdb::NAME];

/// Build a registry from provider configs.
///
/// Unknown names are skipped with a warning; an invalid base URL is an error.
pub fn build(
    configs: &[ProviderConfig],
    fetcher: Arc<ThrottledFetcher>,
    plots: Option<Arc<PlotLookup>>,
) -> anyhow::Result<ProviderRegistry> {
    let mut registry = ProviderRegistry::new();

    for config in configs {
        let name = config.name.to_ascii_lowercase();
        match name.as_str() {
            javbus::NAME => {
                let site = SiteConfig::new(
                    javbus::NAME,
                    config.base_url.as_deref().unwrap_or(javbus::DEFAULT_BASE_URL),
                )?;
                let provider = JavBus::new(site, fetcher.clone(), plots.clone());
                registry.register(config.clone(), Arc::new(provider));
            }
            javdb::NAME => {
                let site = SiteConfig::new(
                    javdb::NAME,
                    config.base_url.as_deref().unwrap_or(javdb::DEFAULT_BASE_URL),
                )?;
                registry.register(config.clone(), Arc::new(JavDb::new(site, fetcher.clone())));
            }
            _ => {
                warn!(provider = %config.name, "Unknown provider, skipping");
                continue;
            }
        }
        info!(
            provider = %name,
            enabled = config.enabled,
            priority = config.priority,
            "Registered provider"
        );
    }

    Ok(registry)
}

/// Element text with whitespace runs collapsed to single spaces.
fn element_text(el: &ElementRef<'_>) -> String {
    squash(&el.text().collect::<String>())
}

/// Collapse whitespace in a plain string.
fn squash(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
