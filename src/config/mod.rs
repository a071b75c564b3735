mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;

use crate::metadata::providers::KNOWN_PROVIDERS;

/// One year.
const MAX_TTL_HOURS: u64 = 24 * 365;
/// One TiB.
const MAX_CACHE_MB: u64 = 1024 * 1024;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./config.toml",
        "./metaforge.toml",
        "~/.config/metaforge/config.toml",
        "/etc/metaforge/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.fetch.max_concurrent == 0 || config.images.max_concurrent == 0 {
        anyhow::bail!("Concurrency limits must be at least 1");
    }
    if config.fetch.pacing_jitter_min_ms > config.fetch.pacing_jitter_max_ms {
        anyhow::bail!(
            "pacing_jitter_min_ms ({}) exceeds pacing_jitter_max_ms ({})",
            config.fetch.pacing_jitter_min_ms,
            config.fetch.pacing_jitter_max_ms
        );
    }
    if !(1..=100).contains(&config.images.jpeg_quality) {
        anyhow::bail!("jpeg_quality must be between 1 and 100");
    }
    if config.fetch.timeout_secs == 0 {
        anyhow::bail!("fetch.timeout_secs cannot be 0");
    }
    if config.resolve.query_timeout_secs == 0 {
        anyhow::bail!("resolve.query_timeout_secs cannot be 0");
    }
    if !(1..=MAX_TTL_HOURS).contains(&config.images.ttl_hours) {
        anyhow::bail!("Image cache ttl_hours must be between 1 and {}", MAX_TTL_HOURS);
    }
    if config.images.max_cache_mb > MAX_CACHE_MB {
        anyhow::bail!("Image cache max_cache_mb cannot exceed {}", MAX_CACHE_MB);
    }

    let mut seen = HashSet::new();
    for provider in &config.providers {
        let name = provider.name.to_ascii_lowercase();
        if !seen.insert(name.clone()) {
            anyhow::bail!("Provider '{}' is configured twice", provider.name);
        }
        if !KNOWN_PROVIDERS.contains(&name.as_str()) {
            tracing::warn!("Unknown provider '{}' will be ignored", provider.name);
        }
    }
    if !config.providers.iter().any(|p| p.enabled) {
        tracing::warn!("No providers are enabled; resolving will always fail");
    }

    if config.baidu.is_used() && config.baidu.credentials().is_none() {
        anyhow::bail!("Baidu features are enabled but api_key/secret_key are missing");
    }

    if !config.resolve.title_format.contains('{') {
        tracing::warn!(
            "title_format {:?} has no placeholders",
            config.resolve.title_format
        );
    }

    Ok(())
}
