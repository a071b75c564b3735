use metaforge_common::ProviderConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub images: ImagesConfig,

    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,

    #[serde(default)]
    pub resolve: ResolveConfig,

    #[serde(default)]
    pub baidu: BaiduConfig,

    #[serde(default)]
    pub avatars: AvatarsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            fetch: FetchConfig::default(),
            images: ImagesConfig::default(),
            providers: default_providers(),
            resolve: ResolveConfig::default(),
            baidu: BaiduConfig::default(),
            avatars: AvatarsConfig::default(),
        }
    }
}

fn default_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig::new("javbus", 0),
        ProviderConfig::new("javdb", 1),
    ]
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Base URL clients use to reach this server; prefixes `/image` links.
    #[serde(default)]
    pub public_url: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: None,
        }
    }
}

impl ServerConfig {
    pub fn public_url(&self) -> String {
        match self.public_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.trim_end_matches('/').to_string(),
            _ => {
                let host: &str = if self.host == "0.0.0.0" { "127.0.0.1" } else { &self.host };
                format!("http://{}:{}", host, self.port)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory holding the SQLite database.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Image cache directory (default: `{data_dir}/image-cache`).
    #[serde(default)]
    pub image_cache_dir: Option<PathBuf>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            image_cache_dir: None,
        }
    }
}

impl StorageConfig {
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("metaforge.db")
    }

    pub fn image_cache_dir(&self) -> PathBuf {
        self.image_cache_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("image-cache"))
    }
}

// ---------------------------------------------------------------------------
// Outbound fetching
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchConfig {
    /// Concurrent page requests across all providers (default: 6)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Minimum gap between requests to one domain, before jitter.
    #[serde(default = "default_pacing_base_ms")]
    pub pacing_base_ms: u64,

    #[serde(default = "default_pacing_jitter_min_ms")]
    pub pacing_jitter_min_ms: u64,

    #[serde(default = "default_pacing_jitter_max_ms")]
    pub pacing_jitter_max_ms: u64,

    /// Retries after a 429 response (default: 3)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// HTTP or SOCKS proxy for all outbound requests.
    #[serde(default)]
    pub proxy: Option<String>,
}

fn default_max_concurrent() -> usize {
    6
}
fn default_timeout_secs() -> u64 {
    15
}
fn default_pacing_base_ms() -> u64 {
    200
}
fn default_pacing_jitter_min_ms() -> u64 {
    100
}
fn default_pacing_jitter_max_ms() -> u64 {
    300
}
fn default_max_retries() -> u32 {
    3
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            timeout_secs: default_timeout_secs(),
            pacing_base_ms: default_pacing_base_ms(),
            pacing_jitter_min_ms: default_pacing_jitter_min_ms(),
            pacing_jitter_max_ms: default_pacing_jitter_max_ms(),
            max_retries: default_max_retries(),
            proxy: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImagesConfig {
    /// Concurrent image downloads (default: 8)
    #[serde(default = "default_image_concurrent")]
    pub max_concurrent: usize,

    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u64,

    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Size bound for the cache sweep in MiB (0 = expiry only)
    #[serde(default)]
    pub max_cache_mb: u64,

    /// Sweep period in seconds (0 = never sweep)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_image_concurrent() -> usize {
    8
}
fn default_ttl_hours() -> u64 {
    24
}
fn default_jpeg_quality() -> u8 {
    90
}
fn default_sweep_interval() -> u64 {
    60 * 60
}

impl ImagesConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_hours.saturating_mul(60 * 60))
    }

    /// Sweep size bound in bytes (0 = expiry only).
    pub fn max_cache_bytes(&self) -> u64 {
        self.max_cache_mb.saturating_mul(1024 * 1024)
    }
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_image_concurrent(),
            ttl_hours: default_ttl_hours(),
            jpeg_quality: default_jpeg_quality(),
            max_cache_mb: 0,
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolution and post-processing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResolveConfig {
    /// Per-provider query timeout (default: 15)
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,

    /// Fill missing synopses from the catalog site.
    #[serde(default = "default_true")]
    pub plot_lookup: bool,

    #[serde(default)]
    pub plot_base_url: Option<String>,

    /// Genres dropped from every record.
    #[serde(default)]
    pub ignore_genres: Vec<String>,

    /// Drop genres named after an actor, and strip actor names from the end
    /// of titles.
    #[serde(default)]
    pub genre_ignore_actor: bool,

    #[serde(default)]
    pub genre_replace: BTreeMap<String, String>,

    #[serde(default)]
    pub actor_replace: BTreeMap<String, String>,

    /// Tag subtitled releases (`-C` suffix) with a subtitle genre.
    #[serde(default)]
    pub subtitle_genre: bool,

    #[serde(default = "default_title_format")]
    pub title_format: String,

    #[serde(default)]
    pub title_format_empty: String,
}

fn default_query_timeout() -> u64 {
    15
}
fn default_true() -> bool {
    true
}
fn default_title_format() -> String {
    "{num} {title}".to_string()
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            query_timeout_secs: default_query_timeout(),
            plot_lookup: true,
            plot_base_url: None,
            ignore_genres: Vec::new(),
            genre_ignore_actor: false,
            genre_replace: BTreeMap::new(),
            actor_replace: BTreeMap::new(),
            subtitle_genre: false,
            title_format: default_title_format(),
            title_format_empty: String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Baidu AI (body analysis and translation)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BaiduConfig {
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub secret_key: Option<String>,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// API calls per second (default: 2)
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Use body analysis to center cropped posters.
    #[serde(default)]
    pub body_analysis: bool,

    #[serde(default)]
    pub translate: bool,

    /// Target language code (default: "zh")
    #[serde(default = "default_translate_to")]
    pub translate_to: String,

    #[serde(default)]
    pub fields: TranslateFields,
}

/// Record fields passed through translation.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct TranslateFields {
    #[serde(default = "default_true")]
    pub title: bool,

    #[serde(default)]
    pub plot: bool,

    #[serde(default)]
    pub genres: bool,
}

impl Default for TranslateFields {
    fn default() -> Self {
        Self {
            title: true,
            plot: false,
            genres: false,
        }
    }
}

fn default_api_base() -> String {
    crate::baidu::DEFAULT_API_BASE.to_string()
}
fn default_requests_per_second() -> u32 {
    2
}
fn default_translate_to() -> String {
    "zh".to_string()
}

impl Default for BaiduConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            secret_key: None,
            api_base: default_api_base(),
            requests_per_second: default_requests_per_second(),
            body_analysis: false,
            translate: false,
            translate_to: default_translate_to(),
            fields: TranslateFields::default(),
        }
    }
}

impl BaiduConfig {
    /// Both credentials, when set and non-empty.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let key = self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())?;
        let secret = self.secret_key.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        Some((key, secret))
    }

    pub fn is_used(&self) -> bool {
        self.body_analysis || self.translate
    }
}

// ---------------------------------------------------------------------------
// Avatars
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AvatarsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for AvatarsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: None,
        }
    }
}
