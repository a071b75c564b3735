//! The provider capability contract and the shared query/fetch flow.
//!
//! A [`ProviderClient`] is what the orchestrator talks to. Site scrapers
//! implement the narrower [`SiteAdapter`] (one search page, one detail page)
//! and delegate the common parts to [`query_variants`] and [`fetch_detail`]:
//! variant expansion, failure classification, URL fixing and ranking.

use async_trait::async_trait;
use metaforge_common::paths::is_web_url;
use metaforge_common::{Candidate, Record};
use reqwest::Url;
use tracing::{debug, warn};

use super::ranker;
use crate::fetch::{FailureClass, FetchError};
use crate::keys::expand_key;

// ---------------------------------------------------------------------------
// Site configuration
// ---------------------------------------------------------------------------

/// Immutable per-instance site settings, fixed at construction.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub name: String,
    pub base_url: Url,
}

impl SiteConfig {
    /// Build a site config; the base URL always ends with `/` so relative
    /// joins keep its path.
    pub fn new(name: impl Into<String>, base_url: &str) -> anyhow::Result<Self> {
        let mut base = base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| anyhow::anyhow!("invalid base URL {base_url:?}: {e}"))?;
        Ok(Self {
            name: name.into(),
            base_url,
        })
    }

    /// Origin of the site with a trailing slash, used as a referer.
    pub fn origin(&self) -> String {
        format!("{}/", self.base_url.origin().ascii_serialization())
    }

    pub fn url(&self, path: &str) -> String {
        fix_url(&self.base_url, path)
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Capability every metadata source exposes to the orchestrator.
///
/// None of these methods fail: problems are logged and surface as an empty
/// result.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Short, lowercase identifier (e.g. `"javbus"`).
    fn name(&self) -> &str;

    /// Whether this provider serves the given key at all.
    fn check_key(&self, key: &str) -> bool;

    /// Ranked candidates for `key`, best first.
    async fn query(&self, key: &str) -> Vec<Candidate>;

    /// Full record behind a candidate's `remote_ref`.
    async fn fetch(&self, remote_ref: &str) -> Option<Record>;
}

/// The site-specific half of a scraping provider.
#[async_trait]
pub trait SiteAdapter: Send + Sync {
    fn site(&self) -> &SiteConfig;

    fn check_key(&self, key: &str) -> bool;

    /// Search one key variant.
    async fn search(&self, variant: &str) -> Result<Vec<Candidate>, FetchError>;

    /// Load and parse a detail page. `Ok(None)` means the page has no record.
    async fn detail(&self, remote_ref: &str) -> Result<Option<Record>, FetchError>;
}

// ---------------------------------------------------------------------------
// Shared flow
// ---------------------------------------------------------------------------

/// Search the expanded variants of `key` until one produces usable hits.
///
/// A network failure stops the walk immediately. Other failures move on to
/// the next variant.
pub async fn query_variants<A>(adapter: &A, key: &str) -> Vec<Candidate>
where
    A: SiteAdapter + ?Sized,
{
    let site = adapter.site();
    if !adapter.check_key(key) {
        debug!(provider = %site.name, key = %key, "Key not supported");
        return Vec::new();
    }

    let mut found = Vec::new();
    for variant in expand_key(key) {
        match adapter.search(&variant).await {
            Ok(mut hits) => {
                hits.retain(Candidate::is_usable);
                if hits.is_empty() {
                    debug!(provider = %site.name, variant = %variant, "No results");
                    continue;
                }
                for hit in &mut hits {
                    hit.provider = site.name.clone();
                    hit.remote_ref = fix_url(&site.base_url, &hit.remote_ref);
                    hit.cover = fix_url(&site.base_url, &hit.cover);
                }
                found = hits;
                break;
            }
            Err(e) => match e.class() {
                FailureClass::AbortProvider => {
                    warn!(provider = %site.name, variant = %variant, error = %e, "Source unreachable, giving up");
                    break;
                }
                FailureClass::Continue => {
                    warn!(provider = %site.name, variant = %variant, error = %e, "Search failed");
                }
            },
        }
    }

    ranker::rank(key, &mut found);
    found
}

/// Load a detail page and normalize its URLs.
pub async fn fetch_detail<A>(adapter: &A, remote_ref: &str) -> Option<Record>
where
    A: SiteAdapter + ?Sized,
{
    let site = adapter.site();
    let url = fix_url(&site.base_url, remote_ref);
    if url.is_empty() {
        return None;
    }

    let mut record = match adapter.detail(&url).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            debug!(provider = %site.name, url = %url, "Detail page has no record");
            return None;
        }
        Err(e) => {
            warn!(provider = %site.name, url = %url, error = %e, "Detail fetch failed");
            return None;
        }
    };

    let page = Url::parse(&url).unwrap_or_else(|_| site.base_url.clone());
    record.provider = site.name.clone();
    record.remote_ref = url;
    record.cover = fix_url(&page, &record.cover);
    record.samples = record
        .samples
        .iter()
        .map(|s| fix_url(&page, s))
        .filter(|s| !s.is_empty())
        .collect();
    if record.original_title.is_empty() {
        record.original_title = record.title.clone();
    }

    Some(record)
}

/// Resolve a possibly relative URL against `base`.
///
/// Blank input stays empty and absolute http(s) URLs are kept as they are.
///
/// # Examples
///
/// ```
/// use metaforge::metadata::provider::fix_url;
/// use reqwest::Url;
///
/// let base = Url::parse("https://www.javbus.com/").unwrap();
/// assert_eq!(fix_url(&base, "/pics/cover/a.jpg"), "https://www.javbus.com/pics/cover/a.jpg");
/// assert_eq!(fix_url(&base, "//cdn.example/a.jpg"), "https://cdn.example/a.jpg");
/// assert_eq!(fix_url(&base, "  "), "");
/// ```
pub fn fix_url(base: &Url, value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        return String::new();
    }
    if is_web_url(value) {
        return value.to_string();
    }
    base.join(value).map(String::from).unwrap_or_default()
}
