//! Provider-independent synopsis lookup.
//!
//! Some sources carry no plot text. [`PlotLookup`] fetches it from a catalog
//! page keyed by the normalized title code and keeps it in the `plots` table,
//! so each code is fetched at most once.

use std::sync::{Arc, LazyLock};

use metaforge_db::pool::{get_conn, DbPool};
use metaforge_db::queries::plots;
use reqwest::Url;
use scraper::{Html, Selector};
use tracing::{debug, warn};

use crate::fetch::ThrottledFetcher;
use crate::locks::KeyedLocks;

pub const DEFAULT_PLOT_BASE_URL: &str = "https://www.dmm.co.jp/";
const PLOT_SOURCE: &str = "dmm";
const AGE_COOKIE: &str = "age_check_done=1";

static PLOT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr td div.mg-b20.lh4 p.mg-b20").unwrap());
static PLOT_FALLBACK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.mg-b20.lh4").unwrap());

pub struct PlotLookup {
    fetcher: Arc<ThrottledFetcher>,
    pool: DbPool,
    locks: Arc<KeyedLocks>,
    base_url: Url,
}

impl PlotLookup {
    pub fn new(
        fetcher: Arc<ThrottledFetcher>,
        pool: DbPool,
        locks: Arc<KeyedLocks>,
        base_url: &str,
    ) -> anyhow::Result<Self> {
        let mut base = base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url =
            Url::parse(&base).map_err(|e| anyhow::anyhow!("invalid plot base URL {base:?}: {e}"))?;
        Ok(Self {
            fetcher,
            pool,
            locks,
            base_url,
        })
    }

    /// Synopsis for `num`, from the store or the catalog page.
    pub async fn lookup(&self, num: &str) -> Option<String> {
        let key = normalize_num(num);
        if key.is_empty() {
            return None;
        }

        let _guard = self.locks.lock(&format!("plot:{key}")).await;

        if let Some(plot) = self.cached(&key) {
            debug!(num = %key, "Plot served from store");
            return Some(plot);
        }

        let url = self
            .base_url
            .join(&format!("mono/dvd/-/detail/=/cid={key}/"))
            .ok()?
            .to_string();
        let html = match self.fetcher.get_page(&url, None, Some(AGE_COOKIE)).await {
            Ok(html) => html,
            Err(e) => {
                debug!(num = %key, error = %e, "Plot page unavailable");
                return None;
            }
        };

        let plot = extract_plot(&html)?;
        match get_conn(&self.pool) {
            Ok(conn) => {
                if let Err(e) = plots::save_plot(&conn, &key, PLOT_SOURCE, &plot, &url) {
                    warn!(num = %key, error = %e, "Failed to store plot");
                }
            }
            Err(e) => warn!(error = %e, "No database connection for plot store"),
        }
        Some(plot)
    }

    fn cached(&self, key: &str) -> Option<String> {
        let conn = get_conn(&self.pool).ok()?;
        match plots::get_plot(&conn, key, PLOT_SOURCE) {
            Ok(Some(entry)) if !entry.plot.trim().is_empty() => Some(entry.plot),
            Ok(_) => None,
            Err(e) => {
                warn!(num = %key, error = %e, "Plot store lookup failed");
                None
            }
        }
    }
}

/// Lowercase a title code and strip its separators.
///
/// # Examples
///
/// ```
/// use metaforge::metadata::plot::normalize_num;
///
/// assert_eq!(normalize_num("ABC-123"), "abc123");
/// assert_eq!(normalize_num(" abc_00123 "), "abc00123");
/// ```
pub fn normalize_num(num: &str) -> String {
    num.trim()
        .chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

fn extract_plot(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    document
        .select(&PLOT_SELECTOR)
        .chain(document.select(&PLOT_FALLBACK_SELECTOR))
        .map(|el| el.text().collect::<String>().trim().to_string())
        .find(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchOptions, Pacing};
    use metaforge_db::pool::init_memory_pool;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r#"<html><body><table><tr><td>
        <div class="mg-b20 lh4"><p class="mg-b20">  A quiet story.  </p></div>
        </td></tr></table></body></html>"#;

    fn lookup(server: &MockServer, pool: DbPool) -> PlotLookup {
        let fetcher = ThrottledFetcher::new(FetchOptions {
            pacing: Pacing::none(),
            ..FetchOptions::default()
        })
        .unwrap();
        PlotLookup::new(
            Arc::new(fetcher),
            pool,
            Arc::new(KeyedLocks::new()),
            &server.uri(),
        )
        .unwrap()
    }

    #[test]
    fn test_extract_plot() {
        assert_eq!(extract_plot(PAGE).as_deref(), Some("A quiet story."));
        assert_eq!(
            extract_plot(r#"<div class="mg-b20 lh4">Fallback text</div>"#).as_deref(),
            Some("Fallback text")
        );
        assert!(extract_plot("<html></html>").is_none());
    }

    #[tokio::test]
    async fn test_lookup_fetches_once_then_uses_store() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mono/dvd/-/detail/=/cid=abc123/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .expect(1)
            .mount(&server)
            .await;

        let pool = init_memory_pool().unwrap();
        let plots = lookup(&server, pool.clone());

        assert_eq!(plots.lookup("ABC-123").await.as_deref(), Some("A quiet story."));
        assert_eq!(plots.lookup("abc_123").await.as_deref(), Some("A quiet story."));

        let conn = get_conn(&pool).unwrap();
        let entry = plots::get_plot(&conn, "abc123", PLOT_SOURCE).unwrap().unwrap();
        assert!(entry.url.ends_with("cid=abc123/"));
    }

    #[tokio::test]
    async fn test_lookup_missing_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let plots = lookup(&server, init_memory_pool().unwrap());
        assert!(plots.lookup("XYZ-999").await.is_none());
        assert!(plots.lookup("").await.is_none());
    }
}
