//! Outbound HTTP for scraping and image downloads.
//!
//! [`ThrottledFetcher`] wraps a cookie-keeping [`reqwest::Client`] with:
//!
//! - a semaphore bounding in-flight requests;
//! - per-domain pacing with jitter ([`DomainPacer`]);
//! - a rotating browser User-Agent and browser-like default headers;
//! - HTTP 429 retries honoring `Retry-After` (max 3 retries).
//!
//! Failures come back as [`FetchError`], whose [`FetchError::class`] tells a
//! provider whether to keep trying other query variants.

mod error;
mod identity;
mod pacing;

pub use error::{FailureClass, FetchError};
pub use identity::random_user_agent;
pub use pacing::{DomainPacer, Pacing};

use std::time::Duration;

use bytes::Bytes;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE, REFERER, USER_AGENT};
use reqwest::{StatusCode, Url};
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const DEFAULT_MAX_CONCURRENT: usize = 6;
pub const DEFAULT_IMAGE_MAX_CONCURRENT: usize = 8;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
const MAX_RETRIES: u32 = 3;
const MAX_RETRY_AFTER_SECS: u64 = 30;

const PAGE_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
const IMAGE_ACCEPT: &str = "image/avif,image/webp,image/apng,image/*,*/*;q=0.8";
const LANGUAGES: &str = "zh-CN,zh;q=0.9,en;q=0.8,ja;q=0.7";

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub max_concurrent: usize,
    pub timeout: Duration,
    pub pacing: Pacing,
    pub max_retries: u32,
    /// Optional proxy URL applied to every request.
    pub proxy: Option<String>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            timeout: DEFAULT_TIMEOUT,
            pacing: Pacing::default(),
            max_retries: MAX_RETRIES,
            proxy: None,
        }
    }
}

impl FetchOptions {
    pub fn for_images() -> Self {
        Self {
            max_concurrent: DEFAULT_IMAGE_MAX_CONCURRENT,
            ..Self::default()
        }
    }
}

#[derive(Clone, Copy)]
enum RequestKind {
    Page,
    Image,
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

pub struct ThrottledFetcher {
    client: reqwest::Client,
    permits: Semaphore,
    pacer: DomainPacer,
    max_retries: u32,
}

impl ThrottledFetcher {
    pub fn new(options: FetchOptions) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder()
            .timeout(options.timeout)
            .cookie_store(true);
        if let Some(proxy) = options.proxy.as_deref().filter(|p| !p.is_empty()) {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| FetchError::Other(format!("invalid proxy {proxy}: {e}")))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| FetchError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            permits: Semaphore::new(options.max_concurrent.max(1)),
            pacer: DomainPacer::new(options.pacing),
            max_retries: options.max_retries,
        })
    }

    /// Fetch an HTML (or other text) page.
    pub async fn get_page(
        &self,
        url: &str,
        referer: Option<&str>,
        cookie: Option<&str>,
    ) -> Result<String, FetchError> {
        let _permit = self.acquire().await?;
        let resp = self
            .send(url, self.headers(RequestKind::Page, referer, cookie))
            .await?;
        let body = resp
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(e, url))?;
        if body.trim().is_empty() {
            return Err(FetchError::EmptyResponse(url.to_string()));
        }
        Ok(body)
    }

    /// Download raw bytes, typically an image.
    pub async fn get_bytes(&self, url: &str, referer: Option<&str>) -> Result<Bytes, FetchError> {
        let _permit = self.acquire().await?;
        let resp = self
            .send(url, self.headers(RequestKind::Image, referer, None))
            .await?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(e, url))?;
        if bytes.is_empty() {
            return Err(FetchError::EmptyResponse(url.to_string()));
        }
        Ok(bytes)
    }

    /// Forget per-domain pacing state.
    pub fn reset(&self) {
        self.pacer.reset();
    }

    async fn acquire(&self) -> Result<SemaphorePermit<'_>, FetchError> {
        self.permits
            .acquire()
            .await
            .map_err(|_| FetchError::Other("fetcher is shut down".to_string()))
    }

    /// Execute a GET with pacing and 429-retry logic.
    async fn send(&self, url: &str, headers: HeaderMap) -> Result<reqwest::Response, FetchError> {
        let parsed =
            Url::parse(url).map_err(|e| FetchError::Other(format!("invalid url {url}: {e}")))?;
        let domain = parsed.host_str().unwrap_or_default().to_string();

        let mut retries = 0u32;
        loop {
            self.pacer.wait(&domain).await;

            debug!(url = %url, "GET");
            let resp = self
                .client
                .get(parsed.clone())
                .headers(headers.clone())
                .header(USER_AGENT, random_user_agent())
                .send()
                .await
                .map_err(|e| FetchError::from_reqwest(e, url))?;

            let status = resp.status();
            if status == StatusCode::TOO_MANY_REQUESTS && retries < self.max_retries {
                retries += 1;
                let wait = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .unwrap_or(1)
                    .min(MAX_RETRY_AFTER_SECS);
                warn!(
                    url = %url,
                    retry = retries,
                    wait_secs = wait,
                    "Source returned 429, backing off"
                );
                tokio::time::sleep(Duration::from_secs(wait)).await;
                continue;
            }

            if !status.is_success() {
                return Err(FetchError::Status {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }

            return Ok(resp);
        }
    }

    fn headers(&self, kind: RequestKind, referer: Option<&str>, cookie: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let (accept, dest, mode, site) = match kind {
            RequestKind::Page => (PAGE_ACCEPT, "document", "navigate", "none"),
            RequestKind::Image => (IMAGE_ACCEPT, "image", "no-cors", "cross-site"),
        };
        headers.insert(ACCEPT, HeaderValue::from_static(accept));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(LANGUAGES));
        headers.insert(HeaderName::from_static("dnt"), HeaderValue::from_static("1"));
        headers.insert(HeaderName::from_static("sec-fetch-dest"), HeaderValue::from_static(dest));
        headers.insert(HeaderName::from_static("sec-fetch-mode"), HeaderValue::from_static(mode));
        headers.insert(HeaderName::from_static("sec-fetch-site"), HeaderValue::from_static(site));

        if matches!(kind, RequestKind::Page) && rand::thread_rng().gen_ratio(1, 3) {
            headers.insert(
                HeaderName::from_static("x-requested-with"),
                HeaderValue::from_static("XMLHttpRequest"),
            );
        }

        for (name, value) in [(REFERER, referer), (COOKIE, cookie)] {
            let Some(value) = value.filter(|v| !v.is_empty()) else {
                continue;
            };
            match HeaderValue::from_str(value) {
                Ok(v) => {
                    headers.insert(name, v);
                }
                Err(_) => warn!(header = %name, "Skipping header with invalid characters"),
            }
        }

        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> ThrottledFetcher {
        ThrottledFetcher::new(FetchOptions {
            pacing: Pacing::none(),
            timeout: Duration::from_millis(500),
            ..FetchOptions::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_get_page_sends_browser_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .and(header_exists("user-agent"))
            .and(header("referer", "https://ref.example/"))
            .and(header("cookie", "existmag=all"))
            .and(header("dnt", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let body = fetcher()
            .get_page(
                &format!("{}/page", server.uri()),
                Some("https://ref.example/"),
                Some("existmag=all"),
            )
            .await
            .unwrap();
        assert_eq!(body, "<html>ok</html>");
    }

    #[tokio::test]
    async fn test_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = fetcher()
            .get_page(&format!("{}/missing", server.uri()), None, None)
            .await
            .unwrap_err();
        assert_matches!(err, FetchError::Status { status: 404, .. });
        assert_eq!(err.class(), FailureClass::Continue);
    }

    #[tokio::test]
    async fn test_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("  "))
            .mount(&server)
            .await;

        let err = fetcher()
            .get_page(&server.uri(), None, None)
            .await
            .unwrap_err();
        assert_matches!(err, FetchError::EmptyResponse(_));
    }

    #[tokio::test]
    async fn test_retries_after_429() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;

        let bytes = fetcher().get_bytes(&server.uri(), None).await.unwrap();
        assert_eq!(bytes.as_ref(), &[1, 2, 3]);
    }

    #[tokio::test]
    async fn test_429_gives_up_after_max_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
            .expect(4)
            .mount(&server)
            .await;

        let err = fetcher().get_bytes(&server.uri(), None).await.unwrap_err();
        assert_matches!(err, FetchError::Status { status: 429, .. });
    }

    #[tokio::test]
    async fn test_timeout_aborts_provider() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("late")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let err = fetcher()
            .get_page(&server.uri(), None, None)
            .await
            .unwrap_err();
        assert_matches!(err, FetchError::Timeout(_));
        assert_eq!(err.class(), FailureClass::AbortProvider);
    }

    #[tokio::test]
    async fn test_refused_connection_aborts_provider() {
        let err = fetcher()
            .get_page("http://127.0.0.1:1/", None, None)
            .await
            .unwrap_err();
        assert_eq!(err.class(), FailureClass::AbortProvider);
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let err = fetcher().get_page("not a url", None, None).await.unwrap_err();
        assert_matches!(err, FetchError::Other(_));
    }
}
