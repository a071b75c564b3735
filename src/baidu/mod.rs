//! Client for the Baidu AI open platform.
//!
//! Every API call needs an OAuth access token obtained with the
//! client-credentials grant. [`BaiduClient`] caches that token behind a
//! mutex, renews it on expiry or when the API reports it invalid (error
//! codes 110 and 111, retried once), and throttles calls with a token bucket.
//!
//! - [`BodyAnalyzer`] locates the main person in a cover image.
//! - [`BaiduTranslator`] is the machine-translation backend.

mod body;
mod translate;

pub use body::BodyAnalyzer;
pub use translate::BaiduTranslator;

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{Quota, RateLimiter};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const DEFAULT_API_BASE: &str = "https://aip.baidubce.com/";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Tokens are renewed this long before they actually expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);
const DEFAULT_TOKEN_LIFETIME: u64 = 30 * 24 * 60 * 60;
const INVALID_TOKEN_CODES: &[i64] = &[110, 111];

// ---------------------------------------------------------------------------
// API response types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
    error_description: Option<String>,
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

impl AccessToken {
    fn is_valid(&self) -> bool {
        Instant::now() + EXPIRY_MARGIN < self.expires_at
    }
}

enum Payload<'a> {
    Form(&'a [(&'a str, String)]),
    Json(&'a Value),
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct BaiduClient {
    client: reqwest::Client,
    api_base: Url,
    api_key: String,
    secret_key: String,
    token: Mutex<Option<AccessToken>>,
    rate_limiter: governor::RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl BaiduClient {
    /// Create a client for `api_base` allowing `per_second` calls per second.
    pub fn new(
        api_key: impl Into<String>,
        secret_key: impl Into<String>,
        api_base: &str,
        per_second: u32,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let mut base = api_base.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let api_base =
            Url::parse(&base).map_err(|e| anyhow::anyhow!("invalid API base {base:?}: {e}"))?;

        let quota = Quota::per_second(NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN));

        Ok(Self {
            client,
            api_base,
            api_key: api_key.into(),
            secret_key: secret_key.into(),
            token: Mutex::new(None),
            rate_limiter: RateLimiter::direct(quota),
        })
    }

    /// Current access token, renewing it when missing, expired or `force`d.
    pub async fn access_token(&self, force: bool) -> Option<String> {
        let mut token = self.token.lock().await;
        if !force {
            if let Some(t) = token.as_ref().filter(|t| t.is_valid()) {
                return Some(t.value.clone());
            }
        }

        match self.request_token().await {
            Ok(fresh) => {
                let value = fresh.value.clone();
                *token = Some(fresh);
                debug!("Baidu access token renewed");
                Some(value)
            }
            Err(e) => {
                warn!(error = %e, "Failed to obtain Baidu access token");
                *token = None;
                None
            }
        }
    }

    /// Drop the cached token. Called when credentials change.
    pub async fn reset(&self) {
        *self.token.lock().await = None;
    }

    async fn request_token(&self) -> anyhow::Result<AccessToken> {
        let url = self.api_base.join("oauth/2.0/token")?;
        let resp: TokenResponse = self
            .client
            .post(url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.api_key.as_str()),
                ("client_secret", self.secret_key.as_str()),
            ])
            .send()
            .await?
            .json()
            .await?;

        match resp.access_token {
            Some(value) if !value.is_empty() => Ok(AccessToken {
                value,
                expires_at: Instant::now()
                    + Duration::from_secs(resp.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME)),
            }),
            _ => anyhow::bail!(
                "token endpoint refused: {} {}",
                resp.error.unwrap_or_default(),
                resp.error_description.unwrap_or_default()
            ),
        }
    }

    pub(crate) async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, String)],
    ) -> Option<T> {
        self.call(path, Payload::Form(form)).await
    }

    pub(crate) async fn post_json<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Option<T> {
        self.call(path, Payload::Json(body)).await
    }

    async fn call<T: DeserializeOwned>(&self, path: &str, payload: Payload<'_>) -> Option<T> {
        let endpoint = self.api_base.join(path).ok()?;
        let mut force = false;

        for attempt in 0..2 {
            let token = self.access_token(force).await?;
            self.rate_limiter.until_ready().await;

            let mut url = endpoint.clone();
            url.query_pairs_mut().append_pair("access_token", &token);
            let request = match &payload {
                Payload::Form(form) => self.client.post(url).form(form),
                Payload::Json(body) => self.client.post(url).json(body),
            };

            let value: Value = match request.send().await {
                Ok(resp) if resp.status().is_success() => match resp.json().await {
                    Ok(v) => v,
                    Err(e) => {
                        warn!(path = %path, error = %e, "Unreadable Baidu response");
                        return None;
                    }
                },
                Ok(resp) => {
                    warn!(path = %path, status = %resp.status(), "Baidu request failed");
                    return None;
                }
                Err(e) => {
                    warn!(path = %path, error = %e, "Baidu request failed");
                    return None;
                }
            };

            match value.get("error_code").and_then(Value::as_i64) {
                Some(code) if INVALID_TOKEN_CODES.contains(&code) && attempt == 0 => {
                    debug!(path = %path, code, "Access token rejected, renewing");
                    force = true;
                    continue;
                }
                Some(code) if code != 0 => {
                    let message = value
                        .get("error_msg")
                        .and_then(serde_json::Value::as_str)
                        .unwrap_or_default();
                    warn!(
                        path = %path,
                        code,
                        message = %message,
                        "Baidu API error"
                    );
                    return None;
                }
                _ => {}
            }

            return match serde_json::from_value(value) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    warn!(path = %path, error = %e, "Unexpected Baidu response shape");
                    None
                }
            };
        }

        None
    }
}
