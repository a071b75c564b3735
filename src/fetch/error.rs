use thiserror::Error;

/// How a provider should react to a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The source is unreachable; stop trying further variants.
    AbortProvider,
    /// This request failed but the next variant may succeed.
    Continue,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("empty response from {0}")]
    EmptyResponse(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("{0}")]
    Other(String),
}

impl FetchError {
    pub fn class(&self) -> FailureClass {
        match self {
            FetchError::Timeout(_) | FetchError::Connection(_) => FailureClass::AbortProvider,
            _ => FailureClass::Continue,
        }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        FetchError::Parse(msg.into())
    }

    pub(crate) fn from_reqwest(err: reqwest::Error, url: &str) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(url.to_string())
        } else if let Some(status) = err.status() {
            FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            }
        } else if err.is_connect() || err.is_request() || err.is_body() {
            FetchError::Connection(format!("{url}: {err}"))
        } else if err.is_decode() {
            FetchError::Parse(format!("{url}: {err}"))
        } else {
            FetchError::Other(format!("{url}: {err}"))
        }
    }
}
