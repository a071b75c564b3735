//! Common error types used throughout metaforge.
//!
//! The store reports two kinds of failure: the database itself, and stored
//! JSON that no longer decodes into a record.

/// Common error type for metaforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// Stored data could not be encoded or decoded.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl Error {
    /// Create a new Database error.
    pub fn database<S: Into<String>>(msg: S) -> Self {
        Self::Database(msg.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
