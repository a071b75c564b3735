//! Database query modules.
//!
//! - records: resolved metadata keyed by (provider, remote_ref)
//! - plots: cached synopses keyed by normalized title code
//! - points: detected subject positions keyed by image URL

pub mod plots;
pub mod points;
pub mod records;

use chrono::{DateTime, Utc};

/// Parse an RFC 3339 timestamp column, falling back to the epoch for
/// rows written by hand.
pub(crate) fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}
