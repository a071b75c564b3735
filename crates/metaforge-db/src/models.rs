//! Rust models for the cache tables.
//!
//! Resolved records are stored as JSON documents and round-trip through
//! [`metaforge_common::Record`]; the models here cover the smaller keyed
//! caches that sit beside them.

use chrono::{DateTime, Utc};
use metaforge_common::Record;
use serde::{Deserialize, Serialize};

/// A persisted record together with its bookkeeping timestamps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredRecord {
    pub record: Record,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// Cached synopsis, keyed by normalized title code and source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlotEntry {
    /// Lowercase title code with separators removed.
    pub num: String,
    pub provider: String,
    pub plot: String,
    /// Page the synopsis was read from.
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// Horizontal subject position detected in an image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PointOfInterest {
    /// Source URL of the image.
    pub url: String,
    /// X coordinate in source pixels.
    pub x: f64,
    pub created_at: DateTime<Utc>,
}
