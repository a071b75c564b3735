//! Core type definitions for search hits and resolved records.
//!
//! A [`Candidate`] is the lightweight result of a provider search; a
//! [`Record`] is the full metadata one provider holds for one title.
//! Enums serialize in lowercase so they can travel in query strings and
//! config files unchanged.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single search hit pointing at a possible full record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Name of the provider that produced this hit.
    pub provider: String,
    /// Absolute URL of the detail page.
    pub remote_ref: String,
    /// Title code as the provider prints it (e.g. `ABC-123`).
    pub num: String,
    pub title: String,
    /// Absolute URL of the cover image, empty when unknown.
    pub cover: String,
    /// Release date as printed by the provider, usually `YYYY-MM-DD`.
    pub date: String,
}

impl Candidate {
    /// Only hits that carry a title code can be ranked and fetched.
    pub fn is_usable(&self) -> bool {
        !self.num.trim().is_empty()
    }
}

/// Fully resolved metadata for one title from one provider.
///
/// Records are identified by `(provider, remote_ref)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub provider: String,
    pub remote_ref: String,
    pub num: String,
    pub title: String,
    /// Title before translation or display formatting.
    #[serde(default)]
    pub original_title: String,
    #[serde(default)]
    pub plot: String,
    #[serde(default)]
    pub cover: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub director: String,
    #[serde(default)]
    pub studio: String,
    #[serde(default)]
    pub maker: String,
    /// Series or collection the title belongs to.
    #[serde(default)]
    pub set: String,
    /// Runtime as printed by the provider (e.g. `120分鐘`).
    #[serde(default)]
    pub runtime: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub actors: Vec<String>,
    #[serde(default)]
    pub samples: Vec<String>,
    /// Community rating on a 0-10 scale.
    #[serde(default)]
    pub rating: Option<f32>,
}

impl Record {
    /// Create an empty record for the given provider and detail page.
    pub fn new(provider: impl Into<String>, remote_ref: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            remote_ref: remote_ref.into(),
            ..Default::default()
        }
    }

    /// Release year parsed from the leading four digits of `date`.
    pub fn year(&self) -> Option<u16> {
        self.date.get(..4).and_then(|y| y.parse::<u16>().ok())
    }
}

/// Role an image plays for a title; drives the crop decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    /// Portrait poster; cover-class sources are cropped to 2:3.
    Primary,
    /// Landscape background; always served as downloaded.
    #[default]
    Backdrop,
    /// Small preview image.
    Thumb,
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Backdrop => write!(f, "backdrop"),
            Self::Thumb => write!(f, "thumb"),
        }
    }
}

impl std::str::FromStr for ImageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "primary" => Ok(Self::Primary),
            "backdrop" => Ok(Self::Backdrop),
            "thumb" => Ok(Self::Thumb),
            _ => Err(format!("Invalid image kind: {}", s)),
        }
    }
}

/// Enablement and ordering of one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Lower values are consulted first.
    #[serde(default)]
    pub priority: i32,

    /// Replaces the provider's built-in site root (mirrors, test servers).
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>, priority: i32) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            priority,
            base_url: None,
        }
    }
}
