//! Title metadata resolution.
//!
//! # Module layout
//!
//! - [`provider`] -- the [`ProviderClient`] contract and the shared
//!   search/detail driver for scraped sites.
//! - [`providers`] -- concrete site adapters.
//! - [`registry`] -- enabled providers in priority order.
//! - [`ranker`] -- candidate ordering against the requested key.
//! - [`merge`] -- gap filling between records.
//! - [`plot`] -- synopsis lookup for sources without one.
//! - [`avatars`] -- actor image index.
//! - [`postprocess`] -- configured rewriting of the final record.
//! - [`orchestrator`] -- the per-identifier pipeline tying it together.

pub mod avatars;
pub mod merge;
pub mod orchestrator;
pub mod plot;
pub mod postprocess;
pub mod provider;
pub mod providers;
pub mod ranker;
pub mod registry;

#[cfg(test)]
pub(crate) mod testing;

pub use avatars::AvatarIndex;
pub use orchestrator::{ActorImage, ImageLink, Orchestrator, Resolution};
pub use plot::PlotLookup;
pub use postprocess::{format_title, PostProcessor};
pub use provider::{ProviderClient, SiteAdapter, SiteConfig};
pub use registry::ProviderRegistry;
