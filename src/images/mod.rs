//! Image proxy with an on-disk cache and poster cropping.
//!
//! [`ImageProxy`] is what the `/image` endpoint calls. It resolves local
//! proxy links back to their source, serves fresh bytes from
//! [`ImageCache`], and turns landscape cover scans into portrait posters
//! with [`PosterCropper`], using a [`PointLocator`] to keep the subject in
//! frame.

pub mod cache;
pub mod crop;
pub mod poi;
mod proxy;

pub use cache::{spawn_sweeper, ImageCache, SweepStats};
pub use crop::{crop_window, CropWindow, PosterCropper};
pub use poi::{PointCache, PointLocator};
pub use proxy::{referer_for, unwrap_local, ImageLinks, ImageProxy, ImageResponse};
