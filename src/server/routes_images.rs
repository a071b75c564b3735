//! Public image proxy endpoint.
//!
//! `GET /image?url=..&type=..` serves a remote image through the cache,
//! cropping cover scans when `type=primary`. Anything that cannot be served
//! is a 404 with an empty body.

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use metaforge_common::ImageKind;
use serde::Deserialize;

use super::AppContext;

/// Create image-related routes.
pub fn image_routes() -> Router<AppContext> {
    Router::new().route("/image", get(serve_image))
}

// ============================================================================
// Request types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ImageQuery {
    #[serde(default)]
    pub url: String,

    /// `primary`, `backdrop` or `thumb`. Unknown values are served uncropped.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

impl ImageQuery {
    fn kind(&self) -> ImageKind {
        self.kind
            .as_deref()
            .and_then(|k| k.parse().ok())
            .unwrap_or_default()
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn serve_image(
    State(ctx): State<AppContext>,
    Query(query): Query<ImageQuery>,
) -> impl IntoResponse {
    let url = query.url.trim();
    if url.is_empty() {
        return StatusCode::NOT_FOUND.into_response();
    }

    let Some(image) = ctx.images.get(url, query.kind()).await else {
        tracing::debug!(url = %url, "Image not available");
        return StatusCode::NOT_FOUND.into_response();
    };

    (
        StatusCode::OK,
        [
            (header::CACHE_CONTROL, "public, max-age=86400"),
            (header::CONTENT_TYPE, image.content_type),
        ],
        Body::from(image.bytes),
    )
        .into_response()
}
