//! Image proxy: download, cache and optionally crop remote images.

use std::sync::Arc;

use bytes::Bytes;
use metaforge_common::paths::{content_type_for, is_cover_path, is_web_url};
use metaforge_common::ImageKind;
use reqwest::Url;
use tracing::{debug, warn};

use super::cache::ImageCache;
use super::crop::{crop_window, needs_crop, PosterCropper};
use super::poi::PointCache;
use crate::fetch::ThrottledFetcher;
use crate::locks::KeyedLocks;
use crate::metadata::providers::{javbus, javdb};

const FALLBACK_REFERER: &str = "https://www.google.com/";

/// Bytes ready to be served.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageResponse {
    pub bytes: Bytes,
    pub content_type: &'static str,
}

/// Builds and unwraps `/image?url=..&type=..` links pointing at this server.
#[derive(Debug, Clone)]
pub struct ImageLinks {
    public_url: String,
}

impl ImageLinks {
    pub fn new(public_url: &str) -> Self {
        Self {
            public_url: public_url.trim().trim_end_matches('/').to_string(),
        }
    }

    /// Local proxy link for a remote image. Empty and already-local URLs are
    /// returned unchanged.
    pub fn local_url(&self, url: &str, kind: ImageKind) -> String {
        if url.is_empty() || unwrap_local(url).is_some() {
            return url.to_string();
        }
        match Url::parse(&format!("{}/image", self.public_url)) {
            Ok(mut local) => {
                local
                    .query_pairs_mut()
                    .append_pair("url", url)
                    .append_pair("type", &kind.to_string());
                local.to_string()
            }
            Err(e) => {
                warn!(public_url = %self.public_url, error = %e, "Invalid public URL");
                url.to_string()
            }
        }
    }
}

/// Extract the remote URL and image kind from a local proxy link.
pub fn unwrap_local(url: &str) -> Option<(String, Option<ImageKind>)> {
    let parsed = Url::parse(url).ok()?;
    if !parsed.path().ends_with("/image") {
        return None;
    }

    let mut inner = None;
    let mut kind = None;
    for (name, value) in parsed.query_pairs() {
        match name.as_ref() {
            "url" => inner = Some(value.into_owned()),
            "type" => kind = value.parse().ok(),
            _ => {}
        }
    }
    inner.filter(|u| !u.is_empty()).map(|u| (u, kind))
}

/// Referer a source host expects for hotlinked images.
pub fn referer_for(url: &str) -> &'static str {
    let host = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        .unwrap_or_default();

    if host.contains("javbus") || host.contains("buscdn") {
        javbus::DEFAULT_BASE_URL
    } else if host.contains("javdb") || host.contains("jdbstatic") {
        javdb::DEFAULT_BASE_URL
    } else {
        FALLBACK_REFERER
    }
}

fn url_path(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string())
}

pub struct ImageProxy {
    fetcher: Arc<ThrottledFetcher>,
    cache: Arc<ImageCache>,
    points: Arc<PointCache>,
    cropper: Arc<PosterCropper>,
    locks: Arc<KeyedLocks>,
}

impl ImageProxy {
    pub fn new(
        fetcher: Arc<ThrottledFetcher>,
        cache: Arc<ImageCache>,
        points: Arc<PointCache>,
        cropper: PosterCropper,
        locks: Arc<KeyedLocks>,
    ) -> Self {
        Self {
            fetcher,
            cache,
            points,
            cropper: Arc::new(cropper),
            locks,
        }
    }

    /// Serve an image, cropping primary cover images into posters.
    ///
    /// Returns `None` when the image cannot be obtained.
    pub async fn get(&self, url: &str, kind: ImageKind) -> Option<ImageResponse> {
        let (url, kind) = match unwrap_local(url) {
            Some((inner, inner_kind)) => (inner, inner_kind.unwrap_or(kind)),
            None => (url.to_string(), kind),
        };
        if !is_web_url(&url) {
            debug!(url = %url, "Not a web URL");
            return None;
        }

        let bytes = self.cached_or_download(&url).await?;

        let path = url_path(&url);
        if kind == ImageKind::Primary && is_cover_path(&path) {
            if let Some(poster) = self.crop(&url, &bytes).await {
                return Some(ImageResponse {
                    bytes: poster,
                    content_type: "image/jpeg",
                });
            }
        }

        Some(ImageResponse {
            bytes,
            content_type: content_type_for(&path),
        })
    }

    async fn cached_or_download(&self, url: &str) -> Option<Bytes> {
        if let Some(bytes) = self.cache.get(url).await {
            debug!(url = %url, size = bytes.len(), "Image cache hit");
            return Some(bytes);
        }

        // One download per cold URL; later waiters find it cached.
        let _guard = self.locks.lock(&format!("image:{url}")).await;
        if let Some(bytes) = self.cache.get(url).await {
            debug!(url = %url, "Image cached by a concurrent request");
            return Some(bytes);
        }
        self.download(url).await
    }

    async fn download(&self, url: &str) -> Option<Bytes> {
        let bytes = match self.fetcher.get_bytes(url, Some(referer_for(url))).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(url = %url, error = %e, "Image download failed");
                return None;
            }
        };

        if let Err(e) = self.cache.put(url, &bytes).await {
            warn!(url = %url, error = %e, "Failed to write image cache");
        }
        Some(bytes)
    }

    async fn crop(&self, url: &str, bytes: &Bytes) -> Option<Bytes> {
        let data = bytes.clone();
        let image = match tokio::task::spawn_blocking(move || PosterCropper::decode(&data)).await {
            Ok(Ok(image)) => image,
            Ok(Err(e)) => {
                warn!(url = %url, error = %e, "Image decode failed, serving original");
                return None;
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Image decode task failed");
                return None;
            }
        };

        let (width, height) = (image.width(), image.height());
        if !needs_crop(width, height) {
            return None;
        }

        let poi = self.points.point_for(url, bytes).await;
        let window = crop_window(width, height, poi)?;
        let cropper = self.cropper.clone();

        match tokio::task::spawn_blocking(move || cropper.crop(&image, window)).await {
            Ok(Ok(jpeg)) => Some(Bytes::from(jpeg)),
            Ok(Err(e)) => {
                warn!(url = %url, error = %e, "Poster encode failed, serving original");
                None
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Poster crop task failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchOptions, Pacing};
    use crate::images::cache::DEFAULT_TTL;
    use crate::images::poi::testing::FixedLocator;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use metaforge_db::pool::init_memory_pool;
    use std::io::Cursor;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn proxy(dir: &std::path::Path, locator: Option<Arc<FixedLocator>>) -> ImageProxy {
        let fetcher = ThrottledFetcher::new(FetchOptions {
            pacing: Pacing::none(),
            ..FetchOptions::for_images()
        })
        .unwrap();
        let locator = locator.map(|l| l as Arc<dyn crate::images::PointLocator>);
        let locks = Arc::new(KeyedLocks::new());
        ImageProxy::new(
            Arc::new(fetcher),
            Arc::new(ImageCache::new(dir, DEFAULT_TTL)),
            Arc::new(PointCache::new(locator, init_memory_pool().unwrap(), locks.clone())),
            PosterCropper::default(),
            locks,
        )
    }

    #[test]
    fn test_local_links() {
        let links = ImageLinks::new("http://localhost:8080/");
        let remote = "https://pics.example.com/cover/a b.jpg?x=1&y=2";
        let local = links.local_url(remote, ImageKind::Primary);
        assert!(local.starts_with("http://localhost:8080/image?url=https%3A%2F%2F"));
        assert!(local.ends_with("&type=primary"));

        assert_eq!(links.local_url(&local, ImageKind::Backdrop), local);
        assert_eq!(links.local_url("", ImageKind::Primary), "");

        let (inner, kind) = unwrap_local(&local).unwrap();
        assert_eq!(inner, remote);
        assert_eq!(kind, Some(ImageKind::Primary));
        assert!(unwrap_local("https://pics.example.com/cover/a.jpg").is_none());
    }

    #[test]
    fn test_referer_by_host() {
        assert_eq!(referer_for("https://www.javbus.com/pics/cover/a.jpg"), javbus::DEFAULT_BASE_URL);
        assert_eq!(referer_for("https://pics.buscdn.fun/cover/a.jpg"), javbus::DEFAULT_BASE_URL);
        assert_eq!(referer_for("https://c0.jdbstatic.com/covers/a.jpg"), javdb::DEFAULT_BASE_URL);
        assert_eq!(referer_for("https://cdn.example.com/a.jpg"), FALLBACK_REFERER);
        assert_eq!(referer_for("garbage"), FALLBACK_REFERER);
    }

    #[tokio::test]
    async fn test_primary_cover_is_cropped_and_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pics/cover/abc_b.png"))
            .and(header("referer", FALLBACK_REFERER))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png(30, 20)))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let locator = Arc::new(FixedLocator::new(None));
        let proxy = proxy(dir.path(), Some(locator.clone()));
        let url = format!("{}/pics/cover/abc_b.png", server.uri());

        for _ in 0..2 {
            let resp = proxy.get(&url, ImageKind::Primary).await.unwrap();
            assert_eq!(resp.content_type, "image/jpeg");
            let poster = image::load_from_memory(&resp.bytes).unwrap();
            assert_eq!((poster.width(), poster.height()), (13, 20));
        }

        // The cache holds the original download, not the poster.
        let cached = ImageCache::new(dir.path(), DEFAULT_TTL).get(&url).await.unwrap();
        assert_eq!(cached.as_ref(), png(30, 20).as_slice());
    }

    #[tokio::test]
    async fn test_backdrop_and_samples_are_served_as_is() {
        let server = MockServer::start().await;
        let body = png(30, 20);
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let proxy = proxy(dir.path(), None);

        let cover = format!("{}/pics/cover/abc_b.png", server.uri());
        let resp = proxy.get(&cover, ImageKind::Backdrop).await.unwrap();
        assert_eq!(resp.content_type, "image/png");
        assert_eq!(resp.bytes.as_ref(), body.as_slice());

        let sample = format!("{}/pics/samples/cover/1.png", server.uri());
        let resp = proxy.get(&sample, ImageKind::Primary).await.unwrap();
        assert_eq!(resp.bytes.as_ref(), body.as_slice());
    }

    #[tokio::test]
    async fn test_undecodable_cover_is_served_as_is() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"not an image".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let url = format!("{}/covers/x.jpg", server.uri());
        let resp = proxy(dir.path(), None).get(&url, ImageKind::Primary).await.unwrap();
        assert_eq!(resp.bytes.as_ref(), b"not an image");
        assert_eq!(resp.content_type, "image/jpeg");
    }

    #[tokio::test]
    async fn test_local_link_is_unwrapped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/covers/x.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png(30, 20)))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let remote = format!("{}/covers/x.png", server.uri());
        let local = ImageLinks::new("http://localhost:1").local_url(&remote, ImageKind::Primary);

        let resp = proxy(dir.path(), None).get(&local, ImageKind::Backdrop).await.unwrap();
        let poster = image::load_from_memory(&resp.bytes).unwrap();
        assert_eq!(poster.width(), 13);
    }

    #[tokio::test]
    async fn test_failures_yield_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let proxy = proxy(dir.path(), None);
        assert!(proxy
            .get(&format!("{}/covers/gone.jpg", server.uri()), ImageKind::Primary)
            .await
            .is_none());
        assert!(proxy.get("/local/path.jpg", ImageKind::Primary).await.is_none());
        assert!(proxy.get("", ImageKind::Primary).await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_cold_requests_download_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/covers/slow.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(png(8, 8))
                    .set_delay(std::time::Duration::from_millis(100)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let proxy = proxy(dir.path(), None);
        let url = format!("{}/covers/slow.png", server.uri());

        let (a, b) = tokio::join!(
            proxy.get(&url, ImageKind::Backdrop),
            proxy.get(&url, ImageKind::Backdrop)
        );
        assert_eq!(a.unwrap().bytes, b.unwrap().bytes);
    }
}
