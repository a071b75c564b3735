//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which builds the full [`Services`] graph on an
//! in-memory DB with a throwaway image cache directory, plus the HTML
//! fixtures served by mock provider sites.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;

use axum::Router;
use metaforge::config::Config;
use metaforge::server::{create_router, AppContext};
use metaforge::services::Services;
use metaforge_common::ProviderConfig;
use metaforge_db::pool::{init_memory_pool, DbPool};
use tempfile::TempDir;

pub const PUBLIC_URL: &str = "http://metaforge.test:8080";

/// Test harness wrapping fully-constructed [`Services`].
pub struct TestHarness {
    pub services: Arc<Services>,
    pub db: DbPool,
    pub cache_dir: TempDir,
}

impl TestHarness {
    /// Harness with no providers and no outbound lookups.
    pub fn new() -> Self {
        Self::with_config(test_config(&[]))
    }

    pub fn with_config(mut config: Config) -> Self {
        let cache_dir = tempfile::tempdir().expect("failed to create cache dir");
        config.storage.image_cache_dir = Some(cache_dir.path().to_path_buf());

        let db = init_memory_pool().expect("failed to create in-memory pool");
        let services =
            Services::build(config, db.clone()).expect("failed to build services");

        Self {
            services: Arc::new(services),
            db,
            cache_dir,
        }
    }

    pub fn router(&self) -> Router {
        create_router(AppContext::from_services(&self.services))
    }

    /// Path and query of the local proxy link for `url`.
    pub fn image_uri(&self, url: &str, kind: metaforge_common::ImageKind) -> String {
        let local = self.services.links.local_url(url, kind);
        local
            .strip_prefix(PUBLIC_URL)
            .expect("local link uses the public URL")
            .to_string()
    }

    pub fn conn(&self) -> metaforge_db::pool::PooledConnection {
        metaforge_db::pool::get_conn(&self.db).expect("failed to get db connection")
    }
}

/// Config pointing the named providers at mock base URLs, in order, with
/// pacing and outbound side lookups turned off.
pub fn test_config(providers: &[(&str, &str)]) -> Config {
    let mut config = Config::default();
    config.server.public_url = Some(PUBLIC_URL.to_string());
    config.fetch.pacing_base_ms = 0;
    config.fetch.pacing_jitter_min_ms = 0;
    config.fetch.pacing_jitter_max_ms = 0;
    config.fetch.timeout_secs = 5;
    config.resolve.plot_lookup = false;
    config.resolve.query_timeout_secs = 5;
    config.avatars.enabled = false;
    config.images.sweep_interval_secs = 0;
    config.providers = providers
        .iter()
        .enumerate()
        .map(|(i, (name, base))| {
            let mut provider = ProviderConfig::new(*name, i as i32);
            provider.base_url = Some(base.to_string());
            provider
        })
        .collect();
    config
}

/// A solid-color PNG of the given size.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb([120, 80, 40]));
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut out, image::ImageFormat::Png)
        .expect("failed to encode png");
    out.into_inner()
}

// ---------------------------------------------------------------------------
// Site fixtures
// ---------------------------------------------------------------------------

pub const JAVBUS_SEARCH: &str = r#"<html><body><div id="waterfall">
  <div class="item"><a class="movie-box" href="/ABC-1234">
    <div class="photo-frame"><img src="/pics/thumb/x1.jpg" title="Other Title"></div>
    <div class="photo-info"><span>Other Title<br><date>ABC-1234</date> / <date>2020-02-02</date></span></div>
  </a></div>
  <div class="item"><a class="movie-box" href="/ABC-123">
    <div class="photo-frame"><img src="/pics/thumb/x2.jpg" title="Right Title"></div>
    <div class="photo-info"><span>Right Title<br><date>ABC-123</date> / <date>2021-01-01</date></span></div>
  </a></div>
</div></body></html>"#;

pub const JAVBUS_DETAIL: &str = r#"<html><body><div class="container">
  <h3>ABC-123 Right Title</h3>
  <div class="row movie">
    <div class="col-md-9 screencap"><a class="bigImage" href="/pics/cover/abc_b.jpg"><img src="/pics/cover/abc_b.jpg"></a></div>
    <div class="col-md-3 info">
      <p><span class="header">識別碼:</span> <span>ABC-123</span></p>
      <p><span class="header">發行日期:</span> 2021-01-01</p>
      <p><span class="header">長度:</span> 120分鐘</p>
      <p><span class="header">製作商:</span> <a href="/studio/1">Maker Co</a></p>
      <p class="header">類別:</p>
      <p><span class="genre"><label><a href="/genre/1">Drama</a></label></span></p>
      <p><span class="genre"><a href="/star/1">Alice</a></span></p>
    </div>
  </div>
</div></body></html>"#;

pub const JAVDB_SEARCH: &str = r#"<html><body><div class="movie-list h cols-4">
  <div class="item"><a href="/v/xyz" class="box" title="Right Title">
    <div class="cover"><img src="/covers/ab/xyz.jpg"></div>
    <div class="video-title"><strong>ABC-123</strong> Right Title</div>
    <div class="meta"> 2021-01-01 </div>
  </a></div>
</div></body></html>"#;

pub const JAVDB_DETAIL: &str = r#"<html><body>
  <h2 class="title is-4"><strong>ABC-123 </strong><strong class="current-title">Right Title</strong></h2>
  <div class="column column-video-cover"><a href="/covers/ab/xyz.jpg"><img src="/covers/ab/xyz.jpg" class="video-cover"></a></div>
  <nav class="panel movie-panel-info">
    <div class="panel-block"><strong>番號:</strong>&nbsp;<span class="value"><a href="/video_codes/ABC">ABC</a>-123</span></div>
    <div class="panel-block"><strong>日期:</strong>&nbsp;<span class="value">2021-01-01</span></div>
    <div class="panel-block"><strong>評分:</strong>&nbsp;<span class="value">4.25分, 由100人評價</span></div>
    <div class="panel-block"><strong>類別:</strong>&nbsp;<span class="value"><a>drama</a>, <a>Action</a></span></div>
    <div class="panel-block"><strong>演員:</strong>&nbsp;<span class="value"><a>Alice</a><strong class="symbol female">♀</strong>&nbsp;<a>Carol</a><strong class="symbol female">♀</strong></span></div>
  </nav>
  <div class="tile-images preview-images"><a class="tile-item" href="/samples/ab/xyz_1.jpg"></a></div>
</body></html>"#;
