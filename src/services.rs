//! Wiring of every long-lived component from a [`Config`].

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use metaforge_db::pool::{init_pool, DbPool};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::baidu::{BaiduClient, BaiduTranslator, BodyAnalyzer};
use crate::config::{Config, FetchConfig};
use crate::fetch::{FetchOptions, Pacing, ThrottledFetcher};
use crate::images::{spawn_sweeper, ImageCache, ImageLinks, ImageProxy, PointCache, PointLocator, PosterCropper};
use crate::locks::KeyedLocks;
use crate::metadata::avatars::DEFAULT_AVATAR_BASE_URL;
use crate::metadata::plot::DEFAULT_PLOT_BASE_URL;
use crate::metadata::{providers, AvatarIndex, Orchestrator, PlotLookup, PostProcessor};
use crate::translate::Translator;

/// Everything the server and the CLI need, built once.
pub struct Services {
    pub config: Arc<Config>,
    pub pool: DbPool,
    pub orchestrator: Arc<Orchestrator>,
    pub images: Arc<ImageProxy>,
    pub image_cache: Arc<ImageCache>,
    pub links: ImageLinks,
    fetcher: Arc<ThrottledFetcher>,
    image_fetcher: Arc<ThrottledFetcher>,
    baidu: Option<Arc<BaiduClient>>,
}

impl Services {
    /// Open the on-disk store under `storage.data_dir` and build services.
    pub fn open(config: Config) -> Result<Self> {
        let data_dir = &config.storage.data_dir;
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let db_path = config.storage.db_path();
        let db_path = db_path.to_string_lossy();
        info!("Initializing database at {}", db_path);
        let pool = init_pool(&db_path).context("Failed to open database")?;

        Self::build(config, pool)
    }

    /// Build services on an existing pool.
    pub fn build(config: Config, pool: DbPool) -> Result<Self> {
        let fetcher = Arc::new(
            ThrottledFetcher::new(fetch_options(&config.fetch, config.fetch.max_concurrent))
                .context("Failed to build page fetcher")?,
        );
        let image_fetcher = Arc::new(
            ThrottledFetcher::new(fetch_options(&config.fetch, config.images.max_concurrent))
                .context("Failed to build image fetcher")?,
        );
        let locks = Arc::new(KeyedLocks::new());

        let plots = if config.resolve.plot_lookup {
            let base = config
                .resolve
                .plot_base_url
                .as_deref()
                .unwrap_or(DEFAULT_PLOT_BASE_URL);
            Some(Arc::new(PlotLookup::new(
                fetcher.clone(),
                pool.clone(),
                locks.clone(),
                base,
            )?))
        } else {
            None
        };

        let registry = Arc::new(providers::build(&config.providers, fetcher.clone(), plots)?);
        if registry.is_empty() {
            tracing::warn!("No usable providers configured");
        }

        let baidu = match config.baidu.credentials() {
            Some((key, secret)) if config.baidu.is_used() => Some(Arc::new(BaiduClient::new(
                key,
                secret,
                &config.baidu.api_base,
                config.baidu.requests_per_second,
            )?)),
            _ => None,
        };

        let locator: Option<Arc<dyn PointLocator>> = match &baidu {
            Some(client) if config.baidu.body_analysis => {
                info!("Body analysis enabled for poster cropping");
                Some(Arc::new(BodyAnalyzer::new(client.clone())))
            }
            _ => None,
        };
        let translator: Option<Arc<dyn Translator>> = match &baidu {
            Some(client) if config.baidu.translate => {
                info!(to = %config.baidu.translate_to, "Translation enabled");
                Some(Arc::new(BaiduTranslator::new(
                    client.clone(),
                    config.baidu.translate_to.clone(),
                )))
            }
            _ => None,
        };

        let links = ImageLinks::new(&config.server.public_url());
        let postprocess = PostProcessor::new(config.resolve.clone(), translator, config.baidu.fields);
        let mut orchestrator = Orchestrator::new(
            registry,
            pool.clone(),
            locks.clone(),
            postprocess,
            links.clone(),
        )
        .with_query_timeout(Duration::from_secs(config.resolve.query_timeout_secs.max(1)));

        if config.avatars.enabled {
            let base = config
                .avatars
                .base_url
                .as_deref()
                .unwrap_or(DEFAULT_AVATAR_BASE_URL);
            orchestrator =
                orchestrator.with_avatars(Arc::new(AvatarIndex::new(fetcher.clone(), base)?));
        }

        let image_cache = Arc::new(ImageCache::new(
            config.storage.image_cache_dir(),
            config.images.ttl(),
        ));
        let points = Arc::new(PointCache::new(locator, pool.clone(), locks.clone()));
        let images = Arc::new(ImageProxy::new(
            image_fetcher.clone(),
            image_cache.clone(),
            points,
            PosterCropper::new(config.images.jpeg_quality),
            locks,
        ));

        Ok(Self {
            config: Arc::new(config),
            pool,
            orchestrator: Arc::new(orchestrator),
            images,
            image_cache,
            links,
            fetcher,
            image_fetcher,
            baidu,
        })
    }

    /// Start the periodic image cache sweep, if configured.
    pub fn spawn_background(&self) -> Option<JoinHandle<()>> {
        let interval = self.config.images.sweep_interval_secs;
        if interval == 0 {
            return None;
        }
        Some(spawn_sweeper(
            self.image_cache.clone(),
            Duration::from_secs(interval),
            self.config.images.max_cache_bytes(),
        ))
    }

    /// Forget per-domain pacing state and the cached API token.
    pub async fn reset(&self) {
        self.fetcher.reset();
        self.image_fetcher.reset();
        if let Some(baidu) = &self.baidu {
            baidu.reset().await;
        }
    }

    /// Run [`Services::reset`] for every trigger received, until the sender
    /// side closes.
    pub fn spawn_reset_listener(self: &Arc<Self>, mut triggers: mpsc::Receiver<()>) -> JoinHandle<()> {
        let services = self.clone();
        tokio::spawn(async move {
            while triggers.recv().await.is_some() {
                info!("Resetting pacing state and API tokens");
                services.reset().await;
            }
        })
    }

    pub fn cache_dir(&self) -> &Path {
        self.image_cache.dir()
    }
}

fn fetch_options(fetch: &FetchConfig, max_concurrent: usize) -> FetchOptions {
    FetchOptions {
        max_concurrent,
        timeout: Duration::from_secs(fetch.timeout_secs),
        pacing: Pacing {
            base: Duration::from_millis(fetch.pacing_base_ms),
            jitter_min: Duration::from_millis(fetch.pacing_jitter_min_ms),
            jitter_max: Duration::from_millis(fetch.pacing_jitter_max_ms),
        },
        max_retries: fetch.max_retries,
        proxy: fetch.proxy.clone(),
    }
}
