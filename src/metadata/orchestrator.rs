//! Per-identifier resolution pipeline.
//!
//! Providers are consulted one at a time in priority order. The first one
//! that yields a full record becomes the primary source; every later
//! provider only fills gaps through [`merge_into`]. Each fetched record is
//! persisted as it arrives.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use metaforge_common::{Candidate, ImageKind, Record};
use metaforge_db::pool::{get_conn, DbPool};
use metaforge_db::queries::records;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::avatars::AvatarIndex;
use super::merge::merge_into;
use super::postprocess::PostProcessor;
use super::provider::ProviderClient;
use super::registry::ProviderRegistry;
use crate::images::ImageLinks;
use crate::keys::{is_plausible, recognize};
use crate::locks::KeyedLocks;

pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(15);

/// A fully resolved title, ready to hand to a client.
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub record: Record,
    /// Name formatted with the configured title template.
    pub display_name: String,
    pub images: Vec<ImageLink>,
    pub actors: Vec<ActorImage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageLink {
    pub kind: ImageKind,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActorImage {
    pub name: String,
    pub image: Option<String>,
}

pub struct Orchestrator {
    registry: Arc<ProviderRegistry>,
    pool: DbPool,
    locks: Arc<KeyedLocks>,
    postprocess: PostProcessor,
    avatars: Option<Arc<AvatarIndex>>,
    links: ImageLinks,
    query_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        pool: DbPool,
        locks: Arc<KeyedLocks>,
        postprocess: PostProcessor,
        links: ImageLinks,
    ) -> Self {
        Self {
            registry,
            pool,
            locks,
            postprocess,
            avatars: None,
            links,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    pub fn with_avatars(mut self, avatars: Arc<AvatarIndex>) -> Self {
        self.avatars = Some(avatars);
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Resolve `name` (a title code or a file name containing one).
    ///
    /// Returns `None` when the name is not plausible or no provider knows it.
    pub async fn resolve(&self, name: &str) -> Option<Resolution> {
        let name = name.trim();
        if !is_plausible(name) {
            debug!(name = %name, "Ignoring implausible name");
            return None;
        }
        let key = recognize(name).map(|id| id.id).unwrap_or_else(|| name.to_string());
        let _guard = self.locks.lock(&format!("resolve:{}", key.to_uppercase())).await;

        let providers = self.registry.enabled();
        let mut first_hit: Option<Candidate> = None;
        let mut primary: Option<Record> = None;
        let mut remaining = providers.iter();

        for provider in remaining.by_ref() {
            let Some(hit) = self.best_candidate(provider.as_ref(), &key).await else {
                continue;
            };
            first_hit.get_or_insert_with(|| hit.clone());

            if let Some(record) = self.fetch(provider.as_ref(), &hit).await {
                info!(
                    key = %key,
                    provider = %provider.name(),
                    remote_ref = %record.remote_ref,
                    "Primary record fetched"
                );
                self.persist(&record);
                primary = Some(record);
                break;
            }
        }

        let mut record = match primary {
            Some(mut record) => {
                for provider in remaining {
                    self.supplement(provider.as_ref(), &key, &mut record).await;
                }
                record
            }
            None => self.stored(&key, first_hit.as_ref(), &providers)?,
        };

        let display_name = self.postprocess.apply(name, &mut record).await;
        let images = self.image_links(&record);
        let actors = self.actor_images(&record).await;

        info!(
            key = %key,
            provider = %record.provider,
            title = %display_name,
            "Resolved"
        );
        Some(Resolution {
            record,
            display_name,
            images,
            actors,
        })
    }

    async fn best_candidate(&self, provider: &dyn ProviderClient, key: &str) -> Option<Candidate> {
        if !provider.check_key(key) {
            debug!(key = %key, provider = %provider.name(), "Provider does not serve key");
            return None;
        }

        match tokio::time::timeout(self.query_timeout, provider.query(key)).await {
            Ok(hits) => {
                let best = hits.into_iter().next();
                if best.is_none() {
                    debug!(key = %key, provider = %provider.name(), "No candidates");
                }
                best
            }
            Err(_) => {
                warn!(
                    key = %key,
                    provider = %provider.name(),
                    timeout_secs = self.query_timeout.as_secs_f32(),
                    "Provider query timed out"
                );
                None
            }
        }
    }

    async fn fetch(&self, provider: &dyn ProviderClient, hit: &Candidate) -> Option<Record> {
        match tokio::time::timeout(self.query_timeout, provider.fetch(&hit.remote_ref)).await {
            Ok(record) => record,
            Err(_) => {
                warn!(
                    provider = %provider.name(),
                    remote_ref = %hit.remote_ref,
                    "Provider fetch timed out"
                );
                None
            }
        }
    }

    async fn supplement(&self, provider: &dyn ProviderClient, key: &str, primary: &mut Record) {
        let Some(hit) = self.best_candidate(provider, key).await else {
            return;
        };
        let Some(secondary) = self.fetch(provider, &hit).await else {
            return;
        };
        self.persist(&secondary);

        if merge_into(primary, &secondary) {
            debug!(
                key = %key,
                from = %provider.name(),
                into = %primary.provider,
                "Primary record supplemented"
            );
            self.persist(primary);
        }
    }

    /// Last stored copy of the title, for when every live fetch failed.
    ///
    /// The first candidate's own record is preferred. Without one, the most
    /// recently stored record for `key` from an enabled provider is used.
    fn stored(
        &self,
        key: &str,
        hit: Option<&Candidate>,
        providers: &[Arc<dyn ProviderClient>],
    ) -> Option<Record> {
        let conn = match get_conn(&self.pool) {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, "No database connection for record fallback");
                return None;
            }
        };

        let found = match hit {
            Some(hit) => records::find_record(&conn, &hit.provider, &hit.remote_ref),
            None => records::find_by_num(&conn, key).map(|rows| {
                rows.into_iter().find(|row| {
                    providers
                        .iter()
                        .any(|p| p.name().eq_ignore_ascii_case(&row.record.provider))
                })
            }),
        };

        match found {
            Ok(Some(stored)) => {
                info!(
                    key = %key,
                    provider = %stored.record.provider,
                    remote_ref = %stored.record.remote_ref,
                    "Using stored record"
                );
                Some(stored.record)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "Stored record lookup failed");
                None
            }
        }
    }

    fn persist(&self, record: &Record) {
        let result = get_conn(&self.pool).and_then(|conn| records::upsert_record(&conn, record));
        if let Err(e) = result {
            warn!(
                provider = %record.provider,
                remote_ref = %record.remote_ref,
                error = %e,
                "Failed to persist record"
            );
        }
    }

    fn image_links(&self, record: &Record) -> Vec<ImageLink> {
        let mut links = Vec::new();
        if !record.cover.is_empty() {
            for kind in [ImageKind::Primary, ImageKind::Backdrop] {
                links.push(ImageLink {
                    kind,
                    url: self.links.local_url(&record.cover, kind),
                });
            }
        }
        links.extend(record.samples.iter().map(|s| ImageLink {
            kind: ImageKind::Thumb,
            url: self.links.local_url(s, ImageKind::Thumb),
        }));
        links
    }

    async fn actor_images(&self, record: &Record) -> Vec<ActorImage> {
        let lookups = record.actors.iter().map(|name| async move {
            let image = match self.avatars.as_ref() {
                Some(index) => index
                    .find(name)
                    .await
                    .map(|url| self.links.local_url(&url, ImageKind::Primary)),
                None => None,
            };
            ActorImage {
                name: name.clone(),
                image,
            }
        });
        join_all(lookups).await
    }
}
