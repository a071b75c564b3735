//! Actor avatar index.
//!
//! The index is a community-maintained `Filetree.json` mapping directories
//! to image files named after actors. It is refreshed at most once per
//! [`REFRESH_INTERVAL`], under a mutex so concurrent lookups share a single
//! download.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::fetch::ThrottledFetcher;

pub const DEFAULT_AVATAR_BASE_URL: &str = "https://raw.githubusercontent.com/xinxin8816/gfriends/master/";
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Directories and files keep their order in the document; the first match
/// wins.
#[derive(Debug, Default, Deserialize)]
struct FileTree {
    #[serde(rename = "Content", default)]
    content: serde_json::Map<String, serde_json::Value>,
}

impl FileTree {
    fn find(&self, base: &Url, name: &str) -> Option<String> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let prefix = format!("{name}.");
        self.content.iter().find_map(|(dir, files)| {
            files.as_object()?.iter().find_map(|(file, path)| {
                let path = path.as_str().filter(|_| file.starts_with(&prefix))?;
                Some(format!("{base}Content/{dir}/{path}"))
            })
        })
    }
}

#[derive(Default)]
struct IndexState {
    tree: Option<Arc<FileTree>>,
    attempted_at: Option<Instant>,
}

pub struct AvatarIndex {
    fetcher: Arc<ThrottledFetcher>,
    base_url: Url,
    state: Mutex<IndexState>,
}

impl AvatarIndex {
    pub fn new(fetcher: Arc<ThrottledFetcher>, base_url: &str) -> anyhow::Result<Self> {
        let mut base = base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| anyhow::anyhow!("invalid avatar base URL {base:?}: {e}"))?;
        Ok(Self {
            fetcher,
            base_url,
            state: Mutex::new(IndexState::default()),
        })
    }

    /// Avatar URL for an actor, if the index has one.
    pub async fn find(&self, name: &str) -> Option<String> {
        let tree = self.tree().await?;
        tree.find(&self.base_url, name)
    }

    async fn tree(&self) -> Option<Arc<FileTree>> {
        let mut state = self.state.lock().await;
        let stale = state
            .attempted_at
            .map_or(true, |at| at.elapsed() > REFRESH_INTERVAL);

        if stale {
            state.attempted_at = Some(Instant::now());
            match self.download().await {
                Ok(tree) => {
                    debug!(dirs = tree.content.len(), "Avatar index refreshed");
                    state.tree = Some(Arc::new(tree));
                }
                Err(e) => warn!(error = %e, "Avatar index refresh failed"),
            }
        }

        state.tree.clone().filter(|t| !t.content.is_empty())
    }

    async fn download(&self) -> anyhow::Result<FileTree> {
        let url = self.base_url.join("Filetree.json")?;
        let json = self.fetcher.get_page(url.as_str(), None, None).await?;
        Ok(serde_json::from_str(&json)?)
    }
}
