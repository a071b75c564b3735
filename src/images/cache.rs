//! Content-addressed on-disk image cache.
//!
//! Entries live at `{dir}/{sha256(url)}` and are fresh for a fixed TTL
//! measured from the file's modification time. Writes go to a temporary file
//! first and are renamed into place, so readers never observe a partial
//! entry.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

const TMP_SUFFIX: &str = ".tmp";

/// Outcome of a cache sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub removed: usize,
    pub remaining_bytes: u64,
}

pub struct ImageCache {
    dir: PathBuf,
    ttl: Duration,
}

impl ImageCache {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Hex SHA-256 of the URL.
    pub fn key(url: &str) -> String {
        hex::encode(Sha256::digest(url.as_bytes()))
    }

    pub fn path_for(&self, url: &str) -> PathBuf {
        self.dir.join(Self::key(url))
    }

    /// Cached bytes for `url`, if present, non-empty and fresh.
    pub async fn get(&self, url: &str) -> Option<Bytes> {
        let path = self.path_for(url);
        let meta = tokio::fs::metadata(&path).await.ok()?;
        if !self.is_fresh(&meta) {
            debug!(url = %url, "Cached image expired");
            return None;
        }

        match tokio::fs::read(&path).await {
            Ok(data) if !data.is_empty() => Some(Bytes::from(data)),
            Ok(_) => {
                warn!(path = %path.display(), "Cached image is empty");
                None
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read cached image");
                None
            }
        }
    }

    /// Store bytes for `url`, replacing any previous entry.
    pub async fn put(&self, url: &str, data: &[u8]) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(url);
        let tmp = self
            .dir
            .join(format!("{}.{:016x}{TMP_SUFFIX}", Self::key(url), rand::random::<u64>()));

        if let Err(e) = tokio::fs::write(&tmp, data).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }
        Ok(())
    }

    fn is_fresh(&self, meta: &std::fs::Metadata) -> bool {
        let Ok(modified) = meta.modified() else {
            return false;
        };
        match SystemTime::now().duration_since(modified) {
            Ok(age) => age < self.ttl,
            // Modified in the future: clock skew, treat as just written.
            Err(_) => true,
        }
    }

    /// Remove expired entries and leftover temporary files, then evict the
    /// oldest entries until the cache fits in `max_bytes`. A `max_bytes` of
    /// zero disables the size bound.
    pub async fn sweep(&self, max_bytes: u64) -> io::Result<SweepStats> {
        let mut stats = SweepStats::default();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(stats),
            Err(e) => return Err(e),
        };

        let mut kept: Vec<(SystemTime, u64, PathBuf)> = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            let path = entry.path();
            let is_tmp = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(TMP_SUFFIX));

            if is_tmp || !self.is_fresh(&meta) {
                if tokio::fs::remove_file(&path).await.is_ok() {
                    stats.removed += 1;
                }
                continue;
            }
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            kept.push((modified, meta.len(), path));
        }

        stats.remaining_bytes = kept.iter().map(|(_, len, _)| len).sum();
        if max_bytes > 0 && stats.remaining_bytes > max_bytes {
            kept.sort_by_key(|(modified, _, _)| *modified);
            for (_, len, path) in kept {
                if stats.remaining_bytes <= max_bytes {
                    break;
                }
                if tokio::fs::remove_file(&path).await.is_ok() {
                    stats.removed += 1;
                    stats.remaining_bytes -= len;
                }
            }
        }

        Ok(stats)
    }
}

/// Sweep the cache every `interval` until the task is aborted.
pub fn spawn_sweeper(cache: Arc<ImageCache>, interval: Duration, max_bytes: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match cache.sweep(max_bytes).await {
                Ok(stats) if stats.removed > 0 => info!(
                    removed = stats.removed,
                    remaining_bytes = stats.remaining_bytes,
                    "Image cache swept"
                ),
                Ok(_) => {}
                Err(e) => warn!(dir = %cache.dir().display(), error = %e, "Image cache sweep failed"),
            }
        }
    })
}
