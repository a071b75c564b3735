//! Point-of-interest detection and its permanent store.

use std::sync::Arc;

use async_trait::async_trait;
use metaforge_db::pool::{get_conn, DbPool};
use metaforge_db::queries::points;
use tracing::{debug, warn};

use crate::locks::KeyedLocks;

/// Finds the horizontal center of the main subject in an image.
#[async_trait]
pub trait PointLocator: Send + Sync {
    /// The subject's x coordinate in pixels, or `None` if none was found.
    async fn locate(&self, image: &[u8]) -> Option<f64>;
}

/// Detected points keyed by source URL.
///
/// Detection results never expire; the same cover always has the same
/// subject. Concurrent requests for one URL share a single detection.
pub struct PointCache {
    locator: Option<Arc<dyn PointLocator>>,
    pool: DbPool,
    locks: Arc<KeyedLocks>,
}

impl PointCache {
    pub fn new(
        locator: Option<Arc<dyn PointLocator>>,
        pool: DbPool,
        locks: Arc<KeyedLocks>,
    ) -> Self {
        Self {
            locator,
            pool,
            locks,
        }
    }

    pub async fn point_for(&self, url: &str, image: &[u8]) -> Option<f64> {
        let _guard = self.locks.lock(&format!("poi:{url}")).await;

        if let Some(x) = self.stored(url) {
            debug!(url = %url, x, "Point of interest served from store");
            return Some(x);
        }

        let locator = self.locator.as_ref()?;
        let x = locator.locate(image).await.filter(|x| *x > 0.0)?;

        match get_conn(&self.pool) {
            Ok(conn) => {
                if let Err(e) = points::upsert_point(&conn, url, x) {
                    warn!(url = %url, error = %e, "Failed to store point of interest");
                }
            }
            Err(e) => warn!(error = %e, "No database connection for point store"),
        }
        Some(x)
    }

    fn stored(&self, url: &str) -> Option<f64> {
        let conn = get_conn(&self.pool).ok()?;
        match points::get_point(&conn, url) {
            Ok(point) => point.map(|p| p.x),
            Err(e) => {
                warn!(url = %url, error = %e, "Point store lookup failed");
                None
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FixedLocator;
    use super::*;
    use metaforge_db::pool::init_memory_pool;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    const URL: &str = "https://pics.example.com/cover/abc_b.jpg";

    #[tokio::test]
    async fn test_detection_is_stored() {
        let pool = init_memory_pool().unwrap();
        let locator = Arc::new(FixedLocator::new(Some(420.0)));
        let cache = PointCache::new(Some(locator.clone()), pool.clone(), Arc::new(KeyedLocks::new()));

        assert_eq!(cache.point_for(URL, b"img").await, Some(420.0));
        assert_eq!(cache.point_for(URL, b"img").await, Some(420.0));
        assert_eq!(locator.calls.load(Ordering::SeqCst), 1);

        let conn = pool.get().unwrap();
        assert_eq!(points::get_point(&conn, URL).unwrap().unwrap().x, 420.0);
    }

    #[tokio::test]
    async fn test_misses_are_not_stored() {
        let pool = init_memory_pool().unwrap();
        let locator = Arc::new(FixedLocator::new(None));
        let cache = PointCache::new(Some(locator.clone()), pool, Arc::new(KeyedLocks::new()));

        assert_eq!(cache.point_for(URL, b"img").await, None);
        assert_eq!(cache.point_for(URL, b"img").await, None);
        assert_eq!(locator.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_store_used_without_locator() {
        let pool = init_memory_pool().unwrap();
        points::upsert_point(&pool.get().unwrap(), URL, 99.0).unwrap();

        let cache = PointCache::new(None, pool, Arc::new(KeyedLocks::new()));
        assert_eq!(cache.point_for(URL, b"img").await, Some(99.0));
        assert_eq!(cache.point_for("https://other/cover/x.jpg", b"img").await, None);
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_detection() {
        let pool = init_memory_pool().unwrap();
        let locator = Arc::new(FixedLocator::slow(Some(300.0), Duration::from_millis(100)));
        let locks = Arc::new(KeyedLocks::new());
        let cache = PointCache::new(Some(locator.clone()), pool, locks.clone());

        let (a, b) = tokio::join!(cache.point_for(URL, b"img"), cache.point_for(URL, b"img"));
        assert_eq!((a, b), (Some(300.0), Some(300.0)));
        assert_eq!(locator.calls.load(Ordering::SeqCst), 1);

        // Guards are released once both callers return.
        assert_eq!(locks.prune(), 1);
    }
}
