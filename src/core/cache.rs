use crate::domain::model::QueryKey;
use crate::utils::error::Result;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, RwLock};

/// Cached listing for one query key.
///
/// Entries are never patched in place: invalidation drops the value and the
/// next read fetches it again. Invalidating twice is the same as once.
/// A fetch that overlaps an invalidation returns its rows but does not
/// populate the cache.
pub struct QueryCache<T: Clone> {
    key: QueryKey,
    entry: RwLock<Option<Vec<T>>>,
    epoch: AtomicU64,
    signals: broadcast::Sender<QueryKey>,
}

impl<T: Clone> QueryCache<T> {
    pub fn new(key: QueryKey, signals: broadcast::Sender<QueryKey>) -> Self {
        Self {
            key,
            entry: RwLock::new(None),
            epoch: AtomicU64::new(0),
            signals,
        }
    }

    pub async fn get_or_fetch<F, Fut>(&self, fetch: F) -> Result<Vec<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>>>,
    {
        if let Some(cached) = self.entry.read().await.as_ref() {
            tracing::debug!("Serving {:?} from cache", self.key);
            return Ok(cached.clone());
        }

        let started = self.epoch.load(Ordering::Acquire);
        // 失敗的讀取不寫入快取
        let fresh = fetch().await?;

        let mut entry = self.entry.write().await;
        if self.epoch.load(Ordering::Acquire) == started {
            *entry = Some(fresh.clone());
        } else {
            tracing::debug!("Discarding stale {:?} fetch", self.key);
        }
        Ok(fresh)
    }

    pub async fn invalidate(&self) {
        let mut entry = self.entry.write().await;
        self.epoch.fetch_add(1, Ordering::AcqRel);
        entry.take();
        drop(entry);
        tracing::debug!("Invalidated {:?}", self.key);
        let _ = self.signals.send(self.key);
    }

    pub async fn is_warm(&self) -> bool {
        self.entry.read().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::ChefError;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    #[tokio::test]
    async fn test_second_read_is_served_from_cache() {
        let (tx, _) = broadcast::channel(4);
        let cache = QueryCache::new(QueryKey::Recipes, tx);
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let value = cache
                .get_or_fetch(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(vec!["a".to_string()])
                })
                .await
                .unwrap();
            assert_eq!(value, vec!["a"]);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch_and_signals() {
        let (tx, mut rx) = broadcast::channel(4);
        let cache = QueryCache::new(QueryKey::Ingredients, tx);

        cache.get_or_fetch(|| async { Ok(vec![1]) }).await.unwrap();
        assert!(cache.is_warm().await);

        cache.invalidate().await;
        cache.invalidate().await;
        assert!(!cache.is_warm().await);
        assert_eq!(rx.recv().await.unwrap(), QueryKey::Ingredients);

        let value = cache.get_or_fetch(|| async { Ok(vec![2]) }).await.unwrap();
        assert_eq!(value, vec![2]);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_cached() {
        let (tx, _) = broadcast::channel(4);
        let cache: QueryCache<i32> = QueryCache::new(QueryKey::Recipes, tx);

        let result = cache
            .get_or_fetch(|| async { Err(ChefError::Unauthenticated) })
            .await;
        assert!(result.is_err());
        assert!(!cache.is_warm().await);
    }

    #[tokio::test]
    async fn test_fetch_overlapping_invalidation_is_not_cached() {
        let (tx, _) = broadcast::channel(4);
        let cache = QueryCache::new(QueryKey::Recipes, tx);
        let release = Notify::new();

        let slow_read = cache.get_or_fetch(|| async {
            release.notified().await;
            Ok(Vec::<String>::new())
        });
        let write = async {
            tokio::task::yield_now().await;
            cache.invalidate().await;
            release.notify_one();
        };
        let (stale, _) = tokio::join!(slow_read, write);
        assert!(stale.unwrap().is_empty());
        assert!(!cache.is_warm().await);

        let fresh = cache
            .get_or_fetch(|| async { Ok(vec!["Saved".to_string()]) })
            .await
            .unwrap();
        assert_eq!(fresh, vec!["Saved"]);
    }
}
