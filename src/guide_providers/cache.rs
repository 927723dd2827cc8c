//! Snapshot cache shared by the guide backends
//!
//! Holds the last successfully fetched data plus the backend's refresh
//! state. Fetches run outside the data lock; only the final swap takes the
//! write lock. Refreshes are serialized by a separate mutex so two refreshes
//! of one backend never overlap.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::errors::AppResult;

/// Where a backend stands with respect to its source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderState {
    /// Never refreshed
    Uninitialized,
    /// Holding data from the most recent successful refresh
    Ready,
    /// The last refresh failed; any earlier data is still served
    Degraded,
}

struct CacheInner<T> {
    data: Option<Arc<T>>,
    state: ProviderState,
    last_error: Option<String>,
    refreshed_at: Option<DateTime<Utc>>,
}

pub struct GuideCache<T> {
    inner: RwLock<CacheInner<T>>,
    refresh_lock: Mutex<()>,
}

impl<T> Default for GuideCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> GuideCache<T> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(CacheInner {
                data: None,
                state: ProviderState::Uninitialized,
                last_error: None,
                refreshed_at: None,
            }),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Current data, stale or not
    pub async fn snapshot(&self) -> Option<Arc<T>> {
        self.inner.read().await.data.clone()
    }

    pub async fn state(&self) -> ProviderState {
        self.inner.read().await.state
    }

    /// Message of the most recent failed refresh, cleared on success
    pub async fn last_error(&self) -> Option<String> {
        self.inner.read().await.last_error.clone()
    }

    /// Time of the most recent successful refresh
    pub async fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.inner.read().await.refreshed_at
    }

    /// Always fetch, then swap in the result or record the failure
    pub async fn refresh_with<F, Fut>(&self, fetch: F) -> AppResult<Arc<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let _guard = self.refresh_lock.lock().await;
        self.fetch_and_store(fetch).await
    }

    /// Return the current data, fetching it first if there is none yet
    pub async fn get_or_load<F, Fut>(&self, fetch: F) -> AppResult<Arc<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        if let Some(data) = self.snapshot().await {
            return Ok(data);
        }

        let _guard = self.refresh_lock.lock().await;
        // Another task may have loaded while we waited for the lock
        if let Some(data) = self.snapshot().await {
            return Ok(data);
        }
        self.fetch_and_store(fetch).await
    }

    async fn fetch_and_store<F, Fut>(&self, fetch: F) -> AppResult<Arc<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        match fetch().await {
            Ok(data) => {
                let data = Arc::new(data);
                let mut inner = self.inner.write().await;
                inner.data = Some(Arc::clone(&data));
                inner.state = ProviderState::Ready;
                inner.last_error = None;
                inner.refreshed_at = Some(Utc::now());
                Ok(data)
            }
            Err(e) => {
                let mut inner = self.inner.write().await;
                inner.state = ProviderState::Degraded;
                inner.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_starts_uninitialized() {
        let cache: GuideCache<u32> = GuideCache::new();
        assert_eq!(cache.state().await, ProviderState::Uninitialized);
        assert!(cache.snapshot().await.is_none());
        assert!(cache.refreshed_at().await.is_none());
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_last_good_data() {
        let cache = GuideCache::new();
        cache.refresh_with(|| async { Ok(1u32) }).await.unwrap();
        assert_eq!(cache.state().await, ProviderState::Ready);

        let err = cache
            .refresh_with(|| async { Err::<u32, _>(AppError::source_error("boom")) })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("boom"));
        assert_eq!(cache.state().await, ProviderState::Degraded);
        assert_eq!(*cache.snapshot().await.unwrap(), 1);
        assert!(cache.last_error().await.unwrap().contains("boom"));

        tokio_test::assert_ok!(cache.refresh_with(|| async { Ok(2u32) }).await);
        assert_eq!(cache.state().await, ProviderState::Ready);
        assert_eq!(*cache.snapshot().await.unwrap(), 2);
        assert!(cache.last_error().await.is_none());
    }

    #[tokio::test]
    async fn test_get_or_load_fetches_once() {
        let cache = GuideCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_load(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7u32)
                })
                .await
                .unwrap();
            assert_eq!(*value, 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_lazy_loads_share_one_fetch() {
        let cache = Arc::new(GuideCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                tokio::spawn(async move {
                    cache
                        .get_or_load(|| async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                            Ok(String::from("guide"))
                        })
                        .await
                        .map(|v| v.len())
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), 5);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
