//! Process-wide picture cache
//!
//! Every status code is downloaded at most once per process lifetime.
//! Entries never expire and are never evicted; the full provider catalogue
//! is a few dozen small JPEGs, so an unbounded cache stays tiny.

use crate::images::fetch::FetchError;
use bytes::Bytes;
use moka::future::Cache;
use std::future::Future;

/// Cache of downloaded pictures keyed by status code
///
/// Concurrent lookups of the same missing code share a single download,
/// and a failed download leaves no entry behind, so the next lookup
/// retries from scratch.
#[derive(Clone)]
pub struct ImageStore {
    /// Moka cache storing code -> picture bytes, unbounded and without TTL
    cache: Cache<u16, Bytes>,
}

impl ImageStore {
    /// Creates an empty store
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: Cache::builder().build(),
        }
    }

    /// Returns the cached picture for `code`, running `load` on a miss
    ///
    /// `load` is awaited at most once per code across all concurrent
    /// callers; everyone waiting on the same code receives the same
    /// result.
    ///
    /// # Errors
    ///
    /// Hands back the `load` failure without caching it.
    pub async fn get_or_load<F>(&self, code: u16, load: F) -> Result<Bytes, FetchError>
    where
        F: Future<Output = Result<Bytes, FetchError>>,
    {
        self.cache
            .try_get_with(code, load)
            .await
            .map_err(|e| (*e).clone())
    }

    /// Returns the cached picture for `code` without loading anything
    pub async fn peek(&self, code: u16) -> Option<Bytes> {
        self.cache.get(&code).await
    }

    /// Returns the current number of cached pictures
    ///
    /// Useful for monitoring and health checks.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for ImageStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn counting_load(
        calls: &Arc<AtomicUsize>,
        outcome: Result<&'static [u8], FetchError>,
    ) -> impl Future<Output = Result<Bytes, FetchError>> {
        let calls = Arc::clone(calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            outcome.map(Bytes::from_static)
        }
    }

    #[tokio::test]
    async fn test_second_lookup_skips_loader() -> Result<()> {
        let store = ImageStore::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let first = store.get_or_load(200, counting_load(&calls, Ok(b"cat"))).await?;
        let second = store.get_or_load(200, counting_load(&calls, Ok(b"dog"))).await?;

        // The second loader never ran, so both lookups see the first bytes
        assert_eq!(first, second);
        assert_eq!(first, Bytes::from_static(b"cat"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_load_is_not_cached() -> Result<()> {
        let store = ImageStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let boom = FetchError::Network("connection reset".to_string());

        let first = store.get_or_load(418, counting_load(&calls, Err(boom.clone()))).await;
        assert_eq!(first, Err(boom));

        // Manually run pending tasks to update the entry count
        store.cache.run_pending_tasks().await;
        assert_eq!(store.entry_count(), 0);

        // The next lookup retries and can succeed
        let second = store.get_or_load(418, counting_load(&calls, Ok(b"teapot"))).await?;
        assert_eq!(second, Bytes::from_static(b"teapot"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_lookups_share_one_download() -> Result<()> {
        let store = ImageStore::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let slow_load = |calls: Arc<AtomicUsize>| async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, FetchError>(Bytes::from_static(b"cat"))
        };

        let (a, b) = tokio::join!(
            store.get_or_load(503, slow_load(Arc::clone(&calls))),
            store.get_or_load(503, slow_load(Arc::clone(&calls))),
        );

        assert_eq!(a?, b?);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_codes_are_cached_independently() -> Result<()> {
        let store = ImageStore::new();
        let calls = Arc::new(AtomicUsize::new(0));

        store.get_or_load(200, counting_load(&calls, Ok(b"ok"))).await?;
        store.get_or_load(404, counting_load(&calls, Ok(b"lost"))).await?;

        // Manually run pending tasks to update the entry count
        store.cache.run_pending_tasks().await;
        assert_eq!(store.entry_count(), 2);
        assert_eq!(store.peek(200).await, Some(Bytes::from_static(b"ok")));
        assert_eq!(store.peek(404).await, Some(Bytes::from_static(b"lost")));
        assert_eq!(store.peek(500).await, None);
        Ok(())
    }
}
