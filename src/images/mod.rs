//! Cat pictures for HTTP status codes
//!
//! Couples the provider download path with a process-wide cache so that
//! each status code is downloaded at most once per process lifetime.

/// Picture cache keyed by status code
pub mod cache;
/// Provider download client
pub mod fetch;

pub use cache::ImageStore;
pub use fetch::{CatFetcher, FetchError};

use bytes::Bytes;

/// A cat picture for one status code
///
/// `bytes` is cheaply cloneable shared memory; every reply built from it
/// reads the payload from the start, no matter how often the same cached
/// picture has been served before.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatImage {
    /// Status code the picture depicts
    pub code: u16,
    /// Raw image bytes as served by the provider
    pub bytes: Bytes,
}

impl CatImage {
    /// Upload file name shown to chat clients
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.jpg", self.code)
    }
}

/// Cache-backed access to provider pictures
///
/// Hits are served from memory, misses download once, and concurrent
/// queries for the same missing code share a single download. Failed
/// downloads are never cached, so the next query retries.
#[derive(Clone)]
pub struct ImageService {
    store: ImageStore,
    fetcher: CatFetcher,
}

impl ImageService {
    /// Creates a service downloading from `base_url`
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            store: ImageStore::new(),
            fetcher: CatFetcher::new(base_url),
        }
    }

    /// Returns the picture for `code`, downloading it on first use
    ///
    /// # Errors
    ///
    /// Propagates the underlying [`FetchError`]; failures are not cached.
    pub async fn get(&self, code: u16) -> Result<CatImage, FetchError> {
        let bytes = self.store.get_or_load(code, self.fetcher.fetch(code)).await?;
        Ok(CatImage { code, bytes })
    }

    /// Number of pictures currently cached
    #[must_use]
    pub fn cached_count(&self) -> u64 {
        self.store.entry_count()
    }
}
