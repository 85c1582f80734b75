//! Product image cache.
//!
//! Resolution order for a URL:
//! 1. in-memory map (lives as long as the [`ImageCache`])
//! 2. an in-flight load for the same URL, shared with the caller
//! 3. the persistent [`DiskImageStore`]
//! 4. a network fetch, written back to 3 and 1
//! 5. the raw URL, when anything above fails (never memoized)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use moka::future::Cache;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, instrument, warn};
use url::Url;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Errors while loading an image into the cache.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("image request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("image store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image response was empty")]
    EmptyBody,
}

/// Image bytes held by the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedImage {
    pub source_url: String,
    pub content_type: String,
    pub bytes: Arc<[u8]>,
    /// On-disk copy, when the persistent store holds one.
    pub path: Option<PathBuf>,
}

impl CachedImage {
    /// Locally resolvable URL: the on-disk file, or an inline data URI.
    #[must_use]
    pub fn local_url(&self) -> String {
        self.path
            .as_deref()
            .and_then(|path| Url::from_file_path(path).ok())
            .map_or_else(
                || format!("data:{};base64,{}", self.content_type, BASE64.encode(&self.bytes)),
                String::from,
            )
    }
}

/// Outcome of resolving an image URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Served from the cache.
    Cached(CachedImage),
    /// Caching failed; use the original URL directly.
    Remote(String),
    /// The input URL was blank.
    Empty,
}

impl ImageSource {
    /// URL to hand to whatever renders the image.
    #[must_use]
    pub fn url(&self) -> String {
        match self {
            Self::Cached(image) => image.local_url(),
            Self::Remote(url) => url.clone(),
            Self::Empty => String::new(),
        }
    }

    #[must_use]
    pub const fn is_cached(&self) -> bool {
        matches!(self, Self::Cached(_))
    }
}

// =============================================================================
// DiskImageStore
// =============================================================================

/// Persistent image store, one `<sha256>.bin` file (plus a `.type` sidecar
/// holding the content type) per source URL.
#[derive(Debug, Clone)]
pub struct DiskImageStore {
    dir: PathBuf,
}

impl DiskImageStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn paths(&self, url: &str) -> (PathBuf, PathBuf) {
        let digest = hex::encode(Sha256::digest(url.as_bytes()));
        (
            self.dir.join(format!("{digest}.bin")),
            self.dir.join(format!("{digest}.type")),
        )
    }

    /// Read a stored image, if present.
    ///
    /// # Errors
    ///
    /// Returns an error for I/O failures other than a missing entry.
    pub async fn get(&self, url: &str) -> Result<Option<CachedImage>, ImageError> {
        let (bytes_path, type_path) = self.paths(url);
        let bytes = match tokio::fs::read(&bytes_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let content_type = tokio::fs::read_to_string(&type_path)
            .await
            .unwrap_or_else(|_| DEFAULT_CONTENT_TYPE.to_string());

        Ok(Some(CachedImage {
            source_url: url.to_string(),
            content_type,
            bytes: bytes.into(),
            path: Some(bytes_path),
        }))
    }

    /// Persist an image and return the path it was written to.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or files cannot be written.
    pub async fn put(&self, url: &str, content_type: &str, bytes: &[u8]) -> Result<PathBuf, ImageError> {
        let (bytes_path, type_path) = self.paths(url);
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&type_path, content_type).await?;
        tokio::fs::write(&bytes_path, bytes).await?;
        Ok(bytes_path)
    }

    /// Remove every stored image.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be removed.
    pub async fn clear(&self) -> Result<(), ImageError> {
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// ImageCache
// =============================================================================

/// Memory + disk image cache with in-flight de-duplication.
///
/// Cheap to clone; clones share the memory map.
#[derive(Clone)]
pub struct ImageCache {
    memory: Cache<String, CachedImage>,
    store: Option<DiskImageStore>,
    client: reqwest::Client,
}

impl std::fmt::Debug for ImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageCache")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl ImageCache {
    /// Create a cache. Without a store, images are only held in memory.
    #[must_use]
    pub fn new(client: reqwest::Client, store: Option<DiskImageStore>) -> Self {
        Self {
            memory: Cache::builder().build(),
            store,
            client,
        }
    }

    /// Resolve an image URL to a cached copy, falling back to the raw URL.
    #[instrument(skip(self))]
    pub async fn resolve(&self, url: &str) -> ImageSource {
        let url = url.trim();
        if url.is_empty() {
            return ImageSource::Empty;
        }

        if let Some(image) = self.memory.get(url).await {
            debug!("image memory hit");
            return ImageSource::Cached(image);
        }

        // Concurrent callers for the same key await a single load; errors are
        // returned to every waiter and not inserted.
        match self
            .memory
            .try_get_with(url.to_string(), self.load(url))
            .await
        {
            Ok(image) => ImageSource::Cached(image),
            Err(e) => {
                debug!(error = %e, "image cache miss, using raw URL");
                ImageSource::Remote(url.to_string())
            }
        }
    }

    /// Warm the cache for a batch of URLs concurrently.
    ///
    /// Returns how many URLs ended up cached.
    pub async fn preload<I, S>(&self, urls: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tasks = JoinSet::new();
        for url in urls {
            let cache = self.clone();
            let url = url.into();
            tasks.spawn(async move { cache.resolve(&url).await.is_cached() });
        }

        let mut cached = 0;
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(true) => cached += 1,
                Ok(false) => {}
                Err(e) => warn!(error = %e, "image preload task failed"),
            }
        }
        cached
    }

    /// Whether the memory map currently holds `url`.
    pub async fn contains(&self, url: &str) -> bool {
        self.memory.get(url.trim()).await.is_some()
    }

    /// Drop the memory map (the persistent store is untouched).
    pub fn clear_memory(&self) {
        self.memory.invalidate_all();
    }

    async fn load(&self, url: &str) -> Result<CachedImage, ImageError> {
        if let Some(store) = &self.store {
            match store.get(url).await {
                Ok(Some(image)) => {
                    debug!("image disk hit");
                    return Ok(image);
                }
                Ok(None) => {}
                Err(e) => debug!(error = %e, "image store read failed"),
            }
        }

        let response = self.client.get(url).send().await?.error_for_status()?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(ImageError::EmptyBody);
        }

        let path = match &self.store {
            Some(store) => match store.put(url, &content_type, &bytes).await {
                Ok(path) => Some(path),
                Err(e) => {
                    debug!(error = %e, "image store write skipped");
                    None
                }
            },
            None => None,
        };

        Ok(CachedImage {
            source_url: url.to_string(),
            content_type,
            bytes: Arc::from(bytes.as_ref()),
            path,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use httpmock::MockServer;

    use super::*;

    fn cache_with_store(dir: &Path) -> ImageCache {
        ImageCache::new(reqwest::Client::new(), Some(DiskImageStore::new(dir)))
    }

    #[tokio::test]
    async fn test_blank_url_resolves_empty() {
        let cache = ImageCache::new(reqwest::Client::new(), None);
        assert_eq!(cache.resolve("   ").await, ImageSource::Empty);
        assert_eq!(cache.resolve("").await.url(), "");
    }

    #[tokio::test]
    async fn test_fetch_once_then_memory_hit() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method("GET").path("/img/tote.jpg");
            then.status(200)
                .header("content-type", "image/jpeg")
                .body("jpeg-bytes");
        });
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_with_store(dir.path());
        let url = server.url("/img/tote.jpg");

        let first = cache.resolve(&url).await;
        let second = cache.resolve(&url).await;

        mock.assert_calls(1);
        let ImageSource::Cached(image) = first else {
            panic!("expected cached image");
        };
        assert_eq!(image.content_type, "image/jpeg");
        assert_eq!(&*image.bytes, b"jpeg-bytes");
        assert!(image.local_url().starts_with("file://"));
        assert!(second.is_cached());
    }

    #[tokio::test]
    async fn test_concurrent_resolves_share_one_fetch() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method("GET").path("/img/a.png");
            then.status(200)
                .header("content-type", "image/png")
                .delay(std::time::Duration::from_millis(100))
                .body("png");
        });
        let cache = ImageCache::new(reqwest::Client::new(), None);
        let url = server.url("/img/a.png");

        let (a, b) = tokio::join!(cache.resolve(&url), cache.resolve(&url));

        mock.assert_calls(1);
        assert!(a.is_cached());
        assert_eq!(a, b);
        assert!(a.url().starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_raw_url_and_is_not_memoized() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method("GET").path("/img/missing.jpg");
            then.status(404);
        });
        let cache = ImageCache::new(reqwest::Client::new(), None);
        let url = server.url("/img/missing.jpg");

        assert_eq!(cache.resolve(&url).await, ImageSource::Remote(url.clone()));
        assert!(!cache.contains(&url).await);
        assert_eq!(cache.resolve(&url).await.url(), url);
        mock.assert_calls(2);
    }

    #[tokio::test]
    async fn test_disk_store_survives_new_cache() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method("GET").path("/img/b.webp");
            then.status(200)
                .header("content-type", "image/webp")
                .body("webp");
        });
        let dir = tempfile::tempdir().unwrap();
        let url = server.url("/img/b.webp");

        assert!(cache_with_store(dir.path()).resolve(&url).await.is_cached());
        let reopened = cache_with_store(dir.path());
        let ImageSource::Cached(image) = reopened.resolve(&url).await else {
            panic!("expected disk hit");
        };

        mock.assert_calls(1);
        assert_eq!(image.content_type, "image/webp");
    }

    #[tokio::test]
    async fn test_preload_counts_cached() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("GET").path("/ok.jpg");
            then.status(200).body("ok");
        });
        server.mock(|when, then| {
            when.method("GET").path("/bad.jpg");
            then.status(500);
        });
        let cache = ImageCache::new(reqwest::Client::new(), None);

        let cached = cache
            .preload([server.url("/ok.jpg"), server.url("/bad.jpg")])
            .await;
        assert_eq!(cached, 1);
        assert!(cache.contains(&server.url("/ok.jpg")).await);
    }
}
