//! Session-scoped cache for listing, category and product-detail payloads.
//!
//! Entries carry the time they were written and are dropped on read once
//! `now - timestamp >= max_age`. Any storage failure (backend unavailable,
//! quota, corrupt JSON) degrades to "no cache" without surfacing an error.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use bazaar_core::ProductId;

use crate::catalog::{Category, Product, ProductPage};
use crate::storage::{KeyValueStore, load_json, save_json};

const PRODUCTS_KEY: &str = "bazaar-products-cache";
const CATEGORIES_KEY: &str = "bazaar-categories-cache";
const PRODUCT_DETAIL_KEY: &str = "bazaar-product-detail-cache";

/// Max age of cached product listings.
pub const PRODUCTS_MAX_AGE: Duration = Duration::from_secs(30 * 60);
/// Max age of the cached category tree.
pub const CATEGORIES_MAX_AGE: Duration = Duration::from_secs(30 * 60);
/// Max age of cached product detail payloads.
pub const PRODUCT_DETAIL_MAX_AGE: Duration = Duration::from_secs(10 * 60);

/// Default number of preload hints emitted.
pub const DEFAULT_PRELOAD_IMAGES: usize = 16;

/// A cached payload stamped with its write time (unix millis).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub data: T,
    pub timestamp: i64,
}

impl<T> CacheEntry<T> {
    /// Whether the entry is still younger than `max_age` at `now`.
    #[must_use]
    pub fn is_fresh(&self, now: i64, max_age: Duration) -> bool {
        let max_age = i64::try_from(max_age.as_millis()).unwrap_or(i64::MAX);
        now.saturating_sub(self.timestamp) < max_age
    }
}

type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Tab-scoped cache over a [`KeyValueStore`].
#[derive(Clone)]
pub struct SessionCache {
    store: Arc<dyn KeyValueStore>,
    clock: Clock,
}

impl std::fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCache").finish_non_exhaustive()
    }
}

impl SessionCache {
    /// Create a cache using the wall clock.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_clock(store, || Utc::now().timestamp_millis())
    }

    /// Create a cache with an explicit millisecond clock.
    #[must_use]
    pub fn with_clock(
        store: Arc<dyn KeyValueStore>,
        clock: impl Fn() -> i64 + Send + Sync + 'static,
    ) -> Self {
        Self {
            store,
            clock: Arc::new(clock),
        }
    }

    fn now(&self) -> i64 {
        (self.clock)()
    }

    fn available(&self) -> bool {
        let available = self.store.is_available();
        if !available {
            debug!("session storage unavailable, cache disabled");
        }
        available
    }

    /// Load a keyed bucket, keeping only fresh entries.
    fn load_bucket<T: DeserializeOwned>(
        &self,
        key: &str,
        max_age: Duration,
    ) -> HashMap<String, CacheEntry<T>> {
        if !self.available() {
            return HashMap::new();
        }
        let now = self.now();
        let mut bucket: HashMap<String, CacheEntry<T>> =
            load_json(self.store.as_ref(), key).unwrap_or_default();
        bucket.retain(|_, entry| entry.is_fresh(now, max_age));
        bucket
    }

    fn save_bucket<T: Serialize>(&self, key: &str, bucket: &HashMap<String, CacheEntry<T>>) {
        if self.available() {
            save_json(self.store.as_ref(), key, bucket);
        }
    }

    // =========================================================================
    // Product listings
    // =========================================================================

    /// All fresh cached listings keyed by query signature.
    #[must_use]
    pub fn load_products(&self) -> HashMap<String, CacheEntry<ProductPage>> {
        self.load_bucket(PRODUCTS_KEY, PRODUCTS_MAX_AGE)
    }

    /// Cached listing for a query signature.
    #[must_use]
    pub fn get_products(&self, cache_key: &str) -> Option<ProductPage> {
        let page = self.load_products().remove(cache_key).map(|e| e.data);
        if page.is_some() {
            debug!(cache_key, "session cache hit for product listing");
        }
        page
    }

    /// Store a listing under its query signature.
    pub fn save_products(&self, cache_key: &str, page: &ProductPage) {
        let mut bucket = self.load_products();
        bucket.insert(
            cache_key.to_string(),
            CacheEntry {
                data: page.clone(),
                timestamp: self.now(),
            },
        );
        self.save_bucket(PRODUCTS_KEY, &bucket);
    }

    // =========================================================================
    // Categories
    // =========================================================================

    /// Cached category tree, if fresh.
    #[must_use]
    pub fn load_categories(&self) -> Option<Vec<Category>> {
        if !self.available() {
            return None;
        }
        let entry: CacheEntry<Vec<Category>> = load_json(self.store.as_ref(), CATEGORIES_KEY)?;
        if entry.data.is_empty() || !entry.is_fresh(self.now(), CATEGORIES_MAX_AGE) {
            return None;
        }
        Some(entry.data)
    }

    /// Store the category tree.
    pub fn save_categories(&self, categories: &[Category]) {
        if !self.available() {
            return;
        }
        let entry = CacheEntry {
            data: categories,
            timestamp: self.now(),
        };
        save_json(self.store.as_ref(), CATEGORIES_KEY, &entry);
    }

    // =========================================================================
    // Product detail
    // =========================================================================

    /// Cached product detail, if fresh.
    #[must_use]
    pub fn get_product(&self, product_id: &ProductId) -> Option<Product> {
        self.load_bucket::<Product>(PRODUCT_DETAIL_KEY, PRODUCT_DETAIL_MAX_AGE)
            .remove(product_id.as_str())
            .map(|e| e.data)
    }

    /// Store a product detail payload.
    pub fn save_product(&self, product: &Product) {
        let mut bucket = self.load_bucket::<Product>(PRODUCT_DETAIL_KEY, PRODUCT_DETAIL_MAX_AGE);
        bucket.insert(
            product.id.to_string(),
            CacheEntry {
                data: product.clone(),
                timestamp: self.now(),
            },
        );
        self.save_bucket(PRODUCT_DETAIL_KEY, &bucket);
    }

    // =========================================================================
    // Image preloading
    // =========================================================================

    /// Distinct absolute main-image URLs from cached listings, at most `max_images`.
    #[must_use]
    pub fn preload_image_urls(&self, max_images: usize) -> Vec<String> {
        let mut urls: Vec<String> = Vec::new();
        if max_images == 0 {
            return urls;
        }
        let mut listings: Vec<_> = self.load_products().into_iter().collect();
        // Deterministic order: oldest signature first
        listings.sort_by(|(a_key, a), (b_key, b)| {
            a.timestamp.cmp(&b.timestamp).then_with(|| a_key.cmp(b_key))
        });

        for (_, entry) in listings {
            for product in entry.data.products {
                let url = product.main_image;
                if !url.starts_with("http") || urls.contains(&url) {
                    continue;
                }
                urls.push(url);
                if urls.len() >= max_images {
                    return urls;
                }
            }
        }
        urls
    }

    /// `<link rel="preload">` hints for [`Self::preload_image_urls`].
    #[must_use]
    pub fn preload_hints(&self, max_images: usize) -> Vec<String> {
        self.preload_image_urls(max_images)
            .iter()
            .map(|url| format!(r#"<link rel="preload" as="image" href="{}">"#, escape_attr(url)))
            .collect()
    }

    /// Drop every cached payload.
    pub fn clear(&self) {
        for key in [PRODUCTS_KEY, CATEGORIES_KEY, PRODUCT_DETAIL_KEY] {
            if let Err(e) = self.store.remove(key) {
                debug!(key, error = %e, "session cache clear skipped");
            }
        }
    }
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
