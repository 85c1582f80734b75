//! Client-side caches.
//!
//! - [`ImageCache`] - product images, memory + disk, with in-flight sharing
//! - [`SessionCache`] - listings, categories and product detail with max-age eviction

pub mod image;
pub mod session;

pub use image::{CachedImage, DiskImageStore, ImageCache, ImageError, ImageSource};
pub use session::{CacheEntry, DEFAULT_PRELOAD_IMAGES, SessionCache};
