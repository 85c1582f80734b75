//! Client-side pagination over the full set of active products.

use std::sync::atomic::{AtomicU64, Ordering};

use super::types::{ProductPage, ProductSummary};
use crate::api::Pagination;

/// Page size used when pulling the whole active catalog.
pub const FETCH_ALL_PER_PAGE: u32 = 100;

/// Slice `products` into the requested page.
///
/// `page` and `per_page` are clamped to at least 1, `page` to at most the
/// last page, and there is always at least one (possibly empty) page.
#[must_use]
pub fn paginate(products: &[ProductSummary], page: u32, per_page: u32) -> ProductPage {
    let per_page = per_page.max(1);
    let total_items = products.len();
    let total_pages = u32::try_from(total_items.div_ceil(per_page as usize))
        .unwrap_or(u32::MAX)
        .max(1);
    let current_page = page.clamp(1, total_pages);

    let start = (current_page as usize - 1) * per_page as usize;
    let end = (start + per_page as usize).min(total_items);
    let slice = products.get(start..end).unwrap_or_default();

    ProductPage {
        products: slice.to_vec(),
        pagination: Pagination {
            current_page,
            per_page,
            total_pages,
            total_items: total_items as u64,
        },
    }
}

/// Ticket for one listing load; see [`ProductListing::begin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestToken(u64);

/// Tracks which listing load is current so late responses can be dropped.
///
/// Every new load (filters changed, category switched) takes a fresh token.
/// A response is only applied if its token is still the latest one issued.
#[derive(Debug, Default)]
pub struct ProductListing {
    latest: AtomicU64,
}

impl ProductListing {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new load, invalidating every earlier token.
    pub fn begin(&self) -> RequestToken {
        RequestToken(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Whether `token` belongs to the most recent load.
    #[must_use]
    pub fn is_current(&self, token: RequestToken) -> bool {
        self.latest.load(Ordering::SeqCst) == token.0
    }

    /// Return `result` if `token` is still current, `None` if it went stale.
    pub fn accept<T>(&self, token: RequestToken, result: T) -> Option<T> {
        if self.is_current(token) {
            Some(result)
        } else {
            tracing::debug!(token = token.0, "discarding stale listing response");
            None
        }
    }
}
