//! Per-product rating aggregates built from order ratings.

use std::collections::HashMap;

use bazaar_core::ProductId;

use super::types::ProductReviews;
use crate::api::types::OrderRating;

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    sum: f64,
    count: u64,
}

/// Running sum and count of buyer ratings per product.
#[derive(Debug, Clone, Default)]
pub struct RatingsBook {
    by_product: HashMap<ProductId, Tally>,
}

impl RatingsBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold order ratings in. Entries without a product id or rating are skipped.
    pub fn record_order_ratings(&mut self, ratings: &[OrderRating]) {
        for rating in ratings {
            let (Some(product_id), Some(value)) = (&rating.product_id, rating.rating) else {
                continue;
            };
            if product_id.is_empty() || !value.is_finite() {
                continue;
            }
            let tally = self.by_product.entry(product_id.clone()).or_default();
            tally.sum += value;
            tally.count += 1;
        }
    }

    /// Average (one decimal place) and count for a product, if rated.
    #[must_use]
    pub fn rating(&self, product_id: &ProductId) -> Option<ProductReviews> {
        let tally = self.by_product.get(product_id)?;
        if tally.count == 0 {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let average = tally.sum / tally.count as f64;
        Some(ProductReviews {
            average: (average * 10.0).round() / 10.0,
            total: tally.count,
        })
    }
}
