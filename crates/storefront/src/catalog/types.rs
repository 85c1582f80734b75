//! Catalog view models.
//!
//! These are denormalized read models built from the backend DTOs in
//! [`crate::api::types`]. They are never patched in place: a refetch replaces
//! them wholesale.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bazaar_core::{CategoryId, CurrencyCode, InventoryStatus, Price, ProductId, ProductStatus};

use crate::api::Pagination;

// =============================================================================
// Price Types
// =============================================================================

/// Active discount on a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discount {
    /// Whole-number percentage off the original price.
    pub percentage: u32,
    /// Absolute amount off.
    pub amount: Decimal,
}

/// Selling price, with the pre-discount price when discounted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceWithDiscount {
    pub current: Decimal,
    pub original: Option<Decimal>,
    pub currency_code: CurrencyCode,
    pub discount: Option<Discount>,
}

impl PriceWithDiscount {
    /// A plain, undiscounted price.
    #[must_use]
    pub fn regular(amount: Decimal) -> Self {
        Self {
            current: amount,
            original: None,
            currency_code: CurrencyCode::default(),
            discount: None,
        }
    }

    /// The price the buyer pays.
    #[must_use]
    pub const fn current_price(&self) -> Price {
        Price::new(self.current, self.currency_code)
    }

    /// Whether this price should carry a deal badge.
    #[must_use]
    pub fn is_deal(&self) -> bool {
        let has_badge = self.discount.as_ref().is_some_and(|d| d.percentage > 0);
        let reduced = self.original.is_some_and(|original| self.current < original);
        has_badge || reduced
    }
}

// =============================================================================
// Product Types
// =============================================================================

/// Stock information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub in_stock: bool,
    pub quantity: Option<i64>,
    pub status: InventoryStatus,
    pub low_stock_threshold: Option<i64>,
    pub track_quantity: bool,
}

/// Product images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductMedia {
    pub main: String,
    pub gallery: Vec<String>,
    pub alt: String,
}

/// Aggregate review score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProductReviews {
    pub average: f64,
    pub total: u64,
}

/// Merchandising flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProductFlags {
    pub featured: bool,
    pub new_arrival: bool,
    pub bestseller: bool,
}

/// Return policy shown on the product page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnPolicy {
    pub returnable: bool,
    pub period_days: u32,
    pub free: bool,
}

impl Default for ReturnPolicy {
    fn default() -> Self {
        Self {
            returnable: true,
            period_days: 30,
            free: false,
        }
    }
}

/// Full product detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub sku: String,
    pub name: String,
    pub slug: String,
    pub category_id: CategoryId,
    pub category_name: String,
    pub tags: Vec<String>,
    pub description: String,
    pub short_description: String,
    pub price: PriceWithDiscount,
    pub inventory: Inventory,
    pub images: ProductMedia,
    /// `None` until the ratings endpoint supplies data.
    pub reviews: Option<ProductReviews>,
    pub seller_id: String,
    pub store_name: String,
    pub estimated_delivery: String,
    pub returns: ReturnPolicy,
    pub status: ProductStatus,
    pub flags: ProductFlags,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Listing-sized product record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub sku: String,
    pub name: String,
    pub slug: String,
    pub category_id: CategoryId,
    pub price: PriceWithDiscount,
    pub inventory_status: InventoryStatus,
    pub in_stock: bool,
    pub main_image: String,
    pub image_alt: String,
    pub reviews: Option<ProductReviews>,
    pub flags: ProductFlags,
    pub store_name: String,
}

/// One page of product summaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPage {
    pub products: Vec<ProductSummary>,
    pub pagination: Pagination,
}

impl ProductPage {
    #[must_use]
    pub fn empty(per_page: u32) -> Self {
        Self {
            products: Vec::new(),
            pagination: Pagination {
                per_page,
                ..Pagination::default()
            },
        }
    }

    /// Whether more pages follow this one.
    #[must_use]
    pub const fn has_more(&self) -> bool {
        self.pagination.current_page < self.pagination.total_pages
    }
}

// =============================================================================
// Category Types
// =============================================================================

/// Category node. Top-level categories have `level == 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub level: u8,
    pub parent_id: Option<CategoryId>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub product_count: Option<u64>,
}

/// Category list with navigation helpers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTree {
    pub categories: Vec<Category>,
}

impl CategoryTree {
    #[must_use]
    pub const fn new(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    /// Top-level categories.
    pub fn main_categories(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter().filter(|c| c.level == 1)
    }

    /// Direct children of `parent_id`.
    pub fn subcategories<'a>(&'a self, parent_id: &'a str) -> impl Iterator<Item = &'a Category> {
        self.categories
            .iter()
            .filter(move |c| c.parent_id.as_ref().is_some_and(|p| p.as_str() == parent_id))
    }

    /// Children of the static services root.
    pub fn services_subcategories(&self) -> impl Iterator<Item = &Category> {
        self.subcategories(super::services::SERVICES_ROOT_ID)
    }

    /// Look a category up by id or slug.
    #[must_use]
    pub fn find(&self, id_or_slug: &str) -> Option<&Category> {
        self.categories
            .iter()
            .find(|c| c.id.as_str() == id_or_slug || c.slug == id_or_slug)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}
