//! Wire types for the marketplace REST API.
//!
//! These mirror the backend's JSON exactly (camelCase, numbers frequently
//! encoded as strings). Conversion into view models happens in
//! [`crate::catalog::conversions`] and [`crate::cart::conversions`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bazaar_core::{CartItemId, CategoryId, ProductId, VendorId};

// =============================================================================
// Envelopes
// =============================================================================

/// Pagination block returned with list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub per_page: u32,
    pub total_pages: u32,
    pub total_items: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            current_page: 1,
            per_page: 10,
            total_pages: 1,
            total_items: 0,
        }
    }
}

/// Paginated list response: `{ status, error, message, data: [...], pagination }`.
#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse<T> {
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub pagination: Pagination,
}

/// Single-object response: `{ status, error, message, data }`.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemResponse<T> {
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

/// Response body for endpoints whose `data` is irrelevant (mutations).
#[derive(Debug, Clone, Deserialize)]
pub struct AckResponse {
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub message: String,
}

// =============================================================================
// Products
// =============================================================================

/// Product as returned by `/product/items` and `/product/item-info/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiProductData {
    pub product_id: ProductId,
    #[serde(default)]
    pub product_name: String,
    #[serde(default = "default_category")]
    pub category_id: CategoryId,
    #[serde(default)]
    pub category_name: String,
    #[serde(default)]
    pub product_description: String,
    #[serde(default)]
    pub product_tags: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub unit_price: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub discount_type: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub discount_value: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub discount_price: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub stock: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub min_stock: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub is_active: String,
    #[serde(default)]
    pub store_name: String,
    /// URL-encoded JSON containing vendor logo URLs.
    #[serde(default)]
    pub vendor_logo: Option<String>,
    #[serde(default)]
    pub vendor_id: Option<VendorId>,
    #[serde(default)]
    pub is_subaccount_set: Option<bool>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

fn default_category() -> CategoryId {
    CategoryId::new("unknown")
}

impl ApiProductData {
    /// Whether the backend flags this product as listed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active.trim() == "1"
    }
}

/// Response of `/product/item-info/{id}`.
///
/// The backend answers `200` even for deleted products, with either a null
/// `data`, an empty `data` array, or a "No product found." message, so `data`
/// is kept raw until inspected.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductDetailResponse {
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl ProductDetailResponse {
    /// Whether this response describes a product that no longer exists.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        let message_says_missing = self.message.as_deref().is_some_and(|m| {
            let m = m.to_lowercase();
            m.contains("no product found") || m.contains("not found")
        });
        if message_says_missing {
            return true;
        }

        match &self.data {
            None | Some(serde_json::Value::Null) => true,
            Some(serde_json::Value::Array(items)) => items.is_empty(),
            Some(serde_json::Value::Object(map)) => !map.contains_key("productId"),
            Some(_) => false,
        }
    }

    /// Extract the product, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is present but malformed.
    pub fn into_product(self) -> Result<Option<ApiProductData>, serde_json::Error> {
        if self.is_missing() {
            return Ok(None);
        }
        match self.data {
            Some(serde_json::Value::Array(items)) => items
                .into_iter()
                .next()
                .map(serde_json::from_value)
                .transpose(),
            Some(value) => serde_json::from_value(value).map(Some),
            None => Ok(None),
        }
    }
}

/// Aggregate rating payload from `/product/ratings/{id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRatingData {
    #[serde(default, deserialize_with = "lenient::string")]
    pub total_rating: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub rating_count: String,
}

/// Rating attached to a delivered order line.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRating {
    #[serde(default, alias = "product_id")]
    pub product_id: Option<ProductId>,
    #[serde(default)]
    pub rating: Option<f64>,
}

// =============================================================================
// Categories
// =============================================================================

/// Category as returned by `/category/items`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCategoryData {
    pub category_id: CategoryId,
    #[serde(default)]
    pub category_name: String,
    #[serde(default)]
    pub parent_id: Option<CategoryId>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub level: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub product_count: Option<u64>,
}

// =============================================================================
// Cart
// =============================================================================

/// Vendor reference on a cart line: either a bare id or a detail object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApiVendor {
    Id(String),
    #[serde(rename_all = "camelCase")]
    Detail {
        vendor_id: String,
        #[serde(default)]
        store_name: String,
    },
}

impl ApiVendor {
    /// The vendor identifier.
    #[must_use]
    pub fn vendor_id(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Detail { vendor_id, .. } => vendor_id,
        }
    }

    /// Display name of the vendor's store.
    #[must_use]
    pub fn store_name(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Detail { store_name, .. } => store_name,
        }
    }
}

/// Server cart line.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCartItem {
    pub cart_item_id: CartItemId,
    pub product_id: ProductId,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub product_images: Vec<String>,
    #[serde(default)]
    pub price: Decimal,
    #[serde(deserialize_with = "lenient::u32")]
    pub quantity: u32,
    #[serde(default)]
    pub subtotal: Decimal,
    pub vendor: ApiVendor,
    #[serde(default)]
    pub added_at: Option<String>,
}

/// Server cart payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiCart {
    #[serde(default)]
    pub items: Vec<ApiCartItem>,
}

/// Body of `POST /cart/add`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCartItemRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Body of `PUT /cart/update`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartItemRequest {
    pub cart_item_id: CartItemId,
    pub quantity: u32,
}

/// Body of `DELETE /cart/remove`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveCartItemRequest {
    pub cart_item_id: CartItemId,
}

// =============================================================================
// Lenient scalars
// =============================================================================

/// Deserializers for fields the backend sends as either strings or numbers.
mod lenient {
    use serde::{Deserialize, Deserializer, de::Error};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Str(String),
        Int(i64),
        Float(f64),
        Bool(bool),
        Null,
    }

    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(match Scalar::deserialize(deserializer)? {
            Scalar::Str(s) => s,
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Bool(b) => if b { "1" } else { "0" }.to_string(),
            Scalar::Null => String::new(),
        })
    }

    pub fn u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        match Scalar::deserialize(deserializer)? {
            Scalar::Str(s) => s
                .trim()
                .parse::<u32>()
                .map_err(|e| D::Error::custom(format!("invalid quantity {s:?}: {e}"))),
            Scalar::Int(i) => u32::try_from(i).map_err(D::Error::custom),
            Scalar::Float(_) | Scalar::Bool(_) | Scalar::Null => {
                Err(D::Error::custom("expected an integer quantity"))
            }
        }
    }
}
