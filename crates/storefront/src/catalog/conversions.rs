//! DTO to view-model conversion functions.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use bazaar_core::{CurrencyCode, InventoryStatus, ProductStatus};

use super::types::{
    Category, Discount, Inventory, PriceWithDiscount, Product, ProductFlags, ProductMedia,
    ProductReviews, ProductSummary, ReturnPolicy,
};
use crate::api::types::{ApiCategoryData, ApiProductData, ApiRatingData};

/// Image shown when a product has none.
pub const PLACEHOLDER_IMAGE: &str = "/placeholder-product.jpg";

const SHORT_DESCRIPTION_CHARS: usize = 150;
const NEW_ARRIVAL_DAYS: i64 = 30;
const DEFAULT_DELIVERY_ESTIMATE: &str = "3-5 business days";

// =============================================================================
// Scalar helpers
// =============================================================================

fn parse_decimal(raw: &str) -> Decimal {
    raw.trim().parse().unwrap_or(Decimal::ZERO)
}

/// Parse a leading integer the way a lenient form parser would ("12 pcs" is 12).
fn parse_int(raw: &str) -> i64 {
    let trimmed = raw.trim();
    let end = trimmed
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && c == '-')))
        .map_or(trimmed.len(), |(i, _)| i);
    trimmed.get(..end).and_then(|s| s.parse().ok()).unwrap_or(0)
}

/// Parse backend timestamps: RFC 3339 or `YYYY-MM-DD HH:MM:SS` (UTC).
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// Lowercase, hyphen-separated slug from a product or category name.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    slug
}

fn discount_percentage(unit_price: Decimal, discount_price: Decimal) -> u32 {
    if unit_price <= Decimal::ZERO || discount_price >= unit_price {
        return 0;
    }
    // Halves round up: 12.5 % shows as 13 %
    ((unit_price - discount_price) / unit_price * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u32()
        .unwrap_or(0)
}

fn short_description(description: &str) -> String {
    let truncated: String = description.chars().take(SHORT_DESCRIPTION_CHARS).collect();
    format!("{truncated}...")
}

// =============================================================================
// Product conversions
// =============================================================================

/// Price block: discounted only when `discountValue > 0` and the discount
/// price undercuts the unit price.
fn convert_price(dto: &ApiProductData) -> PriceWithDiscount {
    let unit_price = parse_decimal(&dto.unit_price);
    let discount_value = parse_decimal(&dto.discount_value);
    let discount_price = parse_decimal(&dto.discount_price);

    let has_discount = discount_value > Decimal::ZERO && discount_price < unit_price;
    if !has_discount {
        return PriceWithDiscount::regular(unit_price);
    }

    PriceWithDiscount {
        current: discount_price,
        original: Some(unit_price),
        currency_code: CurrencyCode::NGN,
        discount: Some(Discount {
            percentage: discount_percentage(unit_price, discount_price),
            amount: unit_price - discount_price,
        }),
    }
}

fn convert_inventory(dto: &ApiProductData) -> Inventory {
    let stock = parse_int(&dto.stock);
    let min_stock = parse_int(&dto.min_stock);
    Inventory {
        in_stock: stock > 0,
        quantity: Some(stock),
        status: InventoryStatus::classify(stock, min_stock),
        low_stock_threshold: Some(min_stock),
        track_quantity: true,
    }
}

fn main_image(dto: &ApiProductData) -> String {
    dto.images
        .first()
        .filter(|url| !url.trim().is_empty())
        .cloned()
        .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string())
}

fn convert_flags(dto: &ApiProductData, now: DateTime<Utc>) -> ProductFlags {
    let new_arrival = parse_timestamp(&dto.created_at)
        .is_some_and(|created| created > now - Duration::days(NEW_ARRIVAL_DAYS));
    ProductFlags {
        featured: false,
        new_arrival,
        bestseller: false,
    }
}

/// Convert a backend product into the detail view model.
///
/// `now` anchors the new-arrival window.
#[must_use]
pub fn convert_product(dto: ApiProductData, now: DateTime<Utc>) -> Product {
    let price = convert_price(&dto);
    let inventory = convert_inventory(&dto);
    let flags = convert_flags(&dto, now);
    let images = ProductMedia {
        main: main_image(&dto),
        gallery: dto.images.clone(),
        alt: dto.product_name.clone(),
    };
    let seller_id = if dto.store_name.is_empty() {
        "api-seller".to_string()
    } else {
        dto.store_name.clone()
    };

    Product {
        sku: dto.product_id.to_string(),
        slug: slugify(&dto.product_name),
        short_description: short_description(&dto.product_description),
        status: ProductStatus::from_flag(&dto.is_active),
        created_at: parse_timestamp(&dto.created_at),
        updated_at: parse_timestamp(&dto.updated_at),
        id: dto.product_id,
        name: dto.product_name,
        category_id: dto.category_id,
        category_name: dto.category_name,
        tags: dto.product_tags,
        description: dto.product_description,
        price,
        inventory,
        images,
        reviews: None,
        seller_id,
        store_name: dto.store_name,
        estimated_delivery: DEFAULT_DELIVERY_ESTIMATE.to_string(),
        returns: ReturnPolicy::default(),
        flags,
    }
}

/// Convert a backend product into the listing view model.
#[must_use]
pub fn convert_product_summary(dto: ApiProductData, now: DateTime<Utc>) -> ProductSummary {
    let price = convert_price(&dto);
    let inventory = convert_inventory(&dto);
    let flags = convert_flags(&dto, now);
    let main_image = main_image(&dto);

    ProductSummary {
        sku: dto.product_id.to_string(),
        slug: slugify(&dto.product_name),
        id: dto.product_id,
        image_alt: dto.product_name.clone(),
        name: dto.product_name,
        category_id: dto.category_id,
        price,
        inventory_status: inventory.status,
        in_stock: inventory.in_stock,
        main_image,
        reviews: None,
        flags,
        store_name: dto.store_name,
    }
}

/// Convert a list of backend products into listing view models.
#[must_use]
pub fn convert_product_summaries(dtos: Vec<ApiProductData>, now: DateTime<Utc>) -> Vec<ProductSummary> {
    dtos.into_iter()
        .map(|dto| convert_product_summary(dto, now))
        .collect()
}

/// Convert the ratings payload; only meaningful when at least one rating exists.
#[must_use]
pub fn convert_rating(dto: &ApiRatingData) -> Option<ProductReviews> {
    let average: f64 = dto.total_rating.trim().parse().ok()?;
    let total: u64 = dto.rating_count.trim().parse().ok()?;
    if total == 0 || !average.is_finite() {
        return None;
    }
    Some(ProductReviews { average, total })
}

// =============================================================================
// Category conversions
// =============================================================================

/// Convert a backend category. Root markers (`""`, `"0"`) mean no parent.
#[must_use]
pub fn convert_category(dto: ApiCategoryData) -> Category {
    let parent_id = dto
        .parent_id
        .filter(|p| !p.is_empty() && p.as_str() != "0");
    let level = dto
        .level
        .trim()
        .parse::<u8>()
        .ok()
        .filter(|l| *l > 0)
        .unwrap_or(if parent_id.is_some() { 2 } else { 1 });

    Category {
        slug: slugify(&dto.category_name),
        id: dto.category_id,
        name: dto.category_name,
        level,
        parent_id,
        description: dto.description,
        image: dto.image,
        product_count: dto.product_count,
    }
}

/// Convert a list of backend categories.
#[must_use]
pub fn convert_categories(dtos: Vec<ApiCategoryData>) -> Vec<Category> {
    dtos.into_iter().map(convert_category).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn product(overrides: serde_json::Value) -> ApiProductData {
        let mut base = json!({
            "productId": "p1",
            "productName": "Hand-woven Aso Oke Fabric!",
            "categoryId": "c1",
            "categoryName": "Fabrics",
            "productDescription": "Traditional fabric",
            "productTags": ["fabric"],
            "unitPrice": "20000",
            "discountType": "percentage",
            "discountValue": "0",
            "discountPrice": "20000",
            "stock": "10",
            "minStock": "3",
            "images": ["https://cdn.example.com/aso.jpg"],
            "isActive": "1",
            "storeName": "Ilorin Weavers",
            "createdAt": "2024-03-01T00:00:00Z",
            "updatedAt": "2024-03-02 08:30:00"
        });
        if let (Some(base), Some(overrides)) = (base.as_object_mut(), overrides.as_object()) {
            for (k, v) in overrides {
                base.insert(k.clone(), v.clone());
            }
        }
        serde_json::from_value(base).unwrap()
    }

    fn now() -> DateTime<Utc> {
        parse_timestamp("2024-03-15T00:00:00Z").unwrap()
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hand-woven Aso Oke Fabric!"), "hand-woven-aso-oke-fabric");
        assert_eq!(slugify("  --Shoes & Bags-- "), "shoes-bags");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn test_no_discount_when_value_zero() {
        let p = convert_product(product(json!({"discountPrice": "15000"})), now());
        assert_eq!(p.price.current, Decimal::new(20000, 0));
        assert!(p.price.original.is_none());
        assert!(p.price.discount.is_none());
        assert!(!p.price.is_deal());
    }

    #[test]
    fn test_discount_applied() {
        let p = convert_product(
            product(json!({"discountValue": "25", "discountPrice": "15000"})),
            now(),
        );
        assert_eq!(p.price.current, Decimal::new(15000, 0));
        assert_eq!(p.price.original, Some(Decimal::new(20000, 0)));
        let discount = p.price.discount.clone().unwrap();
        assert_eq!(discount.percentage, 25);
        assert_eq!(discount.amount, Decimal::new(5000, 0));
        assert!(p.price.is_deal());
    }

    #[test]
    fn test_discount_percentage_rounds_halves_up() {
        assert_eq!(discount_percentage(Decimal::new(800, 0), Decimal::new(700, 0)), 13);
        assert_eq!(discount_percentage(Decimal::new(400, 0), Decimal::new(390, 0)), 3);
        assert_eq!(discount_percentage(Decimal::new(300, 0), Decimal::new(200, 0)), 33);

        let p = convert_product(
            product(json!({"discountValue": "12.5", "discountPrice": "17500"})),
            now(),
        );
        assert_eq!(p.price.discount.unwrap().percentage, 13);
    }

    #[test]
    fn test_discount_ignored_when_not_cheaper() {
        let p = convert_product(
            product(json!({"discountValue": "10", "discountPrice": "25000"})),
            now(),
        );
        assert_eq!(p.price.current, Decimal::new(20000, 0));
        assert!(p.price.discount.is_none());
    }

    #[test]
    fn test_inventory_status_thresholds() {
        let limited = convert_product_summary(product(json!({"stock": "3"})), now());
        assert_eq!(limited.inventory_status, InventoryStatus::LimitedStock);
        assert!(limited.in_stock);

        let out = convert_product_summary(product(json!({"stock": "0"})), now());
        assert_eq!(out.inventory_status, InventoryStatus::OutOfStock);
        assert!(!out.in_stock);

        let garbage = convert_product_summary(product(json!({"stock": "n/a"})), now());
        assert_eq!(garbage.inventory_status, InventoryStatus::OutOfStock);
    }

    #[test]
    fn test_new_arrival_window_and_timestamps() {
        let p = convert_product(product(json!({})), now());
        assert!(p.flags.new_arrival);
        assert!(p.updated_at.is_some());

        let old = convert_product(product(json!({"createdAt": "2023-01-01T00:00:00Z"})), now());
        assert!(!old.flags.new_arrival);
    }

    #[test]
    fn test_reviews_never_fabricated() {
        let p = convert_product(product(json!({})), now());
        assert!(p.reviews.is_none());
    }

    #[test]
    fn test_placeholder_image_and_short_description() {
        let p = convert_product(product(json!({"images": []})), now());
        assert_eq!(p.images.main, PLACEHOLDER_IMAGE);
        assert_eq!(p.short_description, "Traditional fabric...");
        assert_eq!(p.status, ProductStatus::Active);
    }

    #[test]
    fn test_convert_rating_requires_count() {
        let rated = ApiRatingData {
            total_rating: "4.5".to_string(),
            rating_count: "12".to_string(),
        };
        assert_eq!(
            convert_rating(&rated),
            Some(ProductReviews {
                average: 4.5,
                total: 12
            })
        );

        let unrated = ApiRatingData {
            total_rating: "0".to_string(),
            rating_count: "0".to_string(),
        };
        assert_eq!(convert_rating(&unrated), None);
    }

    #[test]
    fn test_convert_category_levels() {
        let root: ApiCategoryData = serde_json::from_value(
            json!({"categoryId": "c1", "categoryName": "Home & Living", "parentId": "0"}),
        )
        .unwrap();
        let root = convert_category(root);
        assert_eq!(root.level, 1);
        assert_eq!(root.parent_id, None);
        assert_eq!(root.slug, "home-living");

        let child: ApiCategoryData = serde_json::from_value(
            json!({"categoryId": "c2", "categoryName": "Kitchen", "parentId": "c1"}),
        )
        .unwrap();
        assert_eq!(convert_category(child).level, 2);
    }
}
