//! Server cart line conversion.

use bazaar_core::{CategoryId, InventoryStatus, ProductStatus, VendorId};

use super::CartItem;
use crate::api::ApiCartItem;
use crate::catalog::conversions::{PLACEHOLDER_IMAGE, parse_timestamp};
use crate::catalog::{
    Inventory, PriceWithDiscount, Product, ProductFlags, ProductMedia, ReturnPolicy,
};

/// Convert a server cart line, using `product` when the lookup returned one.
pub(crate) fn convert_cart_item(line: ApiCartItem, product: Option<Product>) -> CartItem {
    let vendor_id = line.vendor.vendor_id().to_string();
    let product = product.unwrap_or_else(|| fallback_product(&line));

    CartItem {
        id: line.product_id,
        product,
        quantity: line.quantity,
        cart_item_id: Some(line.cart_item_id),
        vendor: Some(VendorId::new(vendor_id)),
        price: Some(line.price),
        subtotal: Some(line.subtotal),
        added_at: line.added_at,
        product_images: line.product_images,
    }
}

/// Minimal product built from the cart line alone.
fn fallback_product(line: &ApiCartItem) -> Product {
    let added_at = line.added_at.as_deref().and_then(parse_timestamp);
    Product {
        id: line.product_id.clone(),
        sku: line.product_id.to_string(),
        name: line.product_name.clone(),
        slug: line.product_id.to_string(),
        category_id: CategoryId::new("unknown"),
        category_name: String::new(),
        tags: Vec::new(),
        description: String::new(),
        short_description: String::new(),
        price: PriceWithDiscount::regular(line.price),
        inventory: Inventory {
            in_stock: true,
            quantity: None,
            status: InventoryStatus::InStock,
            low_stock_threshold: None,
            track_quantity: false,
        },
        images: ProductMedia {
            main: line
                .product_images
                .first()
                .cloned()
                .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string()),
            gallery: line.product_images.clone(),
            alt: line.product_name.clone(),
        },
        reviews: None,
        seller_id: line.vendor.vendor_id().to_string(),
        store_name: line.vendor.store_name().to_string(),
        estimated_delivery: String::new(),
        returns: ReturnPolicy::default(),
        status: ProductStatus::Active,
        flags: ProductFlags::default(),
        created_at: added_at,
        updated_at: added_at,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_fallback_product_from_line() {
        let line: ApiCartItem = serde_json::from_value(json!({
            "cartItemId": "ci1",
            "productId": "p1",
            "productName": "Tote",
            "productImages": ["https://cdn.example.com/tote.jpg"],
            "price": "1500",
            "quantity": 2,
            "subtotal": "3000",
            "vendor": {"vendorId": "v1", "storeName": "Ada Crafts"}
        }))
        .unwrap();

        let item = convert_cart_item(line, None);
        assert_eq!(item.id.as_str(), "p1");
        assert_eq!(item.cart_item_id.unwrap().as_str(), "ci1");
        assert_eq!(item.vendor.unwrap().as_str(), "v1");
        assert_eq!(item.product.store_name, "Ada Crafts");
        assert_eq!(item.product.price.current, Decimal::new(1500, 0));
        assert_eq!(item.product.images.main, "https://cdn.example.com/tote.jpg");
        assert!(item.product.reviews.is_none());
    }
}
