//! Catalog browsing through the storefront against a mocked marketplace.

#![allow(clippy::unwrap_used)]

use httpmock::MockServer;
use serde_json::json;

use bazaar_integration_tests::{envelope, product_json, storefront};
use bazaar_storefront::catalog::{CatalogError, ListingQuery};

fn page(products: &[serde_json::Value], current: u32, total_pages: u32, total: u64) -> serde_json::Value {
    json!({
        "status": 200,
        "error": false,
        "message": "OK",
        "data": products,
        "pagination": {
            "currentPage": current,
            "perPage": 100,
            "totalPages": total_pages,
            "totalItems": total
        }
    })
}

#[tokio::test]
async fn test_listing_walks_every_page_and_paginates_locally() {
    let server = MockServer::start();
    let mut inactive = product_json("p3", 900);
    inactive["isActive"] = json!("0");
    let first = server.mock(|when, then| {
        when.method("GET")
            .path("/product/items")
            .query_param("isActive", "1")
            .query_param("perPage", "100")
            .query_param("page", "1");
        then.status(200).json_body(page(
            &[product_json("p1", 1000), product_json("p2", 2000)],
            1,
            2,
            4,
        ));
    });
    let second = server.mock(|when, then| {
        when.method("GET")
            .path("/product/items")
            .query_param("page", "2");
        then.status(200)
            .json_body(page(&[inactive.clone(), product_json("p4", 500)], 2, 2, 4));
    });

    let storefront = storefront(&server.base_url());
    let listing = storefront
        .catalog()
        .active_products(&ListingQuery::new(2, 2))
        .await
        .unwrap()
        .unwrap();

    first.assert();
    second.assert();
    assert_eq!(listing.products.len(), 1);
    assert_eq!(listing.products[0].id.as_str(), "p4");
    assert_eq!(listing.pagination.total_items, 3);
    assert_eq!(listing.pagination.total_pages, 2);

    // Served from the session cache
    let again = storefront
        .catalog()
        .active_products(&ListingQuery::new(1, 2))
        .await
        .unwrap()
        .unwrap();
    first.assert_calls(1);
    assert_eq!(again.products.len(), 2);
}

#[tokio::test]
async fn test_categories_fall_back_to_services() {
    let server = MockServer::start();
    let categories = server.mock(|when, then| {
        when.method("GET").path("/category/items");
        then.status(500);
    });

    let storefront = storefront(&server.base_url());
    let tree = storefront.catalog().categories().await;

    categories.assert();
    assert!(tree.find("services").is_some());
    assert!(tree.services_subcategories().count() > 0);
}

#[tokio::test]
async fn test_inactive_product_is_not_available() {
    let server = MockServer::start();
    let mut product = product_json("p1", 1000);
    product["isActive"] = json!("0");
    server.mock(|when, then| {
        when.method("GET").path("/product/item-info/p1");
        then.status(200).json_body(envelope(product.clone()));
    });

    let storefront = storefront(&server.base_url());
    let err = storefront.catalog().product(&"p1".into()).await.unwrap_err();

    assert!(matches!(err, CatalogError::NotAvailable(_)));
    assert_eq!(err.user_message(), "Product not available");
}

#[tokio::test]
async fn test_product_detail_carries_ratings() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("GET").path("/product/item-info/p1");
        then.status(200).json_body(envelope(product_json("p1", 1000)));
    });
    server.mock(|when, then| {
        when.method("GET").path("/product/ratings/p1");
        then.status(200)
            .json_body(envelope(json!({"totalRating": "4.5", "ratingCount": "12"})));
    });

    let storefront = storefront(&server.base_url());
    let product = storefront.catalog().product(&"p1".into()).await.unwrap();

    let reviews = product.reviews.unwrap();
    assert!((reviews.average - 4.5).abs() < f64::EPSILON);
    assert_eq!(reviews.total, 12);
}
