//! Guest cart, sign-in migration and sign-out against a mocked marketplace.

#![allow(clippy::unwrap_used)]

use httpmock::MockServer;
use serde_json::json;

use bazaar_integration_tests::{
    cart_line, envelope, product_json, session, storefront, storefront_on_disk,
};
use bazaar_storefront::cart::{SessionKind, SyncAction};

fn ack() -> serde_json::Value {
    json!({"status": 200, "error": false, "message": "OK"})
}

#[tokio::test]
async fn test_sign_in_sums_quantities_of_shared_product() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("GET").path("/product/item-info/p1");
        then.status(200).json_body(envelope(product_json("p1", 1500)));
    });
    server.mock(|when, then| {
        when.method("GET")
            .path("/cart")
            .header("authorization", "Bearer buyer-token");
        then.status(200)
            .json_body(envelope(json!({"items": [cart_line("ci1", "p1", 1, 1500)]})));
    });
    let update = server.mock(|when, then| {
        when.method("PUT")
            .path("/cart/update")
            .json_body(json!({"cartItemId": "ci1", "quantity": 4}));
        then.status(200).json_body(ack());
    });
    let add = server.mock(|when, then| {
        when.method("POST").path("/cart/add");
        then.status(200).json_body(ack());
    });

    let storefront = storefront(&server.base_url());
    let product = storefront.catalog().product(&"p1".into()).await.unwrap();
    storefront
        .cart()
        .add_item(SessionKind::Guest, product, 3)
        .await
        .unwrap();

    let action = storefront.sign_in(session("u1")).await;

    assert_eq!(action, Some(SyncAction::Migrate));
    update.assert();
    add.assert_calls(0);
    assert!(storefront.cart().items(SessionKind::Guest).is_empty());
    assert_eq!(storefront.session_kind().await, SessionKind::Authenticated);
    assert_eq!(storefront.cart().items(SessionKind::Authenticated).len(), 1);
}

#[tokio::test]
async fn test_sign_in_adds_guest_only_products() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("GET").path("/product/item-info/p2");
        then.status(200).json_body(envelope(product_json("p2", 800)));
    });
    server.mock(|when, then| {
        when.method("GET").path("/cart");
        then.status(200).json_body(envelope(json!({"items": []})));
    });
    let add = server.mock(|when, then| {
        when.method("POST")
            .path("/cart/add")
            .json_body(json!({"productId": "p2", "quantity": 2}));
        then.status(200).json_body(ack());
    });

    let storefront = storefront(&server.base_url());
    let product = storefront.catalog().product(&"p2".into()).await.unwrap();
    storefront
        .cart()
        .add_item(SessionKind::Guest, product, 2)
        .await
        .unwrap();

    storefront.sign_in(session("u1")).await;

    add.assert_calls(1);
    assert!(storefront.cart().items(SessionKind::Guest).is_empty());
    assert!(!storefront.cart().is_migrating());
}

#[tokio::test]
async fn test_sign_in_prunes_deleted_products() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("GET").path("/cart");
        then.status(200)
            .json_body(envelope(json!({"items": [cart_line("ci9", "p9", 1, 500)]})));
    });
    server.mock(|when, then| {
        when.method("GET").path("/product/item-info/p9");
        then.status(404)
            .json_body(json!({"status": 404, "error": true, "message": ""}));
    });
    let remove = server.mock(|when, then| {
        when.method("DELETE")
            .path("/cart/remove")
            .json_body(json!({"cartItemId": "ci9"}));
        then.status(200).json_body(ack());
    });

    let storefront = storefront(&server.base_url());
    storefront.sign_in(session("u1")).await;

    remove.assert();
    assert!(storefront.cart().items(SessionKind::Authenticated).is_empty());
    assert!(storefront.cart().error().is_none());
}

#[tokio::test]
async fn test_failed_cart_reload_does_not_merge_twice() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("GET").path("/product/item-info/p1");
        then.status(200).json_body(envelope(product_json("p1", 1500)));
    });
    let mut cart = server.mock(|when, then| {
        when.method("GET").path("/cart");
        then.status(503);
    });
    let add = server.mock(|when, then| {
        when.method("POST")
            .path("/cart/add")
            .json_body(json!({"productId": "p1", "quantity": 1}));
        then.status(200).json_body(ack());
    });

    let storefront = storefront(&server.base_url());
    let product = storefront.catalog().product(&"p1".into()).await.unwrap();
    storefront
        .cart()
        .add_item(SessionKind::Guest, product, 1)
        .await
        .unwrap();

    storefront.sign_in(session("u1")).await;

    add.assert_calls(1);
    assert!(storefront.cart().items(SessionKind::Guest).is_empty());
    assert_eq!(
        storefront.cart().error().as_deref(),
        Some("Something went wrong on our end. Please try again later.")
    );

    // The backend recovers; a later sync only reloads
    cart.delete();
    server.mock(|when, then| {
        when.method("GET").path("/cart");
        then.status(200)
            .json_body(envelope(json!({"items": [cart_line("ci1", "p1", 1, 1500)]})));
    });
    storefront.sign_out().await;
    storefront.sign_in(session("u1")).await;

    add.assert_calls(1);
    assert_eq!(storefront.cart().item_quantity(SessionKind::Authenticated, &"p1".into()), 1);
    assert!(storefront.cart().error().is_none());
}

#[tokio::test]
async fn test_session_survives_restart_and_sign_out_resets() {
    let server = MockServer::start();
    let fetch = server.mock(|when, then| {
        when.method("GET").path("/cart");
        then.status(200)
            .json_body(envelope(json!({"items": [cart_line("ci1", "p1", 2, 1500)]})));
    });
    server.mock(|when, then| {
        when.method("GET").path("/product/item-info/p1");
        then.status(200).json_body(envelope(product_json("p1", 1500)));
    });
    let dir = tempfile::tempdir().unwrap();

    let first = storefront_on_disk(&server.base_url(), dir.path());
    first.sign_in(session("u1")).await;
    drop(first);

    let second = storefront_on_disk(&server.base_url(), dir.path());
    assert_eq!(second.auth_session().unwrap().user_id.as_str(), "u1");
    assert_eq!(second.restore_session().await, Some(SyncAction::Migrate));
    fetch.assert_calls(2);
    assert_eq!(second.cart().item_quantity(SessionKind::Authenticated, &"p1".into()), 2);

    assert_eq!(second.sign_out().await, Some(SyncAction::Reset));
    assert!(second.auth_session().is_none());
    assert!(second.cart().items(SessionKind::Authenticated).is_empty());
    assert_eq!(second.session_kind().await, SessionKind::Guest);
}
