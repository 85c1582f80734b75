//! Integration tests for the Bazaar storefront.
//!
//! Each test starts an `httpmock` server standing in for the marketplace API
//! and drives a real [`Storefront`] against it.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p bazaar-integration-tests
//! ```

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;

use bazaar_storefront::Storefront;
use bazaar_storefront::api::ApiClient;
use bazaar_storefront::cache::ImageCache;
use bazaar_storefront::config::ApiConfig;
use bazaar_storefront::state::AuthSession;
use bazaar_storefront::storage::{FileStore, KeyValueStore, MemoryStore};

/// API configuration pointing at a mock server.
///
/// # Panics
///
/// Panics if `base_url` is not a valid URL.
#[must_use]
pub fn api_config(base_url: &str) -> ApiConfig {
    ApiConfig {
        base_url: Url::parse(base_url).unwrap_or_else(|e| panic!("bad mock URL {base_url}: {e}")),
        username: "buyer-app".to_string(),
        password: SecretString::from("s3cr3t"),
        timeout: Duration::from_secs(5),
    }
}

/// Storefront with in-memory storage talking to `base_url`.
///
/// # Panics
///
/// Panics if the HTTP client cannot be built.
#[must_use]
pub fn storefront(base_url: &str) -> Storefront {
    let api = ApiClient::new(&api_config(base_url))
        .unwrap_or_else(|e| panic!("failed to build API client: {e}"));
    Storefront::in_memory(api)
}

/// Storefront whose device storage lives in `dir`, as the CLI sets it up.
///
/// # Panics
///
/// Panics if the HTTP client cannot be built.
#[must_use]
pub fn storefront_on_disk(base_url: &str, dir: &std::path::Path) -> Storefront {
    let api = ApiClient::new(&api_config(base_url))
        .unwrap_or_else(|e| panic!("failed to build API client: {e}"));
    let device: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(dir.join("device")));
    Storefront::with_parts(
        api,
        device,
        Arc::new(MemoryStore::new()),
        ImageCache::new(reqwest::Client::new(), None),
    )
}

/// A signed-in buyer session.
#[must_use]
pub fn session(user_id: &str) -> AuthSession {
    AuthSession {
        user_id: user_id.into(),
        token: SecretString::from("buyer-token"),
    }
}

/// Active product as the API returns it.
#[must_use]
pub fn product_json(id: &str, price: u32) -> Value {
    json!({
        "productId": id,
        "productName": format!("Product {id}"),
        "categoryId": "fashion",
        "unitPrice": price.to_string(),
        "stock": "25",
        "minStock": "5",
        "images": [format!("https://cdn.bazaar.test/{id}.jpg")],
        "isActive": "1",
        "storeName": "Ada Crafts",
        "createdAt": "2024-01-01 10:00:00"
    })
}

/// `{status, error, message, data}` envelope.
#[must_use]
pub fn envelope(data: Value) -> Value {
    json!({"status": 200, "error": false, "message": "OK", "data": data})
}

/// Server cart line.
#[must_use]
pub fn cart_line(cart_item_id: &str, product_id: &str, quantity: u32, price: u32) -> Value {
    json!({
        "cartItemId": cart_item_id,
        "productId": product_id,
        "productName": format!("Product {product_id}"),
        "productImages": [],
        "price": price.to_string(),
        "quantity": quantity,
        "subtotal": (price * quantity).to_string(),
        "vendor": {"vendorId": "v1", "storeName": "Ada Crafts"}
    })
}
