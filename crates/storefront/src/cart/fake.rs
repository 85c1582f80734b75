//! In-memory [`CartBackend`] for cart tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;

use bazaar_core::{CartItemId, ProductId};

use super::CartBackend;
use crate::api::{
    AddCartItemRequest, ApiCart, ApiCartItem, ApiError, ApiVendor, ProductDetailResponse,
    RemoveCartItemRequest, UpdateCartItemRequest,
};
use crate::catalog::Product;
use crate::catalog::conversions::convert_product;

/// Active product priced at `price` (whole naira).
pub fn product(id: &str, price: i64) -> Product {
    let dto = serde_json::from_value(json!({
        "productId": id,
        "productName": format!("Product {id}"),
        "unitPrice": price.to_string(),
        "stock": "10",
        "minStock": "2",
        "isActive": "1"
    }))
    .unwrap_or_else(|e| panic!("invalid test product: {e}"));
    convert_product(dto, Utc::now())
}

#[derive(Default)]
struct State {
    lines: Vec<ApiCartItem>,
    next_id: usize,
    deleted: HashSet<String>,
    empty: HashSet<String>,
    lookup_failures: HashMap<String, u16>,
    fetch_failure: Option<u16>,
    /// Fetches that fail with 503 before answering normally.
    transient_fetch_failures: usize,
    /// 1-based fetch call that answers 503.
    failing_fetch: Option<usize>,
    add_failure: Option<(u16, String)>,
    fail_removes: bool,
    removed: Vec<CartItemId>,
    /// Merge quantities into an existing line on add, like some backends do.
    merge_on_add: bool,
}

/// Server cart held in memory, with switchable failures.
#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<State>,
    fetches: AtomicUsize,
    adds: AtomicUsize,
    updates: AtomicUsize,
}

fn status(status: u16, message: &str) -> ApiError {
    ApiError::Status {
        status,
        message: message.to_string(),
    }
}

impl FakeBackend {
    fn with_state<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    fn line(state: &mut State, product_id: &str, quantity: u32, price: i64) -> ApiCartItem {
        state.next_id += 1;
        let price = Decimal::from(price);
        ApiCartItem {
            cart_item_id: CartItemId::new(format!("ci-auto-{}", state.next_id)),
            product_id: ProductId::new(product_id),
            product_name: format!("Product {product_id}"),
            product_images: Vec::new(),
            price,
            quantity,
            subtotal: price * Decimal::from(quantity),
            vendor: ApiVendor::Id("v1".to_string()),
            added_at: None,
        }
    }

    pub fn seed_line(&self, cart_item_id: &str, product_id: &str, quantity: u32, price: i64) {
        self.with_state(|state| {
            let mut line = Self::line(state, product_id, quantity, price);
            line.cart_item_id = CartItemId::new(cart_item_id);
            state.lines.push(line);
        });
    }

    /// Product lookups answer 404.
    pub fn delete_product(&self, product_id: &str) {
        self.with_state(|state| state.deleted.insert(product_id.to_string()));
    }

    /// Product lookups answer 200 with "No product found." and empty data.
    pub fn empty_product(&self, product_id: &str) {
        self.with_state(|state| state.empty.insert(product_id.to_string()));
    }

    pub fn fail_lookup(&self, product_id: &str, code: u16) {
        self.with_state(|state| state.lookup_failures.insert(product_id.to_string(), code));
    }

    pub fn fail_fetch(&self, code: u16) {
        self.with_state(|state| state.fetch_failure = Some(code));
    }

    /// Fail only the next `times` fetches.
    pub fn fail_next_fetches(&self, times: usize) {
        self.with_state(|state| state.transient_fetch_failures = times);
    }

    /// Fail only the `number`th fetch (counting from 1).
    pub fn fail_fetch_number(&self, number: usize) {
        self.with_state(|state| state.failing_fetch = Some(number));
    }

    pub fn restore_fetch(&self) {
        self.with_state(|state| state.fetch_failure = None);
    }

    pub fn fail_adds(&self, code: u16, message: &str) {
        self.with_state(|state| state.add_failure = Some((code, message.to_string())));
    }

    pub fn fail_removes(&self) {
        self.with_state(|state| state.fail_removes = true);
    }

    pub fn merge_on_add(&self) {
        self.with_state(|state| state.merge_on_add = true);
    }

    pub fn removed(&self) -> Vec<CartItemId> {
        self.with_state(|state| state.removed.clone())
    }

    pub fn lines(&self) -> Vec<ApiCartItem> {
        self.with_state(|state| state.lines.clone())
    }

    /// Quantity of the server line for `product_id`, `0` when absent.
    pub fn quantity(&self, product_id: &str) -> u32 {
        self.with_state(|state| {
            state
                .lines
                .iter()
                .filter(|l| l.product_id.as_str() == product_id)
                .map(|l| l.quantity)
                .sum()
        })
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn add_count(&self) -> usize {
        self.adds.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CartBackend for FakeBackend {
    async fn fetch_cart(&self) -> Result<ApiCart, ApiError> {
        let number = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        // Let other tasks interleave, like a real request would
        tokio::task::yield_now().await;
        self.with_state(|state| {
            if let Some(code) = state.fetch_failure {
                return Err(status(code, ""));
            }
            if state.failing_fetch == Some(number) {
                return Err(status(503, ""));
            }
            if state.transient_fetch_failures > 0 {
                state.transient_fetch_failures -= 1;
                return Err(status(503, ""));
            }
            Ok(ApiCart {
                items: state.lines.clone(),
            })
        })
    }

    async fn add_item(&self, body: AddCartItemRequest) -> Result<(), ApiError> {
        self.adds.fetch_add(1, Ordering::SeqCst);
        self.with_state(|state| {
            if let Some((code, message)) = &state.add_failure {
                return Err(status(*code, message));
            }
            let merge = state.merge_on_add;
            match state
                .lines
                .iter_mut()
                .find(|l| l.product_id == body.product_id)
                .filter(|_| merge)
            {
                Some(line) => line.quantity += body.quantity,
                None => {
                    let line = Self::line(state, body.product_id.as_str(), body.quantity, 1_000);
                    state.lines.push(line);
                }
            }
            Ok(())
        })
    }

    async fn update_item(&self, body: UpdateCartItemRequest) -> Result<(), ApiError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.with_state(|state| {
            let line = state
                .lines
                .iter_mut()
                .find(|l| l.cart_item_id == body.cart_item_id)
                .ok_or_else(|| status(404, "Cart item not found"))?;
            line.quantity = body.quantity;
            Ok(())
        })
    }

    async fn remove_item(&self, body: RemoveCartItemRequest) -> Result<(), ApiError> {
        self.with_state(|state| {
            if state.fail_removes {
                return Err(status(500, ""));
            }
            state.lines.retain(|l| l.cart_item_id != body.cart_item_id);
            state.removed.push(body.cart_item_id);
            Ok(())
        })
    }

    async fn clear(&self) -> Result<(), ApiError> {
        self.with_state(|state| state.lines.clear());
        Ok(())
    }

    async fn lookup_product(
        &self,
        product_id: &ProductId,
    ) -> Result<ProductDetailResponse, ApiError> {
        let id = product_id.as_str();
        self.with_state(|state| {
            if state.deleted.contains(id) {
                return Err(status(404, ""));
            }
            if let Some(code) = state.lookup_failures.get(id) {
                return Err(status(*code, ""));
            }
            let price = state
                .lines
                .iter()
                .find(|l| l.product_id == *product_id)
                .map_or(Decimal::ZERO, |l| l.price);
            let body = if state.empty.contains(id) {
                json!({"status": 200, "message": "No product found.", "data": []})
            } else {
                json!({
                    "status": 200,
                    "message": "Product retrieved",
                    "data": {
                        "productId": id,
                        "productName": format!("Product {id}"),
                        "unitPrice": price.to_string(),
                        "isActive": "1"
                    }
                })
            };
            serde_json::from_value(body).map_err(ApiError::from)
        })
    }
}
