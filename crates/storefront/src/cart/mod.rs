//! Shopping cart store.
//!
//! Two collections live side by side:
//! - guest items, kept locally and persisted to device storage under
//!   [`CART_STORAGE_KEY`] (together with the drawer `is_open` flag)
//! - server items, fetched fresh for each signed-in session and pruned of
//!   lines whose product was deleted
//!
//! Mutations go through [`CartOperations`], picked by [`SessionKind`]. Totals
//! are derived on read. The state lock is only held for short synchronous
//! sections, never across an `.await`.

mod conversions;
mod migration;

pub mod backend;
pub mod operations;
pub mod sync;

#[cfg(test)]
pub(crate) mod fake;

pub use backend::CartBackend;
pub use migration::{MigrationOutcome, MigrationReport};
pub use operations::{CartOperations, GuestCartOperations, ServerCartOperations, SessionKind};
pub use sync::{AuthSnapshot, CartSync, SyncAction};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use bazaar_core::{CartItemId, Price, ProductId, VendorId};

use crate::api::{ApiCartItem, ApiError, RemoveCartItemRequest, user_message};
use crate::catalog::Product;
use crate::catalog::conversions::convert_product;
use crate::storage::{KeyValueStore, MemoryStore, load_json, save_json};

/// Device storage key for the guest cart.
pub const CART_STORAGE_KEY: &str = "cart-storage";

/// Subtotal above which shipping is free.
pub const FREE_SHIPPING_THRESHOLD: Decimal = Decimal::from_parts(50_000, 0, 0, false, 0);
/// Flat shipping fee below the threshold.
pub const SHIPPING_FEE: Decimal = Decimal::from_parts(2_500, 0, 0, false, 0);
/// Tax rate applied to the subtotal (8%).
pub const TAX_RATE: Decimal = Decimal::from_parts(8, 0, 0, false, 2);

// =============================================================================
// Types
// =============================================================================

/// Errors returned by cart mutations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The backend rejected or failed the request. `message` is buyer-facing.
    #[error("{message}")]
    Api {
        message: String,
        #[source]
        source: ApiError,
    },
}

impl CartError {
    /// Buyer-facing description.
    #[must_use]
    pub fn user_message(&self) -> &str {
        match self {
            Self::Api { message, .. } => message,
        }
    }

    /// The underlying API error.
    #[must_use]
    pub const fn api_error(&self) -> &ApiError {
        match self {
            Self::Api { source, .. } => source,
        }
    }
}

/// One cart line. At most one line per product id exists per collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: ProductId,
    pub product: Product,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cart_item_id: Option<CartItemId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<VendorId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtotal: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub product_images: Vec<String>,
}

impl CartItem {
    /// A local line for a guest cart.
    #[must_use]
    pub fn guest(product: Product, quantity: u32) -> Self {
        Self {
            id: product.id.clone(),
            product,
            quantity,
            cart_item_id: None,
            vendor: None,
            price: None,
            subtotal: None,
            added_at: None,
            product_images: Vec::new(),
        }
    }

    /// Current unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.product.price.current * Decimal::from(self.quantity)
    }
}

/// Totals derived from a list of lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartTotals {
    pub item_count: u32,
    pub subtotal: Price,
    pub shipping: Price,
    pub tax: Price,
    pub total: Price,
}

impl CartTotals {
    #[must_use]
    pub fn compute(items: &[CartItem]) -> Self {
        let item_count = items.iter().map(|i| i.quantity).sum();
        let subtotal: Decimal = items.iter().map(CartItem::line_total).sum();
        let shipping = if subtotal > FREE_SHIPPING_THRESHOLD {
            Decimal::ZERO
        } else {
            SHIPPING_FEE
        };
        let tax = subtotal * TAX_RATE;

        Self {
            item_count,
            subtotal: Price::from_amount(subtotal),
            shipping: Price::from_amount(shipping),
            tax: Price::from_amount(tax),
            total: Price::from_amount(subtotal + shipping + tax),
        }
    }
}

/// Where the visible cart comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Guest cart, stored on this device.
    Local,
    /// A server request is in flight.
    Loading,
    /// The last server request failed.
    Error,
    /// Synced with the server.
    Server,
}

/// Point-in-time copy of the cart state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartState {
    pub guest_items: Vec<CartItem>,
    pub server_items: Vec<CartItem>,
    pub is_open: bool,
    pub is_loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
pub(crate) struct Inner {
    pub(crate) guest_items: Vec<CartItem>,
    pub(crate) server_items: Vec<CartItem>,
    is_open: bool,
    /// Outstanding server requests.
    loading: u32,
    error: Option<String>,
}

/// Subset of the state written to device storage.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedCart {
    #[serde(default)]
    guest_items: Vec<CartItem>,
    #[serde(default)]
    is_open: bool,
}

// =============================================================================
// CartStore
// =============================================================================

/// Cart state plus the backend used for server carts.
pub struct CartStore<B> {
    backend: B,
    device: Arc<dyn KeyValueStore>,
    state: Mutex<Inner>,
    migrating: AtomicBool,
}

impl<B> std::fmt::Debug for CartStore<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("state", &self.state)
            .field("migrating", &self.migrating)
            .finish_non_exhaustive()
    }
}

impl<B: CartBackend> CartStore<B> {
    /// Create a store, restoring the guest cart from `device`.
    pub fn new(backend: B, device: Arc<dyn KeyValueStore>) -> Self {
        let persisted: PersistedCart =
            load_json(device.as_ref(), CART_STORAGE_KEY).unwrap_or_default();
        debug!(
            guest_items = persisted.guest_items.len(),
            "restored guest cart"
        );
        Self {
            backend,
            device,
            state: Mutex::new(Inner {
                guest_items: persisted.guest_items,
                is_open: persisted.is_open,
                ..Inner::default()
            }),
            migrating: AtomicBool::new(false),
        }
    }

    /// Create a store whose guest cart is not persisted.
    pub fn in_memory(backend: B) -> Self {
        Self::new(backend, Arc::new(MemoryStore::new()))
    }

    /// Operations for the given session kind.
    #[must_use]
    pub fn operations(&self, kind: SessionKind) -> Box<dyn CartOperations + '_> {
        match kind {
            SessionKind::Guest => Box::new(GuestCartOperations::new(self)),
            SessionKind::Authenticated => Box::new(ServerCartOperations::new(self)),
        }
    }

    // =========================================================================
    // Mutations (dispatch on session kind)
    // =========================================================================

    /// Add `quantity` of `product`.
    ///
    /// # Errors
    ///
    /// Returns the recorded error if the server rejects the change.
    pub async fn add_item(
        &self,
        kind: SessionKind,
        product: Product,
        quantity: u32,
    ) -> Result<(), CartError> {
        self.operations(kind).add_item(product, quantity).await
    }

    /// Remove the line for `product_id`.
    ///
    /// # Errors
    ///
    /// Returns the recorded error if the server rejects the change.
    pub async fn remove_item(
        &self,
        kind: SessionKind,
        product_id: &ProductId,
    ) -> Result<(), CartError> {
        self.operations(kind).remove_item(product_id).await
    }

    /// Set the quantity of the line for `product_id`; `0` removes it.
    ///
    /// # Errors
    ///
    /// Returns the recorded error if the server rejects the change.
    pub async fn update_quantity(
        &self,
        kind: SessionKind,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<(), CartError> {
        self.operations(kind)
            .update_quantity(product_id, quantity)
            .await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns the recorded error if the server rejects the change.
    pub async fn clear_cart(&self, kind: SessionKind) -> Result<(), CartError> {
        self.operations(kind).clear().await
    }

    // =========================================================================
    // Server cart
    // =========================================================================

    /// Fetch the server cart, dropping lines whose product no longer exists.
    ///
    /// Stale lines are also removed server-side; failures there are logged.
    /// Lines whose product lookup fails for other reasons are kept.
    ///
    /// # Errors
    ///
    /// Returns (and records) the error if the cart itself cannot be fetched.
    pub async fn load_server_cart(&self) -> Result<(), CartError> {
        let _loading = self.begin_request();

        let cart = match self.backend.fetch_cart().await {
            Ok(cart) => cart,
            Err(e) => {
                warn!(error = %e, "failed to load server cart");
                return Err(self.record_error(e));
            }
        };

        let mut items: Vec<CartItem> = Vec::with_capacity(cart.items.len());
        let mut pruned = 0_usize;
        for line in cart.items {
            match self.backend.lookup_product(&line.product_id).await {
                Ok(response) if response.is_missing() => {
                    self.prune_line(&line).await;
                    pruned += 1;
                }
                Ok(response) => {
                    let product = match response.into_product() {
                        Ok(dto) => dto.map(|dto| convert_product(dto, chrono::Utc::now())),
                        Err(e) => {
                            debug!(product_id = %line.product_id, error = %e, "unreadable product payload");
                            None
                        }
                    };
                    push_unique(&mut items, conversions::convert_cart_item(line, product));
                }
                Err(e) if e.is_not_found() => {
                    self.prune_line(&line).await;
                    pruned += 1;
                }
                Err(e) => {
                    warn!(product_id = %line.product_id, error = %e, "could not verify cart product");
                    push_unique(&mut items, conversions::convert_cart_item(line, None));
                }
            }
        }

        if pruned > 0 {
            info!(pruned, "removed deleted products from cart");
        }
        self.with_state(|state| state.server_items = items);
        Ok(())
    }

    async fn prune_line(&self, line: &ApiCartItem) {
        info!(product_id = %line.product_id, "product no longer exists, removing from cart");
        let body = RemoveCartItemRequest {
            cart_item_id: line.cart_item_id.clone(),
        };
        if let Err(e) = self.backend.remove_item(body).await {
            warn!(product_id = %line.product_id, error = %e, "failed to remove deleted product from cart");
        }
    }

    /// Reset everything on sign-out. The guest cart starts empty.
    pub fn handle_logout(&self) {
        self.with_state(|state| {
            state.server_items.clear();
            state.guest_items.clear();
            state.loading = 0;
            state.error = None;
        });
        self.persist();
    }

    /// Empty the guest cart without touching the server cart.
    pub fn clear_guest_cart(&self) {
        self.with_state(|state| state.guest_items.clear());
        self.persist();
    }

    // =========================================================================
    // UI state
    // =========================================================================

    /// Flip the cart drawer flag.
    pub fn toggle_open(&self) -> bool {
        let open = self.with_state(|state| {
            state.is_open = !state.is_open;
            state.is_open
        });
        self.persist();
        open
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Copy of the whole state.
    #[must_use]
    pub fn snapshot(&self) -> CartState {
        self.with_state(|state| CartState {
            guest_items: state.guest_items.clone(),
            server_items: state.server_items.clone(),
            is_open: state.is_open,
            is_loading: state.loading > 0,
            error: state.error.clone(),
        })
    }

    /// Lines visible for the session kind.
    #[must_use]
    pub fn items(&self, kind: SessionKind) -> Vec<CartItem> {
        self.with_state(|state| state.items(kind).to_vec())
    }

    #[must_use]
    pub fn totals(&self, kind: SessionKind) -> CartTotals {
        self.with_state(|state| CartTotals::compute(state.items(kind)))
    }

    /// Sum of line quantities.
    #[must_use]
    pub fn item_count(&self, kind: SessionKind) -> u32 {
        self.with_state(|state| state.items(kind).iter().map(|i| i.quantity).sum())
    }

    #[must_use]
    pub fn is_item_in_cart(&self, kind: SessionKind, product_id: &ProductId) -> bool {
        self.with_state(|state| state.items(kind).iter().any(|i| &i.id == product_id))
    }

    /// Quantity of `product_id`, `0` when absent.
    #[must_use]
    pub fn item_quantity(&self, kind: SessionKind, product_id: &ProductId) -> u32 {
        self.with_state(|state| {
            state
                .items(kind)
                .iter()
                .find(|i| &i.id == product_id)
                .map_or(0, |i| i.quantity)
        })
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.with_state(|state| state.loading > 0)
    }

    /// Last recorded buyer-facing error.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.with_state(|state| state.error.clone())
    }

    #[must_use]
    pub fn is_migrating(&self) -> bool {
        self.migrating.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn sync_status(&self, kind: SessionKind) -> SyncStatus {
        if kind == SessionKind::Guest {
            return SyncStatus::Local;
        }
        self.with_state(|state| {
            if state.loading > 0 {
                SyncStatus::Loading
            } else if state.error.is_some() {
                SyncStatus::Error
            } else {
                SyncStatus::Server
            }
        })
    }

    // =========================================================================
    // Internals
    // =========================================================================

    pub(crate) const fn backend(&self) -> &B {
        &self.backend
    }

    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Write guest items and the drawer flag to device storage.
    pub(crate) fn persist(&self) {
        let persisted = self.with_state(|state| PersistedCart {
            guest_items: state.guest_items.clone(),
            is_open: state.is_open,
        });
        save_json(self.device.as_ref(), CART_STORAGE_KEY, &persisted);
    }

    /// Mark a server request as in flight and clear the last error.
    pub(crate) fn begin_request(&self) -> LoadingGuard<'_> {
        self.with_state(|state| {
            state.loading += 1;
            state.error = None;
        });
        LoadingGuard { state: &self.state }
    }

    /// Record an API error for display and wrap it.
    pub(crate) fn record_error(&self, source: ApiError) -> CartError {
        let message = user_message(&source);
        self.with_state(|state| state.error = Some(message.clone()));
        CartError::Api { message, source }
    }

    pub(crate) fn server_line(&self, product_id: &ProductId) -> Option<CartItem> {
        self.with_state(|state| {
            state
                .server_items
                .iter()
                .find(|i| &i.id == product_id)
                .cloned()
        })
    }
}

impl Inner {
    fn items(&self, kind: SessionKind) -> &[CartItem] {
        match kind {
            SessionKind::Guest => &self.guest_items,
            SessionKind::Authenticated => &self.server_items,
        }
    }
}

fn push_unique(items: &mut Vec<CartItem>, item: CartItem) {
    if items.iter().any(|existing| existing.id == item.id) {
        warn!(product_id = %item.id, "duplicate server cart line ignored");
        return;
    }
    items.push(item);
}

/// Decrements the in-flight request count when dropped.
pub(crate) struct LoadingGuard<'a> {
    state: &'a Mutex<Inner>,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.loading = state.loading.saturating_sub(1);
    }
}
