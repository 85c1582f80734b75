//! Cart mutations for guest and signed-in sessions.

use async_trait::async_trait;
use tracing::{debug, instrument};

use bazaar_core::ProductId;

use super::{CartBackend, CartError, CartItem, CartStore};
use crate::api::{AddCartItemRequest, RemoveCartItemRequest, UpdateCartItemRequest};
use crate::catalog::Product;
use crate::error::add_breadcrumb;

/// Whose cart an operation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    /// Not signed in; the cart lives on this device.
    Guest,
    /// Signed in; the cart lives on the server.
    Authenticated,
}

impl SessionKind {
    #[must_use]
    pub const fn from_authenticated(is_authenticated: bool) -> Self {
        if is_authenticated {
            Self::Authenticated
        } else {
            Self::Guest
        }
    }
}

/// Cart mutations. Quantity `0` in [`Self::update_quantity`] removes the line.
#[async_trait]
pub trait CartOperations: Send + Sync {
    /// Add `quantity` of `product`, merging with an existing line.
    async fn add_item(&self, product: Product, quantity: u32) -> Result<(), CartError>;

    /// Remove the line for `product_id`. Missing lines are a no-op.
    async fn remove_item(&self, product_id: &ProductId) -> Result<(), CartError>;

    /// Replace the quantity of the line for `product_id`.
    async fn update_quantity(&self, product_id: &ProductId, quantity: u32)
    -> Result<(), CartError>;

    /// Remove every line.
    async fn clear(&self) -> Result<(), CartError>;
}

// =============================================================================
// Guest
// =============================================================================

/// Local cart persisted to device storage. Never fails.
pub struct GuestCartOperations<'a, B> {
    store: &'a CartStore<B>,
}

impl<'a, B: CartBackend> GuestCartOperations<'a, B> {
    #[must_use]
    pub const fn new(store: &'a CartStore<B>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<B: CartBackend> CartOperations for GuestCartOperations<'_, B> {
    async fn add_item(&self, product: Product, quantity: u32) -> Result<(), CartError> {
        self.store.with_state(|state| {
            let existing = state.guest_items.iter().position(|i| i.id == product.id);
            match existing.and_then(|index| state.guest_items.get_mut(index)) {
                Some(line) => line.quantity = line.quantity.saturating_add(quantity),
                None => state.guest_items.push(CartItem::guest(product, quantity)),
            }
        });
        self.store.persist();
        Ok(())
    }

    async fn remove_item(&self, product_id: &ProductId) -> Result<(), CartError> {
        self.store
            .with_state(|state| state.guest_items.retain(|i| &i.id != product_id));
        self.store.persist();
        Ok(())
    }

    async fn update_quantity(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<(), CartError> {
        if quantity == 0 {
            return self.remove_item(product_id).await;
        }
        self.store.with_state(|state| {
            if let Some(line) = state.guest_items.iter_mut().find(|i| &i.id == product_id) {
                line.quantity = quantity;
            }
        });
        self.store.persist();
        Ok(())
    }

    async fn clear(&self) -> Result<(), CartError> {
        self.store.clear_guest_cart();
        Ok(())
    }
}

// =============================================================================
// Server
// =============================================================================

/// Server cart: every mutation is a request followed by a reload.
pub struct ServerCartOperations<'a, B> {
    store: &'a CartStore<B>,
}

impl<'a, B: CartBackend> ServerCartOperations<'a, B> {
    #[must_use]
    pub const fn new(store: &'a CartStore<B>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<B: CartBackend> CartOperations for ServerCartOperations<'_, B> {
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    async fn add_item(&self, product: Product, quantity: u32) -> Result<(), CartError> {
        let _loading = self.store.begin_request();
        add_breadcrumb("cart", "Added item", Some(&[("product_id", product.id.as_str())]));

        let body = AddCartItemRequest {
            product_id: product.id,
            quantity,
        };
        if let Err(e) = self.store.backend().add_item(body).await {
            return Err(self.store.record_error(e));
        }
        self.store.load_server_cart().await
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn remove_item(&self, product_id: &ProductId) -> Result<(), CartError> {
        let Some(cart_item_id) = self
            .store
            .server_line(product_id)
            .and_then(|line| line.cart_item_id)
        else {
            debug!("no server line to remove");
            return Ok(());
        };

        let _loading = self.store.begin_request();
        add_breadcrumb("cart", "Removed item", Some(&[("product_id", product_id.as_str())]));
        if let Err(e) = self
            .store
            .backend()
            .remove_item(RemoveCartItemRequest { cart_item_id })
            .await
        {
            return Err(self.store.record_error(e));
        }
        self.store.load_server_cart().await
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn update_quantity(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<(), CartError> {
        if quantity == 0 {
            return self.remove_item(product_id).await;
        }
        let Some(cart_item_id) = self
            .store
            .server_line(product_id)
            .and_then(|line| line.cart_item_id)
        else {
            debug!("no server line to update");
            return Ok(());
        };

        let _loading = self.store.begin_request();
        if let Err(e) = self
            .store
            .backend()
            .update_item(UpdateCartItemRequest {
                cart_item_id,
                quantity,
            })
            .await
        {
            return Err(self.store.record_error(e));
        }
        self.store.load_server_cart().await
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<(), CartError> {
        let _loading = self.store.begin_request();
        add_breadcrumb("cart", "Cleared cart", None);
        if let Err(e) = self.store.backend().clear().await {
            return Err(self.store.record_error(e));
        }
        self.store.with_state(|state| state.server_items.clear());
        Ok(())
    }
}
