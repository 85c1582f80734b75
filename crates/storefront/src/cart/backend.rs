//! Remote cart seam.

use async_trait::async_trait;

use bazaar_core::ProductId;

use crate::api::{
    AddCartItemRequest, ApiCart, ApiError, ProductDetailResponse, RemoveCartItemRequest,
    UpdateCartItemRequest,
};

/// Server-side cart operations plus the product lookup used for pruning.
///
/// Implemented by [`crate::api::ApiClient`]; tests substitute an in-memory
/// backend.
#[async_trait]
pub trait CartBackend: Send + Sync {
    /// Fetch the signed-in buyer's cart.
    async fn fetch_cart(&self) -> Result<ApiCart, ApiError>;

    async fn add_item(&self, body: AddCartItemRequest) -> Result<(), ApiError>;

    async fn update_item(&self, body: UpdateCartItemRequest) -> Result<(), ApiError>;

    async fn remove_item(&self, body: RemoveCartItemRequest) -> Result<(), ApiError>;

    async fn clear(&self) -> Result<(), ApiError>;

    /// Look up the product behind a cart line.
    async fn lookup_product(&self, product_id: &ProductId)
    -> Result<ProductDetailResponse, ApiError>;
}
