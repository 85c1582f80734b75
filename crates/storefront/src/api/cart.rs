//! Cart endpoints (bearer auth).
//!
//! Carts are mutable per-buyer state and are never cached here.

use async_trait::async_trait;
use reqwest::Method;
use tracing::instrument;

use bazaar_core::ProductId;

use super::types::{
    AckResponse, AddCartItemRequest, ApiCart, ItemResponse, ProductDetailResponse,
    RemoveCartItemRequest, UpdateCartItemRequest,
};
use super::{ApiClient, ApiError, check_envelope};
use crate::cart::CartBackend;

impl ApiClient {
    /// Get the signed-in buyer's cart.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is set or the API request fails.
    #[instrument(skip(self))]
    pub async fn get_cart(&self) -> Result<ApiCart, ApiError> {
        let request = self.bearer(Method::GET, "cart").await?;
        let response: ItemResponse<ApiCart> = self.send(request).await?;
        check_envelope(response.status, response.error, &response.message)?;
        Ok(response.data.unwrap_or_default())
    }

    /// Add a product to the signed-in buyer's cart.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is set or the API request fails.
    #[instrument(skip(self), fields(product_id = %body.product_id, quantity = body.quantity))]
    pub async fn add_cart_item(&self, body: &AddCartItemRequest) -> Result<(), ApiError> {
        let request = self.bearer(Method::POST, "cart/add").await?.json(body);
        let response: AckResponse = self.send(request).await?;
        check_envelope(response.status, response.error, &response.message)
    }

    /// Change the quantity of a cart line.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is set or the API request fails.
    #[instrument(skip(self), fields(cart_item_id = %body.cart_item_id, quantity = body.quantity))]
    pub async fn update_cart_item(&self, body: &UpdateCartItemRequest) -> Result<(), ApiError> {
        let request = self.bearer(Method::PUT, "cart/update").await?.json(body);
        let response: AckResponse = self.send(request).await?;
        check_envelope(response.status, response.error, &response.message)
    }

    /// Remove a cart line.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is set or the API request fails.
    #[instrument(skip(self), fields(cart_item_id = %body.cart_item_id))]
    pub async fn remove_cart_item(&self, body: &RemoveCartItemRequest) -> Result<(), ApiError> {
        let request = self.bearer(Method::DELETE, "cart/remove").await?.json(body);
        let response: AckResponse = self.send(request).await?;
        check_envelope(response.status, response.error, &response.message)
    }

    /// Empty the signed-in buyer's cart.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is set or the API request fails.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) -> Result<(), ApiError> {
        let request = self.bearer(Method::DELETE, "cart/clear").await?;
        let response: AckResponse = self.send(request).await?;
        check_envelope(response.status, response.error, &response.message)
    }
}

#[async_trait]
impl CartBackend for ApiClient {
    async fn fetch_cart(&self) -> Result<ApiCart, ApiError> {
        self.get_cart().await
    }

    async fn add_item(&self, body: AddCartItemRequest) -> Result<(), ApiError> {
        self.add_cart_item(&body).await
    }

    async fn update_item(&self, body: UpdateCartItemRequest) -> Result<(), ApiError> {
        self.update_cart_item(&body).await
    }

    async fn remove_item(&self, body: RemoveCartItemRequest) -> Result<(), ApiError> {
        self.remove_cart_item(&body).await
    }

    async fn clear(&self) -> Result<(), ApiError> {
        self.clear_cart().await
    }

    async fn lookup_product(
        &self,
        product_id: &ProductId,
    ) -> Result<ProductDetailResponse, ApiError> {
        self.get_product(product_id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use httpmock::MockServer;
    use secrecy::SecretString;
    use serde_json::json;

    use bazaar_core::CartItemId;

    use super::*;
    use crate::api::tests::test_config;

    #[tokio::test]
    async fn test_get_cart_uses_bearer_token() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method("GET")
                .path("/cart")
                .header("authorization", "Bearer buyer-token");
            then.status(200).json_body(json!({
                "status": 200,
                "error": false,
                "message": "Cart retrieved",
                "data": {"items": [{
                    "cartItemId": "ci1",
                    "productId": "p1",
                    "productName": "Tote",
                    "productImages": ["https://cdn.example.com/tote.jpg"],
                    "price": "1500",
                    "quantity": "2",
                    "subtotal": "3000",
                    "vendor": "v1",
                    "addedAt": "2024-05-01T10:00:00Z"
                }]}
            }));
        });

        let client = ApiClient::new(&test_config(&server.base_url())).unwrap();
        client.set_token(SecretString::from("buyer-token")).await;
        let cart = client.get_cart().await.unwrap();

        mock.assert();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_update_sends_json_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method("PUT")
                .path("/cart/update")
                .json_body(json!({"cartItemId": "ci1", "quantity": 4}));
            then.status(200)
                .json_body(json!({"status": 200, "error": false, "message": "Updated"}));
        });

        let client = ApiClient::new(&test_config(&server.base_url())).unwrap();
        client.set_token(SecretString::from("buyer-token")).await;
        client
            .update_cart_item(&UpdateCartItemRequest {
                cart_item_id: CartItemId::new("ci1"),
                quantity: 4,
            })
            .await
            .unwrap();

        mock.assert();
    }

    #[tokio::test]
    async fn test_cart_call_without_token_never_hits_network() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.path("/cart/clear");
            then.status(200);
        });

        let client = ApiClient::new(&test_config(&server.base_url())).unwrap();
        let err = client.clear_cart().await.unwrap_err();

        assert!(matches!(err, ApiError::MissingToken));
        mock.assert_calls(0);
    }
}
