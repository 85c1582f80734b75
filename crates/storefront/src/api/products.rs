//! Product catalog endpoints (Basic auth).

use reqwest::Method;
use tracing::instrument;

use bazaar_core::{CategoryId, ProductId};

use super::types::{
    ApiProductData, ApiRatingData, AckResponse, ItemResponse, ListResponse,
    ProductDetailResponse,
};
use super::{ApiClient, ApiError, check_envelope};

/// Query parameters for product listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ProductsListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub category: Option<CategoryId>,
    pub search: Option<String>,
    /// Restrict to active products (`isActive=1`).
    pub active_only: bool,
}

impl ProductsListParams {
    /// Parameters for the buyer-facing listing (active products only).
    #[must_use]
    pub fn active() -> Self {
        Self {
            active_only: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    #[must_use]
    pub const fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = Some(per_page);
        self
    }

    /// Set the search term; blank terms are dropped.
    #[must_use]
    pub fn search(mut self, search: Option<&str>) -> Self {
        self.search = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from);
        self
    }

    #[must_use]
    pub fn category(mut self, category: CategoryId) -> Self {
        self.category = Some(category);
        self
    }

    /// Query-string pairs, omitting unset values.
    #[must_use]
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(page) = self.page.filter(|p| *p > 0) {
            query.push(("page", page.to_string()));
        }
        if let Some(per_page) = self.per_page.filter(|p| *p > 0) {
            query.push(("perPage", per_page.to_string()));
        }
        if let Some(category) = &self.category {
            query.push(("category", category.to_string()));
        }
        if let Some(search) = &self.search {
            query.push(("search", search.clone()));
        }
        if self.active_only {
            query.push(("isActive", "1".to_string()));
        }
        query
    }

    /// Stable signature used as a cache key.
    #[must_use]
    pub fn cache_key(&self) -> String {
        self.to_query()
            .into_iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl ApiClient {
    /// Get a page of products.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or reports an error.
    #[instrument(skip(self))]
    pub async fn get_products(
        &self,
        params: &ProductsListParams,
    ) -> Result<ListResponse<ApiProductData>, ApiError> {
        let request = self
            .basic(Method::GET, "product/items")?
            .query(&params.to_query());
        let response: ListResponse<ApiProductData> = self.send(request).await?;
        check_envelope(response.status, response.error, &response.message)?;
        Ok(response)
    }

    /// Get a page of products within one category.
    ///
    /// The `category` field of `params` is ignored; the id goes in the path.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or reports an error.
    #[instrument(skip(self, params), fields(category_id = %category_id))]
    pub async fn get_products_by_category(
        &self,
        category_id: &CategoryId,
        params: &ProductsListParams,
    ) -> Result<ListResponse<ApiProductData>, ApiError> {
        let params = ProductsListParams {
            category: None,
            ..params.clone()
        };
        let path = format!(
            "product/category/{}/items",
            urlencoding::encode(category_id.as_str())
        );
        let request = self.basic(Method::GET, &path)?.query(&params.to_query());
        let response: ListResponse<ApiProductData> = self.send(request).await?;
        check_envelope(response.status, response.error, &response.message)?;
        Ok(response)
    }

    /// Get a single product.
    ///
    /// Deleted products may come back as `200` with an empty payload; inspect
    /// [`ProductDetailResponse::is_missing`].
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails (including `404`).
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn get_product(
        &self,
        product_id: &ProductId,
    ) -> Result<ProductDetailResponse, ApiError> {
        let path = format!(
            "product/item-info/{}",
            urlencoding::encode(product_id.as_str())
        );
        let request = self.basic(Method::GET, &path)?;
        self.send(request).await
    }

    /// Get the aggregate rating of a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn get_product_ratings(
        &self,
        product_id: &ProductId,
    ) -> Result<ItemResponse<ApiRatingData>, ApiError> {
        let path = format!(
            "product/ratings/{}",
            urlencoding::encode(product_id.as_str())
        );
        let request = self.basic(Method::GET, &path)?;
        self.send(request).await
    }

    /// Record that the buyer viewed a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn track_product_view(&self, product_id: &ProductId) -> Result<(), ApiError> {
        let path = format!(
            "product/view/{}",
            urlencoding::encode(product_id.as_str())
        );
        let request = self.basic(Method::POST, &path)?;
        let response: AckResponse = self.send(request).await?;
        check_envelope(response.status, response.error, &response.message)
    }
}
