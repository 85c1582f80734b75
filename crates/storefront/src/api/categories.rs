//! Category endpoints (Basic auth).

use reqwest::Method;
use tracing::instrument;

use super::types::{ApiCategoryData, ListResponse};
use super::{ApiClient, ApiError, check_envelope};

/// Query parameters for category listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoriesListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl CategoriesListParams {
    /// Everything the storefront shows in one request.
    pub const ALL: Self = Self {
        page: Some(1),
        per_page: Some(100),
    };

    fn to_query(self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(page) = self.page {
            query.push(("page", page.to_string()));
        }
        if let Some(per_page) = self.per_page {
            query.push(("perPage", per_page.to_string()));
        }
        query
    }
}

impl ApiClient {
    /// Get a page of categories.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or reports an error.
    #[instrument(skip(self))]
    pub async fn get_categories(
        &self,
        params: CategoriesListParams,
    ) -> Result<ListResponse<ApiCategoryData>, ApiError> {
        let request = self
            .basic(Method::GET, "category/items")?
            .query(&params.to_query());
        let response: ListResponse<ApiCategoryData> = self.send(request).await?;
        check_envelope(response.status, response.error, &response.message)?;
        Ok(response)
    }
}
