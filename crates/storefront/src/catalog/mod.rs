//! Buyer-facing catalog: products, categories, ratings and deals.
//!
//! [`CatalogService`] wraps the [`ApiClient`] with the buyer listing rules
//! (active products only, client-side pagination, stale response discarding),
//! the category tree cache and the session cache.

pub mod conversions;
pub mod listing;
pub mod ratings;
pub mod services;
pub mod types;

pub use listing::{FETCH_ALL_PER_PAGE, ProductListing, RequestToken, paginate};
pub use ratings::RatingsBook;
pub use types::*;

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::Utc;
use moka::future::Cache;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use bazaar_core::{CategoryId, ProductId};

use crate::api::{
    ApiClient, ApiError, ApiProductData, CategoriesListParams, ListResponse, OrderRating,
    ProductsListParams, user_message,
};
use crate::cache::SessionCache;
use conversions::{
    convert_categories, convert_product, convert_product_summaries, convert_rating,
};
use services::combine_with_services;

/// How long the category tree is kept in memory.
const CATEGORY_MEMORY_TTL: Duration = Duration::from_secs(5 * 60);

/// Errors surfaced by catalog lookups.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("product not found: {0}")]
    NotFound(ProductId),

    /// The product exists but is not listed for buyers.
    #[error("product not available: {0}")]
    NotAvailable(ProductId),

    #[error("malformed product payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl CatalogError {
    /// Buyer-facing description of the error.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(e) => user_message(e),
            Self::NotFound(_) => "The requested item could not be found.".to_string(),
            Self::NotAvailable(_) => "Product not available".to_string(),
            Self::Payload(_) => "Received an unexpected response from the server.".to_string(),
        }
    }
}

/// Paging and search for a buyer listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    pub page: u32,
    pub per_page: u32,
    pub search: Option<String>,
}

impl Default for ListingQuery {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
            search: None,
        }
    }
}

impl ListingQuery {
    #[must_use]
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page,
            per_page,
            search: None,
        }
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
}

/// Catalog service.
///
/// Cheap to clone; clones share caches and the listing tokens.
#[derive(Clone)]
pub struct CatalogService {
    inner: Arc<CatalogInner>,
}

struct CatalogInner {
    api: ApiClient,
    session: SessionCache,
    /// Single-key cache; `get_with` makes concurrent loads share one fetch.
    categories: Cache<(), Arc<CategoryTree>>,
    /// Each listing is superseded only by a newer load of the same listing.
    home_listing: ProductListing,
    category_listing: ProductListing,
    ratings: RwLock<RatingsBook>,
}

impl CatalogService {
    #[must_use]
    pub fn new(api: ApiClient, session: SessionCache) -> Self {
        Self {
            inner: Arc::new(CatalogInner {
                api,
                session,
                categories: Cache::builder()
                    .max_capacity(1)
                    .time_to_live(CATEGORY_MEMORY_TTL)
                    .build(),
                home_listing: ProductListing::new(),
                category_listing: ProductListing::new(),
                ratings: RwLock::new(RatingsBook::new()),
            }),
        }
    }

    /// The session cache backing this service.
    #[must_use]
    pub fn session(&self) -> &SessionCache {
        &self.inner.session
    }

    // =========================================================================
    // Product listings
    // =========================================================================

    /// One server page of active products, cached per query signature.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        params: &ProductsListParams,
    ) -> Result<ProductPage, CatalogError> {
        let params = ProductsListParams {
            active_only: true,
            ..params.clone()
        };
        let cache_key = params.cache_key();
        if let Some(page) = self.inner.session.get_products(&cache_key) {
            return Ok(page);
        }

        let response = self.inner.api.get_products(&params).await?;
        let page = ProductPage {
            products: convert_product_summaries(response.data, Utc::now()),
            pagination: response.pagination,
        };
        self.inner.session.save_products(&cache_key, &page);
        Ok(page)
    }

    /// Every active product matching `search` (and `category`), fetched page
    /// by page and filtered client-side.
    ///
    /// # Errors
    ///
    /// Returns an error if any page request fails.
    #[instrument(skip(self))]
    pub async fn fetch_all_active(
        &self,
        category: Option<&CategoryId>,
        search: Option<&str>,
    ) -> Result<Vec<ProductSummary>, CatalogError> {
        let mut params = ProductsListParams::active()
            .per_page(FETCH_ALL_PER_PAGE)
            .search(search);
        if let Some(category) = category {
            params = params.category(category.clone());
        }
        let cache_key = format!("all:{}", params.cache_key());
        if let Some(page) = self.inner.session.get_products(&cache_key) {
            return Ok(page.products);
        }

        let first = self.fetch_page(category, &params, 1).await?;
        let total_pages = first.pagination.total_pages.max(1);
        let mut active = keep_active(first.data);

        for page in 2..=total_pages {
            let response = self.fetch_page(category, &params, page).await?;
            active.extend(keep_active(response.data));
        }

        let products = convert_product_summaries(active, Utc::now());
        debug!(count = products.len(), "loaded active catalog");
        self.inner
            .session
            .save_products(&cache_key, &paginate(&products, 1, u32::MAX));
        Ok(products)
    }

    async fn fetch_page(
        &self,
        category: Option<&CategoryId>,
        params: &ProductsListParams,
        page: u32,
    ) -> Result<ListResponse<ApiProductData>, ApiError> {
        let params = params.clone().page(page);
        match category {
            Some(category) => self.inner.api.get_products_by_category(category, &params).await,
            None => self.inner.api.get_products(&params).await,
        }
    }

    /// Buyer listing over all active products, paginated client-side.
    ///
    /// Returns `Ok(None)` when a newer load of this listing started while
    /// this one was in flight. Category listings do not supersede it.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be fetched and this load is
    /// still current.
    pub async fn active_products(
        &self,
        query: &ListingQuery,
    ) -> Result<Option<ProductPage>, CatalogError> {
        let listing = &self.inner.home_listing;
        let token = listing.begin();
        let result = self.fetch_all_active(None, query.search.as_deref()).await;
        finish_listing(listing, token, result, query)
    }

    /// Buyer listing for one category. No category yields an empty listing.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be fetched and this load is
    /// still current.
    pub async fn products_by_category(
        &self,
        category: Option<&CategoryId>,
        query: &ListingQuery,
    ) -> Result<Option<ProductPage>, CatalogError> {
        let listing = &self.inner.category_listing;
        let token = listing.begin();
        let Some(category) = category else {
            return Ok(Some(ProductPage::empty(query.per_page.max(1))));
        };
        let result = self
            .fetch_all_active(Some(category), query.search.as_deref())
            .await;
        finish_listing(listing, token, result, query)
    }

    /// Active products carrying a discount, at most `limit`.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be fetched.
    pub async fn flash_deals(&self, limit: usize) -> Result<Vec<ProductSummary>, CatalogError> {
        let products = self.fetch_all_active(None, None).await?;
        Ok(products
            .into_iter()
            .filter(|p| p.price.is_deal())
            .take(limit)
            .collect())
    }

    // =========================================================================
    // Product detail
    // =========================================================================

    /// Full product detail with reviews when available.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] for deleted products,
    /// [`CatalogError::NotAvailable`] for inactive ones, or the API error.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn product(&self, product_id: &ProductId) -> Result<Product, CatalogError> {
        if let Some(product) = self.inner.session.get_product(product_id) {
            debug!("session cache hit for product detail");
            return Ok(product);
        }

        let response = self.inner.api.get_product(product_id).await?;
        let dto = response
            .into_product()?
            .ok_or_else(|| CatalogError::NotFound(product_id.clone()))?;
        if !dto.is_active() {
            return Err(CatalogError::NotAvailable(product_id.clone()));
        }

        let mut product = convert_product(dto, Utc::now());
        product.reviews = self.product_reviews(product_id).await;
        self.inner.session.save_product(&product);
        Ok(product)
    }

    /// Reviews from the ratings endpoint, else from recorded order ratings.
    pub async fn product_reviews(&self, product_id: &ProductId) -> Option<ProductReviews> {
        match self.inner.api.get_product_ratings(product_id).await {
            Ok(response) if !response.error => {
                if let Some(reviews) = response.data.as_ref().and_then(convert_rating) {
                    return Some(reviews);
                }
            }
            Ok(response) => debug!(message = %response.message, "ratings unavailable"),
            Err(e) => debug!(error = %e, "ratings request failed"),
        }
        self.inner
            .ratings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .rating(product_id)
    }

    /// Fold ratings from a delivered order into the local aggregate.
    pub fn record_order_ratings(&self, ratings: &[OrderRating]) {
        self.inner
            .ratings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .record_order_ratings(ratings);
    }

    /// Record a product view. Failures are logged and otherwise ignored.
    pub async fn track_view(&self, product_id: &ProductId) {
        if let Err(e) = self.inner.api.track_product_view(product_id).await {
            warn!(product_id = %product_id, error = %e, "failed to record product view");
        }
    }

    // =========================================================================
    // Categories
    // =========================================================================

    /// The category tree, including the services sub-tree.
    ///
    /// Served from memory for five minutes, then from the session cache, then
    /// fetched. Concurrent callers share one fetch. On API failure only the
    /// services sub-tree is returned.
    pub async fn categories(&self) -> Arc<CategoryTree> {
        self.inner
            .categories
            .get_with((), self.load_categories())
            .await
    }

    /// Drop cached categories and fetch them again.
    pub async fn refresh_categories(&self) -> Arc<CategoryTree> {
        self.inner.categories.invalidate(&()).await;
        let tree = Arc::new(self.fetch_categories().await);
        self.inner.categories.insert((), Arc::clone(&tree)).await;
        tree
    }

    async fn load_categories(&self) -> Arc<CategoryTree> {
        if let Some(categories) = self.inner.session.load_categories() {
            debug!("session cache hit for categories");
            return Arc::new(CategoryTree::new(categories));
        }
        Arc::new(self.fetch_categories().await)
    }

    #[instrument(skip(self))]
    async fn fetch_categories(&self) -> CategoryTree {
        match self.inner.api.get_categories(CategoriesListParams::ALL).await {
            Ok(response) => {
                let categories = combine_with_services(convert_categories(response.data));
                self.inner.session.save_categories(&categories);
                CategoryTree::new(categories)
            }
            Err(e) => {
                warn!(error = %e, "category fetch failed, showing services only");
                CategoryTree::new(combine_with_services(Vec::new()))
            }
        }
    }
}

fn keep_active(products: Vec<ApiProductData>) -> Vec<ApiProductData> {
    products.into_iter().filter(ApiProductData::is_active).collect()
}

fn finish_listing(
    listing: &ProductListing,
    token: RequestToken,
    result: Result<Vec<ProductSummary>, CatalogError>,
    query: &ListingQuery,
) -> Result<Option<ProductPage>, CatalogError> {
    match listing.accept(token, result) {
        Some(Ok(products)) => Ok(Some(paginate(&products, query.page, query.per_page))),
        Some(Err(e)) => Err(e),
        None => Ok(None),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use httpmock::MockServer;
    use serde_json::{Value, json};

    use super::*;
    use crate::api::tests::test_config;
    use crate::storage::MemoryStore;

    fn service(server: &MockServer) -> CatalogService {
        let api = ApiClient::new(&test_config(&server.base_url())).unwrap();
        CatalogService::new(api, SessionCache::new(Arc::new(MemoryStore::new())))
    }

    fn product(id: &str, active: &str) -> Value {
        json!({
            "productId": id,
            "productName": format!("Product {id}"),
            "categoryId": "c1",
            "unitPrice": "1000",
            "discountValue": "0",
            "discountPrice": "1000",
            "stock": "5",
            "minStock": "1",
            "images": [format!("https://cdn.example.com/{id}.jpg")],
            "isActive": active
        })
    }

    fn list(data: Vec<Value>, page: u32, total_pages: u32) -> Value {
        json!({
            "status": 200,
            "error": false,
            "message": "ok",
            "data": data,
            "pagination": {"currentPage": page, "perPage": 100, "totalPages": total_pages, "totalItems": 0}
        })
    }

    #[tokio::test]
    async fn test_active_products_fetches_all_pages_and_filters() {
        let server = MockServer::start();
        let page1 = server.mock(|when, then| {
            when.method("GET")
                .path("/product/items")
                .query_param("page", "1")
                .query_param("perPage", "100")
                .query_param("isActive", "1");
            then.status(200).json_body(list(
                vec![product("p1", "1"), product("p2", "0"), product("p3", "1")],
                1,
                2,
            ));
        });
        let page2 = server.mock(|when, then| {
            when.method("GET")
                .path("/product/items")
                .query_param("page", "2");
            then.status(200)
                .json_body(list(vec![product("p4", "1")], 2, 2));
        });

        let catalog = service(&server);
        let page = catalog
            .active_products(&ListingQuery::new(2, 2))
            .await
            .unwrap()
            .unwrap();

        page1.assert();
        page2.assert();
        assert_eq!(page.pagination.total_items, 3);
        assert_eq!(page.pagination.total_pages, 2);
        assert_eq!(page.products.len(), 1);
        assert_eq!(page.products[0].id.as_str(), "p4");

        // Second load is served from the session cache
        catalog.active_products(&ListingQuery::new(1, 2)).await.unwrap();
        page1.assert_calls(1);
    }

    #[tokio::test]
    async fn test_products_by_category_without_category_is_empty() {
        let server = MockServer::start();
        let catalog = service(&server);
        let page = catalog
            .products_by_category(None, &ListingQuery::new(1, 12))
            .await
            .unwrap()
            .unwrap();
        assert!(page.products.is_empty());
        assert_eq!(page.pagination.per_page, 12);
        assert_eq!(page.pagination.total_pages, 1);
    }

    #[tokio::test]
    async fn test_superseded_listing_is_discarded() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("GET")
                .path("/product/items")
                .query_param("search", "slow");
            then.status(200)
                .delay(std::time::Duration::from_millis(200))
                .json_body(list(vec![product("p1", "1")], 1, 1));
        });
        server.mock(|when, then| {
            when.method("GET")
                .path("/product/items")
                .query_param("search", "fast");
            then.status(200)
                .json_body(list(vec![product("p2", "1")], 1, 1));
        });

        let catalog = service(&server);
        let slow_query = ListingQuery::default().search(Some("slow"));
        let fast_query = ListingQuery::default().search(Some("fast"));
        let slow = catalog.active_products(&slow_query);
        let fast = async {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            catalog.active_products(&fast_query).await
        };
        let (slow, fast) = tokio::join!(slow, fast);

        assert!(slow.unwrap().is_none());
        assert_eq!(fast.unwrap().unwrap().products[0].id.as_str(), "p2");
    }

    #[tokio::test]
    async fn test_category_listing_does_not_supersede_home_listing() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("GET").path("/product/items");
            then.status(200)
                .delay(std::time::Duration::from_millis(200))
                .json_body(list(vec![product("p1", "1")], 1, 1));
        });
        server.mock(|when, then| {
            when.method("GET").path("/product/category/c1/items");
            then.status(200)
                .json_body(list(vec![product("p2", "1")], 1, 1));
        });

        let catalog = service(&server);
        let category = CategoryId::new("c1");
        let query = ListingQuery::default();
        let home = catalog.active_products(&query);
        let by_category = async {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            catalog.products_by_category(Some(&category), &query).await
        };
        let (home, by_category) = tokio::join!(home, by_category);

        assert_eq!(home.unwrap().unwrap().products[0].id.as_str(), "p1");
        assert_eq!(by_category.unwrap().unwrap().products[0].id.as_str(), "p2");
    }

    #[tokio::test]
    async fn test_inactive_product_not_available() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("GET").path("/product/item-info/p2");
            then.status(200)
                .json_body(json!({"status": 200, "message": "ok", "data": product("p2", "0")}));
        });

        let err = service(&server)
            .product(&ProductId::new("p2"))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::NotAvailable(_)));
        assert_eq!(err.user_message(), "Product not available");
    }

    #[tokio::test]
    async fn test_product_detail_attaches_ratings_and_caches() {
        let server = MockServer::start();
        let detail = server.mock(|when, then| {
            when.method("GET").path("/product/item-info/p1");
            then.status(200)
                .json_body(json!({"status": 200, "message": "ok", "data": product("p1", "1")}));
        });
        server.mock(|when, then| {
            when.method("GET").path("/product/ratings/p1");
            then.status(200).json_body(json!({
                "status": 200,
                "error": false,
                "data": {"totalRating": "4.2", "ratingCount": "7"}
            }));
        });

        let catalog = service(&server);
        let product = catalog.product(&ProductId::new("p1")).await.unwrap();
        assert_eq!(product.reviews.unwrap().total, 7);

        catalog.product(&ProductId::new("p1")).await.unwrap();
        detail.assert_calls(1);
    }

    #[tokio::test]
    async fn test_reviews_fall_back_to_order_ratings() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("GET").path("/product/ratings/p1");
            then.status(200).json_body(json!({
                "status": 200,
                "error": false,
                "data": {"totalRating": "0", "ratingCount": "0"}
            }));
        });

        let catalog = service(&server);
        assert!(catalog.product_reviews(&ProductId::new("p1")).await.is_none());

        let ratings: Vec<OrderRating> =
            serde_json::from_value(json!([{"productId": "p1", "rating": 3}])).unwrap();
        catalog.record_order_ratings(&ratings);
        assert_eq!(
            catalog.product_reviews(&ProductId::new("p1")).await.unwrap().total,
            1
        );
    }

    #[tokio::test]
    async fn test_categories_shared_fetch_and_services_merge() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method("GET")
                .path("/category/items")
                .query_param("page", "1")
                .query_param("perPage", "100");
            then.status(200)
                .delay(std::time::Duration::from_millis(50))
                .json_body(json!({
                    "status": 200,
                    "error": false,
                    "data": [
                        {"categoryId": "c1", "categoryName": "Fashion", "level": "1"},
                        {"categoryId": "c2", "categoryName": "Shoes", "parentId": "c1", "level": "2"}
                    ]
                }));
        });

        let catalog = service(&server);
        let (a, b) = tokio::join!(catalog.categories(), catalog.categories());

        mock.assert_calls(1);
        assert_eq!(a, b);
        let main: Vec<_> = a.main_categories().map(|c| c.id.as_str()).collect();
        assert_eq!(main, vec!["c1", "services"]);
        assert_eq!(a.subcategories("c1").count(), 1);
        assert!(a.services_subcategories().count() > 0);
    }

    #[tokio::test]
    async fn test_categories_fall_back_to_services() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("GET").path("/category/items");
            then.status(500);
        });

        let tree = service(&server).categories().await;
        assert!(tree.categories.iter().all(|c| {
            c.id.as_str() == "services"
                || c.parent_id.as_ref().map(CategoryId::as_str) == Some("services")
        }));
    }

    #[tokio::test]
    async fn test_flash_deals_only_discounted() {
        let server = MockServer::start();
        let mut deal = product("p9", "1");
        deal["discountValue"] = json!("10");
        deal["discountPrice"] = json!("900");
        server.mock(|when, then| {
            when.method("GET").path("/product/items");
            then.status(200)
                .json_body(list(vec![product("p1", "1"), deal], 1, 1));
        });

        let deals = service(&server).flash_deals(8).await.unwrap();
        assert_eq!(deals.len(), 1);
        assert_eq!(deals[0].id.as_str(), "p9");
    }
}
