//! Storefront state shared by every front end.
//!
//! [`Storefront`] owns the service objects: the API client, the catalog with
//! its caches, the cart store, the image cache and the auth observer. It is
//! cheaply cloneable via `Arc`.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use bazaar_core::UserId;

use crate::api::{ApiClient, ApiError};
use crate::cache::{DiskImageStore, ImageCache, SessionCache};
use crate::cart::{AuthSnapshot, CartStore, CartSync, SessionKind, SyncAction};
use crate::catalog::CatalogService;
use crate::config::StorefrontConfig;
use crate::storage::{FileStore, KeyValueStore, MemoryStore, load_json, save_json};

/// Device storage key for the signed-in buyer.
pub const AUTH_STORAGE_KEY: &str = "auth-session";

/// A signed-in buyer. The token is issued by the marketplace login flow.
#[derive(Clone)]
pub struct AuthSession {
    pub user_id: UserId,
    pub token: SecretString,
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("user_id", &self.user_id)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedAuth {
    user_id: UserId,
    token: String,
}

/// Storefront services shared across commands.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    api: ApiClient,
    catalog: CatalogService,
    cart: CartStore<ApiClient>,
    images: ImageCache,
    device: Arc<dyn KeyValueStore>,
    sync: CartSync,
}

impl std::fmt::Debug for Storefront {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storefront")
            .field("cart", &self.inner.cart)
            .field("images", &self.inner.images)
            .finish_non_exhaustive()
    }
}

impl Storefront {
    /// Build the storefront with file-backed storage under `config.data_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &StorefrontConfig) -> Result<Self, ApiError> {
        let api = ApiClient::new(&config.api)?;
        let images = ImageCache::new(
            reqwest::Client::builder().timeout(config.api.timeout).build()?,
            Some(DiskImageStore::new(config.image_dir())),
        );
        Ok(Self::with_parts(
            api,
            Arc::new(FileStore::new(config.device_dir())),
            Arc::new(FileStore::new(config.session_dir())),
            images,
        ))
    }

    /// Build the storefront from its parts.
    #[must_use]
    pub fn with_parts(
        api: ApiClient,
        device: Arc<dyn KeyValueStore>,
        session: Arc<dyn KeyValueStore>,
        images: ImageCache,
    ) -> Self {
        let catalog = CatalogService::new(api.clone(), SessionCache::new(session));
        let cart = CartStore::new(api.clone(), Arc::clone(&device));

        Self {
            inner: Arc::new(StorefrontInner {
                api,
                catalog,
                cart,
                images,
                device,
                sync: CartSync::new(),
            }),
        }
    }

    /// Storefront with in-memory storage and no image store.
    #[must_use]
    pub fn in_memory(api: ApiClient) -> Self {
        Self::with_parts(
            api,
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
            ImageCache::new(reqwest::Client::new(), None),
        )
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogService {
        &self.inner.catalog
    }

    #[must_use]
    pub fn cart(&self) -> &CartStore<ApiClient> {
        &self.inner.cart
    }

    #[must_use]
    pub fn images(&self) -> &ImageCache {
        &self.inner.images
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// The persisted buyer session, if any.
    #[must_use]
    pub fn auth_session(&self) -> Option<AuthSession> {
        let persisted: PersistedAuth = load_json(self.inner.device.as_ref(), AUTH_STORAGE_KEY)?;
        Some(AuthSession {
            user_id: persisted.user_id,
            token: SecretString::from(persisted.token),
        })
    }

    /// Cart session kind for the current auth state.
    pub async fn session_kind(&self) -> SessionKind {
        SessionKind::from_authenticated(self.inner.api.has_token().await)
    }

    /// Restore a persisted session and sync the cart for it.
    pub async fn restore_session(&self) -> Option<SyncAction> {
        let Some(session) = self.auth_session() else {
            debug!("no persisted session");
            return self.observe(AuthSnapshot::signed_out()).await;
        };
        self.inner.api.set_token(session.token).await;
        self.observe(AuthSnapshot::signed_in(session.user_id)).await
    }

    /// Sign a buyer in and merge their guest cart.
    pub async fn sign_in(&self, session: AuthSession) -> Option<SyncAction> {
        save_json(
            self.inner.device.as_ref(),
            AUTH_STORAGE_KEY,
            &PersistedAuth {
                user_id: session.user_id.clone(),
                token: session.token.expose_secret().to_string(),
            },
        );
        self.inner.api.set_token(session.token).await;
        info!(user_id = %session.user_id, "signed in");
        self.observe(AuthSnapshot::signed_in(session.user_id)).await
    }

    /// Sign the buyer out and reset the cart.
    pub async fn sign_out(&self) -> Option<SyncAction> {
        if let Err(e) = self.inner.device.remove(AUTH_STORAGE_KEY) {
            debug!(error = %e, "failed to remove persisted session");
        }
        self.inner.api.clear_token().await;
        info!("signed out");
        self.observe(AuthSnapshot::signed_out()).await
    }

    async fn observe(&self, snapshot: AuthSnapshot) -> Option<SyncAction> {
        self.inner.sync.observe(&self.inner.cart, snapshot).await
    }
}
