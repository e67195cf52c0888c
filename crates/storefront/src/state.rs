//! Storefront client state shared across the shell.

use std::sync::Arc;

use crate::api::{ApiClient, ApiError};
use crate::cart_store::CartStore;
use crate::config::StorefrontConfig;
use crate::services::auth::AuthService;
use crate::services::catalog::CatalogService;
use crate::sync::SyncController;

/// Everything a running storefront client needs, wired together.
///
/// This struct is cheaply cloneable via `Arc`. Each instance owns its own
/// cart and session; tests build one per case.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    config: StorefrontConfig,
    api: ApiClient,
    cart: CartStore,
    auth: AuthService,
    sync: SyncController,
}

impl Storefront {
    /// Create a storefront client and start cart sync.
    ///
    /// Starts signed out; call `auth().restore()` or `auth().login(..)` next.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn new(config: StorefrontConfig) -> Result<Self, ApiError> {
        let api = ApiClient::new(&config.api)?;
        let cart = CartStore::new();
        let auth = AuthService::new(api.clone());
        let sync = SyncController::spawn(Arc::new(api.clone()), cart.clone(), auth.session());

        Ok(Self {
            inner: Arc::new(StorefrontInner {
                config,
                api,
                cart,
                auth,
                sync,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the API client.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    /// Get a reference to the cart store.
    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.inner.cart
    }

    /// Get a reference to the authentication service.
    #[must_use]
    pub fn auth(&self) -> &AuthService {
        &self.inner.auth
    }

    /// Get a reference to the cart sync controller.
    #[must_use]
    pub fn sync(&self) -> &SyncController {
        &self.inner.sync
    }

    /// Catalog lookups priced in the configured currency.
    #[must_use]
    pub fn catalog(&self) -> CatalogService<'_> {
        CatalogService::new(&self.inner.api, self.inner.config.currency)
    }
}
