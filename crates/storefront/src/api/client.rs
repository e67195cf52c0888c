//! HTTP client for the FreshCart API.

use std::sync::Arc;

use moka::future::Cache;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use freshcart_core::{Cart, Catalog, Email, SessionUser};

use super::ApiError;
use super::conversions::{convert_catalog, convert_user};
use super::types::{
    CartUpdateRequest, IsAuthResponse, LoginRequest, MessageResponse, ProductListResponse,
};
use crate::config::ApiConfig;

const IS_AUTH_PATH: &str = "api/user/is-auth";
const CART_UPDATE_PATH: &str = "api/cart/update";
const PRODUCT_LIST_PATH: &str = "api/product/list";
const LOGIN_PATH: &str = "api/user/login";
const LOGOUT_PATH: &str = "api/user/logout";

const CATALOG_CACHE_KEY: &str = "products:list";

/// Longest body excerpt carried in errors and logs.
const BODY_EXCERPT_CHARS: usize = 200;

/// Client for the FreshCart REST API.
///
/// Cheap to clone; clones share one connection pool, one cookie jar (and so
/// one session) and one product cache.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    catalog: Cache<String, Catalog>,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Http` if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.request_timeout)
            .build()?;

        let catalog = Cache::builder()
            .max_capacity(1)
            .time_to_live(config.catalog_ttl)
            .build();

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.base_url.clone(),
                catalog,
            }),
        })
    }

    /// Base URL this client talks to.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.inner.base_url.join(path)?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.inner.client.get(self.endpoint(path)?).send().await?;
        read_json(response).await
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self
            .inner
            .client
            .post(self.endpoint(path)?)
            .json(body)
            .send()
            .await?;
        read_json(response).await
    }

    // =========================================================================
    // Session & Cart
    // =========================================================================

    /// Fetch the signed-in user together with the stored cart.
    ///
    /// Returns `Ok(None)` when the server reports no session.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or an unreadable response.
    #[instrument(skip(self))]
    pub async fn current_user(&self) -> Result<Option<SessionUser>, ApiError> {
        let response: IsAuthResponse = match self.get(IS_AUTH_PATH).await {
            Ok(response) => response,
            Err(ApiError::Status { status, .. })
                if status == StatusCode::UNAUTHORIZED.as_u16() =>
            {
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if !response.success {
            debug!(message = ?response.message, "No authenticated session");
            return Ok(None);
        }

        let user = response.user.map(convert_user);
        if let Some(user) = &user {
            debug!(user = %user.id, items = user.cart_items.count(), "Fetched session user");
        }
        Ok(user)
    }

    /// Replace the stored cart with `cart`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Rejected` with the server's message if it answers
    /// `success: false`, or a transport error.
    #[instrument(skip(self, cart), fields(lines = cart.len(), items = cart.count()))]
    pub async fn update_cart(&self, cart: &Cart) -> Result<(), ApiError> {
        let body = CartUpdateRequest {
            cart_items: cart.clone(),
        };
        let response: MessageResponse = self.post(CART_UPDATE_PATH, &body).await?;
        ensure_success(response.success, response.message)
    }

    // =========================================================================
    // Catalog (cached)
    // =========================================================================

    /// Fetch the product list, serving from cache while it is fresh.
    ///
    /// # Errors
    ///
    /// Returns an error if the product list cannot be fetched.
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Catalog, ApiError> {
        if let Some(catalog) = self.inner.catalog.get(CATALOG_CACHE_KEY).await {
            debug!("Cache hit for product list");
            return Ok(catalog);
        }

        let response: ProductListResponse = self.get(PRODUCT_LIST_PATH).await?;
        ensure_success(response.success, response.message)?;

        let catalog = convert_catalog(response.products);
        debug!(products = catalog.len(), "Fetched product list");

        self.inner
            .catalog
            .insert(CATALOG_CACHE_KEY.to_string(), catalog.clone())
            .await;

        Ok(catalog)
    }

    /// Drop the cached product list so the next lookup refetches it.
    pub async fn invalidate_catalog(&self) {
        self.inner.catalog.invalidate(CATALOG_CACHE_KEY).await;
    }

    // =========================================================================
    // Login / Logout
    // =========================================================================

    /// Start a session. The session cookie lands in the client's cookie jar.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Rejected` for bad credentials, or a transport error.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(&self, email: &Email, password: &SecretString) -> Result<(), ApiError> {
        let body = LoginRequest {
            email: email.as_str(),
            password: password.expose_secret(),
        };
        let response: MessageResponse = self.post(LOGIN_PATH, &body).await?;
        ensure_success(response.success, response.message)
    }

    /// End the session.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Rejected` if the server refuses, or a transport error.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), ApiError> {
        let response: MessageResponse = self.get(LOGOUT_PATH).await?;
        ensure_success(response.success, response.message)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Read a response body as JSON, turning non-2xx statuses into errors.
async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    // Read the body as text first for better error diagnostics
    let body = response.text().await?;

    if !status.is_success() {
        tracing::warn!(
            status = %status,
            body = %excerpt(&body),
            "API returned non-success status"
        );
        // Prefer the server's own message when the body is an envelope
        let message = serde_json::from_str::<MessageResponse>(&body)
            .ok()
            .and_then(|r| r.message)
            .unwrap_or_else(|| excerpt(&body));
        return Err(ApiError::Status {
            status: status.as_u16(),
            body: message,
        });
    }

    serde_json::from_str(&body).map_err(|e| {
        tracing::error!(
            error = %e,
            body = %excerpt(&body),
            "Failed to parse API response"
        );
        ApiError::Parse(e)
    })
}

fn ensure_success(success: bool, message: Option<String>) -> Result<(), ApiError> {
    if success {
        Ok(())
    } else {
        Err(ApiError::Rejected(
            message.unwrap_or_else(|| "request failed".to_string()),
        ))
    }
}

fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_success_carries_server_message() {
        assert!(ensure_success(true, None).is_ok());

        let err = ensure_success(false, Some("Out of stock".to_string()));
        assert!(matches!(err, Err(ApiError::Rejected(m)) if m == "Out of stock"));

        let err = ensure_success(false, None);
        assert!(matches!(err, Err(ApiError::Rejected(m)) if m == "request failed"));
    }

    #[test]
    fn test_excerpt_truncates_long_bodies() {
        let body = "x".repeat(1000);
        assert_eq!(excerpt(&body).len(), BODY_EXCERPT_CHARS);
        assert_eq!(excerpt("short"), "short");
    }
}
