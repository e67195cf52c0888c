//! FreshCart REST API client.
//!
//! # Architecture
//!
//! - `reqwest` with a cookie store; the server's session cookie identifies the user
//! - The server is the source of truth at session start; afterwards the client
//!   pushes its whole cart after every change
//! - In-memory caching via `moka` for the product list
//!
//! # Endpoints
//!
//! | method | path | use |
//! |---|---|---|
//! | `GET` | `/api/user/is-auth` | current user and stored cart (pull) |
//! | `POST` | `/api/cart/update` | replace the stored cart (push) |
//! | `GET` | `/api/product/list` | catalog for pricing |
//! | `POST` | `/api/user/login` | start a session |
//! | `GET` | `/api/user/logout` | end the session |
//!
//! # Example
//!
//! ```rust,ignore
//! use freshcart_storefront::api::ApiClient;
//!
//! let api = ApiClient::new(&config.api)?;
//! api.login(&email, &password).await?;
//! let user = api.current_user().await?.expect("signed in");
//! api.update_cart(&user.cart_items).await?;
//! ```

mod client;
mod conversions;
pub mod types;

pub use client::ApiClient;

use thiserror::Error;

use freshcart_core::UserId;

/// Errors that can occur when talking to the API server.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed (connection, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not the expected JSON.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Endpoint URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Server answered with a non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// Status code.
        status: u16,
        /// Body excerpt or server message.
        body: String,
    },

    /// Server answered `success: false`.
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// No authenticated session.
    #[error("Not signed in")]
    Unauthenticated,

    /// The server reports a different user than the one the request was made for.
    #[error("Session changed: expected user {expected}, server reports {actual}")]
    SessionMismatch {
        /// User the request was tagged with.
        expected: UserId,
        /// User the server answered for.
        actual: UserId,
    },
}

impl ApiError {
    /// Whether the failure happened before the server could answer.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_))
    }
}
