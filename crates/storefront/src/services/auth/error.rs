//! Authentication error types.

use thiserror::Error;

use crate::api::ApiError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] freshcart_core::EmailError),

    /// The server refused the email/password pair.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Login succeeded but the server reports no session afterwards.
    #[error("session was not established")]
    SessionNotEstablished,

    /// API request failed.
    #[error("api error: {0}")]
    Api(#[from] ApiError),
}
