//! Server-facing operations the sync driver needs.

use std::future::Future;

use freshcart_core::{Cart, UserId};

use crate::api::{ApiClient, ApiError};

/// Where the stored cart lives.
///
/// Both operations must be idempotent: repeating a pull, or a push of the same
/// cart under the same session, leaves the server unchanged.
pub trait CartBackend: Send + Sync + 'static {
    /// Fetch the stored cart of `session`.
    fn pull(&self, session: &UserId) -> impl Future<Output = Result<Cart, ApiError>> + Send;

    /// Replace the stored cart of `session` with `cart`.
    fn push(
        &self,
        session: &UserId,
        cart: &Cart,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}

impl CartBackend for ApiClient {
    async fn pull(&self, session: &UserId) -> Result<Cart, ApiError> {
        match self.current_user().await? {
            None => Err(ApiError::Unauthenticated),
            Some(user) if &user.id != session => Err(ApiError::SessionMismatch {
                expected: session.clone(),
                actual: user.id,
            }),
            Some(user) => Ok(user.cart_items),
        }
    }

    // The session cookie identifies the cart server-side; `session` only
    // tags the request for the state machine.
    async fn push(&self, _session: &UserId, cart: &Cart) -> Result<(), ApiError> {
        self.update_cart(cart).await
    }
}
