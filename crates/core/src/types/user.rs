//! The authenticated session user.

use serde::{Deserialize, Serialize};

use super::cart::Cart;
use super::id::UserId;

/// The user behind an authenticated session, as reported by the API.
///
/// `cart_items` is the server's stored cart at the moment the user object was
/// fetched; it is authoritative at session start only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    /// User id; doubles as the session identity for sync tagging.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Login email as stored by the server.
    pub email: String,
    /// Stored cart snapshot.
    #[serde(default)]
    pub cart_items: Cart,
}
