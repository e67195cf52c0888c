//! Wire types for the FreshCart REST API.
//!
//! Every endpoint answers with a JSON envelope carrying `success` and, on
//! failure, a human-readable `message`. Field names follow the server's
//! camelCase document shape (`_id`, `cartItems`, `offerPrice`).
//!
//! These types are public so that test servers can speak the same contract.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use freshcart_core::{Cart, ProductId, UserId};

/// Envelope with no payload beyond the status and message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `GET /api/user/is-auth` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IsAuthResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserDto>,
}

/// `GET /api/product/list` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductListResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub products: Vec<ProductDto>,
}

/// User document as returned by the server (password omitted).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDto {
    #[serde(rename = "_id")]
    pub id: UserId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(rename = "cartItems", default)]
    pub cart_items: Cart,
}

/// Product document as returned by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDto {
    #[serde(rename = "_id")]
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub offer_price: Decimal,
    #[serde(default = "default_in_stock")]
    pub in_stock: bool,
}

const fn default_in_stock() -> bool {
    true
}

/// `POST /api/cart/update` request body: the entire cart, never a diff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartUpdateRequest {
    #[serde(rename = "cartItems")]
    pub cart_items: Cart,
}

/// `POST /api/user/login` request body.
///
/// The password is borrowed from a `SecretString` only for the duration of
/// serialization.
#[derive(Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_auth_response_with_cart() {
        let body = json!({
            "success": true,
            "user": {
                "_id": "u1",
                "name": "Ada",
                "email": "ada@example.com",
                "cartItems": { "p1": 3, "p2": 0 }
            }
        });

        let parsed: IsAuthResponse = serde_json::from_value(body).unwrap();
        let user = parsed.user.unwrap();
        assert_eq!(user.id.as_str(), "u1");
        assert_eq!(user.cart_items.quantity("p1"), 3);
        // Zero quantities are dropped on decode.
        assert_eq!(user.cart_items.len(), 1);
    }

    #[test]
    fn test_is_auth_response_anonymous() {
        let parsed: IsAuthResponse =
            serde_json::from_value(json!({ "success": false, "message": "Not Authorized" }))
                .unwrap();
        assert!(!parsed.success);
        assert!(parsed.user.is_none());
        assert_eq!(parsed.message.as_deref(), Some("Not Authorized"));
    }

    #[test]
    fn test_product_prices_are_json_numbers() {
        let body = json!({
            "_id": "p1",
            "name": "Organic Bananas",
            "category": "Fruits",
            "price": 12.5,
            "offerPrice": 9.999
        });

        let product: ProductDto = serde_json::from_value(body).unwrap();
        assert_eq!(product.offer_price.to_string(), "9.999");
        assert!(product.in_stock);

        let back = serde_json::to_value(&product).unwrap();
        assert_eq!(back["offerPrice"], json!(9.999));
    }

    #[test]
    fn test_cart_update_request_shape() {
        let cart: Cart = [(ProductId::from("p1"), 2)].into_iter().collect();
        let body = serde_json::to_value(CartUpdateRequest { cart_items: cart }).unwrap();
        assert_eq!(body, json!({ "cartItems": { "p1": 2 } }));
    }
}
