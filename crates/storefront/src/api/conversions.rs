//! Wire type to domain type conversions.

use freshcart_core::{Catalog, Product, SessionUser};

use super::types::{ProductDto, UserDto};

pub fn convert_user(user: UserDto) -> SessionUser {
    SessionUser {
        id: user.id,
        name: user.name,
        email: user.email,
        cart_items: user.cart_items,
    }
}

pub fn convert_product(product: ProductDto) -> Product {
    Product {
        id: product.id,
        name: product.name,
        category: product.category,
        price: product.price,
        offer_price: product.offer_price,
        in_stock: product.in_stock,
    }
}

pub fn convert_catalog(products: Vec<ProductDto>) -> Catalog {
    products.into_iter().map(convert_product).collect()
}
