//! One-shot catalog listing.
//!
//! # Usage
//!
//! ```bash
//! fc-cli catalog
//! ```

use freshcart_core::Price;
use freshcart_storefront::Storefront;
use freshcart_storefront::error::Result;

/// Print every product with its offer price.
///
/// # Errors
///
/// Returns an error if the product list cannot be fetched.
pub async fn list(storefront: &Storefront) -> Result<()> {
    let catalog = storefront.catalog().catalog().await?;
    let currency = storefront.config().currency;
    tracing::info!(
        products = catalog.len(),
        currency = currency.code(),
        "Fetched catalog"
    );

    for product in catalog.sorted() {
        println!(
            "{:<26} {:<32} {:<12} {:>10}{}",
            product.id.as_str(),
            product.name,
            product.category,
            Price::new(product.offer_price, currency).to_string(),
            if product.in_stock { "" } else { "  (out of stock)" }
        );
    }
    Ok(())
}
