//! Pricing the cart against the product list.

use rust_decimal::Decimal;

use freshcart_core::{Cart, Catalog, CurrencyCode, Price, ProductId, truncate_to_cents};

use crate::api::{ApiClient, ApiError};
use crate::cart_store::CartStore;

/// One priced cart line, for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub id: ProductId,
    /// Product name, `None` if the product is not in the catalog.
    pub name: Option<String>,
    pub quantity: u32,
    pub unit_price: Option<Price>,
    /// Zero for products missing from the catalog.
    pub subtotal: Price,
}

/// Catalog lookups, priced in one currency.
pub struct CatalogService<'a> {
    api: &'a ApiClient,
    currency: CurrencyCode,
}

impl<'a> CatalogService<'a> {
    #[must_use]
    pub const fn new(api: &'a ApiClient, currency: CurrencyCode) -> Self {
        Self { api, currency }
    }

    /// The current product list (cached by the client).
    ///
    /// # Errors
    ///
    /// Returns an error if the product list cannot be fetched.
    pub async fn catalog(&self) -> Result<Catalog, ApiError> {
        self.api.list_products().await
    }

    /// Cart total at offer prices.
    ///
    /// # Errors
    ///
    /// Returns an error if the product list cannot be fetched.
    pub async fn total(&self, store: &CartStore) -> Result<Price, ApiError> {
        let catalog = self.catalog().await?;
        Ok(Price::new(store.total_amount(&catalog), self.currency))
    }

    /// Price every line of `cart`.
    ///
    /// # Errors
    ///
    /// Returns an error if the product list cannot be fetched.
    pub async fn lines(&self, cart: &Cart) -> Result<Vec<CartLine>, ApiError> {
        let catalog = self.catalog().await?;
        Ok(price_lines(cart, &catalog, self.currency))
    }
}

fn price_lines(cart: &Cart, catalog: &Catalog, currency: CurrencyCode) -> Vec<CartLine> {
    cart.iter()
        .map(|(id, quantity)| {
            let product = catalog.get(id.as_str());
            let unit = product.map(|p| p.offer_price);
            let subtotal = unit.map_or(Decimal::ZERO, |u| {
                truncate_to_cents(u * Decimal::from(quantity))
            });
            CartLine {
                id: id.clone(),
                name: product.map(|p| p.name.clone()),
                quantity,
                unit_price: unit.map(|u| Price::new(u, currency)),
                subtotal: Price::new(subtotal, currency),
            }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;
    use freshcart_core::Product;

    #[test]
    fn test_price_lines_tolerates_catalog_miss() {
        let cart: Cart = [(ProductId::from("a"), 3), (ProductId::from("ghost"), 1)]
            .into_iter()
            .collect();
        let catalog: Catalog = [Product::priced("a".into(), Decimal::new(3333, 3))]
            .into_iter()
            .collect();

        let lines = price_lines(&cart, &catalog, CurrencyCode::USD);

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].subtotal.amount, Decimal::new(999, 2));
        assert_eq!(lines[1].name, None);
        assert_eq!(lines[1].subtotal.amount, Decimal::ZERO);
    }
}
