//! Product catalog as seen by the cart.
//!
//! The cart only ever reads offer prices from here; the catalog itself is
//! owned and managed elsewhere.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;

/// A product listed by the storefront.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Product id, the key used in carts.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Category slug.
    pub category: String,
    /// List price, shown struck through when an offer applies.
    pub price: Decimal,
    /// Price actually charged.
    pub offer_price: Decimal,
    /// Whether the product can currently be bought.
    pub in_stock: bool,
}

impl Product {
    /// A minimal in-stock product whose list and offer price are equal.
    #[must_use]
    pub fn priced(id: ProductId, offer_price: Decimal) -> Self {
        Self {
            name: id.to_string(),
            id,
            category: String::new(),
            price: offer_price,
            offer_price,
            in_stock: true,
        }
    }
}

/// Products indexed by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    products: HashMap<ProductId, Product>,
}

impl Catalog {
    /// Look up a product.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Product> {
        self.products.get(id)
    }

    /// Offer price for `id`, if the catalog knows the product.
    #[must_use]
    pub fn offer_price(&self, id: &str) -> Option<Decimal> {
        self.get(id).map(|p| p.offer_price)
    }

    /// Number of products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.products.len()
    }

    /// Whether the catalog is empty (e.g., not loaded yet).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Products sorted by name, for listing.
    #[must_use]
    pub fn sorted(&self) -> Vec<&Product> {
        let mut products: Vec<&Product> = self.products.values().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        products
    }
}

impl FromIterator<Product> for Catalog {
    fn from_iter<I: IntoIterator<Item = Product>>(iter: I) -> Self {
        Self {
            products: iter.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_offer_price_lookup() {
        let catalog: Catalog = [Product::priced(ProductId::from("p1"), Decimal::new(499, 2))]
            .into_iter()
            .collect();

        assert_eq!(catalog.offer_price("p1"), Some(Decimal::new(499, 2)));
        assert_eq!(catalog.offer_price("p2"), None);
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_sorted_by_name() {
        let mut apple = Product::priced(ProductId::from("2"), Decimal::ONE);
        apple.name = "Apple".to_string();
        let mut bread = Product::priced(ProductId::from("1"), Decimal::ONE);
        bread.name = "Bread".to_string();

        let catalog: Catalog = [bread, apple].into_iter().collect();
        let names: Vec<&str> = catalog.sorted().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Apple", "Bread"]);
    }
}
