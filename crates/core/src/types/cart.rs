//! The shopping cart snapshot and its mutations.
//!
//! A [`Cart`] maps product ids to positive quantities. The invariant that no
//! entry ever holds a quantity of zero or less is enforced here, by every
//! mutation and by deserialization, so holders of a `Cart` never have to
//! re-check it.
//!
//! On the wire the cart is a plain JSON object, e.g. `{"66a1": 2, "66b7": 1}`.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::catalog::Catalog;
use super::id::ProductId;
use super::price::truncate_to_cents;

/// A single mutation applied to a cart snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartOp {
    /// Increment by one, inserting at one if absent.
    Add(ProductId),
    /// Set an exact quantity; zero or less removes the line.
    SetQuantity(ProductId, i64),
    /// Decrement by one, deleting the line when it reaches zero.
    Remove(ProductId),
}

/// A complete cart snapshot: product id to quantity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<ProductId, i64>", into = "BTreeMap<ProductId, u32>")]
pub struct Cart {
    lines: BTreeMap<ProductId, u32>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lines: BTreeMap::new(),
        }
    }

    /// Apply a mutation in place.
    ///
    /// Returns `true` if the snapshot changed. Removing an absent product and
    /// setting a quantity to its current value are no-ops.
    pub fn apply(&mut self, op: &CartOp) -> bool {
        match op {
            CartOp::Add(id) => {
                let quantity = self.lines.entry(id.clone()).or_insert(0);
                let next = quantity.saturating_add(1);
                let changed = next != *quantity;
                *quantity = next;
                changed
            }
            CartOp::SetQuantity(id, quantity) => self.set(id, *quantity),
            CartOp::Remove(id) => match self.lines.entry(id.clone()) {
                Entry::Vacant(_) => false,
                Entry::Occupied(mut line) => {
                    if *line.get() <= 1 {
                        line.remove();
                    } else {
                        *line.get_mut() -= 1;
                    }
                    true
                }
            },
        }
    }

    /// Return a new snapshot with `op` applied, leaving `self` untouched.
    #[must_use]
    pub fn with(&self, op: &CartOp) -> Self {
        let mut next = self.clone();
        next.apply(op);
        next
    }

    fn set(&mut self, id: &ProductId, quantity: i64) -> bool {
        if quantity <= 0 {
            return self.lines.remove(id).is_some();
        }
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        self.lines.insert(id.clone(), quantity) != Some(quantity)
    }

    /// Quantity held for `id`, or zero if the product is not in the cart.
    #[must_use]
    pub fn quantity(&self, id: &str) -> u32 {
        self.lines.get(id).copied().unwrap_or(0)
    }

    /// Sum of all quantities.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.lines.values().map(|&q| u64::from(q)).sum()
    }

    /// Number of distinct products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the cart holds no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Iterate over `(product, quantity)` in product-id order.
    pub fn iter(&self) -> impl Iterator<Item = (&ProductId, u32)> {
        self.lines.iter().map(|(id, &q)| (id, q))
    }

    /// Total of `offer_price × quantity` over all lines, floored at the cent.
    ///
    /// Lines whose product is missing from `catalog` contribute zero; the
    /// catalog and the cart load independently.
    #[must_use]
    pub fn total_amount(&self, catalog: &Catalog) -> Decimal {
        let total: Decimal = self
            .lines
            .iter()
            .filter_map(|(id, &quantity)| {
                catalog
                    .offer_price(id.as_str())
                    .map(|price| price * Decimal::from(quantity))
            })
            .sum();
        truncate_to_cents(total)
    }
}

impl From<BTreeMap<ProductId, i64>> for Cart {
    fn from(raw: BTreeMap<ProductId, i64>) -> Self {
        let lines = raw
            .into_iter()
            .filter(|&(_, quantity)| quantity > 0)
            .map(|(id, quantity)| (id, u32::try_from(quantity).unwrap_or(u32::MAX)))
            .collect();
        Self { lines }
    }
}

impl From<Cart> for BTreeMap<ProductId, u32> {
    fn from(cart: Cart) -> Self {
        cart.lines
    }
}

impl FromIterator<(ProductId, i64)> for Cart {
    fn from_iter<I: IntoIterator<Item = (ProductId, i64)>>(iter: I) -> Self {
        let mut cart = Self::new();
        for (id, quantity) in iter {
            cart.set(&id, quantity);
        }
        cart
    }
}
