//! The in-memory cart and its change notifications.
//!
//! `CartStore` holds exactly one [`Snapshot`]: the current cart plus a version
//! number that increases on every change. Mutations are applied atomically to
//! the snapshot held by a `tokio::sync::watch` channel, so an `add` can never
//! interleave with a `replace_all`. Subscribers get a `watch::Receiver`, which
//! always yields the latest snapshot; several mutations made before a
//! subscriber wakes up are observed as one change.
//!
//! While a session is being established the store can also record the
//! mutations it applies, so they can be replayed onto the cart that the
//! server returns ([`CartStore::rebase`]).
//!
//! The store never performs I/O.

use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::watch;
use tracing::debug;

use freshcart_core::{Cart, CartOp, Catalog, ProductId};

/// The current cart together with its version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Cart contents.
    pub cart: Cart,
    /// Incremented on every change, starting from 0 for the initial empty cart.
    pub version: u64,
    /// Mutations applied since recording started, oldest first.
    recorded: Option<Vec<CartOp>>,
}

/// Owner of the current cart snapshot.
///
/// Cheap to clone; clones share the same snapshot.
#[derive(Clone)]
pub struct CartStore {
    tx: Arc<watch::Sender<Snapshot>>,
}

impl CartStore {
    /// Create a store holding an empty cart at version 0.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Snapshot::default());
        Self { tx: Arc::new(tx) }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add one unit of `id`.
    pub fn add(&self, id: impl Into<ProductId>) {
        self.apply(&CartOp::Add(id.into()));
    }

    /// Set the quantity of `id`. A quantity of zero or less removes the line.
    pub fn set_quantity(&self, id: impl Into<ProductId>, quantity: i64) {
        self.apply(&CartOp::SetQuantity(id.into(), quantity));
    }

    /// Remove one unit of `id`. Removing a product that is not in the cart
    /// does nothing.
    pub fn remove(&self, id: impl Into<ProductId>) {
        self.apply(&CartOp::Remove(id.into()));
    }

    /// Apply `op` to the current snapshot.
    ///
    /// Returns `true` if the cart changed. Subscribers are notified and the
    /// version advances only in that case.
    pub fn apply(&self, op: &CartOp) -> bool {
        self.tx.send_if_modified(|snapshot| {
            let changed = snapshot.cart.apply(op);
            if changed {
                snapshot.version += 1;
                if let Some(recorded) = &mut snapshot.recorded {
                    recorded.push(op.clone());
                }
                debug!(?op, version = snapshot.version, "Cart changed");
            }
            changed
        })
    }

    /// Overwrite the whole cart with `cart`.
    ///
    /// Always advances the version and notifies subscribers, even when `cart`
    /// equals the current contents. Stops any recording. Returns the new
    /// version.
    pub fn replace_all(&self, cart: Cart) -> u64 {
        let mut version = 0;
        self.tx.send_modify(|snapshot| {
            snapshot.cart = cart;
            snapshot.version += 1;
            snapshot.recorded = None;
            version = snapshot.version;
        });
        debug!(version, "Cart replaced");
        version
    }

    /// Start recording mutations from now on, dropping any earlier record.
    ///
    /// The cart itself is left alone and subscribers are not notified.
    pub fn record_changes(&self) {
        self.tx.send_if_modified(|snapshot| {
            snapshot.recorded = Some(Vec::new());
            false
        });
    }

    /// Replace the cart with `base`, then re-apply every mutation recorded
    /// since [`record_changes`](Self::record_changes). Stops recording.
    ///
    /// Always advances the version. Returns the new version and the number of
    /// recorded mutations that were replayed.
    pub fn rebase(&self, base: Cart) -> (u64, usize) {
        let mut outcome = (0, 0);
        self.tx.send_modify(|snapshot| {
            let recorded = snapshot.recorded.take().unwrap_or_default();
            let mut cart = base;
            for op in &recorded {
                cart.apply(op);
            }
            snapshot.cart = cart;
            snapshot.version += 1;
            outcome = (snapshot.version, recorded.len());
        });
        debug!(version = outcome.0, replayed = outcome.1, "Cart rebased");
        outcome
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Copy of the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.tx.borrow().clone()
    }

    /// Copy of the current cart.
    #[must_use]
    pub fn cart(&self) -> Cart {
        self.tx.borrow().cart.clone()
    }

    /// Current version.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.tx.borrow().version
    }

    /// Quantity of `id`, 0 if absent.
    #[must_use]
    pub fn quantity(&self, id: &str) -> u32 {
        self.tx.borrow().cart.quantity(id)
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.tx.borrow().cart.count()
    }

    /// Total at offer prices, truncated to cents. Lines missing from
    /// `catalog` contribute nothing.
    #[must_use]
    pub fn total_amount(&self, catalog: &Catalog) -> Decimal {
        self.tx.borrow().cart.total_amount(catalog)
    }

    /// Subscribe to snapshot changes.
    ///
    /// The receiver starts with the current snapshot marked as seen.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.tx.subscribe()
    }
}

impl Default for CartStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("CartStore").field(&*self.tx.borrow()).finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use freshcart_core::Product;

    #[test]
    fn test_new_store_is_empty() {
        let store = CartStore::new();
        assert_eq!(store.count(), 0);
        assert_eq!(store.version(), 0);
        assert!(store.cart().is_empty());
    }

    #[test]
    fn test_add_and_remove_restore_snapshot() {
        let store = CartStore::new();
        store.add("a");
        let before = store.cart();

        store.add("b");
        store.remove("b");

        assert_eq!(store.cart(), before);
        assert_eq!(store.version(), 3);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let store = CartStore::new();
        store.add("a");
        let version = store.version();

        store.remove("missing");

        assert_eq!(store.count(), 1);
        assert_eq!(store.version(), version);
    }

    #[test]
    fn test_set_quantity_non_positive_removes_line() {
        let store = CartStore::new();
        store.set_quantity("a", 4);
        assert_eq!(store.quantity("a"), 4);

        store.set_quantity("a", -2);
        assert_eq!(store.quantity("a"), 0);
        assert!(store.cart().is_empty());
    }

    #[test]
    fn test_replace_all_always_bumps_version() {
        let store = CartStore::new();
        let v1 = store.replace_all(Cart::new());
        let v2 = store.replace_all(Cart::new());
        assert_eq!(v1, 1);
        assert_eq!(v2, 2);
        let snapshot = store.snapshot();
        assert!(snapshot.cart.is_empty());
        assert_eq!(snapshot.version, 2);
    }

    #[test]
    fn test_rebase_replays_recorded_changes_onto_base() {
        let store = CartStore::new();
        store.add("anonymous");
        store.record_changes();
        assert_eq!(store.version(), 1);

        store.add("late");
        store.set_quantity("x", 5);
        store.remove("missing");

        let base: Cart = [(ProductId::from("x"), 3)].into_iter().collect();
        let (version, replayed) = store.rebase(base);

        let expected: Cart = [(ProductId::from("late"), 1), (ProductId::from("x"), 5)]
            .into_iter()
            .collect();
        assert_eq!(store.cart(), expected);
        assert_eq!(replayed, 2);
        assert_eq!(version, store.version());
    }

    #[test]
    fn test_rebase_without_recording_is_replace() {
        let store = CartStore::new();
        store.record_changes();
        store.add("a");
        store.replace_all(Cart::new());
        store.add("b");

        let (_, replayed) = store.rebase(Cart::new());
        assert_eq!(replayed, 0);
        assert!(store.cart().is_empty());
    }

    #[test]
    fn test_total_amount_uses_offer_prices() {
        let store = CartStore::new();
        store.add("a");
        store.add("a");
        store.add("ghost");

        let catalog: Catalog = [Product::priced("a".into(), Decimal::new(10_555, 3))]
            .into_iter()
            .collect();

        assert_eq!(store.total_amount(&catalog), Decimal::new(2111, 2));
    }

    #[tokio::test]
    async fn test_subscribers_see_latest_snapshot_once() {
        let store = CartStore::new();
        let mut rx = store.subscribe();

        store.add("a");
        store.add("a");
        store.add("b");

        rx.changed().await.unwrap();
        let seen = rx.borrow_and_update().clone();
        assert_eq!(seen.version, 3);
        assert_eq!(seen.cart.count(), 3);
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_noop_mutation_does_not_notify() {
        let store = CartStore::new();
        let rx = store.subscribe();

        store.remove("a");
        store.set_quantity("b", 0);

        assert!(!rx.has_changed().unwrap());
    }
}
