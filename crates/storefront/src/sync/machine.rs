//! Cart sync state machine.
//!
//! `SyncMachine` decides *what* to send and *whether* a response still
//! applies; it never talks to the network. Each input (session change, cart
//! change, pull/push completion) returns the [`Effect`]s the driver must carry
//! out.
//!
//! Every request is stamped with a [`Ticket`]. A completion is applied only if
//! its ticket is still the one the machine is waiting for: a session change
//! or a newer dispatch clears or replaces the slot, which turns late
//! responses into no-ops. A pull whose cart was mutated locally after
//! dispatch is discarded as well, since the local edits are newer.
//!
//! The first pull of a session is different: the server cart is
//! authoritative and the cart held before sign-in is dropped. Edits made
//! after the session started are recorded by the store and replayed onto the
//! pulled cart, so they survive without carrying anonymous lines to the
//! server. Until that pull succeeds nothing is pushed.
//!
//! At most one pull and one push are in flight. Changes that arrive while a
//! push is outstanding set a flag; when the push settles, one trailing push
//! carries the latest snapshot.

use tracing::{debug, info, warn};

use freshcart_core::{Cart, UserId};

use super::SyncEvent;
use crate::api::ApiError;
use crate::cart_store::CartStore;

/// Where the machine is in the session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No session. Local changes stay local.
    Anonymous,
    /// Waiting for a pull. Local changes are not pushed.
    Syncing,
    /// Signed in, but the stored cart could not be fetched yet. Local changes
    /// are kept and not pushed until a reconcile succeeds.
    Unreconciled,
    /// Session established. Every change is pushed.
    Authenticated,
}

/// Identity stamped on a request at dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    /// Dispatch sequence number, unique per machine.
    pub seq: u64,
    /// Session the request was made for.
    pub session: UserId,
    /// Session epoch; bumped on every session transition.
    pub epoch: u64,
    /// Cart version at dispatch.
    pub version: u64,
}

/// Work the driver must perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Fetch the stored cart and report back with `on_pull_complete`.
    Pull(Ticket),
    /// Send `cart` and report back with `on_push_complete`.
    Push {
        /// Ticket to hand back.
        ticket: Ticket,
        /// Full snapshot at `ticket.version`.
        cart: Cart,
    },
    /// Tell the user-facing layer.
    Notify(SyncEvent),
}

/// Sans-IO sync state.
#[derive(Debug)]
pub struct SyncMachine {
    phase: Phase,
    session: Option<UserId>,
    epoch: u64,
    seq: u64,
    pull: Option<Ticket>,
    push: Option<Ticket>,
    push_queued: bool,
    reconcile_queued: bool,
    synced_version: Option<u64>,
    reconciled: bool,
}

impl SyncMachine {
    /// A machine with no session.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: Phase::Anonymous,
            session: None,
            epoch: 0,
            seq: 0,
            pull: None,
            push: None,
            push_queued: false,
            reconcile_queued: false,
            synced_version: None,
            reconciled: false,
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Session the machine is tracking.
    #[must_use]
    pub const fn session(&self) -> Option<&UserId> {
        self.session.as_ref()
    }

    /// Whether a pull is outstanding.
    #[must_use]
    pub const fn pull_in_flight(&self) -> bool {
        self.pull.is_some()
    }

    /// Whether a push is outstanding.
    #[must_use]
    pub const fn push_in_flight(&self) -> bool {
        self.push.is_some()
    }

    // =========================================================================
    // Inputs
    // =========================================================================

    /// The session signal changed to `user`.
    ///
    /// Signing out empties the cart without pushing. Signing in, or switching
    /// directly to another user, empties the cart and pulls the new user's
    /// stored cart. Repeating the current session does nothing.
    pub fn on_session(&mut self, user: Option<&UserId>, store: &CartStore) -> Vec<Effect> {
        match (self.session.as_ref(), user) {
            (None, None) => Vec::new(),
            (Some(current), Some(next)) if current == next => Vec::new(),
            (Some(_), None) => vec![self.reset(store)],
            (previous, Some(next)) => {
                let mut effects = Vec::with_capacity(2);
                if previous.is_some() {
                    effects.push(self.reset(store));
                }
                self.epoch += 1;
                self.session = Some(next.clone());
                self.phase = Phase::Syncing;
                self.reconciled = false;
                store.record_changes();
                info!(session = %next, epoch = self.epoch, "Session established, pulling cart");
                effects.push(self.dispatch_pull(next.clone(), store));
                effects
            }
        }
    }

    /// The cart snapshot changed.
    pub fn on_cart_changed(&mut self, store: &CartStore) -> Vec<Effect> {
        if self.phase != Phase::Authenticated {
            return Vec::new();
        }
        let Some(session) = self.session.clone() else {
            return Vec::new();
        };

        let version = store.version();
        if self.synced_version == Some(version) {
            return Vec::new();
        }

        if let Some(in_flight) = &self.push {
            if in_flight.version != version {
                debug!(version, in_flight = in_flight.version, "Push in flight, queueing");
                self.push_queued = true;
            }
            return Vec::new();
        }

        vec![self.dispatch_push(session, store)]
    }

    /// Re-pull the stored cart for the current session.
    ///
    /// Waits for an outstanding push to settle first. Does nothing without a
    /// session or while a pull is already outstanding.
    pub fn reconcile(&mut self, store: &CartStore) -> Vec<Effect> {
        let Some(session) = self.session.clone() else {
            return Vec::new();
        };
        if self.pull.is_some() {
            return Vec::new();
        }
        if self.push.is_some() {
            debug!("Push in flight, reconcile deferred");
            self.reconcile_queued = true;
            return Vec::new();
        }
        self.phase = Phase::Syncing;
        vec![self.dispatch_pull(session, store)]
    }

    /// A pull dispatched with `ticket` finished.
    pub fn on_pull_complete(
        &mut self,
        ticket: &Ticket,
        result: Result<Cart, ApiError>,
        store: &CartStore,
    ) -> Vec<Effect> {
        if self.pull.as_ref() != Some(ticket) {
            debug!(seq = ticket.seq, session = %ticket.session, "Discarding stale pull");
            return Vec::new();
        }
        self.pull = None;
        self.phase = if self.reconciled {
            Phase::Authenticated
        } else {
            Phase::Unreconciled
        };

        let user = ticket.session.clone();
        let cart = match result {
            Ok(cart) => cart,
            Err(e) => {
                warn!(
                    error = %e,
                    transport = e.is_transport(),
                    session = %user,
                    "Pull failed, keeping local cart"
                );
                let mut effects = vec![Effect::Notify(SyncEvent::PullFailed {
                    user,
                    message: e.to_string(),
                })];
                // Edits held back during the pull. Unreconciled sessions push nothing.
                effects.extend(self.on_cart_changed(store));
                return effects;
            }
        };

        if !self.reconciled {
            return self.establish(user, cart, store);
        }

        if store.version() != ticket.version {
            info!(
                dispatched = ticket.version,
                current = store.version(),
                "Cart changed during pull, keeping local edits"
            );
            let mut effects = vec![Effect::Notify(SyncEvent::PullDiscarded { user })];
            effects.extend(self.on_cart_changed(store));
            return effects;
        }

        let items = cart.count();
        let version = store.replace_all(cart);
        self.synced_version = Some(version);
        info!(session = %user, items, version, "Cart reconciled from server");
        vec![Effect::Notify(SyncEvent::Reconciled { user, items })]
    }

    /// A push dispatched with `ticket` finished.
    ///
    /// Failures are reported, never retried here, and never roll back the
    /// local cart.
    pub fn on_push_complete(
        &mut self,
        ticket: &Ticket,
        result: Result<(), ApiError>,
        store: &CartStore,
    ) -> Vec<Effect> {
        if self.push.as_ref() != Some(ticket) {
            debug!(seq = ticket.seq, session = %ticket.session, "Discarding stale push result");
            return Vec::new();
        }
        self.push = None;

        let mut effects = Vec::with_capacity(2);
        match result {
            Ok(()) => {
                self.synced_version = Some(
                    self.synced_version
                        .map_or(ticket.version, |synced| synced.max(ticket.version)),
                );
                debug!(version = ticket.version, "Cart pushed");
                effects.push(Effect::Notify(SyncEvent::Pushed {
                    version: ticket.version,
                }));
            }
            Err(e) => {
                warn!(error = %e, version = ticket.version, "Push failed");
                effects.push(Effect::Notify(SyncEvent::PushFailed {
                    version: ticket.version,
                    message: e.to_string(),
                }));
            }
        }

        if std::mem::take(&mut self.push_queued) && store.version() > ticket.version {
            effects.extend(self.on_cart_changed(store));
        } else if std::mem::take(&mut self.reconcile_queued) {
            effects.extend(self.reconcile(store));
        }

        effects
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Adopt the first stored cart of the session, replaying edits made
    /// since sign-in on top of it.
    fn establish(&mut self, user: UserId, cart: Cart, store: &CartStore) -> Vec<Effect> {
        let (version, replayed) = store.rebase(cart);
        self.reconciled = true;
        self.phase = Phase::Authenticated;

        let items = store.count();
        info!(session = %user, items, version, replayed, "Cart reconciled from server");
        let mut effects = vec![Effect::Notify(SyncEvent::Reconciled { user, items })];
        if replayed == 0 {
            self.synced_version = Some(version);
        } else {
            effects.extend(self.on_cart_changed(store));
        }
        effects
    }

    /// Drop the session: empty the cart, forget in-flight work.
    fn reset(&mut self, store: &CartStore) -> Effect {
        self.epoch += 1;
        self.session = None;
        self.phase = Phase::Anonymous;
        self.pull = None;
        self.push = None;
        self.push_queued = false;
        self.reconcile_queued = false;
        self.reconciled = false;
        self.synced_version = Some(store.replace_all(Cart::new()));
        info!(epoch = self.epoch, "Session ended, cart cleared");
        Effect::Notify(SyncEvent::Reset)
    }

    fn ticket(&mut self, session: UserId, version: u64) -> Ticket {
        self.seq += 1;
        Ticket {
            seq: self.seq,
            session,
            epoch: self.epoch,
            version,
        }
    }

    fn dispatch_pull(&mut self, session: UserId, store: &CartStore) -> Effect {
        let ticket = self.ticket(session, store.version());
        self.pull = Some(ticket.clone());
        Effect::Pull(ticket)
    }

    fn dispatch_push(&mut self, session: UserId, store: &CartStore) -> Effect {
        let snapshot = store.snapshot();
        let ticket = self.ticket(session, snapshot.version);
        self.push = Some(ticket.clone());
        self.push_queued = false;
        debug!(version = snapshot.version, lines = snapshot.cart.len(), "Dispatching push");
        Effect::Push {
            ticket,
            cart: snapshot.cart,
        }
    }
}

impl Default for SyncMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use freshcart_core::ProductId;

    fn user(id: &str) -> UserId {
        UserId::from(id)
    }

    fn cart(lines: &[(&str, i64)]) -> Cart {
        lines
            .iter()
            .map(|(id, q)| (ProductId::from(*id), *q))
            .collect()
    }

    fn pulls(effects: &[Effect]) -> Vec<Ticket> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Pull(t) => Some(t.clone()),
                _ => None,
            })
            .collect()
    }

    fn pushes(effects: &[Effect]) -> Vec<(Ticket, Cart)> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Push { ticket, cart } => Some((ticket.clone(), cart.clone())),
                _ => None,
            })
            .collect()
    }

    fn events(effects: &[Effect]) -> Vec<SyncEvent> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Notify(event) => Some(event.clone()),
                _ => None,
            })
            .collect()
    }

    /// Sign in as `id` and complete the pull with `server`.
    fn signed_in(id: &str, server: Cart) -> (SyncMachine, CartStore) {
        let store = CartStore::new();
        let mut machine = SyncMachine::new();
        let effects = machine.on_session(Some(&user(id)), &store);
        let ticket = pulls(&effects).remove(0);
        machine.on_pull_complete(&ticket, Ok(server), &store);
        assert_eq!(machine.phase(), Phase::Authenticated);
        (machine, store)
    }

    #[test]
    fn test_anonymous_changes_are_not_pushed() {
        let store = CartStore::new();
        let mut machine = SyncMachine::new();

        store.add("y");
        assert!(machine.on_cart_changed(&store).is_empty());
        assert_eq!(machine.phase(), Phase::Anonymous);
    }

    #[test]
    fn test_login_replaces_anonymous_cart_with_server_cart() {
        let store = CartStore::new();
        let mut machine = SyncMachine::new();
        store.add("y");

        let effects = machine.on_session(Some(&user("u1")), &store);
        assert_eq!(machine.phase(), Phase::Syncing);
        assert!(machine.pull_in_flight());
        let ticket = pulls(&effects).remove(0);
        assert_eq!(ticket.session, user("u1"));

        let effects = machine.on_pull_complete(&ticket, Ok(cart(&[("x", 3)])), &store);
        assert!(!machine.pull_in_flight());

        assert_eq!(store.cart(), cart(&[("x", 3)]));
        assert_eq!(
            events(&effects),
            vec![SyncEvent::Reconciled {
                user: user("u1"),
                items: 3
            }]
        );
        // The reconciled snapshot is already on the server.
        assert!(machine.on_cart_changed(&store).is_empty());
    }

    #[test]
    fn test_changes_while_syncing_are_not_pushed() {
        let store = CartStore::new();
        let mut machine = SyncMachine::new();
        machine.on_session(Some(&user("u1")), &store);

        store.add("a");
        assert!(machine.on_cart_changed(&store).is_empty());
    }

    #[test]
    fn test_each_change_pushes_full_snapshot() {
        let (mut machine, store) = signed_in("u1", cart(&[("x", 1)]));

        store.add("y");
        let effects = machine.on_cart_changed(&store);
        let (ticket, sent) = pushes(&effects).remove(0);

        assert_eq!(sent, cart(&[("x", 1), ("y", 1)]));
        assert_eq!(ticket.version, store.version());
        assert!(machine.push_in_flight());
    }

    #[test]
    fn test_two_changes_during_push_coalesce_into_one_trailing_push() {
        let (mut machine, store) = signed_in("u1", Cart::new());

        store.add("a");
        let first = pushes(&machine.on_cart_changed(&store)).remove(0).0;

        store.add("b");
        assert!(machine.on_cart_changed(&store).is_empty());
        store.add("b");
        assert!(machine.on_cart_changed(&store).is_empty());

        let effects = machine.on_push_complete(&first, Ok(()), &store);
        let trailing = pushes(&effects);
        assert_eq!(trailing.len(), 1);
        assert_eq!(trailing[0].1, cart(&[("a", 1), ("b", 2)]));
        assert_eq!(trailing[0].0.version, store.version());

        let effects = machine.on_push_complete(&trailing[0].0, Ok(()), &store);
        assert!(pushes(&effects).is_empty());
        assert!(!machine.push_in_flight());
    }

    #[test]
    fn test_logout_clears_cart_without_push() {
        let (mut machine, store) = signed_in("u1", cart(&[("x", 2)]));

        let effects = machine.on_session(None, &store);

        assert!(store.cart().is_empty());
        assert!(pushes(&effects).is_empty());
        assert_eq!(events(&effects), vec![SyncEvent::Reset]);
        assert_eq!(machine.phase(), Phase::Anonymous);
        assert!(machine.session().is_none());

        // The reset itself does not trigger a push either.
        assert!(machine.on_cart_changed(&store).is_empty());
    }

    #[test]
    fn test_logout_orphans_in_flight_push() {
        let (mut machine, store) = signed_in("u1", Cart::new());
        store.add("a");
        let ticket = pushes(&machine.on_cart_changed(&store)).remove(0).0;

        machine.on_session(None, &store);
        let effects = machine.on_push_complete(&ticket, Ok(()), &store);

        assert!(effects.is_empty());
    }

    #[test]
    fn test_pull_for_superseded_session_is_discarded() {
        let store = CartStore::new();
        let mut machine = SyncMachine::new();

        let stale = pulls(&machine.on_session(Some(&user("u1")), &store)).remove(0);
        let fresh = pulls(&machine.on_session(Some(&user("u2")), &store)).remove(0);
        assert_eq!(machine.session(), Some(&user("u2")));

        let effects = machine.on_pull_complete(&stale, Ok(cart(&[("u1-item", 5)])), &store);
        assert!(effects.is_empty());
        assert!(store.cart().is_empty());

        machine.on_pull_complete(&fresh, Ok(cart(&[("u2-item", 1)])), &store);
        assert_eq!(store.cart(), cart(&[("u2-item", 1)]));
    }

    #[test]
    fn test_reconcile_after_local_edit_is_discarded_and_local_cart_pushed() {
        let (mut machine, store) = signed_in("u1", cart(&[("x", 1)]));
        let ticket = pulls(&machine.reconcile(&store)).remove(0);

        store.add("local");
        assert!(machine.on_cart_changed(&store).is_empty());
        let effects = machine.on_pull_complete(&ticket, Ok(cart(&[("server", 1)])), &store);

        assert_eq!(store.cart(), cart(&[("local", 1), ("x", 1)]));
        assert_eq!(
            events(&effects),
            vec![SyncEvent::PullDiscarded { user: user("u1") }]
        );
        assert_eq!(pushes(&effects)[0].1, cart(&[("local", 1), ("x", 1)]));
    }

    #[test]
    fn test_edit_during_login_pull_is_replayed_onto_server_cart() {
        let store = CartStore::new();
        store.add("y");
        let mut machine = SyncMachine::new();
        let ticket = pulls(&machine.on_session(Some(&user("u1")), &store)).remove(0);

        store.add("z");
        assert!(machine.on_cart_changed(&store).is_empty());
        let effects = machine.on_pull_complete(&ticket, Ok(cart(&[("x", 3)])), &store);

        let expected = cart(&[("x", 3), ("z", 1)]);
        assert_eq!(store.cart(), expected);
        assert_eq!(
            events(&effects),
            vec![SyncEvent::Reconciled {
                user: user("u1"),
                items: 4
            }]
        );
        let sent = pushes(&effects);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, expected);
        assert_eq!(sent[0].1.quantity("y"), 0);
    }

    #[test]
    fn test_pull_failure_keeps_cart() {
        let store = CartStore::new();
        store.add("y");
        let mut machine = SyncMachine::new();
        let ticket = pulls(&machine.on_session(Some(&user("u1")), &store)).remove(0);

        let effects =
            machine.on_pull_complete(&ticket, Err(ApiError::Rejected("down".into())), &store);

        assert_eq!(store.cart(), cart(&[("y", 1)]));
        assert!(matches!(
            events(&effects).as_slice(),
            [SyncEvent::PullFailed { message, .. }] if message.contains("down")
        ));
        assert!(pushes(&effects).is_empty());
        assert_eq!(machine.phase(), Phase::Unreconciled);
    }

    #[test]
    fn test_edit_after_failed_login_pull_is_not_pushed() {
        let store = CartStore::new();
        store.add("y");
        let mut machine = SyncMachine::new();
        let ticket = pulls(&machine.on_session(Some(&user("u1")), &store)).remove(0);
        machine.on_pull_complete(&ticket, Err(ApiError::Rejected("down".into())), &store);

        store.add("z");
        assert!(machine.on_cart_changed(&store).is_empty());
        assert_eq!(store.cart(), cart(&[("y", 1), ("z", 1)]));

        // A successful reconcile adopts the server cart plus the later edit.
        let ticket = pulls(&machine.reconcile(&store)).remove(0);
        let effects = machine.on_pull_complete(&ticket, Ok(cart(&[("x", 3)])), &store);

        assert_eq!(machine.phase(), Phase::Authenticated);
        assert_eq!(store.cart(), cart(&[("x", 3), ("z", 1)]));
        assert_eq!(pushes(&effects)[0].1, cart(&[("x", 3), ("z", 1)]));
    }

    #[test]
    fn test_failed_reconcile_pushes_edits_held_back_during_pull() {
        let (mut machine, store) = signed_in("u1", Cart::new());
        let ticket = pulls(&machine.reconcile(&store)).remove(0);

        store.add("a");
        assert!(machine.on_cart_changed(&store).is_empty());
        let effects =
            machine.on_pull_complete(&ticket, Err(ApiError::Rejected("down".into())), &store);

        assert_eq!(machine.phase(), Phase::Authenticated);
        assert_eq!(pushes(&effects)[0].1, cart(&[("a", 1)]));
    }

    #[test]
    fn test_push_failure_does_not_roll_back() {
        let (mut machine, store) = signed_in("u1", Cart::new());
        store.add("a");
        let ticket = pushes(&machine.on_cart_changed(&store)).remove(0).0;

        let effects =
            machine.on_push_complete(&ticket, Err(ApiError::Rejected("nope".into())), &store);

        assert_eq!(store.cart(), cart(&[("a", 1)]));
        assert!(matches!(
            events(&effects).as_slice(),
            [SyncEvent::PushFailed { .. }]
        ));
        assert!(pushes(&effects).is_empty());

        // The next change retries with the latest snapshot.
        store.add("b");
        let (_, sent) = pushes(&machine.on_cart_changed(&store)).remove(0);
        assert_eq!(sent, cart(&[("a", 1), ("b", 1)]));
    }

    #[test]
    fn test_same_session_repeated_is_noop() {
        let (mut machine, store) = signed_in("u1", cart(&[("x", 1)]));
        assert!(machine.on_session(Some(&user("u1")), &store).is_empty());
        assert_eq!(store.cart(), cart(&[("x", 1)]));
    }

    #[test]
    fn test_reconcile_waits_for_push() {
        let (mut machine, store) = signed_in("u1", Cart::new());
        store.add("a");
        let ticket = pushes(&machine.on_cart_changed(&store)).remove(0).0;

        assert!(machine.reconcile(&store).is_empty());

        let effects = machine.on_push_complete(&ticket, Ok(()), &store);
        assert_eq!(pulls(&effects).len(), 1);
        assert_eq!(machine.phase(), Phase::Syncing);
    }

    #[test]
    fn test_tickets_are_unique() {
        let (mut machine, store) = signed_in("u1", Cart::new());
        store.add("a");
        let first = pushes(&machine.on_cart_changed(&store)).remove(0).0;
        machine.on_push_complete(&first, Ok(()), &store);
        store.add("a");
        let second = pushes(&machine.on_cart_changed(&store)).remove(0).0;

        assert!(second.seq > first.seq);
        // A duplicate completion for the first push is ignored.
        assert!(machine.on_push_complete(&first, Ok(()), &store).is_empty());
    }
}
