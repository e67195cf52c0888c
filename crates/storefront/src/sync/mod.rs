//! Keeps the local cart and the server's stored cart in step.
//!
//! [`SyncController`] runs a background task that watches two signals: the
//! session (who is signed in) and the [`CartStore`] snapshot. It feeds both
//! into a [`SyncMachine`] and carries out the effects it returns. Network
//! calls are spawned as separate tasks and report back over a channel, so a
//! slow request never delays the handling of later changes.
//!
//! Outcomes are broadcast as [`SyncEvent`]s for the user-facing layer.
//!
//! # Example
//!
//! ```rust,ignore
//! let store = CartStore::new();
//! let (session_tx, session_rx) = watch::channel(None);
//! let sync = SyncController::spawn(Arc::new(api), store.clone(), session_rx);
//! let mut events = sync.subscribe();
//!
//! session_tx.send_replace(Some(user)); // pulls the stored cart
//! store.add("66a1");                   // pushed once the pull has landed
//! ```

mod backend;
pub mod machine;

use std::fmt;
use std::sync::{Arc, Mutex};

use tokio::sync::{Notify, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use freshcart_core::{Cart, SessionUser, UserId};

pub use backend::CartBackend;
pub use machine::{Effect, Phase, SyncMachine, Ticket};

use crate::api::ApiError;
use crate::cart_store::{CartStore, Snapshot};

/// Buffered events per subscriber before the oldest are dropped.
const EVENT_CAPACITY: usize = 64;

/// Outcome of a sync step, for toasts and logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// The server's stored cart replaced the local one.
    Reconciled {
        /// Signed-in user.
        user: UserId,
        /// Units in the reconciled cart.
        items: u64,
    },
    /// A pull landed after local edits and was dropped in their favour.
    PullDiscarded {
        /// Signed-in user.
        user: UserId,
    },
    /// The stored cart could not be fetched. The local cart is unchanged.
    PullFailed {
        /// Signed-in user.
        user: UserId,
        /// Error description.
        message: String,
    },
    /// The server accepted the cart at `version`.
    Pushed {
        /// Cart version that was sent.
        version: u64,
    },
    /// The server did not accept the cart. The local cart is unchanged.
    PushFailed {
        /// Cart version that was sent.
        version: u64,
        /// Error description.
        message: String,
    },
    /// The session ended and the local cart was emptied.
    Reset,
}

impl SyncEvent {
    /// Whether this event reports a failed request.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::PullFailed { .. } | Self::PushFailed { .. })
    }
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reconciled { items, .. } => write!(f, "Cart loaded ({items} items)"),
            Self::PullDiscarded { .. } => f.write_str("Kept your latest changes"),
            Self::PullFailed { message, .. } => write!(f, "Could not load your cart: {message}"),
            Self::Pushed { .. } => f.write_str("Cart saved"),
            Self::PushFailed { message, .. } => write!(f, "Could not save your cart: {message}"),
            Self::Reset => f.write_str("Signed out, cart cleared"),
        }
    }
}

enum Command {
    Reconcile,
}

enum Completion {
    Pull(Ticket, Result<Cart, ApiError>),
    Push(Ticket, Result<(), ApiError>),
}

/// Handle to the background sync task.
///
/// Cheap to clone. The task stops when [`shutdown`](Self::shutdown) is
/// called, when the last handle is dropped, or when the session signal
/// closes.
#[derive(Clone)]
pub struct SyncController {
    inner: Arc<SyncControllerInner>,
}

struct SyncControllerInner {
    events: broadcast::Sender<SyncEvent>,
    commands: mpsc::UnboundedSender<Command>,
    shutdown: Arc<Notify>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SyncController {
    /// Start syncing `store` against `backend` for whoever `session` names.
    ///
    /// The current session value is acted on immediately.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn spawn<B: CartBackend>(
        backend: Arc<B>,
        store: CartStore,
        session: watch::Receiver<Option<SessionUser>>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (commands, command_rx) = mpsc::unbounded_channel();
        let shutdown = Arc::new(Notify::new());

        let driver = Driver {
            backend,
            cart: store.subscribe(),
            store,
            session,
            events: events.clone(),
            machine: SyncMachine::new(),
        };
        let task = tokio::spawn(driver.run(command_rx, Arc::clone(&shutdown)));

        Self {
            inner: Arc::new(SyncControllerInner {
                events,
                commands,
                shutdown,
                task: Mutex::new(Some(task)),
            }),
        }
    }

    /// Receive sync events from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    /// Pull the stored cart again for the current session.
    ///
    /// Useful after a [`SyncEvent::PullFailed`]. Does nothing when signed out.
    pub fn reconcile(&self) {
        if self.inner.commands.send(Command::Reconcile).is_err() {
            debug!("Sync task has stopped, reconcile ignored");
        }
    }

    /// Stop the background task and wait for it to finish.
    ///
    /// Requests already in flight are abandoned.
    pub async fn shutdown(&self) {
        self.inner.shutdown.notify_one();
        let task = self.inner.task.lock().ok().and_then(|mut task| task.take());
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Sync task panicked");
            }
        }
    }
}

impl Drop for SyncControllerInner {
    fn drop(&mut self) {
        self.shutdown.notify_one();
    }
}

struct Driver<B> {
    backend: Arc<B>,
    store: CartStore,
    cart: watch::Receiver<Snapshot>,
    session: watch::Receiver<Option<SessionUser>>,
    events: broadcast::Sender<SyncEvent>,
    machine: SyncMachine,
}

impl<B: CartBackend> Driver<B> {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>, shutdown: Arc<Notify>) {
        info!("Cart sync started");
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();

        let initial = self.current_session();
        let effects = self.machine.on_session(initial.as_ref(), &self.store);
        self.execute(effects, &done_tx);

        loop {
            let effects = tokio::select! {
                () = shutdown.notified() => {
                    info!("Cart sync received shutdown signal");
                    break;
                }
                changed = self.session.changed() => {
                    if changed.is_err() {
                        info!("Session signal closed");
                        break;
                    }
                    let user = self.current_session();
                    self.machine.on_session(user.as_ref(), &self.store)
                }
                changed = self.cart.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.machine.on_cart_changed(&self.store)
                }
                Some(command) = commands.recv() => match command {
                    Command::Reconcile => self.machine.reconcile(&self.store),
                },
                Some(done) = done_rx.recv() => match done {
                    Completion::Pull(ticket, result) => {
                        self.machine.on_pull_complete(&ticket, result, &self.store)
                    }
                    Completion::Push(ticket, result) => {
                        self.machine.on_push_complete(&ticket, result, &self.store)
                    }
                },
            };
            self.execute(effects, &done_tx);
        }

        info!("Cart sync stopped");
    }

    fn current_session(&mut self) -> Option<UserId> {
        self.session
            .borrow_and_update()
            .as_ref()
            .map(|user| user.id.clone())
    }

    fn execute(&self, effects: Vec<Effect>, done: &mpsc::UnboundedSender<Completion>) {
        for effect in effects {
            match effect {
                Effect::Pull(ticket) => {
                    let backend = Arc::clone(&self.backend);
                    let done = done.clone();
                    tokio::spawn(async move {
                        let result = backend.pull(&ticket.session).await;
                        let _ = done.send(Completion::Pull(ticket, result));
                    });
                }
                Effect::Push { ticket, cart } => {
                    let backend = Arc::clone(&self.backend);
                    let done = done.clone();
                    tokio::spawn(async move {
                        let result = backend.push(&ticket.session, &cart).await;
                        let _ = done.send(Completion::Push(ticket, result));
                    });
                }
                Effect::Notify(event) => {
                    // No subscribers is fine.
                    let _ = self.events.send(event);
                }
            }
        }
    }
}
