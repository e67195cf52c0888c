//! FreshCart storefront client library.
//!
//! The cart core of the storefront: a locally owned [`CartStore`] that the UI
//! mutates, and a [`SyncController`] that keeps it in step with the cart the
//! API server stores for the signed-in user.
//!
//! # Modules
//!
//! - [`cart_store`] - The in-memory cart snapshot and change notifications
//! - [`sync`] - Session-aware pull/push of the cart, with stale-response discard
//! - [`api`] - REST client for the FreshCart API
//! - [`services`] - Authentication (session signal) and catalog pricing
//! - [`state`] - [`Storefront`], which wires the above together
//! - [`config`] - Environment-based configuration
//! - [`error`] - `AppError` and Sentry helpers

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart_store;
pub mod config;
pub mod error;
pub mod services;
pub mod state;
pub mod sync;

pub use cart_store::{CartStore, Snapshot};
pub use state::Storefront;
pub use sync::{SyncController, SyncEvent};
