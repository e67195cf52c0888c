//! FreshCart Core - Shared types library.
//!
//! This crate provides the types shared by every FreshCart component:
//! - `storefront` - Cart store, sync controller and API client
//! - `cli` - Headless shell driving the storefront client
//! - `integration-tests` - Fake API server and end-to-end tests
//!
//! # Architecture
//!
//! The core crate contains only types and pure operations - no I/O, no HTTP
//! clients, no async runtime. Cart mutations are plain functions of
//! (snapshot, operation), which keeps them usable and testable anywhere.
//!
//! # Modules
//!
//! - [`types`] - Ids, emails, prices, the cart, the catalog and the session user

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
