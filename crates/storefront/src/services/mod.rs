//! Collaborators around the cart core.
//!
//! - `auth` - Sign-in state: restores, starts and ends the API session and
//!   publishes the session signal the cart sync reacts to
//! - `catalog` - Product list lookup for pricing

pub mod auth;
pub mod catalog;
