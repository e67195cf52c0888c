//! Core types for FreshCart.
//!
//! This module provides type-safe wrappers for the cart domain.

pub mod cart;
pub mod catalog;
pub mod email;
pub mod id;
pub mod price;
pub mod user;

pub use cart::{Cart, CartOp};
pub use catalog::{Catalog, Product};
pub use email::{Email, EmailError};
pub use id::*;
pub use price::{CurrencyCode, Price, truncate_to_cents};
pub use user::SessionUser;
