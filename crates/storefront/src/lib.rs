//! Bazaar buyer storefront library.
//!
//! Catalog browsing on top of the marketplace REST API, a guest/server cart
//! with sign-in migration, and the session and image caches that keep the
//! storefront responsive. Front ends (the `bazaar` CLI, tests) drive it
//! through [`state::Storefront`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cache;
pub mod cart;
pub mod catalog;
pub mod config;
pub mod error;
pub mod state;
pub mod storage;

pub use error::{AppError, Result};
pub use state::Storefront;
