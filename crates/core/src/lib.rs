//! SellerDesk Core - Shared types and policies.
//!
//! This crate provides what the server and CLI both need:
//! - `server` - Seller dashboard backend (webhooks, gate, database layer)
//! - `cli` - Command-line tools for migrations, health checks and seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure decision functions - no I/O,
//! no database access, no HTTP. The server wires these into axum and sqlx.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, emails, external ids and roles
//! - [`transaction`] - Retry classification and exponential backoff
//! - [`gate`] - Profile-completion gate decision function

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod gate;
pub mod transaction;
pub mod types;

pub use types::*;
