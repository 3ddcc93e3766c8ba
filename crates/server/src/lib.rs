//! SellerDesk dashboard server library.
//!
//! This crate provides the server functionality as a library,
//! allowing it to be tested and reused by the CLI.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod webhooks;

use axum::Router;

use crate::state::AppState;

/// Build the application router.
///
/// The session layer is not included; the caller picks the store.
pub fn router(state: AppState) -> Router {
    routes::routes(&state).with_state(state)
}
