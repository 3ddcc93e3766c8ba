//! Application services shared across routes.
//!
//! - `viewer` - Cached per-user gate snapshots with a change feed

pub mod viewer;

pub use viewer::{ViewerSnapshot, ViewerStore};
