//! Domain models for the seller dashboard.
//!
//! Row types derive `sqlx::FromRow` and are read with runtime-checked
//! queries; view types are what the JSON API and the gate consume.

pub mod profile;
pub mod session;
pub mod user;

pub use profile::{Profile, ProfileSections};
pub use session::{CurrentUser, session_keys};
pub use user::{CurrentUserProfile, ProfileRef, User};
