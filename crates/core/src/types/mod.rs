//! Core types for SellerDesk.
//!
//! Type-safe wrappers for the identity concepts shared by the server and CLI.

pub mod email;
pub mod external_id;
pub mod id;
pub mod role;

pub use email::{Email, EmailError};
pub use external_id::{ExternalIdError, ExternalUserId};
pub use id::*;
pub use role::{RolePolicy, UserRole};
