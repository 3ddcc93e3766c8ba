//! Identity provider webhooks.
//!
//! - [`signature`] verifies Svix-signed deliveries
//! - [`provisioning`] turns verified user events into user upserts

pub mod provisioning;
pub mod signature;

pub use provisioning::{ProvisioningError, ProvisioningOutcome, handle_delivery};
pub use signature::{SigningSecret, WebhookHeaders};
