//! Token-state models shared through the store.

pub mod cooldown;
pub mod record;
pub mod secret;
