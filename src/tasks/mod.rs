//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Expiry janitor: deletes entries whose TTL has passed, in batches

mod janitor;

pub use janitor::{spawn_janitor, sweep_once, SweepReport};
