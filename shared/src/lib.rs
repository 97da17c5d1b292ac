//! Shared types for the vendor dashboard sync engine
//!
//! Wire contract between the dashboard client and the ordering backend:
//! entity models, reference normalization, realtime event frames and
//! REST envelopes.

pub mod error;
pub mod message;
pub mod models;
pub mod resource;
pub mod sync;

// Re-exports
pub use error::{ModelError, ModelResult};
pub use message::{DomainEvent, EventFrame, Room};
pub use resource::{Entity, ResourceType, WireRecord};
pub use serde::{Deserialize, Serialize};
