//! Data models
//!
//! Each resource has two shapes: the `*Record` as the server sends it
//! (references may be bare ids or nested documents) and the normalized
//! entity kept in the stores. All IDs are strings.

pub mod menu_item;
pub mod order;
pub mod outlet;
pub mod payment;
pub mod reference;

// Re-exports
pub use menu_item::*;
pub use order::*;
pub use outlet::*;
pub use payment::*;
pub use reference::*;
