//! Vendor dashboard sync engine
//!
//! Keeps the order, payment, menu item and outlet stores consistent with
//! the server over an unreliable realtime channel:
//!
//! - [`connection`]: channel lifecycle, backoff, resubscription, heartbeat
//! - [`dispatcher`]: sequence watermarks and event routing
//! - [`reconcile`]: delta/full REST fetches
//! - [`store`] / [`merge`]: per-resource stores with last-writer-wins
//! - [`engine`]: the single loop that owns the state
//!
//! # Example
//!
//! ```ignore
//! let handle = crab_sync::start(&SyncConfig::from_env())?;
//! handle.login(Credential::new(token))?;
//! handle.subscribe(Room::outlet("outlet-1"))?;
//! ```

pub mod backend;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod http;
pub mod logger;
pub mod merge;
pub mod reconcile;
pub mod session;
pub mod state;
pub mod store;
pub mod watermark;

// Re-exports
pub use backend::{DeltaBatch, ResourceBatch, SyncBackend, ViewBatch};
pub use config::SyncConfig;
pub use connection::{ConnectionHandle, ConnectionSignal, ConnectionSnapshot, ConnectionStatus};
pub use engine::{Command, EngineInput, SyncEngine, SyncHandle, start};
pub use error::{ErrorKind, SyncError, SyncResult};
pub use reconcile::SyncMode;
pub use session::{Credential, SessionId};
pub use state::DashboardState;
