//! Workspace session layer
//!
//! Owns the tree mirror of one workspace root together with the UI state
//! persisted for it, and turns canonical watcher events into consistent
//! updates for the presentation layer.

pub mod config;
pub mod error;
pub mod notification;
pub mod session;
pub mod state;
pub mod store;

pub use config::SessionConfig;
pub use error::{Result, SessionError};
pub use notification::{Notification, WorkspaceInit, WorkspaceUpdate};
pub use session::WorkspaceSession;
pub use state::{PersistedState, TabRef};
pub use store::StateStore;
