//! File system watching for Canopy
//!
//! This crate provides:
//! - Native (or polling) watches normalized into canonical
//!   add/change/remove events
//! - Write-stability debouncing so half-written files are never reported
//! - Ignore rules (hidden entries, dependency dirs, bundles, gitignore)
//! - Reconciliation walks for moved-in directories and overflow recovery
//! - A suppression ledger for echoes of the host's own writes
//! - A registry that owns subscriptions and routes events to consumers

pub mod config;
pub mod debounce;
pub mod error;
pub mod event;
pub mod ignore;
mod normalizer;
pub mod platform;
pub mod reconcile;
pub mod registry;
pub mod suppress;

pub use config::WatcherConfig;
pub use error::{Result, WatchError};
pub use event::{CanonicalEvent, ConsumerId, EventKind, SubscriptionId, WatchKind};
pub use crate::ignore::{IgnoreConfig, IgnoreRules};
pub use registry::{Delivery, SubscriptionHandle, WatchRegistry, RESOURCE_WARNING};
pub use suppress::SuppressionLedger;
