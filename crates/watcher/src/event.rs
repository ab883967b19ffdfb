//! Canonical event vocabulary shared by the normalizer, registry and consumers

use canopy_core::EntryStat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use ulid::Ulid;

/// What a subscription observes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchKind {
    /// One file, observed shallowly
    File,
    /// A directory, observed recursively
    Directory,
}

/// Normalized change kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    Added,
    Changed,
    Removed,
    DirectoryAdded,
    DirectoryRemoved,
}

impl EventKind {
    /// Whether the event concerns a directory node
    pub fn is_directory(self) -> bool {
        matches!(self, EventKind::DirectoryAdded | EventKind::DirectoryRemoved)
    }
}

/// One normalized filesystem event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalEvent {
    pub kind: EventKind,
    pub path: PathBuf,
    /// Stat taken when the event became stable (absent for removals)
    pub stat: Option<EntryStat>,
}

impl CanonicalEvent {
    pub fn new(kind: EventKind, path: impl Into<PathBuf>, stat: Option<EntryStat>) -> Self {
        Self {
            kind,
            path: path.into(),
            stat,
        }
    }
}

/// Owner of watch subscriptions (one presentation window)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConsumerId(pub u64);

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "consumer-{}", self.0)
    }
}

/// Identity of one subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(Ulid);

impl SubscriptionId {
    pub(crate) fn generate() -> Self {
        Self(Ulid::new())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
