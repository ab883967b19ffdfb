//! Persisted per-workspace UI state

use canopy_core::SortOrder;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One open tab
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabRef {
    pub path: PathBuf,
    /// Insertion index, unique within the tab list
    pub index: u32,
}

/// Record stored per workspace root
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    pub active_file: Option<PathBuf>,
    pub tabs: Vec<TabRef>,
    pub expanded_folders: Vec<PathBuf>,
    pub is_expanded_all: bool,
    pub sort_by: SortOrder,
}

impl PersistedState {
    /// Encode for the state store
    pub fn serialize(&self) -> bincode::Result<Vec<u8>> {
        bincode::serialize(self)
    }

    /// Decode a record written by [`serialize`](Self::serialize)
    pub fn deserialize(bytes: &[u8]) -> bincode::Result<Self> {
        bincode::deserialize(bytes)
    }
}
