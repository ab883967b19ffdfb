//! Outbound notifications for the presentation layer
//!
//! Every payload is an owned snapshot built at the moment it crosses the
//! boundary; nothing in here aliases live session state.

use crate::state::TabRef;
use canopy_core::{FileNode, SortOrder};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use watcher::{CanonicalEvent, WatchKind};

/// Payload of the "workspace initialized" notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceInit {
    pub root_path: PathBuf,
    pub tree: FileNode,
    pub active_file: Option<PathBuf>,
    pub tabs: Vec<TabRef>,
    pub expanded_folders: Vec<PathBuf>,
    pub is_expanded_all: bool,
    pub sort_by: SortOrder,
}

/// Payload of the "workspace updated" notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceUpdate {
    pub tree: FileNode,
    pub active_file: Option<PathBuf>,
    pub tabs: Vec<TabRef>,
    pub expanded_folders: Vec<PathBuf>,
    pub is_expanded_all: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Notification {
    Initialized(WorkspaceInit),
    Updated(WorkspaceUpdate),
    /// The active file changed on disk (not by us)
    FileChanged { path: PathBuf },
    /// Event on a subscription the presentation layer opened itself
    WatchEvent { watch: WatchKind, event: CanonicalEvent },
    Warning { title: String, message: String },
}
