//! Inbound commands from the presentation layer and their results

use canopy_core::SortOrder;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use watcher::WatchKind;

/// One command, tagged by name on the wire:
/// `{"command":"setActiveFile","path":"/w/a.md"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Command {
    /// Replace the current workspace with `path`
    OpenWorkspace { path: PathBuf },
    Watch { kind: WatchKind, path: PathBuf },
    Unwatch { kind: WatchKind, path: PathBuf },

    SetActiveFile { path: PathBuf },
    SetActiveTab { path: PathBuf },
    CloseTab { path: PathBuf },
    CloseAllTabs,
    ToggleExpand { path: PathBuf },
    ToggleExpandAll,
    SetSortOrder { order: SortOrder },

    ReadFile { path: PathBuf },
    WriteFile { path: PathBuf, contents: String },
    /// Create an empty file in `dir`; the name is disambiguated if taken
    CreateFile { dir: PathBuf, name: String },
    CreateDirectory { dir: PathBuf, name: String },
    UnlinkFile { path: PathBuf },
    UnlinkDirectory { path: PathBuf },
    Rename { path: PathBuf, new_name: String },
}

impl Command {
    /// Whether the command is a user-initiated filesystem operation, whose
    /// filesystem errors are reported as a failed result
    pub fn is_file_operation(&self) -> bool {
        matches!(
            self,
            Command::ReadFile { .. }
                | Command::WriteFile { .. }
                | Command::CreateFile { .. }
                | Command::CreateDirectory { .. }
                | Command::UnlinkFile { .. }
                | Command::UnlinkDirectory { .. }
                | Command::Rename { .. }
        )
    }
}

/// Payload of a successful command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CommandOutput {
    Done,
    /// File contents (lossy UTF-8)
    Contents(String),
    /// Path of the entry a command created or renamed
    Path(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "camelCase")]
pub enum CommandResult {
    Ok(CommandOutput),
    Failed { reason: String },
}

impl CommandResult {
    pub fn done() -> Self {
        CommandResult::Ok(CommandOutput::Done)
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        CommandResult::Failed { reason: reason.into() }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, CommandResult::Ok(_))
    }
}
