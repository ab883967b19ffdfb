//! Platform-specific watch placement
//!
//! macOS never delivers reliable single-file notifications, so it always
//! polls and observes a watched file through its containing directory.

use crate::event::WatchKind;
use notify::RecursiveMode;
use std::path::{Path, PathBuf};

/// Whether this platform must use the polling backend
pub fn prefers_polling() -> bool {
    cfg!(target_os = "macos")
}

/// Where the native watch is installed for a subscription on `path`
pub fn watch_target(path: &Path, kind: WatchKind) -> (PathBuf, RecursiveMode) {
    match kind {
        WatchKind::Directory => (path.to_path_buf(), RecursiveMode::Recursive),
        WatchKind::File if cfg!(target_os = "macos") => {
            let parent = path.parent().unwrap_or(path);
            (parent.to_path_buf(), RecursiveMode::NonRecursive)
        }
        WatchKind::File => (path.to_path_buf(), RecursiveMode::NonRecursive),
    }
}
