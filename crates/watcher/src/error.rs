//! Watcher error types

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for watcher operations
pub type Result<T> = std::result::Result<T, WatchError>;

#[derive(Error, Debug)]
pub enum WatchError {
    /// The platform ran out of watch descriptors
    #[error("watch limit reached while watching {path}")]
    ResourceExhausted { path: PathBuf },

    /// The native watch could not be installed for another reason
    #[error("failed to watch {path}: {source}")]
    WatchPath {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// Watch paths must be absolute
    #[error("watch path must be absolute: {0}")]
    InvalidPath(PathBuf),

    #[error("invalid ignore pattern: {0}")]
    Ignore(#[from] ::ignore::Error),

    #[error("invalid watcher configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[cfg(unix)]
const ENFILE: i32 = 23;
#[cfg(unix)]
const EMFILE: i32 = 24;
#[cfg(unix)]
const ENOSPC: i32 = 28;

/// Whether a native watcher error means descriptor exhaustion
pub(crate) fn is_resource_exhausted(err: &notify::Error) -> bool {
    match &err.kind {
        notify::ErrorKind::MaxFilesWatch => true,
        #[cfg(unix)]
        notify::ErrorKind::Io(io) => {
            matches!(io.raw_os_error(), Some(ENFILE) | Some(EMFILE) | Some(ENOSPC))
        }
        _ => false,
    }
}

impl WatchError {
    /// Classify a native error raised while installing a watch on `path`
    pub(crate) fn from_notify(path: impl Into<PathBuf>, source: notify::Error) -> Self {
        let path = path.into();
        if is_resource_exhausted(&source) {
            WatchError::ResourceExhausted { path }
        } else {
            WatchError::WatchPath { path, source }
        }
    }
}
