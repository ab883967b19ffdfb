//! Error taxonomy shared by the tree mirror and the filesystem boundary

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the tree mirror and filesystem helpers
#[derive(Error, Debug)]
pub enum Error {
    /// Stat/read target does not exist
    #[error("path not found: {0}")]
    NotFound(PathBuf),

    /// Create or rename target already exists
    #[error("path already exists: {0}")]
    AlreadyExists(PathBuf),

    /// Relative path where an absolute one is required, or a path outside
    /// the workspace root. Always a caller defect.
    #[error("invalid path {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: &'static str },

    /// Any other I/O failure
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Classify an `io::Error` for `path` into the taxonomy
    pub fn from_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            io::ErrorKind::NotFound => Error::NotFound(path),
            io::ErrorKind::AlreadyExists => Error::AlreadyExists(path),
            _ => Error::Io { path, source },
        }
    }

    /// Whether this error means the target is already gone
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_classification() {
        let err = Error::from_io("/w/a.txt", io::Error::from(io::ErrorKind::NotFound));
        assert!(err.is_not_found());

        let err = Error::from_io("/w/a.txt", io::Error::from(io::ErrorKind::AlreadyExists));
        assert!(matches!(err, Error::AlreadyExists(_)));

        let err = Error::from_io("/w/a.txt", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, Error::Io { .. }));
    }
}
