//! User-initiated file operations
//!
//! The tree mirror is not touched here: the workspace watch reports the
//! results back like any other change. Writes that would come back as a
//! `Changed` for an open file are declared to the suppression ledger first.

use canopy_core::{fs, Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use watcher::{ConsumerId, WatchRegistry};

pub struct FileOps {
    registry: Arc<WatchRegistry>,
    consumer: ConsumerId,
}

impl FileOps {
    pub fn new(registry: Arc<WatchRegistry>, consumer: ConsumerId) -> Self {
        Self { registry, consumer }
    }

    pub fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read_file(path)
    }

    /// Overwrite `path`; the resulting change is not echoed back to us
    pub fn write_file(&self, path: &Path, contents: &[u8]) -> Result<()> {
        if !path.is_file() {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        self.registry.suppress(self.consumer, path);
        fs::write_file(path, contents)?;
        debug!("Wrote {} bytes to {}", contents.len(), path.display());
        Ok(())
    }

    /// Create an empty file named `name` in `dir`, or `name(1).ext`,
    /// `name(2).ext`, ... if taken. Returns the created path.
    pub fn create_file(&self, dir: &Path, name: &str) -> Result<PathBuf> {
        let path = dir.join(self.free_name(dir, name)?);
        fs::create_file(&path)?;
        info!("Created file {}", path.display());
        Ok(path)
    }

    /// Directory counterpart of [`create_file`](Self::create_file)
    pub fn create_directory(&self, dir: &Path, name: &str) -> Result<PathBuf> {
        let path = dir.join(self.free_name(dir, name)?);
        fs::mkdir(&path)?;
        info!("Created directory {}", path.display());
        Ok(path)
    }

    /// Delete a file. A file that is already gone is not an error.
    pub fn unlink_file(&self, path: &Path) -> Result<()> {
        if path.is_dir() {
            return Err(Error::InvalidPath {
                path: path.to_path_buf(),
                reason: "expected a file, found a directory",
            });
        }
        remove_if_present(path)
    }

    /// Delete a directory and its contents. Already gone is not an error.
    pub fn unlink_directory(&self, path: &Path) -> Result<()> {
        if path.is_file() {
            return Err(Error::InvalidPath {
                path: path.to_path_buf(),
                reason: "expected a directory, found a file",
            });
        }
        remove_if_present(path)
    }

    /// Rename within the same directory. Returns the new path.
    pub fn rename(&self, path: &Path, new_name: &str) -> Result<PathBuf> {
        let renamed = fs::rename(path, new_name)?;
        info!("Renamed {} to {}", path.display(), renamed.display());
        Ok(renamed)
    }

    fn free_name(&self, dir: &Path, name: &str) -> Result<String> {
        if name.is_empty() || name.contains(|c| c == '/' || c == '\\') {
            return Err(Error::InvalidPath {
                path: PathBuf::from(name),
                reason: "name must be a single path segment",
            });
        }
        fs::unique_name(dir, name)
    }
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove(path) {
        Ok(()) => {
            info!("Removed {}", path.display());
            Ok(())
        }
        Err(e) if e.is_not_found() => {
            debug!("{} already gone", path.display());
            Ok(())
        }
        Err(e) => Err(e),
    }
}
