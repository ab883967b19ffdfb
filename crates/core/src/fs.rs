//! Filesystem boundary used by the tree mirror and file commands
//!
//! Every helper maps `io::Error` into the crate taxonomy so callers can
//! tell "already gone" apart from real failures.

use crate::error::{Error, Result};
use crate::node::EntryStat;
use std::fs;
use std::path::{Path, PathBuf};

/// One entry returned by [`read_directory`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryInfo {
    pub name: String,
    pub is_file: bool,
    pub is_directory: bool,
}

/// Stat a path. Fails with `NotFound` if it does not exist.
pub fn stat(path: &Path) -> Result<EntryStat> {
    let metadata = fs::metadata(path).map_err(|e| Error::from_io(path, e))?;
    Ok(EntryStat::from_metadata(&metadata))
}

/// List the immediate entries of a directory
pub fn read_directory(path: &Path) -> Result<Vec<DirEntryInfo>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(path).map_err(|e| Error::from_io(path, e))? {
        let entry = entry.map_err(|e| Error::from_io(path, e))?;
        let file_type = entry.file_type().map_err(|e| Error::from_io(entry.path(), e))?;
        entries.push(DirEntryInfo {
            name: entry.file_name().to_string_lossy().into_owned(),
            is_file: file_type.is_file(),
            is_directory: file_type.is_dir(),
        });
    }
    Ok(entries)
}

/// Read a whole file
pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| Error::from_io(path, e))
}

/// Write a whole file in place.
///
/// The write goes to the target inode so that native watchers report a
/// content change rather than a create/rename pair.
pub fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    fs::write(path, contents).map_err(|e| Error::from_io(path, e))
}

/// Create a new empty file. Fails with `AlreadyExists` on collision.
pub fn create_file(path: &Path) -> Result<()> {
    fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map(|_| ())
        .map_err(|e| Error::from_io(path, e))
}

/// Create a directory (parent must exist)
pub fn mkdir(path: &Path) -> Result<()> {
    fs::create_dir(path).map_err(|e| Error::from_io(path, e))
}

/// Remove a file, or a directory with all its contents
pub fn remove(path: &Path) -> Result<()> {
    let metadata = fs::symlink_metadata(path).map_err(|e| Error::from_io(path, e))?;
    let result = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(|e| Error::from_io(path, e))
}

/// Rename `old_path` to `new_name` inside the same parent directory.
///
/// Returns the new absolute path. Refuses to overwrite an existing entry.
pub fn rename(old_path: &Path, new_name: &str) -> Result<PathBuf> {
    if new_name.is_empty() || new_name.contains(|c| c == '/' || c == '\\') {
        return Err(Error::InvalidPath {
            path: PathBuf::from(new_name),
            reason: "new name must be a single path segment",
        });
    }
    let parent = old_path.parent().ok_or_else(|| Error::InvalidPath {
        path: old_path.to_path_buf(),
        reason: "path has no parent directory",
    })?;
    let new_path = parent.join(new_name);

    if fs::symlink_metadata(&new_path).is_ok() {
        return Err(Error::AlreadyExists(new_path));
    }
    fs::rename(old_path, &new_path).map_err(|e| Error::from_io(old_path, e))?;
    Ok(new_path)
}

/// Pick a name inside `dir` that does not collide with an existing entry.
///
/// `notes.md` becomes `notes(1).md`, `notes(2).md`, ...; names without an
/// extension get the counter appended directly.
pub fn unique_name(dir: &Path, filename: &str) -> Result<String> {
    if !dir.is_dir() {
        return Err(Error::NotFound(dir.to_path_buf()));
    }
    if fs::symlink_metadata(dir.join(filename)).is_err() {
        return Ok(filename.to_string());
    }

    let candidate = Path::new(filename);
    let stem = candidate
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string());
    let ext = candidate
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut counter = 1u32;
    loop {
        let name = format!("{}({}){}", stem, counter, ext);
        if fs::symlink_metadata(dir.join(&name)).is_err() {
            return Ok(name);
        }
        counter += 1;
    }
}
