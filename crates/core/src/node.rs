//! File and directory nodes of the workspace tree

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::Metadata;
use std::path::{Path, PathBuf};

/// Stat metadata accompanying a node or a canonical event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryStat {
    pub is_file: bool,
    pub is_directory: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    /// Size in bytes (0 for directories)
    pub size: u64,
}

impl EntryStat {
    /// Build from `std::fs::Metadata`.
    ///
    /// Birth time is not available on every filesystem; the modification
    /// time stands in for it there.
    pub fn from_metadata(metadata: &Metadata) -> Self {
        let modified_at = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        let created_at = metadata
            .created()
            .map(DateTime::<Utc>::from)
            .unwrap_or(modified_at);

        Self {
            is_file: metadata.is_file(),
            is_directory: metadata.is_dir(),
            created_at,
            modified_at,
            size: if metadata.is_dir() { 0 } else { metadata.len() },
        }
    }

    /// Stat for a regular file created and modified at `at`
    pub fn file(at: DateTime<Utc>, size: u64) -> Self {
        Self {
            is_file: true,
            is_directory: false,
            created_at: at,
            modified_at: at,
            size,
        }
    }

    /// Stat for a directory created and modified at `at`
    pub fn directory(at: DateTime<Utc>) -> Self {
        Self {
            is_file: false,
            is_directory: true,
            created_at: at,
            modified_at: at,
            size: 0,
        }
    }
}

/// Child collections of a directory node (always empty for files)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Children {
    pub files: Vec<FileNode>,
    pub folders: Vec<FileNode>,
}

/// One file or directory in the tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileNode {
    /// Last path segment, with extension
    pub basename: String,
    /// Basename without extension (equal to basename for directories)
    pub name: String,
    /// Lower-cased extension with leading dot, empty for directories
    pub extension: String,
    /// Absolute path
    pub path: PathBuf,
    pub is_file: bool,
    pub is_directory: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub children: Children,
}

impl FileNode {
    /// Create a file node for `path`
    pub fn file(path: &Path, stat: &EntryStat) -> Self {
        Self {
            basename: basename_of(path),
            name: name_without_extension(path),
            extension: extension_of(path),
            path: path.to_path_buf(),
            is_file: true,
            is_directory: false,
            created_at: stat.created_at,
            modified_at: stat.modified_at,
            children: Children::default(),
        }
    }

    /// Create an empty directory node for `path`
    pub fn directory(path: &Path, stat: &EntryStat) -> Self {
        let basename = basename_of(path);
        Self {
            name: basename.clone(),
            basename,
            extension: String::new(),
            path: path.to_path_buf(),
            is_file: false,
            is_directory: true,
            created_at: stat.created_at,
            modified_at: stat.modified_at,
            children: Children::default(),
        }
    }

    /// Direct child folder with the given name
    pub fn folder(&self, name: &str) -> Option<&FileNode> {
        self.children.folders.iter().find(|f| f.name == name)
    }

    /// Mutable direct child folder with the given name
    pub fn folder_mut(&mut self, name: &str) -> Option<&mut FileNode> {
        self.children.folders.iter_mut().find(|f| f.name == name)
    }

    /// Number of directory nodes in this subtree, including `self` when it
    /// is a directory
    pub fn folder_count(&self) -> usize {
        let own = usize::from(self.is_directory);
        own + self
            .children
            .folders
            .iter()
            .map(FileNode::folder_count)
            .sum::<usize>()
    }

    /// Pre-order walk over directory paths of this subtree
    pub fn collect_folder_paths(&self, out: &mut Vec<PathBuf>) {
        if self.is_directory {
            out.push(self.path.clone());
        }
        for folder in &self.children.folders {
            folder.collect_folder_paths(out);
        }
    }
}

/// Last path segment as a string
pub fn basename_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Basename without its final extension (`notes.tar.gz` -> `notes.tar`)
pub fn name_without_extension(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| basename_of(path))
}

/// Lower-cased final extension with leading dot, or empty
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}
