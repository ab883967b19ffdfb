//! In-memory mirror of one workspace directory
//!
//! The tree is driven by canonical add/remove events. Every mutation walks
//! from the root through the path's directory segments, so lookups never
//! depend on the filesystem, only on the event stream that built the tree.

use crate::error::{Error, Result};
use crate::fs;
use crate::node::{name_without_extension, EntryStat, FileNode};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Outcome of an insertion into the tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Insertion {
    /// Number of directory nodes created (missing ancestors included)
    pub folders_created: usize,
    /// Whether the requested leaf was inserted (false for duplicates)
    pub inserted: bool,
}

/// Hierarchical mirror of a workspace root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    root: FileNode,
}

impl Tree {
    /// Create a tree holding only the root directory
    pub fn new(root_path: &Path, stat: &EntryStat) -> Result<Self> {
        if !root_path.is_absolute() {
            return Err(Error::InvalidPath {
                path: root_path.to_path_buf(),
                reason: "workspace root must be absolute",
            });
        }
        if !stat.is_directory {
            return Err(Error::InvalidPath {
                path: root_path.to_path_buf(),
                reason: "workspace root must be a directory",
            });
        }

        Ok(Self {
            root: FileNode::directory(root_path, stat),
        })
    }

    /// Build the tree by recursively scanning `root_path`.
    ///
    /// Entries for which `is_ignored` returns true are skipped together
    /// with everything below them. Unreadable entries are skipped.
    pub fn scan(root_path: &Path, mut is_ignored: impl FnMut(&Path) -> bool) -> Result<Self> {
        let mut tree = Self::new(root_path, &fs::stat(root_path)?)?;

        let walker = WalkDir::new(root_path)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_ignored(entry.path()));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry during scan: {}", e);
                    continue;
                }
            };

            let stat = match fs::stat(entry.path()) {
                Ok(stat) => stat,
                Err(e) => {
                    debug!("Entry vanished during scan: {}", e);
                    continue;
                }
            };

            if stat.is_directory {
                tree.add_dir(entry.path(), &stat)?;
            } else if stat.is_file {
                tree.add_file(entry.path(), &stat)?;
            }
        }

        debug!(
            "Scanned {} ({} folders)",
            root_path.display(),
            tree.folder_count()
        );
        Ok(tree)
    }

    /// Root node
    pub fn root(&self) -> &FileNode {
        &self.root
    }

    /// Absolute path of the root
    pub fn root_path(&self) -> &Path {
        &self.root.path
    }

    /// Insert a file, creating any missing ancestor directories.
    ///
    /// A file whose name already exists under the parent is left alone.
    pub fn add_file(&mut self, path: &Path, stat: &EntryStat) -> Result<Insertion> {
        let parent = self.parent_of(path)?;
        let segments = self.get_subdirectories_from_root(parent)?;
        let (folder, folders_created) = self.ensure_folders(&segments, stat);

        let name = name_without_extension(path);
        let inserted = !folder.children.files.iter().any(|f| f.name == name);
        if inserted {
            folder.children.files.push(FileNode::file(path, stat));
            debug!("tree: added file {}", path.display());
        }

        Ok(Insertion {
            folders_created,
            inserted,
        })
    }

    /// Ensure the directory `path` and all its ancestors exist
    pub fn add_dir(&mut self, path: &Path, stat: &EntryStat) -> Result<Insertion> {
        let segments = self.get_subdirectories_from_root(path)?;
        let (_, folders_created) = self.ensure_folders(&segments, stat);
        if folders_created > 0 {
            debug!("tree: added directory {}", path.display());
        }

        Ok(Insertion {
            folders_created,
            inserted: folders_created > 0,
        })
    }

    /// Remove a file. Returns the removed node, or `None` when the parent
    /// or the file is already gone.
    pub fn unlink_file(&mut self, path: &Path) -> Result<Option<FileNode>> {
        let parent = self.parent_of(path)?;
        let segments = self.get_subdirectories_from_root(parent)?;

        let Some(folder) = self.folder_at_mut(&segments) else {
            return Ok(None);
        };
        let Some(index) = folder.children.files.iter().position(|f| f.path == path) else {
            return Ok(None);
        };

        debug!("tree: removed file {}", path.display());
        Ok(Some(folder.children.files.remove(index)))
    }

    /// Remove a directory and its whole subtree. Returns the removed node,
    /// or `None` when it is already gone.
    pub fn unlink_dir(&mut self, path: &Path) -> Result<Option<FileNode>> {
        let mut segments = self.get_subdirectories_from_root(path)?;
        let Some(name) = segments.pop() else {
            warn!("Ignoring removal of the workspace root {}", path.display());
            return Ok(None);
        };

        let Some(parent) = self.folder_at_mut(&segments) else {
            return Ok(None);
        };
        let Some(index) = parent.children.folders.iter().position(|f| f.name == name) else {
            return Ok(None);
        };

        debug!("tree: removed directory {}", path.display());
        Ok(Some(parent.children.folders.remove(index)))
    }

    /// Resolve a file node by absolute path
    pub fn get_file_item_by_path(&self, path: &Path) -> Result<Option<&FileNode>> {
        let parent = self.parent_of(path)?;
        let segments = self.get_subdirectories_from_root(parent)?;

        Ok(self
            .folder_at(&segments)
            .and_then(|folder| folder.children.files.iter().find(|f| f.path == path)))
    }

    /// Resolve a directory node by absolute path (the root included)
    pub fn get_dir_by_path(&self, path: &Path) -> Result<Option<&FileNode>> {
        let segments = self.get_subdirectories_from_root(path)?;
        Ok(self.folder_at(&segments))
    }

    /// Pre-order list of every directory path, the root first
    pub fn get_all_path(&self) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        self.root.collect_folder_paths(&mut paths);
        paths
    }

    /// Number of directory nodes, the root included
    pub fn folder_count(&self) -> usize {
        self.root.folder_count()
    }

    /// Directory segments from the root down to `path`.
    ///
    /// `path` must be absolute and equal to or below the root; anything else
    /// is a caller defect reported as `InvalidPath`.
    pub fn get_subdirectories_from_root(&self, path: &Path) -> Result<Vec<String>> {
        if !path.is_absolute() {
            return Err(Error::InvalidPath {
                path: path.to_path_buf(),
                reason: "path must be absolute",
            });
        }
        let relative = path.strip_prefix(&self.root.path).map_err(|_| Error::InvalidPath {
            path: path.to_path_buf(),
            reason: "path is outside the workspace root",
        })?;

        relative
            .components()
            .map(|component| match component {
                Component::Normal(segment) => Ok(segment.to_string_lossy().into_owned()),
                _ => Err(Error::InvalidPath {
                    path: path.to_path_buf(),
                    reason: "path must be normalized",
                }),
            })
            .collect()
    }

    /// Immutable copy of the whole tree for hand-off across a boundary
    pub fn snapshot(&self) -> FileNode {
        self.root.clone()
    }

    fn parent_of<'a>(&self, path: &'a Path) -> Result<&'a Path> {
        match path.parent() {
            Some(parent) if path != self.root.path => Ok(parent),
            _ => Err(Error::InvalidPath {
                path: path.to_path_buf(),
                reason: "path must name an entry below the workspace root",
            }),
        }
    }

    fn folder_at(&self, segments: &[String]) -> Option<&FileNode> {
        let mut current = &self.root;
        for segment in segments {
            current = current.folder(segment)?;
        }
        Some(current)
    }

    fn folder_at_mut(&mut self, segments: &[String]) -> Option<&mut FileNode> {
        let mut current = &mut self.root;
        for segment in segments {
            current = current.folder_mut(segment)?;
        }
        Some(current)
    }

    /// Walk down `segments`, creating missing directories from `stat`.
    fn ensure_folders(&mut self, segments: &[String], stat: &EntryStat) -> (&mut FileNode, usize) {
        let mut created = 0;
        let mut current = &mut self.root;

        for segment in segments {
            let index = match current.children.folders.iter().position(|f| f.name == *segment) {
                Some(index) => index,
                None => {
                    let path = current.path.join(segment);
                    current.children.folders.push(FileNode::directory(&path, stat));
                    created += 1;
                    current.children.folders.len() - 1
                }
            };
            current = &mut current.children.folders[index];
        }

        (current, created)
    }
}
