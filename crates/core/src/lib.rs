//! Core data model for Canopy
//!
//! This crate provides:
//! - `FileNode`, the in-memory representation of one file or directory
//! - `Tree`, a hierarchical mirror of one workspace directory
//! - The filesystem boundary (stat, read, write, mkdir, remove, rename)
//! - Sort helpers used when handing a tree to the presentation layer

pub mod error;
pub mod fs;
pub mod node;
pub mod sort;
pub mod tree;

// Re-exports
pub use error::{Error, Result};
pub use node::{Children, EntryStat, FileNode};
pub use sort::SortOrder;
pub use tree::{Insertion, Tree};
