//! Ignore pattern management
//!
//! Supports multiple sources of ignore patterns:
//! 1. Built-in patterns (hidden entries, dependency directories and archive
//!    bundles, always active)
//! 2. The workspace `.gitignore` (optional)
//! 3. Config-based patterns (additional gitignore-style lines)
//!
//! All rules are evaluated against the path relative to the watched root,
//! so a root that itself lives inside a hidden directory is still watched.

use crate::error::Result;
use ::ignore::gitignore::{Gitignore, GitignoreBuilder};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Directory names never mirrored into the tree
const DEPENDENCY_DIRS: &[&str] = &["node_modules"];

/// Opaque bundle extension treated as a single ignored entry
const BUNDLE_SUFFIX: &str = ".asar";

/// Ignore rule manager for one watched root
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    /// Watched root directory
    root: PathBuf,

    /// Gitignore patterns (optional)
    gitignore: Option<Gitignore>,

    /// Patterns from configuration (optional)
    additional: Option<Gitignore>,

    /// Configuration
    config: IgnoreConfig,
}

impl IgnoreRules {
    /// Load ignore rules for a root
    pub fn load(root: &Path, config: IgnoreConfig) -> Result<Self> {
        let mut rules = Self {
            root: root.to_path_buf(),
            gitignore: None,
            additional: None,
            config,
        };

        rules.reload()?;
        Ok(rules)
    }

    /// Built-in rules only
    pub fn builtin(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            gitignore: None,
            additional: None,
            config: IgnoreConfig::default(),
        }
    }

    /// Rebuild the optional matchers from disk and configuration
    pub fn reload(&mut self) -> Result<()> {
        self.gitignore = None;
        if self.config.use_gitignore {
            let gitignore_path = self.root.join(".gitignore");
            if gitignore_path.exists() {
                let mut builder = GitignoreBuilder::new(&self.root);
                if let Some(err) = builder.add(&gitignore_path) {
                    return Err(err.into());
                }
                self.gitignore = Some(builder.build()?);
            }
        }

        self.additional = None;
        if !self.config.additional_patterns.is_empty() {
            let mut builder = GitignoreBuilder::new(&self.root);
            for pattern in &self.config.additional_patterns {
                builder.add_line(None, pattern)?;
            }
            self.additional = Some(builder.build()?);
        }

        Ok(())
    }

    /// Check if a path should be excluded from the tree and from events.
    ///
    /// Accepts an absolute path below the root or a root-relative path.
    pub fn is_ignored(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        if relative.as_os_str().is_empty() || relative.is_absolute() {
            return false;
        }

        if is_builtin_ignored(relative) {
            return true;
        }

        let full_path = self.root.join(relative);
        let is_dir = full_path.is_dir();
        [&self.gitignore, &self.additional]
            .into_iter()
            .flatten()
            .any(|matcher| matcher.matched_path_or_any_parents(&full_path, is_dir).is_ignore())
    }

    /// Number of active ignore sources
    pub fn active_sources(&self) -> usize {
        1 + usize::from(self.gitignore.is_some()) + usize::from(self.additional.is_some())
    }

    /// Watched root
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Hidden segments, dependency directories and bundle archives, anywhere in
/// the relative path
fn is_builtin_ignored(relative: &Path) -> bool {
    relative.components().any(|component| {
        let Component::Normal(segment) = component else {
            return false;
        };
        let segment = segment.to_string_lossy();
        (segment.starts_with('.') && segment.len() > 1)
            || DEPENDENCY_DIRS.iter().any(|dir| segment.starts_with(dir))
            || (segment.len() > BUNDLE_SUFFIX.len() && segment.ends_with(BUNDLE_SUFFIX))
    })
}

/// Ignore configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreConfig {
    /// Also honor `<root>/.gitignore` (default: false)
    #[serde(default)]
    pub use_gitignore: bool,

    /// Additional gitignore-style patterns
    #[serde(default)]
    pub additional_patterns: Vec<String>,
}
