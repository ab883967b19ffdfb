//! Directory reconciliation walks
//!
//! Native backends do not report the pre-existing children of a directory
//! that was moved in or created with `mkdir -p`, and they drop events on
//! overflow. Both cases are repaired by walking the filesystem and
//! synthesizing adds, which the tree applies idempotently.

use crate::ignore::IgnoreRules;
use canopy_core::{fs, EntryStat};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// An entry found by a reconciliation walk
#[derive(Debug, Clone)]
pub struct Discovered {
    pub path: PathBuf,
    pub stat: EntryStat,
}

/// Walk everything below `dir` that the ignore rules let through.
///
/// Entries come out in pre-order, parents before children. Unreadable or
/// vanished entries are skipped.
pub fn walk(dir: &Path, rules: &IgnoreRules) -> Vec<Discovered> {
    let mut found = Vec::new();

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !rules.is_ignored(entry.path()));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping entry during reconcile walk: {}", e);
                continue;
            }
        };

        match fs::stat(entry.path()) {
            Ok(stat) if stat.is_file || stat.is_directory => found.push(Discovered {
                path: entry.into_path(),
                stat,
            }),
            Ok(_) => {}
            Err(e) => debug!("Entry vanished during reconcile walk: {}", e),
        }
    }

    found
}

/// Every non-ignored directory below `dir`
pub fn directories(dir: &Path, rules: &IgnoreRules) -> Vec<PathBuf> {
    walk(dir, rules)
        .into_iter()
        .filter(|d| d.stat.is_directory)
        .map(|d| d.path)
        .collect()
}
