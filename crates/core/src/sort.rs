//! Presentation-time ordering of tree snapshots
//!
//! The tree keeps discovery order. Sorting happens on a copy handed to the
//! presentation layer, directories always before files.

use crate::node::FileNode;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Sort mode persisted per workspace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
    #[default]
    AlphabeticalAsc,
    AlphabeticalDesc,
    CreatedTimeAsc,
    CreatedTimeDesc,
    ModifiedTimeAsc,
    ModifiedTimeDesc,
}

impl SortOrder {
    /// Compare two siblings under this order (directories first)
    pub fn compare(self, a: &FileNode, b: &FileNode) -> Ordering {
        if a.is_directory != b.is_directory {
            return if a.is_directory {
                Ordering::Less
            } else {
                Ordering::Greater
            };
        }

        match self {
            SortOrder::AlphabeticalAsc => natural_cmp(&a.basename, &b.basename),
            SortOrder::AlphabeticalDesc => natural_cmp(&b.basename, &a.basename),
            SortOrder::CreatedTimeAsc => a.created_at.cmp(&b.created_at),
            SortOrder::CreatedTimeDesc => b.created_at.cmp(&a.created_at),
            SortOrder::ModifiedTimeAsc => a.modified_at.cmp(&b.modified_at),
            SortOrder::ModifiedTimeDesc => b.modified_at.cmp(&a.modified_at),
        }
    }
}

/// Copy of `node` with every level's children ordered by `order`
pub fn sorted_snapshot(node: &FileNode, order: SortOrder) -> FileNode {
    let mut copy = node.clone();
    sort_in_place(&mut copy, order);
    copy
}

fn sort_in_place(node: &mut FileNode, order: SortOrder) {
    node.children.files.sort_by(|a, b| order.compare(a, b));
    node.children.folders.sort_by(|a, b| order.compare(a, b));
    for folder in &mut node.children.folders {
        sort_in_place(folder, order);
    }
}

/// Case-insensitive comparison treating digit runs as numbers,
/// so `note2` sorts before `note10`.
fn natural_cmp(a: &str, b: &str) -> Ordering {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let lhs = take_number(&mut left);
                let rhs = take_number(&mut right);
                let ord = lhs
                    .trim_start_matches('0')
                    .len()
                    .cmp(&rhs.trim_start_matches('0').len())
                    .then_with(|| lhs.trim_start_matches('0').cmp(rhs.trim_start_matches('0')));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(&y);
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.peek().copied() {
        if !c.is_ascii_digit() {
            break;
        }
        digits.push(c);
        chars.next();
    }
    digits
}
