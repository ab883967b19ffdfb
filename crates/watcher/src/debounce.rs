//! Write-stability tracking
//!
//! A file is reported only after its size has stopped changing for the
//! stability threshold, so partially written files never reach the tree.

use crate::event::{CanonicalEvent, EventKind};
use canopy_core::EntryStat;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// A write waiting for its size to settle
#[derive(Debug, Clone)]
pub struct PendingWrite {
    pub path: PathBuf,
    pub kind: EventKind,
    pub stat: EntryStat,
    /// Last time the observed size changed
    since: Instant,
}

impl PendingWrite {
    pub fn into_event(self) -> CanonicalEvent {
        CanonicalEvent::new(self.kind, self.path, Some(self.stat))
    }
}

/// Per-path stability tracker
#[derive(Debug)]
pub struct StabilityTracker {
    threshold: Duration,
    pending: Vec<PendingWrite>,
}

impl StabilityTracker {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            pending: Vec::new(),
        }
    }

    /// Start (or refresh) tracking of `path`.
    ///
    /// A pending `Added` stays `Added` when further writes arrive.
    pub fn begin(&mut self, path: &Path, kind: EventKind, stat: EntryStat, now: Instant) {
        if let Some(entry) = self.pending.iter_mut().find(|p| p.path == path) {
            if entry.stat.size != stat.size {
                entry.since = now;
            }
            entry.stat = stat;
            if entry.kind != EventKind::Added {
                entry.kind = kind;
            }
            return;
        }

        self.pending.push(PendingWrite {
            path: path.to_path_buf(),
            kind,
            stat,
            since: now,
        });
    }

    /// Stop tracking `path`, returning its pending write
    pub fn take(&mut self, path: &Path) -> Option<PendingWrite> {
        let index = self.pending.iter().position(|p| p.path == path)?;
        Some(self.pending.remove(index))
    }

    /// Stop tracking everything at or below `dir`, in arrival order
    pub fn take_under(&mut self, dir: &Path) -> Vec<PendingWrite> {
        let (taken, kept) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|p| p.path.starts_with(dir));
        self.pending = kept;
        taken
    }

    /// Re-probe every pending path and release the stable ones.
    ///
    /// `probe` returns the current stat, or `None` if the path vanished (its
    /// removal event will follow, so the entry is dropped silently).
    pub fn poll(
        &mut self,
        now: Instant,
        mut probe: impl FnMut(&Path) -> Option<EntryStat>,
    ) -> Vec<CanonicalEvent> {
        let threshold = self.threshold;
        let mut ready = Vec::new();

        self.pending.retain_mut(|entry| {
            let Some(stat) = probe(&entry.path) else {
                return false;
            };
            if stat.size != entry.stat.size {
                entry.stat = stat;
                entry.since = now;
                return true;
            }
            entry.stat = stat;
            if now.duration_since(entry.since) >= threshold {
                ready.push(CanonicalEvent::new(entry.kind, entry.path.clone(), Some(stat)));
                return false;
            }
            true
        });

        ready
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
