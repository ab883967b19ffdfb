//! Change-suppression ledger
//!
//! A consumer that is about to write a file records the path here so that
//! the `Changed` event produced by its own write is not echoed back.

use crate::event::{ConsumerId, EventKind, WatchKind};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::trace;

#[derive(Debug, Clone)]
struct SuppressionEntry {
    consumer: ConsumerId,
    path: PathBuf,
    start: Instant,
    duration: Duration,
}

impl SuppressionEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        now.duration_since(self.start) < self.duration
    }
}

/// Short-lived record of self-initiated writes
#[derive(Debug)]
pub struct SuppressionLedger {
    default_window: Duration,
    entries: Vec<SuppressionEntry>,
}

impl SuppressionLedger {
    /// Create a ledger whose entries live for `default_window` unless told
    /// otherwise
    pub fn new(default_window: Duration) -> Self {
        Self {
            default_window,
            entries: Vec::new(),
        }
    }

    /// Record an upcoming self-write with the default window
    pub fn suppress(&mut self, consumer: ConsumerId, path: &Path) {
        self.suppress_at(consumer, path, self.default_window, Instant::now());
    }

    /// Record an upcoming self-write with an explicit window
    pub fn suppress_for(&mut self, consumer: ConsumerId, path: &Path, duration: Duration) {
        self.suppress_at(consumer, path, duration, Instant::now());
    }

    pub(crate) fn suppress_at(
        &mut self,
        consumer: ConsumerId,
        path: &Path,
        duration: Duration,
        now: Instant,
    ) {
        // Entries no event ever matched would otherwise accumulate
        self.entries.retain(|entry| entry.is_fresh(now));
        self.entries.push(SuppressionEntry {
            consumer,
            path: path.to_path_buf(),
            start: now,
            duration,
        });
    }

    /// Decide whether an incoming event is the echo of a recorded write.
    ///
    /// Only file-kind `Changed` events are eligible. Matching entries are
    /// consumed whether or not they are still fresh; an expired one is
    /// discarded without suppressing.
    pub fn should_suppress(
        &mut self,
        consumer: ConsumerId,
        path: &Path,
        watch: WatchKind,
        kind: EventKind,
    ) -> bool {
        self.should_suppress_at(consumer, path, watch, kind, Instant::now())
    }

    pub(crate) fn should_suppress_at(
        &mut self,
        consumer: ConsumerId,
        path: &Path,
        watch: WatchKind,
        kind: EventKind,
        now: Instant,
    ) -> bool {
        if watch != WatchKind::File || kind != EventKind::Changed {
            return false;
        }

        while let Some(index) = self
            .entries
            .iter()
            .position(|entry| entry.consumer == consumer && entry.path == path)
        {
            let entry = self.entries.remove(index);
            if entry.is_fresh(now) {
                trace!("Suppressed self-write echo for {}", path.display());
                return true;
            }
            trace!("Discarded expired suppression for {}", path.display());
        }

        false
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget every entry of one consumer
    pub fn clear_consumer(&mut self, consumer: ConsumerId) {
        self.entries.retain(|entry| entry.consumer != consumer);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(1300);

    #[test]
    fn test_suppression_is_one_shot() {
        let mut ledger = SuppressionLedger::new(WINDOW);
        let consumer = ConsumerId(1);
        let path = Path::new("/w/a.md");

        ledger.suppress(consumer, path);
        assert!(ledger.should_suppress(consumer, path, WatchKind::File, EventKind::Changed));
        assert!(!ledger.should_suppress(consumer, path, WatchKind::File, EventKind::Changed));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_expired_entry_is_consumed_without_suppressing() {
        let mut ledger = SuppressionLedger::new(WINDOW);
        let consumer = ConsumerId(1);
        let path = Path::new("/w/a.md");
        let start = Instant::now();

        ledger.suppress_at(consumer, path, WINDOW, start);
        let late = start + WINDOW + Duration::from_millis(1);
        assert!(!ledger.should_suppress_at(consumer, path, WatchKind::File, EventKind::Changed, late));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_only_file_changes_are_eligible() {
        let mut ledger = SuppressionLedger::new(WINDOW);
        let consumer = ConsumerId(1);
        let path = Path::new("/w/a.md");

        ledger.suppress(consumer, path);
        assert!(!ledger.should_suppress(consumer, path, WatchKind::Directory, EventKind::Changed));
        assert!(!ledger.should_suppress(consumer, path, WatchKind::File, EventKind::Added));
        // Ineligible lookups leave the entry in place
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_scoped_by_consumer() {
        let mut ledger = SuppressionLedger::new(WINDOW);
        let path = Path::new("/w/a.md");

        ledger.suppress(ConsumerId(1), path);
        assert!(!ledger.should_suppress(ConsumerId(2), path, WatchKind::File, EventKind::Changed));
        assert!(ledger.should_suppress(ConsumerId(1), path, WatchKind::File, EventKind::Changed));
    }

    #[test]
    fn test_expired_entries_pruned_on_insert() {
        let mut ledger = SuppressionLedger::new(WINDOW);
        let start = Instant::now();

        ledger.suppress_at(ConsumerId(1), Path::new("/w/a.md"), WINDOW, start);
        ledger.suppress_at(ConsumerId(1), Path::new("/w/b.md"), WINDOW, start + WINDOW * 2);
        assert_eq!(ledger.len(), 1);

        ledger.clear_consumer(ConsumerId(1));
        assert!(ledger.is_empty());
    }
}
