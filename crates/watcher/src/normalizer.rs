//! Event normalizer
//!
//! Wraps one native watch and turns its raw notifications into canonical
//! events. Raw events are handed from the backend thread to a worker thread
//! over a channel; the worker classifies them, applies the ignore rules,
//! holds files back until their size is stable and forwards the results to
//! the registry.

use crate::config::WatcherConfig;
use crate::debounce::StabilityTracker;
use crate::error::{is_resource_exhausted, Result, WatchError};
use crate::event::{CanonicalEvent, EventKind, SubscriptionId, WatchKind};
use crate::ignore::IgnoreRules;
use crate::platform;
use crate::reconcile;
use ahash::AHashSet;
use canopy_core::fs;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind as NativeKind, PollWatcher, RecommendedWatcher, Watcher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Message from a normalizer worker to the registry
#[derive(Debug)]
pub(crate) enum WorkerMessage {
    Event {
        subscription: SubscriptionId,
        event: CanonicalEvent,
    },
    ResourceExhausted {
        subscription: SubscriptionId,
        root: PathBuf,
    },
}

/// A running native watch plus its worker thread
pub(crate) struct Normalizer {
    path: PathBuf,
    watcher: Option<Box<dyn Watcher + Send>>,
    closed: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl Normalizer {
    /// Install the native watch for `path` and start the worker
    pub(crate) fn spawn(
        subscription: SubscriptionId,
        path: &Path,
        kind: WatchKind,
        config: &WatcherConfig,
        rules: IgnoreRules,
        out: Sender<WorkerMessage>,
    ) -> Result<Self> {
        let (raw_tx, raw_rx) = unbounded();
        let mut watcher = create_backend(config, raw_tx)?;

        let (target, mode) = platform::watch_target(path, kind);
        watcher
            .watch(&target, mode)
            .map_err(|e| WatchError::from_notify(path, e))?;

        let closed = Arc::new(AtomicBool::new(false));
        let mut state = NormalizerState::new(path.to_path_buf(), kind, rules, config.stability_threshold());
        let worker_closed = Arc::clone(&closed);
        let poll_interval = config.poll_interval();

        let worker = std::thread::Builder::new()
            .name(format!("canopy-watch-{}", subscription))
            .spawn(move || {
                state.prime();
                run_worker(subscription, state, raw_rx, out, worker_closed, poll_interval);
            })?;

        debug!("Watching {} ({:?}, {:?})", path.display(), kind, mode);
        Ok(Self {
            path: path.to_path_buf(),
            watcher: Some(watcher),
            closed,
            worker: Some(worker),
        })
    }
}

impl Drop for Normalizer {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Release);
        // Dropping the backend disconnects the raw channel and wakes the worker
        self.watcher.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Watch worker for {} panicked", self.path.display());
            }
        }
        debug!("Stopped watching {}", self.path.display());
    }
}

fn create_backend(
    config: &WatcherConfig,
    raw_tx: Sender<notify::Result<Event>>,
) -> Result<Box<dyn Watcher + Send>> {
    let handler = move |res: notify::Result<Event>| {
        let _ = raw_tx.send(res);
    };

    if config.use_polling || platform::prefers_polling() {
        let backend_config = notify::Config::default().with_poll_interval(config.poll_interval());
        let watcher = PollWatcher::new(handler, backend_config)
            .map_err(|e| WatchError::from_notify(PathBuf::new(), e))?;
        Ok(Box::new(watcher))
    } else {
        let watcher = RecommendedWatcher::new(handler, notify::Config::default())
            .map_err(|e| WatchError::from_notify(PathBuf::new(), e))?;
        Ok(Box::new(watcher))
    }
}

fn run_worker(
    subscription: SubscriptionId,
    mut state: NormalizerState,
    raw_rx: Receiver<notify::Result<Event>>,
    out: Sender<WorkerMessage>,
    closed: Arc<AtomicBool>,
    poll_interval: Duration,
) {
    let mut last_tick = Instant::now();

    loop {
        if closed.load(Ordering::Acquire) {
            break;
        }

        match raw_rx.recv_timeout(poll_interval) {
            Ok(Ok(event)) => state.handle(event, Instant::now()),
            Ok(Err(e)) if is_resource_exhausted(&e) => {
                warn!("Watch limit reached under {}: {}", state.root.display(), e);
                let msg = WorkerMessage::ResourceExhausted {
                    subscription,
                    root: state.root.clone(),
                };
                if out.send(msg).is_err() {
                    break;
                }
            }
            Ok(Err(e)) => warn!("Watch error under {}: {}", state.root.display(), e),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        let now = Instant::now();
        if now.duration_since(last_tick) >= poll_interval {
            state.tick(now);
            last_tick = now;
        }

        for event in state.drain() {
            if closed.load(Ordering::Acquire) {
                return;
            }
            if out.send(WorkerMessage::Event { subscription, event }).is_err() {
                return;
            }
        }
    }

    trace!("Watch worker for {} exiting", state.root.display());
}

/// Classification state of one subscription, independent of threads
pub(crate) struct NormalizerState {
    root: PathBuf,
    kind: WatchKind,
    rules: IgnoreRules,
    /// Directories known to exist, used to classify ambiguous removals
    known_dirs: AHashSet<PathBuf>,
    stability: StabilityTracker,
    ready: Vec<CanonicalEvent>,
}

impl NormalizerState {
    pub(crate) fn new(root: PathBuf, kind: WatchKind, rules: IgnoreRules, threshold: Duration) -> Self {
        Self {
            root,
            kind,
            rules,
            known_dirs: AHashSet::new(),
            stability: StabilityTracker::new(threshold),
            ready: Vec::new(),
        }
    }

    /// Record the directories that already exist under the root
    pub(crate) fn prime(&mut self) {
        if self.kind == WatchKind::Directory {
            self.known_dirs = reconcile::directories(&self.root, &self.rules)
                .into_iter()
                .collect();
            self.known_dirs.insert(self.root.clone());
        }
    }

    /// Classify one raw notification
    pub(crate) fn handle(&mut self, event: Event, now: Instant) {
        if event.need_rescan() {
            self.rescan(now);
        }

        match event.kind {
            NativeKind::Create(CreateKind::Folder) => {
                for path in self.relevant(&event.paths) {
                    self.directory_appeared(&path, now);
                }
            }
            NativeKind::Create(_) => {
                for path in self.relevant(&event.paths) {
                    self.appeared(&path, now);
                }
            }
            NativeKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => {
                if self.is_relevant(&event.paths[0]) {
                    self.disappeared(&event.paths[0]);
                }
                if self.is_relevant(&event.paths[1]) {
                    self.appeared(&event.paths[1], now);
                }
            }
            NativeKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                for path in self.relevant(&event.paths) {
                    self.disappeared(&path);
                }
            }
            NativeKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                for path in self.relevant(&event.paths) {
                    self.appeared(&path, now);
                }
            }
            NativeKind::Modify(ModifyKind::Name(_)) => {
                for path in self.relevant(&event.paths) {
                    if path.exists() {
                        self.appeared(&path, now);
                    } else {
                        self.disappeared(&path);
                    }
                }
            }
            NativeKind::Modify(_) => {
                for path in self.relevant(&event.paths) {
                    self.modified(&path, now);
                }
            }
            NativeKind::Remove(RemoveKind::Folder) => {
                for path in self.relevant(&event.paths) {
                    self.directory_removed(&path);
                }
            }
            NativeKind::Remove(RemoveKind::File) => {
                for path in self.relevant(&event.paths) {
                    self.file_removed(&path);
                }
            }
            NativeKind::Remove(_) => {
                for path in self.relevant(&event.paths) {
                    self.disappeared(&path);
                }
            }
            NativeKind::Access(_) | NativeKind::Any | NativeKind::Other => {
                trace!("Ignoring native event {:?}", event.kind);
            }
        }
    }

    /// Release writes whose size has settled
    pub(crate) fn tick(&mut self, now: Instant) {
        let stable = self.stability.poll(now, |path| fs::stat(path).ok());
        self.ready.extend(stable);
    }

    /// Take the events ready for delivery, in emission order
    pub(crate) fn drain(&mut self) -> Vec<CanonicalEvent> {
        std::mem::take(&mut self.ready)
    }

    fn is_relevant(&self, path: &Path) -> bool {
        match self.kind {
            WatchKind::File => path == self.root,
            WatchKind::Directory => {
                path.starts_with(&self.root) && !self.rules.is_ignored(path)
            }
        }
    }

    fn relevant(&self, paths: &[PathBuf]) -> Vec<PathBuf> {
        paths.iter().filter(|p| self.is_relevant(p)).cloned().collect()
    }

    fn appeared(&mut self, path: &Path, now: Instant) {
        match fs::stat(path) {
            Ok(stat) if stat.is_directory => self.directory_appeared(path, now),
            Ok(stat) if stat.is_file => self.stability.begin(path, EventKind::Added, stat, now),
            Ok(_) => {}
            Err(e) => trace!("Created entry already gone: {}", e),
        }
    }

    fn modified(&mut self, path: &Path, now: Instant) {
        match fs::stat(path) {
            Ok(stat) if stat.is_file => self.stability.begin(path, EventKind::Changed, stat, now),
            Ok(_) => {}
            Err(e) => trace!("Modified entry already gone: {}", e),
        }
    }

    fn directory_appeared(&mut self, path: &Path, now: Instant) {
        if self.kind == WatchKind::File {
            return;
        }
        let stat = match fs::stat(path) {
            Ok(stat) => stat,
            Err(e) => {
                trace!("Created directory already gone: {}", e);
                return;
            }
        };
        if !self.known_dirs.insert(path.to_path_buf()) {
            return;
        }

        self.ready
            .push(CanonicalEvent::new(EventKind::DirectoryAdded, path, Some(stat)));
        self.adopt_contents(path, now);
    }

    /// Report the pre-existing contents of a directory that just appeared
    fn adopt_contents(&mut self, dir: &Path, now: Instant) {
        for found in reconcile::walk(dir, &self.rules) {
            if found.stat.is_directory {
                if self.known_dirs.insert(found.path.clone()) {
                    self.ready.push(CanonicalEvent::new(
                        EventKind::DirectoryAdded,
                        found.path,
                        Some(found.stat),
                    ));
                }
            } else {
                self.stability.begin(&found.path, EventKind::Added, found.stat, now);
            }
        }
    }

    fn disappeared(&mut self, path: &Path) {
        if self.known_dirs.contains(path) {
            self.directory_removed(path);
        } else {
            self.file_removed(path);
        }
    }

    fn file_removed(&mut self, path: &Path) {
        // A pending add is released first so the removal applies to a node
        // the consumer has seen; a pending content change is dropped.
        if let Some(pending) = self.stability.take(path) {
            if pending.kind == EventKind::Added {
                self.ready.push(pending.into_event());
            }
        }
        self.ready.push(CanonicalEvent::new(EventKind::Removed, path, None));
    }

    fn directory_removed(&mut self, path: &Path) {
        if self.kind == WatchKind::File {
            return;
        }
        for pending in self.stability.take_under(path) {
            if pending.kind == EventKind::Added {
                self.ready.push(pending.into_event());
            }
        }
        self.known_dirs.retain(|dir| !dir.starts_with(path));
        self.ready
            .push(CanonicalEvent::new(EventKind::DirectoryRemoved, path, None));
    }

    /// Recover from dropped native events by comparing against the disk
    fn rescan(&mut self, now: Instant) {
        debug!("Rescanning {} after dropped events", self.root.display());

        match self.kind {
            WatchKind::File => match fs::stat(&self.root) {
                Ok(stat) if stat.is_file => {
                    self.stability.begin(&self.root, EventKind::Changed, stat, now);
                }
                _ => {
                    let root = self.root.clone();
                    self.file_removed(&root);
                }
            },
            WatchKind::Directory => {
                let found = reconcile::walk(&self.root, &self.rules);
                let on_disk: AHashSet<&Path> = found
                    .iter()
                    .filter(|d| d.stat.is_directory)
                    .map(|d| d.path.as_path())
                    .collect();

                let mut vanished: Vec<PathBuf> = self
                    .known_dirs
                    .iter()
                    .filter(|dir| **dir != self.root && !on_disk.contains(dir.as_path()))
                    .cloned()
                    .collect();
                vanished.sort();
                for dir in vanished {
                    if self.known_dirs.contains(&dir) {
                        self.directory_removed(&dir);
                    }
                }

                for entry in found {
                    if entry.stat.is_directory {
                        if self.known_dirs.insert(entry.path.clone()) {
                            self.ready.push(CanonicalEvent::new(
                                EventKind::DirectoryAdded,
                                entry.path,
                                Some(entry.stat),
                            ));
                        }
                    } else {
                        self.ready
                            .push(CanonicalEvent::new(EventKind::Added, entry.path, Some(entry.stat)));
                    }
                }
            }
        }
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        self.stability.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::Flag;
    use std::fs as stdfs;
    use tempfile::TempDir;

    const THRESHOLD: Duration = Duration::from_millis(100);

    fn directory_state(root: &Path) -> NormalizerState {
        let mut state = NormalizerState::new(
            root.to_path_buf(),
            WatchKind::Directory,
            IgnoreRules::builtin(root),
            THRESHOLD,
        );
        state.prime();
        state
    }

    fn native(kind: NativeKind, paths: &[PathBuf]) -> Event {
        let mut event = Event::new(kind);
        for path in paths {
            event = event.add_path(path.clone());
        }
        event
    }

    fn kinds(events: &[CanonicalEvent]) -> Vec<(EventKind, PathBuf)> {
        events.iter().map(|e| (e.kind, e.path.clone())).collect()
    }

    #[test]
    fn test_created_file_waits_for_stability() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let mut state = directory_state(root);
        let file = root.join("a.md");
        stdfs::write(&file, b"hello").unwrap();

        let start = Instant::now();
        state.handle(native(NativeKind::Create(CreateKind::File), &[file.clone()]), start);
        state.tick(start + Duration::from_millis(50));
        assert!(state.drain().is_empty());

        state.tick(start + THRESHOLD);
        let events = state.drain();
        assert_eq!(kinds(&events), vec![(EventKind::Added, file)]);
        assert_eq!(events[0].stat.map(|s| s.size), Some(5));
    }

    #[test]
    fn test_ignored_paths_produce_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let mut state = directory_state(root);
        stdfs::create_dir_all(root.join("node_modules")).unwrap();
        stdfs::write(root.join(".secret"), b"x").unwrap();
        stdfs::write(root.join("node_modules/x.js"), b"x").unwrap();

        let now = Instant::now();
        state.handle(
            native(
                NativeKind::Create(CreateKind::File),
                &[root.join(".secret"), root.join("node_modules/x.js")],
            ),
            now,
        );
        state.tick(now + THRESHOLD);
        assert!(state.drain().is_empty());
        assert_eq!(state.pending(), 0);
    }

    #[test]
    fn test_new_directory_reports_existing_contents() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let mut state = directory_state(root);
        stdfs::create_dir_all(root.join("moved/inner")).unwrap();
        stdfs::write(root.join("moved/inner/x.md"), b"x").unwrap();

        let now = Instant::now();
        state.handle(
            native(NativeKind::Create(CreateKind::Folder), &[root.join("moved")]),
            now,
        );
        assert_eq!(
            kinds(&state.drain()),
            vec![
                (EventKind::DirectoryAdded, root.join("moved")),
                (EventKind::DirectoryAdded, root.join("moved/inner")),
            ]
        );

        state.tick(now + THRESHOLD);
        assert_eq!(
            kinds(&state.drain()),
            vec![(EventKind::Added, root.join("moved/inner/x.md"))]
        );

        // A duplicate native create for a known directory is swallowed
        state.handle(
            native(NativeKind::Create(CreateKind::Folder), &[root.join("moved/inner")]),
            now,
        );
        assert!(state.drain().is_empty());
    }

    #[test]
    fn test_rename_splits_into_remove_and_add() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        stdfs::create_dir_all(root.join("old")).unwrap();
        let mut state = directory_state(root);

        stdfs::rename(root.join("old"), root.join("new")).unwrap();
        let now = Instant::now();
        state.handle(
            native(
                NativeKind::Modify(ModifyKind::Name(RenameMode::Both)),
                &[root.join("old"), root.join("new")],
            ),
            now,
        );

        assert_eq!(
            kinds(&state.drain()),
            vec![
                (EventKind::DirectoryRemoved, root.join("old")),
                (EventKind::DirectoryAdded, root.join("new")),
            ]
        );
    }

    #[test]
    fn test_ambiguous_removal_uses_known_directories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        stdfs::create_dir_all(root.join("docs")).unwrap();
        let mut state = directory_state(root);

        let now = Instant::now();
        state.handle(
            native(
                NativeKind::Remove(RemoveKind::Any),
                &[root.join("docs"), root.join("a.md")],
            ),
            now,
        );
        assert_eq!(
            kinds(&state.drain()),
            vec![
                (EventKind::DirectoryRemoved, root.join("docs")),
                (EventKind::Removed, root.join("a.md")),
            ]
        );
    }

    #[test]
    fn test_removal_flushes_pending_add_first() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let mut state = directory_state(root);
        let file = root.join("a.md");
        stdfs::write(&file, b"x").unwrap();

        let now = Instant::now();
        state.handle(native(NativeKind::Create(CreateKind::File), &[file.clone()]), now);
        state.handle(native(NativeKind::Remove(RemoveKind::File), &[file.clone()]), now);

        assert_eq!(
            kinds(&state.drain()),
            vec![(EventKind::Added, file.clone()), (EventKind::Removed, file)]
        );
        assert_eq!(state.pending(), 0);
    }

    #[test]
    fn test_directory_modify_is_not_a_change() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        stdfs::create_dir_all(root.join("docs")).unwrap();
        let mut state = directory_state(root);

        let now = Instant::now();
        state.handle(
            native(NativeKind::Modify(ModifyKind::Any), &[root.join("docs")]),
            now,
        );
        state.tick(now + THRESHOLD);
        assert!(state.drain().is_empty());
    }

    #[test]
    fn test_file_kind_filters_to_exact_path() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let watched = root.join("a.md");
        let sibling = root.join("b.md");
        stdfs::write(&watched, b"a").unwrap();
        stdfs::write(&sibling, b"b").unwrap();

        let mut state = NormalizerState::new(
            watched.clone(),
            WatchKind::File,
            IgnoreRules::builtin(root),
            THRESHOLD,
        );
        state.prime();

        let now = Instant::now();
        state.handle(
            native(
                NativeKind::Modify(ModifyKind::Any),
                &[watched.clone(), sibling],
            ),
            now,
        );
        state.tick(now + THRESHOLD);
        assert_eq!(kinds(&state.drain()), vec![(EventKind::Changed, watched)]);
    }

    #[test]
    fn test_rescan_reports_missed_entries() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        stdfs::create_dir_all(root.join("gone")).unwrap();
        let mut state = directory_state(root);

        stdfs::remove_dir(root.join("gone")).unwrap();
        stdfs::create_dir_all(root.join("fresh")).unwrap();
        stdfs::write(root.join("fresh/x.md"), b"x").unwrap();

        let event = Event::new(NativeKind::Other).set_flag(Flag::Rescan);
        state.handle(event, Instant::now());

        assert_eq!(
            kinds(&state.drain()),
            vec![
                (EventKind::DirectoryRemoved, root.join("gone")),
                (EventKind::DirectoryAdded, root.join("fresh")),
                (EventKind::Added, root.join("fresh/x.md")),
            ]
        );
    }
}
