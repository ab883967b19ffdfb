//! Workspace session
//!
//! Binds one tree mirror to the persisted UI state of its root (active file,
//! tabs, expanded folders, sort order) and keeps the two consistent as
//! canonical events arrive. A session is owned by one thread; events must be
//! applied one at a time.

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::notification::{Notification, WorkspaceInit, WorkspaceUpdate};
use crate::state::{PersistedState, TabRef};
use crate::store::StateStore;
use canopy_core::sort::sorted_snapshot;
use canopy_core::{fs, EntryStat, FileNode, SortOrder, Tree};
use crossbeam_channel::Sender;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace};
use watcher::{CanonicalEvent, EventKind, IgnoreRules};

pub struct WorkspaceSession {
    tree: Tree,
    active_file: Option<PathBuf>,
    tabs: Vec<TabRef>,
    expanded_folders: Vec<PathBuf>,
    /// Directory nodes in the tree, the root included
    folder_count: usize,
    sort_by: SortOrder,
    store: StateStore,
    notifier: Sender<Notification>,
}

impl WorkspaceSession {
    /// Scan `root`, restore its persisted state and announce it.
    ///
    /// Persisted paths that no longer exist in the scanned tree are dropped.
    pub fn open(
        root: &Path,
        config: &SessionConfig,
        rules: &IgnoreRules,
        notifier: Sender<Notification>,
    ) -> Result<Self> {
        config.validate()?;
        let tree = Tree::scan(root, |path| rules.is_ignored(path))?;

        let state_dir = root.join(&config.state_dir);
        std::fs::create_dir_all(&state_dir)?;
        let store = StateStore::open(&state_dir)?;
        let persisted = store.load(root)?.unwrap_or_default();

        let mut session = Self {
            folder_count: tree.folder_count(),
            tree,
            active_file: None,
            tabs: Vec::new(),
            expanded_folders: Vec::new(),
            sort_by: persisted.sort_by,
            store,
            notifier,
        };
        session.restore(persisted);
        session.persist()?;

        info!(
            "Opened workspace {} ({} folders, {} tabs)",
            root.display(),
            session.folder_count,
            session.tabs.len()
        );
        let init = WorkspaceInit {
            root_path: root.to_path_buf(),
            tree: session.snapshot(),
            active_file: session.active_file.clone(),
            tabs: session.tabs.clone(),
            expanded_folders: session.expanded_folders.clone(),
            is_expanded_all: session.is_expanded_all(),
            sort_by: session.sort_by,
        };
        session.notify(Notification::Initialized(init));
        Ok(session)
    }

    fn restore(&mut self, persisted: PersistedState) {
        for tab in persisted.tabs {
            if self.has_file(&tab.path) && !self.has_tab(&tab.path) {
                self.tabs.push(tab);
            } else {
                debug!("Dropping stale tab {}", tab.path.display());
            }
        }

        for folder in persisted.expanded_folders {
            let exists = matches!(self.tree.get_dir_by_path(&folder), Ok(Some(_)));
            if exists && !self.expanded_folders.contains(&folder) {
                self.expanded_folders.push(folder);
            }
        }

        let active = persisted
            .active_file
            .filter(|path| path.is_file() && self.has_file(path));
        if let Some(active) = &active {
            if !self.has_tab(active) {
                self.open_tab(active.clone());
            }
        }
        self.active_file = active;
    }

    pub fn root_path(&self) -> &Path {
        self.tree.root_path()
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn active_file(&self) -> Option<&Path> {
        self.active_file.as_deref()
    }

    pub fn tabs(&self) -> &[TabRef] {
        &self.tabs
    }

    pub fn expanded_folders(&self) -> &[PathBuf] {
        &self.expanded_folders
    }

    pub fn folder_count(&self) -> usize {
        self.folder_count
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort_by
    }

    /// True iff every directory in the tree is expanded
    pub fn is_expanded_all(&self) -> bool {
        self.folder_count > 0 && self.expanded_folders.len() == self.folder_count
    }

    /// Sorted, owned copy of the tree for the presentation layer
    pub fn snapshot(&self) -> FileNode {
        sorted_snapshot(self.tree.root(), self.sort_by)
    }

    /// Make `path` the active file, opening a tab for it if needed
    pub fn set_active_file(&mut self, path: &Path) -> Result<()> {
        if self.active_file.as_deref() == Some(path) {
            return Ok(());
        }
        if self.tree.get_file_item_by_path(path)?.is_none() {
            return Err(SessionError::ConsistencyViolation(format!(
                "cannot activate {}: not in the workspace tree",
                path.display()
            )));
        }

        if !self.has_tab(path) {
            self.open_tab(path.to_path_buf());
        }
        self.active_file = Some(path.to_path_buf());
        self.publish()
    }

    /// Switch to an already open tab
    pub fn set_active_tab(&mut self, path: &Path) -> Result<()> {
        if !self.has_tab(path) {
            return Err(SessionError::ConsistencyViolation(format!(
                "cannot switch to {}: no such tab",
                path.display()
            )));
        }
        if self.active_file.as_deref() == Some(path) {
            return Ok(());
        }
        self.active_file = Some(path.to_path_buf());
        self.publish()
    }

    /// Close an open tab. Closing a tab that is not open is an error.
    pub fn close_tab(&mut self, path: &Path) -> Result<()> {
        if !self.remove_tab(path) {
            return Err(SessionError::ConsistencyViolation(format!(
                "cannot close {}: no such tab",
                path.display()
            )));
        }
        self.publish()
    }

    pub fn close_all_tabs(&mut self) -> Result<()> {
        self.tabs.clear();
        self.active_file = None;
        self.publish()
    }

    /// Flip whether the directory `path` is expanded
    pub fn toggle_expand(&mut self, path: &Path) -> Result<()> {
        if self.tree.get_dir_by_path(path)?.is_none() {
            return Err(SessionError::ConsistencyViolation(format!(
                "cannot expand {}: not a directory in the workspace tree",
                path.display()
            )));
        }

        match self.expanded_folders.iter().position(|p| p == path) {
            Some(index) => {
                self.expanded_folders.remove(index);
            }
            None => self.expanded_folders.push(path.to_path_buf()),
        }
        self.publish()
    }

    /// Collapse everything if fully expanded, otherwise expand everything
    pub fn toggle_expand_all(&mut self) -> Result<()> {
        if self.is_expanded_all() {
            self.expanded_folders.clear();
        } else {
            self.expanded_folders = self.tree.get_all_path();
        }
        self.publish()
    }

    pub fn set_sort_order(&mut self, order: SortOrder) -> Result<()> {
        if self.sort_by == order {
            return Ok(());
        }
        self.sort_by = order;
        self.publish()
    }

    /// Apply one canonical event from the root's directory subscription.
    ///
    /// Returns whether the tree changed (an update was then emitted). Events
    /// for paths already added or removed are no-ops; a path outside the
    /// root is a caller defect and is returned as an error.
    pub fn apply(&mut self, event: &CanonicalEvent) -> Result<bool> {
        let path = event.path.as_path();

        let changed = match event.kind {
            EventKind::Added => {
                let Some(stat) = self.stat_for(event)? else {
                    return Ok(false);
                };
                let insertion = self.tree.add_file(path, &stat)?;
                self.folder_count += insertion.folders_created;
                insertion.inserted || insertion.folders_created > 0
            }
            EventKind::DirectoryAdded => {
                let Some(stat) = self.stat_for(event)? else {
                    return Ok(false);
                };
                let insertion = self.tree.add_dir(path, &stat)?;
                self.folder_count += insertion.folders_created;
                insertion.folders_created > 0
            }
            EventKind::Removed => {
                let removed = self.tree.unlink_file(path)?.is_some();
                let closed = self.remove_tab(path);
                removed || closed
            }
            EventKind::DirectoryRemoved => {
                let removed = self.tree.unlink_dir(path)?;
                if let Some(node) = &removed {
                    self.folder_count = self.folder_count.saturating_sub(node.folder_count());
                }
                let pruned = self.prune_under(path);
                removed.is_some() || pruned
            }
            EventKind::Changed => false,
        };

        debug_assert_eq!(self.folder_count, self.tree.folder_count());
        if !changed {
            trace!("{:?} on {} left the workspace unchanged", event.kind, path.display());
            return Ok(false);
        }

        debug!("Applied {:?} on {}", event.kind, path.display());
        self.publish()?;
        Ok(true)
    }

    /// Stat carried by the event, or a fresh one. `None` if the entry is
    /// already gone again.
    fn stat_for(&self, event: &CanonicalEvent) -> Result<Option<EntryStat>> {
        if let Some(stat) = event.stat {
            return Ok(Some(stat));
        }
        match fs::stat(&event.path) {
            Ok(stat) => Ok(Some(stat)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn has_file(&self, path: &Path) -> bool {
        matches!(self.tree.get_file_item_by_path(path), Ok(Some(_)))
    }

    fn has_tab(&self, path: &Path) -> bool {
        self.tabs.iter().any(|tab| tab.path == path)
    }

    fn open_tab(&mut self, path: PathBuf) {
        let index = self.tabs.iter().map(|tab| tab.index + 1).max().unwrap_or(0);
        self.tabs.push(TabRef { path, index });
    }

    /// Remove a tab, moving the active file to the last remaining tab if it
    /// was the one removed
    fn remove_tab(&mut self, path: &Path) -> bool {
        let Some(position) = self.tabs.iter().position(|tab| tab.path == path) else {
            return false;
        };
        self.tabs.remove(position);

        if self.active_file.as_deref() == Some(path) {
            self.active_file = self.tabs.last().map(|tab| tab.path.clone());
        }
        true
    }

    /// Close tabs and collapse folders at or below a removed directory
    fn prune_under(&mut self, dir: &Path) -> bool {
        let before = self.expanded_folders.len();
        self.expanded_folders.retain(|p| !p.starts_with(dir));
        let mut pruned = self.expanded_folders.len() != before;

        let doomed: Vec<PathBuf> = self
            .tabs
            .iter()
            .filter(|tab| tab.path.starts_with(dir))
            .map(|tab| tab.path.clone())
            .collect();
        for path in doomed {
            pruned |= self.remove_tab(&path);
        }
        pruned
    }

    fn persisted(&self) -> PersistedState {
        PersistedState {
            active_file: self.active_file.clone(),
            tabs: self.tabs.clone(),
            expanded_folders: self.expanded_folders.clone(),
            is_expanded_all: self.is_expanded_all(),
            sort_by: self.sort_by,
        }
    }

    fn persist(&self) -> Result<()> {
        self.store.save(self.root_path(), &self.persisted())
    }

    /// Persist, then emit one consolidated update
    fn publish(&self) -> Result<()> {
        self.persist()?;
        let update = WorkspaceUpdate {
            tree: self.snapshot(),
            active_file: self.active_file.clone(),
            tabs: self.tabs.clone(),
            expanded_folders: self.expanded_folders.clone(),
            is_expanded_all: self.is_expanded_all(),
        };
        self.notify(Notification::Updated(update));
        Ok(())
    }

    fn notify(&self, notification: Notification) {
        if self.notifier.send(notification).is_err() {
            trace!("Notification dropped, presentation layer is gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crossbeam_channel::{unbounded, Receiver};
    use std::fs as stdfs;
    use tempfile::TempDir;

    struct Fixture {
        _temp_dir: TempDir,
        root: PathBuf,
        rx: Receiver<Notification>,
        session: WorkspaceSession,
    }

    fn fixture(files: &[&str]) -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().to_path_buf();
        for file in files {
            let path = root.join(file);
            stdfs::create_dir_all(path.parent().unwrap()).unwrap();
            stdfs::write(&path, b"content").unwrap();
        }
        let (tx, rx) = unbounded();
        let session = open(&root, tx);
        Fixture {
            _temp_dir: temp_dir,
            root,
            rx,
            session,
        }
    }

    fn open(root: &Path, tx: Sender<Notification>) -> WorkspaceSession {
        WorkspaceSession::open(root, &SessionConfig::default(), &IgnoreRules::builtin(root), tx).unwrap()
    }

    fn tab_paths(session: &WorkspaceSession) -> Vec<PathBuf> {
        session.tabs().iter().map(|t| t.path.clone()).collect()
    }

    #[test]
    fn test_open_emits_initialized() {
        let f = fixture(&["a.txt", "docs/notes/x.md"]);

        match f.rx.try_recv().unwrap() {
            Notification::Initialized(init) => {
                assert_eq!(init.root_path, f.root);
                assert_eq!(init.active_file, None);
                assert!(init.tabs.is_empty());
                assert!(!init.is_expanded_all);
                assert_eq!(init.tree.children.folders.len(), 1);
            }
            other => panic!("expected Initialized, got {:?}", other),
        }
        // Root, docs, docs/notes; the hidden state directory is not mirrored
        assert_eq!(f.session.folder_count(), 3);
    }

    #[test]
    fn test_tab_lifecycle() {
        let mut f = fixture(&["a.txt", "b.txt"]);
        let a = f.root.join("a.txt");
        let b = f.root.join("b.txt");

        f.session.set_active_file(&a).unwrap();
        assert_eq!(tab_paths(&f.session), vec![a.clone()]);
        assert_eq!(f.session.active_file(), Some(a.as_path()));

        f.session.set_active_file(&b).unwrap();
        assert_eq!(tab_paths(&f.session), vec![a.clone(), b.clone()]);
        assert_eq!(f.session.active_file(), Some(b.as_path()));

        f.session.close_tab(&b).unwrap();
        assert_eq!(tab_paths(&f.session), vec![a.clone()]);
        assert_eq!(f.session.active_file(), Some(a.as_path()));

        f.session.close_tab(&a).unwrap();
        assert!(f.session.tabs().is_empty());
        assert_eq!(f.session.active_file(), None);
    }

    #[test]
    fn test_reactivating_active_file_is_noop() {
        let mut f = fixture(&["a.txt"]);
        let a = f.root.join("a.txt");
        f.session.set_active_file(&a).unwrap();
        let emitted = f.rx.try_iter().count();

        f.session.set_active_file(&a).unwrap();
        assert_eq!(f.rx.try_iter().count(), 0);
        assert_eq!(f.session.tabs().len(), 1);
        assert!(emitted >= 2);
    }

    #[test]
    fn test_tab_indices_unique() {
        let mut f = fixture(&["a.txt", "b.txt", "c.txt"]);
        for name in ["a.txt", "b.txt"] {
            f.session.set_active_file(&f.root.join(name)).unwrap();
        }
        f.session.close_tab(&f.root.join("a.txt")).unwrap();
        f.session.set_active_file(&f.root.join("c.txt")).unwrap();

        let indices: Vec<u32> = f.session.tabs().iter().map(|t| t.index).collect();
        assert_eq!(indices, vec![1, 2]);
    }

    #[test]
    fn test_consistency_violations() {
        let mut f = fixture(&["a.txt"]);

        let err = f.session.set_active_file(&f.root.join("ghost.txt")).unwrap_err();
        assert!(matches!(err, SessionError::ConsistencyViolation(_)));

        let err = f.session.close_tab(&f.root.join("a.txt")).unwrap_err();
        assert!(matches!(err, SessionError::ConsistencyViolation(_)));

        let err = f.session.set_active_tab(&f.root.join("a.txt")).unwrap_err();
        assert!(err.is_programming_error());

        let err = f.session.toggle_expand(&f.root.join("a.txt")).unwrap_err();
        assert!(matches!(err, SessionError::ConsistencyViolation(_)));
    }

    #[test]
    fn test_deletion_reconciliation() {
        let mut f = fixture(&["a.txt"]);
        let a = f.root.join("a.txt");
        f.session.set_active_file(&a).unwrap();
        f.rx.try_iter().for_each(drop);

        stdfs::remove_file(&a).unwrap();
        let changed = f
            .session
            .apply(&CanonicalEvent::new(EventKind::Removed, &a, None))
            .unwrap();

        assert!(changed);
        assert!(f.session.tabs().is_empty());
        assert_eq!(f.session.active_file(), None);
        assert!(f.session.tree().get_file_item_by_path(&a).unwrap().is_none());

        let updates: Vec<_> = f.rx.try_iter().collect();
        assert_eq!(updates.len(), 1);
        assert!(matches!(&updates[0], Notification::Updated(u) if u.tabs.is_empty()));
    }

    #[test]
    fn test_duplicate_events_are_noops() {
        let mut f = fixture(&["a.txt"]);
        let b = f.root.join("b.txt");
        let event = CanonicalEvent::new(EventKind::Added, &b, Some(EntryStat::file(Utc::now(), 1)));

        assert!(f.session.apply(&event).unwrap());
        assert!(!f.session.apply(&event).unwrap());

        let gone = CanonicalEvent::new(EventKind::Removed, f.root.join("never.txt"), None);
        assert!(!f.session.apply(&gone).unwrap());
    }

    #[test]
    fn test_expand_all_consistency() {
        let mut f = fixture(&["docs/a.md", "docs/notes/x.md"]);

        f.session.toggle_expand_all().unwrap();
        assert_eq!(f.session.expanded_folders(), f.session.tree().get_all_path().as_slice());
        assert!(f.session.is_expanded_all());

        let fresh = f.root.join("fresh");
        let event = CanonicalEvent::new(
            EventKind::DirectoryAdded,
            &fresh,
            Some(EntryStat::directory(Utc::now())),
        );
        f.session.apply(&event).unwrap();
        assert!(!f.session.is_expanded_all());

        f.session.toggle_expand(&fresh).unwrap();
        assert!(f.session.is_expanded_all());

        f.session.toggle_expand_all().unwrap();
        assert!(f.session.expanded_folders().is_empty());
    }

    #[test]
    fn test_directory_removal_prunes_state() {
        let mut f = fixture(&["docs/notes/x.md", "top.md"]);
        let docs = f.root.join("docs");
        let x = f.root.join("docs/notes/x.md");
        let top = f.root.join("top.md");

        f.session.set_active_file(&top).unwrap();
        f.session.set_active_file(&x).unwrap();
        f.session.toggle_expand_all().unwrap();
        assert_eq!(f.session.folder_count(), 3);

        f.session
            .apply(&CanonicalEvent::new(EventKind::DirectoryRemoved, &docs, None))
            .unwrap();

        assert_eq!(f.session.folder_count(), 1);
        assert_eq!(f.session.expanded_folders(), &[f.root.clone()]);
        assert!(f.session.is_expanded_all());
        assert_eq!(tab_paths(&f.session), vec![top.clone()]);
        assert_eq!(f.session.active_file(), Some(top.as_path()));

        // Child removals after the ancestor was pruned change nothing
        let late = CanonicalEvent::new(EventKind::Removed, &x, None);
        assert!(!f.session.apply(&late).unwrap());
    }

    #[test]
    fn test_added_file_creates_missing_ancestors() {
        let mut f = fixture(&[]);
        let deep = f.root.join("a/b/c.md");
        let event = CanonicalEvent::new(EventKind::Added, &deep, Some(EntryStat::file(Utc::now(), 1)));

        f.session.apply(&event).unwrap();
        assert_eq!(f.session.folder_count(), 3);
        assert!(f.session.tree().get_file_item_by_path(&deep).unwrap().is_some());
    }

    #[test]
    fn test_event_outside_root_is_an_error() {
        let mut f = fixture(&[]);
        let event = CanonicalEvent::new(
            EventKind::Added,
            "relative.md",
            Some(EntryStat::file(Utc::now(), 1)),
        );

        let err = f.session.apply(&event).unwrap_err();
        assert!(err.is_programming_error());
    }

    #[test]
    fn test_state_survives_reopen() {
        let mut f = fixture(&["a.txt", "b.txt", "docs/c.md"]);
        let a = f.root.join("a.txt");
        let b = f.root.join("b.txt");
        f.session.set_active_file(&a).unwrap();
        f.session.set_active_file(&b).unwrap();
        f.session.toggle_expand(&f.root.join("docs")).unwrap();
        f.session.set_sort_order(SortOrder::CreatedTimeDesc).unwrap();

        let Fixture {
            _temp_dir,
            root,
            session,
            ..
        } = f;
        drop(session);

        let (tx, _rx) = unbounded();
        let session = open(&root, tx);
        assert_eq!(tab_paths(&session), vec![a, b.clone()]);
        assert_eq!(session.active_file(), Some(b.as_path()));
        assert_eq!(session.expanded_folders(), &[root.join("docs")]);
        assert_eq!(session.sort_order(), SortOrder::CreatedTimeDesc);
    }

    #[test]
    fn test_stale_persisted_paths_pruned() {
        let f = fixture(&["a.txt", "docs/c.md"]);
        let Fixture {
            _temp_dir,
            root,
            mut session,
            ..
        } = f;
        let a = root.join("a.txt");
        session.set_active_file(&a).unwrap();
        session.toggle_expand(&root.join("docs")).unwrap();
        drop(session);

        stdfs::remove_file(&a).unwrap();
        stdfs::remove_dir_all(root.join("docs")).unwrap();

        let (tx, _rx) = unbounded();
        let session = open(&root, tx);
        assert_eq!(session.active_file(), None);
        assert!(session.tabs().is_empty());
        assert!(session.expanded_folders().is_empty());
    }

    #[test]
    fn test_notification_json_shape() {
        let f = fixture(&["a.txt"]);
        let init = f.rx.try_recv().unwrap();
        let json = serde_json::to_value(&init).unwrap();

        assert_eq!(json["type"], "initialized");
        assert!(json["rootPath"].is_string());
        assert_eq!(json["isExpandedAll"], false);
        assert_eq!(json["sortBy"], "alphabeticalAsc");
        assert_eq!(json["tree"]["children"]["files"][0]["basename"], "a.txt");
    }
}
