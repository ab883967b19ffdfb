//! Host application
//!
//! `App` is the single owner of the watch registry and the open workspace
//! session. Commands and registry deliveries are both handled on the thread
//! that owns the `App`, so the session only ever sees one mutation at a time.

use crate::command::{Command, CommandOutput, CommandResult};
use crate::config::HostConfig;
use crate::ops::FileOps;
use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use session::{Notification, WorkspaceSession};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};
use watcher::{
    CanonicalEvent, ConsumerId, Delivery, EventKind, IgnoreRules, SubscriptionId, WatchKind, WatchRegistry,
};

/// Title of the notification sent when a root runs out of watch handles
pub const RESOURCE_WARNING_TITLE: &str = "watch limit reached";

struct Workspace {
    session: WorkspaceSession,
    root_subscription: SubscriptionId,
    /// File-kind subscription following the active file. The id is `None`
    /// when the native watch could not be installed for that path.
    active_watch: Option<(PathBuf, Option<SubscriptionId>)>,
}

pub struct App {
    config: HostConfig,
    registry: Arc<WatchRegistry>,
    consumer: ConsumerId,
    ops: FileOps,
    notifier: Sender<Notification>,
    workspace: Option<Workspace>,
}

impl App {
    pub fn new(config: HostConfig, consumer: ConsumerId, notifier: Sender<Notification>) -> Result<Self> {
        config.validate()?;
        let registry = Arc::new(
            WatchRegistry::new(config.watcher.clone()).context("Failed to create watch registry")?,
        );
        let ops = FileOps::new(Arc::clone(&registry), consumer);

        Ok(Self {
            config,
            registry,
            consumer,
            ops,
            notifier,
            workspace: None,
        })
    }

    pub fn registry(&self) -> &WatchRegistry {
        &self.registry
    }

    pub fn consumer(&self) -> ConsumerId {
        self.consumer
    }

    pub fn session(&self) -> Option<&WorkspaceSession> {
        self.workspace.as_ref().map(|ws| &ws.session)
    }

    pub fn root(&self) -> Option<&Path> {
        self.session().map(|s| s.root_path())
    }

    /// Replace the open workspace (if any) with `root`
    pub fn open_workspace(&mut self, root: &Path) -> Result<()> {
        let root = std::fs::canonicalize(root)
            .with_context(|| format!("Cannot open workspace {}", root.display()))?;
        if !root.is_dir() {
            anyhow::bail!("Not a directory: {}", root.display());
        }

        self.close_workspace();

        let rules = IgnoreRules::load(&root, self.config.watcher.ignore.clone())
            .context("Failed to load ignore rules")?;
        let handle = self
            .registry
            .watch(self.consumer, &root, WatchKind::Directory)
            .with_context(|| format!("Failed to watch {}", root.display()))?;

        let session = match WorkspaceSession::open(&root, &self.config.workspace, &rules, self.notifier.clone()) {
            Ok(session) => session,
            Err(e) => {
                self.registry.unwatch_id(handle.id);
                return Err(e).with_context(|| format!("Failed to open workspace {}", root.display()));
            }
        };

        self.workspace = Some(Workspace {
            session,
            root_subscription: handle.id,
            active_watch: None,
        });
        self.sync_active_watch();
        info!("Workspace {} is open", root.display());
        Ok(())
    }

    /// Tear down the open workspace's subscriptions and drop its session
    pub fn close_workspace(&mut self) {
        let Some(workspace) = self.workspace.take() else {
            return;
        };
        let root = workspace.session.root_path().to_path_buf();

        self.registry.unwatch_id(workspace.root_subscription);
        if let Some((_, Some(id))) = workspace.active_watch {
            self.registry.unwatch_id(id);
        }
        debug!("Closed workspace {}", root.display());
    }

    /// Close the workspace and every remaining subscription
    pub fn shutdown(&mut self) {
        self.close_workspace();
        self.registry.unwatch_by_consumer(self.consumer);
    }

    /// Run one inbound command.
    ///
    /// Filesystem failures of file operations come back as
    /// `CommandResult::Failed`. Desynchronization between the caller and the
    /// session (unknown tab, path outside the root) is returned as `Err`.
    pub fn handle(&mut self, command: Command) -> Result<CommandResult> {
        trace!("Handling {:?}", command);
        if command.is_file_operation() {
            return self.handle_file_operation(command);
        }

        match command {
            Command::OpenWorkspace { path } => {
                self.open_workspace(&path)?;
                return Ok(CommandResult::done());
            }
            Command::Watch { kind, path } => {
                let handle = self.registry.watch(self.consumer, &path, kind)?;
                debug!("Presentation watch {} on {}", handle.id, path.display());
                return Ok(CommandResult::done());
            }
            Command::Unwatch { kind, path } => {
                let own = self.own_subscriptions();
                let target = self
                    .registry
                    .subscriptions()
                    .into_iter()
                    .find(|s| {
                        s.consumer == self.consumer && s.path == path && s.kind == kind && !own.contains(&s.id)
                    });
                if target.is_some_and(|s| self.registry.unwatch_id(s.id)) {
                    return Ok(CommandResult::done());
                }
                return Ok(CommandResult::failed(format!("not watching {}", path.display())));
            }
            _ => {}
        }

        let Some(workspace) = self.workspace.as_mut() else {
            return Ok(CommandResult::failed("no workspace is open"));
        };
        let session = &mut workspace.session;

        match command {
            Command::SetActiveFile { path } => session.set_active_file(&path)?,
            Command::SetActiveTab { path } => session.set_active_tab(&path)?,
            Command::CloseTab { path } => session.close_tab(&path)?,
            Command::CloseAllTabs => session.close_all_tabs()?,
            Command::ToggleExpand { path } => session.toggle_expand(&path)?,
            Command::ToggleExpandAll => session.toggle_expand_all()?,
            Command::SetSortOrder { order } => session.set_sort_order(order)?,
            other => anyhow::bail!("Unroutable command {:?}", other),
        }

        self.sync_active_watch();
        Ok(CommandResult::done())
    }

    fn handle_file_operation(&mut self, command: Command) -> Result<CommandResult> {
        let result = match command {
            Command::ReadFile { path } => self
                .ops
                .read_file(&path)
                .map(|bytes| CommandOutput::Contents(String::from_utf8_lossy(&bytes).into_owned())),
            Command::WriteFile { path, contents } => {
                self.ops.write_file(&path, contents.as_bytes()).map(|()| CommandOutput::Done)
            }
            Command::CreateFile { dir, name } => self.ops.create_file(&dir, &name).map(CommandOutput::Path),
            Command::CreateDirectory { dir, name } => {
                self.ops.create_directory(&dir, &name).map(CommandOutput::Path)
            }
            Command::UnlinkFile { path } => self.ops.unlink_file(&path).map(|()| CommandOutput::Done),
            Command::UnlinkDirectory { path } => {
                self.ops.unlink_directory(&path).map(|()| CommandOutput::Done)
            }
            Command::Rename { path, new_name } => self.ops.rename(&path, &new_name).map(CommandOutput::Path),
            other => anyhow::bail!("Not a file operation: {:?}", other),
        };

        match result {
            Ok(output) => Ok(CommandResult::Ok(output)),
            Err(e @ canopy_core::Error::InvalidPath { .. }) => Err(e.into()),
            Err(e) => {
                warn!("File operation failed: {}", e);
                Ok(CommandResult::failed(e.to_string()))
            }
        }
    }

    /// Wait up to `timeout` for registry deliveries and handle everything
    /// that is ready. Returns how many deliveries were handled.
    pub fn pump(&mut self, timeout: Duration) -> Result<usize> {
        let Some(first) = self.registry.recv_timeout(timeout) else {
            return Ok(0);
        };

        let mut handled = 0;
        let mut next = Some(first);
        while let Some(delivery) = next {
            self.deliver(delivery)?;
            handled += 1;
            next = self.registry.try_recv();
        }

        self.sync_active_watch();
        Ok(handled)
    }

    fn deliver(&mut self, delivery: Delivery) -> Result<()> {
        match delivery {
            Delivery::Warning { root, message, .. } => {
                warn!("Watch limit reached for {}", root.display());
                self.notify(Notification::Warning {
                    title: RESOURCE_WARNING_TITLE.to_string(),
                    message,
                });
            }
            Delivery::Event {
                subscription,
                watch,
                event,
                ..
            } => self.route_event(subscription, watch, event)?,
        }
        Ok(())
    }

    fn route_event(&mut self, subscription: SubscriptionId, watch: WatchKind, event: CanonicalEvent) -> Result<()> {
        let Some(workspace) = self.workspace.as_mut() else {
            self.notify(Notification::WatchEvent { watch, event });
            return Ok(());
        };

        if subscription == workspace.root_subscription {
            return match workspace.session.apply(&event) {
                Ok(_) => Ok(()),
                Err(e) if e.is_programming_error() => {
                    error!("Cannot apply {:?} on {}: {}", event.kind, event.path.display(), e);
                    Err(e.into())
                }
                Err(e) => {
                    warn!("Skipping {:?} on {}: {}", event.kind, event.path.display(), e);
                    Ok(())
                }
            };
        }

        let is_active_watch = workspace
            .active_watch
            .as_ref()
            .is_some_and(|(_, id)| *id == Some(subscription));
        if is_active_watch {
            // Removal of the active file reaches the session through the root watch
            if event.kind == EventKind::Changed {
                self.notify(Notification::FileChanged { path: event.path });
            }
            return Ok(());
        }

        self.notify(Notification::WatchEvent { watch, event });
        Ok(())
    }

    /// Subscriptions the app holds for the open workspace
    fn own_subscriptions(&self) -> Vec<SubscriptionId> {
        let Some(workspace) = &self.workspace else {
            return Vec::new();
        };
        let active = workspace.active_watch.as_ref().and_then(|(_, id)| *id);
        std::iter::once(workspace.root_subscription).chain(active).collect()
    }

    /// Point the file-kind subscription at the current active file.
    ///
    /// An active file that cannot be watched (typically already deleted, with
    /// its `Removed` event still queued) is remembered without a subscription
    /// and is not retried until the active file changes.
    fn sync_active_watch(&mut self) {
        let Some(workspace) = self.workspace.as_mut() else {
            return;
        };

        let wanted = workspace.session.active_file().map(Path::to_path_buf);
        let current = workspace.active_watch.as_ref().map(|(path, _)| path);
        if wanted.as_ref() == current {
            return;
        }

        if let Some((_, Some(id))) = workspace.active_watch.take() {
            self.registry.unwatch_id(id);
        }
        workspace.active_watch = wanted.map(|path| match self.registry.watch(self.consumer, &path, WatchKind::File) {
            Ok(handle) => {
                debug!("Following active file {}", path.display());
                (path, Some(handle.id))
            }
            Err(e) => {
                warn!("Not following active file {}: {}", path.display(), e);
                (path, None)
            }
        });
    }

    fn notify(&self, notification: Notification) {
        if self.notifier.send(notification).is_err() {
            trace!("Notification dropped, presentation layer is gone");
        }
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.shutdown();
    }
}
