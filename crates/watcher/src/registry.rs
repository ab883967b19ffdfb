//! Watch registry
//!
//! Owns every subscription, routes canonical events to the consumer that
//! registered them and applies the suppression ledger on the way. The
//! registry is an explicitly constructed value; hosts share it by `Arc`.

use crate::config::WatcherConfig;
use crate::error::{Result, WatchError};
use crate::event::{CanonicalEvent, ConsumerId, EventKind, SubscriptionId, WatchKind};
use crate::ignore::IgnoreRules;
use crate::normalizer::{Normalizer, WorkerMessage};
use crate::suppress::SuppressionLedger;
use ahash::AHashSet;
use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Message shown once per root when the platform runs out of watch handles
pub const RESOURCE_WARNING: &str =
    "Cannot watch all files and file changes because too many file descriptors are opened.";

/// Public view of one subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    pub consumer: ConsumerId,
    pub path: PathBuf,
    pub kind: WatchKind,
    /// True when no native watch could be installed
    pub degraded: bool,
}

/// Something routed to a consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Event {
        consumer: ConsumerId,
        subscription: SubscriptionId,
        watch: WatchKind,
        event: CanonicalEvent,
    },
    Warning {
        consumer: ConsumerId,
        root: PathBuf,
        message: String,
    },
}

struct Subscription {
    handle: SubscriptionHandle,
    _normalizer: Option<Normalizer>,
}

struct RegistryState {
    subscriptions: Vec<Subscription>,
    ledger: SuppressionLedger,
    warned_roots: AHashSet<PathBuf>,
}

/// Owner of all active watch subscriptions
pub struct WatchRegistry {
    config: WatcherConfig,
    state: Mutex<RegistryState>,
    tx: Sender<WorkerMessage>,
    rx: Receiver<WorkerMessage>,
}

impl WatchRegistry {
    pub fn new(config: WatcherConfig) -> Result<Self> {
        config.validate()?;
        let (tx, rx) = unbounded();
        let ledger = SuppressionLedger::new(config.suppression_window());

        Ok(Self {
            config,
            state: Mutex::new(RegistryState {
                subscriptions: Vec::new(),
                ledger,
                warned_roots: AHashSet::new(),
            }),
            tx,
            rx,
        })
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// Start watching `path` on behalf of `consumer`.
    ///
    /// Duplicate subscriptions are allowed and each gets its own native
    /// watch. When the platform is out of watch handles the subscription is
    /// still registered, marked degraded, and a single warning is queued for
    /// its root.
    pub fn watch(&self, consumer: ConsumerId, path: &Path, kind: WatchKind) -> Result<SubscriptionHandle> {
        if !path.is_absolute() {
            return Err(WatchError::InvalidPath(path.to_path_buf()));
        }

        let rules = match kind {
            WatchKind::Directory => IgnoreRules::load(path, self.config.ignore.clone())?,
            WatchKind::File => IgnoreRules::builtin(path),
        };

        let id = SubscriptionId::generate();
        let mut state = self.state.lock();
        let spawned = Normalizer::spawn(id, path, kind, &self.config, rules, self.tx.clone());
        let handle = self.register(&mut state, id, consumer, path, kind, spawned)?;

        info!("{} watching {} ({:?})", consumer, path.display(), kind);
        Ok(handle)
    }

    /// Record a subscription whose native watch was just spawned. The
    /// caller holds the state lock so the worker cannot race registration.
    fn register(
        &self,
        state: &mut RegistryState,
        id: SubscriptionId,
        consumer: ConsumerId,
        path: &Path,
        kind: WatchKind,
        spawned: Result<Normalizer>,
    ) -> Result<SubscriptionHandle> {
        let normalizer = match spawned {
            Ok(normalizer) => Some(normalizer),
            Err(WatchError::ResourceExhausted { path: root }) => {
                warn!("Watch limit reached, {} continues without notifications", root.display());
                let _ = self.tx.send(WorkerMessage::ResourceExhausted { subscription: id, root });
                None
            }
            Err(e) => return Err(e),
        };

        let handle = SubscriptionHandle {
            id,
            consumer,
            path: path.to_path_buf(),
            kind,
            degraded: normalizer.is_none(),
        };
        state.subscriptions.push(Subscription {
            handle: handle.clone(),
            _normalizer: normalizer,
        });
        Ok(handle)
    }

    /// Remove the first matching subscription. Returns false if none matched.
    pub fn unwatch(&self, consumer: ConsumerId, path: &Path, kind: WatchKind) -> bool {
        let removed = {
            let mut state = self.state.lock();
            let index = state.subscriptions.iter().position(|s| {
                s.handle.consumer == consumer && s.handle.path == path && s.handle.kind == kind
            });
            index.map(|i| state.subscriptions.remove(i))
        };

        // Dropped outside the lock: tearing down joins the worker thread
        match removed {
            Some(subscription) => {
                debug!("{} unwatched {}", consumer, subscription.handle.path.display());
                true
            }
            None => false,
        }
    }

    /// Remove the subscription with this id. Returns false if it is already gone.
    pub fn unwatch_id(&self, id: SubscriptionId) -> bool {
        let removed = {
            let mut state = self.state.lock();
            let index = state.subscriptions.iter().position(|s| s.handle.id == id);
            index.map(|i| state.subscriptions.remove(i))
        };

        match removed {
            Some(subscription) => {
                debug!("{} unwatched {}", subscription.handle.consumer, subscription.handle.path.display());
                true
            }
            None => false,
        }
    }

    /// Remove every subscription owned by `consumer`
    pub fn unwatch_by_consumer(&self, consumer: ConsumerId) -> usize {
        let removed: Vec<Subscription> = {
            let mut state = self.state.lock();
            let (removed, kept) = std::mem::take(&mut state.subscriptions)
                .into_iter()
                .partition(|s| s.handle.consumer == consumer);
            state.subscriptions = kept;
            state.ledger.clear_consumer(consumer);
            removed
        };

        if !removed.is_empty() {
            info!("Closed {} subscriptions of {}", removed.len(), consumer);
        }
        removed.len()
    }

    /// Tear down every subscription
    pub fn close(&self) {
        let removed = {
            let mut state = self.state.lock();
            state.ledger.clear();
            state.warned_roots.clear();
            std::mem::take(&mut state.subscriptions)
        };
        info!("Watch registry closed ({} subscriptions)", removed.len());
    }

    /// Declare an upcoming self-write of `path` by `consumer`
    pub fn suppress(&self, consumer: ConsumerId, path: &Path) {
        self.state.lock().ledger.suppress(consumer, path);
    }

    /// Like [`suppress`](Self::suppress) with an explicit window
    pub fn suppress_for(&self, consumer: ConsumerId, path: &Path, duration: Duration) {
        self.state.lock().ledger.suppress_for(consumer, path, duration);
    }

    /// Snapshot of the active subscriptions
    pub fn subscriptions(&self) -> Vec<SubscriptionHandle> {
        self.state
            .lock()
            .subscriptions
            .iter()
            .map(|s| s.handle.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait up to `timeout` for the next delivery
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Delivery> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let msg = self.rx.recv_timeout(remaining).ok()?;
            if let Some(delivery) = self.dispatch(msg) {
                return Some(delivery);
            }
        }
    }

    /// Next delivery if one is ready
    pub fn try_recv(&self) -> Option<Delivery> {
        loop {
            match self.rx.try_recv() {
                Ok(msg) => {
                    if let Some(delivery) = self.dispatch(msg) {
                        return Some(delivery);
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return None,
            }
        }
    }

    /// Route one worker message, applying kind filters and the ledger
    fn dispatch(&self, msg: WorkerMessage) -> Option<Delivery> {
        let mut state = self.state.lock();

        match msg {
            WorkerMessage::Event { subscription, event } => {
                let Some(handle) = find(&state.subscriptions, subscription) else {
                    trace!("Discarding event for closed subscription {}", subscription);
                    return None;
                };
                let (consumer, watch) = (handle.consumer, handle.kind);

                let routed = match watch {
                    WatchKind::Directory => event.kind != EventKind::Changed,
                    WatchKind::File => !event.kind.is_directory(),
                };
                if !routed {
                    trace!("{:?} on {} not routed to {:?} watch", event.kind, event.path.display(), watch);
                    return None;
                }

                if state.ledger.should_suppress(consumer, &event.path, watch, event.kind) {
                    debug!("Suppressed echo of own write to {}", event.path.display());
                    return None;
                }

                Some(Delivery::Event {
                    consumer,
                    subscription,
                    watch,
                    event,
                })
            }
            WorkerMessage::ResourceExhausted { subscription, root } => {
                let consumer = find(&state.subscriptions, subscription)?.consumer;
                if !state.warned_roots.insert(root.clone()) {
                    return None;
                }
                Some(Delivery::Warning {
                    consumer,
                    root,
                    message: RESOURCE_WARNING.to_string(),
                })
            }
        }
    }
}

fn find(subscriptions: &[Subscription], id: SubscriptionId) -> Option<&SubscriptionHandle> {
    subscriptions
        .iter()
        .map(|s| &s.handle)
        .find(|handle| handle.id == id)
}
