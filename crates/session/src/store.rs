//! Workspace state store using sled
//!
//! One record per workspace root, keyed by the root path and encoded with
//! bincode. Every save is flushed before returning.

use crate::error::Result;
use crate::state::PersistedState;
use sled::Db;
use std::path::Path;
use tracing::{debug, warn};

const DB_FILE: &str = "workspace.db";

pub struct StateStore {
    db: Db,
}

impl StateStore {
    /// Open or create the store inside `dir`
    pub fn open(dir: &Path) -> Result<Self> {
        let db = sled::open(dir.join(DB_FILE))?;
        Ok(Self { db })
    }

    /// Load the record for `root`.
    ///
    /// A record that cannot be decoded (older layout, corruption) is
    /// reported and treated as absent.
    pub fn load(&self, root: &Path) -> Result<Option<PersistedState>> {
        let Some(value) = self.db.get(key(root))? else {
            return Ok(None);
        };

        match PersistedState::deserialize(&value) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                warn!("Discarding unreadable workspace state for {}: {}", root.display(), e);
                Ok(None)
            }
        }
    }

    /// Replace the record for `root`
    pub fn save(&self, root: &Path, state: &PersistedState) -> Result<()> {
        let value = state.serialize()?;
        self.db.insert(key(root), value)?;
        self.db.flush()?;
        debug!("Saved workspace state for {}", root.display());
        Ok(())
    }

    /// Delete the record for `root`
    pub fn remove(&self, root: &Path) -> Result<()> {
        self.db.remove(key(root))?;
        self.db.flush()?;
        Ok(())
    }
}

fn key(root: &Path) -> Vec<u8> {
    root.to_string_lossy().into_owned().into_bytes()
}
