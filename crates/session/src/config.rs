//! Session configuration

use crate::error::{Result, SessionError};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path};

/// Where per-workspace state lives, relative to the workspace root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
        }
    }
}

impl SessionConfig {
    /// The state directory must be a plain relative directory name
    pub fn validate(&self) -> Result<()> {
        let path = Path::new(&self.state_dir);
        let mut components = path.components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(()),
            _ => Err(SessionError::Config(format!(
                "state_dir must be a single relative directory name (got {:?})",
                self.state_dir
            ))),
        }
    }
}

fn default_state_dir() -> String {
    ".canopy".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_dir_validation() {
        assert!(SessionConfig::default().validate().is_ok());

        for bad in ["", "/abs", "a/b", ".."] {
            let config = SessionConfig {
                state_dir: bad.to_string(),
            };
            assert!(config.validate().is_err(), "{:?} accepted", bad);
        }
    }
}
