//! canopy host layer
//!
//! Glue between the watch registry, the workspace session and whatever
//! presentation layer drives them: command dispatch, file operations and
//! routing of registry deliveries.

pub mod app;
pub mod command;
pub mod config;
pub mod ops;

pub use app::{App, RESOURCE_WARNING_TITLE};
pub use command::{Command, CommandOutput, CommandResult};
pub use config::HostConfig;
pub use ops::FileOps;
