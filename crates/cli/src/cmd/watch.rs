//! Foreground workspace host
//!
//! Opens a workspace and runs the `App` on a blocking thread. Notifications
//! and command results are written to stdout as JSON lines; commands are
//! read from stdin as JSON lines. Stops on Ctrl-C or end of input.

use anyhow::{Context, Result};
use cli_lib::config::{self, HostConfig};
use cli_lib::{App, Command, CommandResult};
use crossbeam_channel::{unbounded, Receiver, TryRecvError};
use serde::Serialize;
use session::Notification;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use watcher::ConsumerId;

/// How long the host blocks on the registry before checking for commands
const PUMP_INTERVAL: Duration = Duration::from_millis(50);

pub async fn run(path: PathBuf, config_path: Option<PathBuf>, polling: bool) -> Result<()> {
    let mut config = match &config_path {
        Some(path) => HostConfig::load_from(path)?,
        None => config::load()?,
    };
    if polling {
        config.watcher.use_polling = true;
    }

    let (notify_tx, notify_rx) = unbounded();
    let (command_tx, command_rx) = unbounded();

    let mut app = App::new(config, ConsumerId(1), notify_tx)?;
    app.open_workspace(&path)?;

    let mut host = tokio::task::spawn_blocking(move || run_host(app, command_rx, notify_rx));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
            result = &mut host => {
                return result.context("Host thread panicked")?;
            }
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    info!("End of input, shutting down");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Command>(&line) {
                    Ok(command) => {
                        if command_tx.send(command).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("Ignoring malformed command: {}", e),
                }
            }
        }
    }

    drop(command_tx);
    host.await.context("Host thread panicked")?
}

/// Owner loop of the `App`: commands first, then registry deliveries
fn run_host(mut app: App, commands: Receiver<Command>, notifications: Receiver<Notification>) -> Result<()> {
    loop {
        loop {
            match commands.try_recv() {
                Ok(command) => {
                    let result = app.handle(command).unwrap_or_else(|e| {
                        error!("Command rejected: {:#}", e);
                        CommandResult::failed(format!("{:#}", e))
                    });
                    emit_all(&notifications)?;
                    emit(&serde_json::json!({ "result": result }))?;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    app.shutdown();
                    return emit_all(&notifications);
                }
            }
        }

        app.pump(PUMP_INTERVAL)?;
        emit_all(&notifications)?;
    }
}

fn emit_all(notifications: &Receiver<Notification>) -> Result<()> {
    for notification in notifications.try_iter() {
        emit(&notification)?;
    }
    Ok(())
}

fn emit<T: Serialize>(value: &T) -> Result<()> {
    let line = serde_json::to_string(value).context("Failed to encode output")?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", line).context("Failed to write to stdout")?;
    stdout.flush()?;
    Ok(())
}
