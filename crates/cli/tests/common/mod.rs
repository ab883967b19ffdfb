//! Common utilities for integration tests

use cli_lib::{App, HostConfig};
use crossbeam_channel::{unbounded, Receiver};
use session::Notification;
use std::time::{Duration, Instant};
use watcher::{ConsumerId, WatcherConfig};

/// Upper bound for anything that waits on the native watcher
pub const TIMEOUT: Duration = Duration::from_secs(10);

/// App with short stability windows so tests settle quickly
pub fn fast_app() -> (App, Receiver<Notification>) {
    app_with(100, 20)
}

/// App with the given stability threshold and poll interval
pub fn app_with(stability_threshold_ms: u64, poll_interval_ms: u64) -> (App, Receiver<Notification>) {
    let config = HostConfig {
        watcher: WatcherConfig {
            stability_threshold_ms,
            poll_interval_ms,
            ..Default::default()
        },
        ..Default::default()
    };
    let (tx, rx) = unbounded();
    let app = App::new(config, ConsumerId(1), tx).unwrap();
    (app, rx)
}

/// Pump the app until `done` holds or the timeout expires
pub fn pump_until(app: &mut App, mut done: impl FnMut(&App) -> bool) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if done(app) {
            return true;
        }
        app.pump(Duration::from_millis(50)).unwrap();
    }
    done(app)
}

/// Pump for a fixed window, collecting every notification
pub fn pump_for(app: &mut App, rx: &Receiver<Notification>, window: Duration) -> Vec<Notification> {
    let deadline = Instant::now() + window;
    let mut seen = Vec::new();
    while Instant::now() < deadline {
        app.pump(Duration::from_millis(50)).unwrap();
        seen.extend(rx.try_iter());
    }
    seen
}
