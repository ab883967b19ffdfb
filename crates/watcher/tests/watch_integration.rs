//! Integration tests for the watch registry against a real filesystem
//!
//! Windows are kept short so the tests run quickly; timeouts are generous
//! to tolerate slow CI filesystems.

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use watcher::{ConsumerId, Delivery, EventKind, WatchKind, WatchRegistry, WatcherConfig};

const TIMEOUT: Duration = Duration::from_secs(10);

fn fast_registry() -> WatchRegistry {
    WatchRegistry::new(WatcherConfig {
        stability_threshold_ms: 100,
        poll_interval_ms: 20,
        ..Default::default()
    })
    .unwrap()
}

/// Pump deliveries until one matches `kind` on `path`, or time out
fn wait_for(registry: &WatchRegistry, kind: EventKind, path: &Path) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if let Some(Delivery::Event { event, .. }) = registry.recv_timeout(Duration::from_millis(100)) {
            if event.kind == kind && event.path == path {
                return true;
            }
        }
    }
    false
}

/// Collect every delivery arriving within `window`
fn drain_for(registry: &WatchRegistry, window: Duration) -> Vec<Delivery> {
    let deadline = Instant::now() + window;
    let mut deliveries = Vec::new();
    while Instant::now() < deadline {
        if let Some(delivery) = registry.recv_timeout(Duration::from_millis(50)) {
            deliveries.push(delivery);
        }
    }
    deliveries
}

#[test]
fn test_directory_watch_reports_adds_and_removes() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().canonicalize().unwrap();
    let registry = fast_registry();
    registry.watch(ConsumerId(1), &root, WatchKind::Directory).unwrap();
    std::thread::sleep(Duration::from_millis(200));

    let file = root.join("note.md");
    fs::write(&file, b"hello").unwrap();
    assert!(wait_for(&registry, EventKind::Added, &file), "no Added for {}", file.display());

    let dir = root.join("docs");
    fs::create_dir(&dir).unwrap();
    assert!(wait_for(&registry, EventKind::DirectoryAdded, &dir));

    fs::remove_file(&file).unwrap();
    assert!(wait_for(&registry, EventKind::Removed, &file));

    registry.close();
}

#[test]
fn test_hidden_files_never_delivered() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().canonicalize().unwrap();
    let registry = fast_registry();
    registry.watch(ConsumerId(1), &root, WatchKind::Directory).unwrap();
    std::thread::sleep(Duration::from_millis(200));

    fs::write(root.join(".hidden"), b"x").unwrap();
    fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
    let visible = root.join("visible.md");
    fs::write(&visible, b"x").unwrap();

    assert!(wait_for(&registry, EventKind::Added, &visible));
    for delivery in drain_for(&registry, Duration::from_millis(500)) {
        if let Delivery::Event { event, .. } = delivery {
            let name = event.path.file_name().unwrap().to_string_lossy().into_owned();
            assert!(!name.starts_with('.'), "hidden entry delivered: {}", name);
            assert!(!event.path.starts_with(root.join("node_modules")));
        }
    }
}

#[test]
fn test_file_watch_suppresses_own_write() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().canonicalize().unwrap();
    let file = root.join("active.md");
    fs::write(&file, b"v1").unwrap();

    let registry = fast_registry();
    let consumer = ConsumerId(3);
    registry.watch(consumer, &file, WatchKind::File).unwrap();
    std::thread::sleep(Duration::from_millis(200));

    registry.suppress(consumer, &file);
    fs::write(&file, b"v2 written by us").unwrap();
    let echoes: Vec<_> = drain_for(&registry, Duration::from_millis(800))
        .into_iter()
        .filter(|d| matches!(d, Delivery::Event { event, .. } if event.kind == EventKind::Changed))
        .collect();
    assert!(echoes.is_empty(), "own write echoed: {:?}", echoes);

    fs::write(&file, b"v3 written by someone else").unwrap();
    assert!(wait_for(&registry, EventKind::Changed, &file));
}

#[test]
fn test_unwatch_stops_delivery() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().canonicalize().unwrap();
    let registry = fast_registry();
    registry.watch(ConsumerId(1), &root, WatchKind::Directory).unwrap();
    std::thread::sleep(Duration::from_millis(200));

    assert!(registry.unwatch(ConsumerId(1), &root, WatchKind::Directory));
    fs::write(root.join("late.md"), b"x").unwrap();

    assert!(drain_for(&registry, Duration::from_millis(500)).is_empty());
}
