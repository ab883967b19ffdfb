//! End-to-end tests of the host against a real filesystem and native
//! watcher

mod common;

use cli_lib::{Command, CommandOutput, CommandResult};
use common::{app_with, fast_app, pump_for, pump_until};
use session::Notification;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_external_changes_reach_the_tree() {
    let temp_dir = TempDir::new().unwrap();
    let (mut app, _rx) = fast_app();
    app.open_workspace(temp_dir.path()).unwrap();
    let root = app.root().unwrap().to_path_buf();
    std::thread::sleep(Duration::from_millis(200));

    fs::create_dir_all(root.join("docs/notes")).unwrap();
    fs::write(root.join("docs/notes/x.md"), b"x").unwrap();

    let x = root.join("docs/notes/x.md");
    assert!(pump_until(&mut app, |app| {
        let tree = app.session().unwrap().tree();
        matches!(tree.get_file_item_by_path(&x), Ok(Some(_)))
    }));
    let session = app.session().unwrap();
    assert_eq!(session.folder_count(), session.tree().folder_count());
    assert_eq!(session.folder_count(), 3);

    fs::remove_dir_all(root.join("docs")).unwrap();
    assert!(pump_until(&mut app, |app| app.session().unwrap().folder_count() == 1));
}

#[test]
fn test_deleting_active_file_closes_its_tab() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("a.md"), b"a").unwrap();
    let (mut app, _rx) = fast_app();
    app.open_workspace(temp_dir.path()).unwrap();
    let root = app.root().unwrap().to_path_buf();
    let a = root.join("a.md");
    std::thread::sleep(Duration::from_millis(200));

    app.handle(Command::SetActiveFile { path: a.clone() }).unwrap();
    let result = app.handle(Command::UnlinkFile { path: a.clone() }).unwrap();
    assert!(result.is_ok());

    assert!(pump_until(&mut app, |app| app.session().unwrap().tabs().is_empty()));
    let session = app.session().unwrap();
    assert_eq!(session.active_file(), None);
    assert!(session.tree().get_file_item_by_path(&a).unwrap().is_none());
}

#[test]
fn test_own_writes_are_not_reported_as_file_changes() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("a.md"), b"a").unwrap();
    // The suppression window only outlasts the stability wait by two poll
    // rounds, so keep the poll interval coarse here
    let (mut app, rx) = app_with(200, 80);
    app.open_workspace(temp_dir.path()).unwrap();
    let a = app.root().unwrap().join("a.md");
    app.handle(Command::SetActiveFile { path: a.clone() }).unwrap();
    std::thread::sleep(Duration::from_millis(200));
    rx.try_iter().for_each(drop);

    let result = app
        .handle(Command::WriteFile {
            path: a.clone(),
            contents: "mine".to_string(),
        })
        .unwrap();
    assert_eq!(result, CommandResult::Ok(CommandOutput::Done));

    let seen = pump_for(&mut app, &rx, Duration::from_millis(800));
    assert!(
        !seen.iter().any(|n| matches!(n, Notification::FileChanged { .. })),
        "own write echoed back: {:?}",
        seen
    );

    fs::write(&a, b"someone else").unwrap();
    let mut changed = false;
    assert!(pump_until(&mut app, |_| {
        changed |= rx
            .try_iter()
            .any(|n| matches!(n, Notification::FileChanged { ref path } if *path == a));
        changed
    }));
}

#[test]
fn test_created_file_appears_once() {
    let temp_dir = TempDir::new().unwrap();
    let (mut app, rx) = fast_app();
    app.open_workspace(temp_dir.path()).unwrap();
    let root = app.root().unwrap().to_path_buf();
    std::thread::sleep(Duration::from_millis(200));

    let result = app
        .handle(Command::CreateFile {
            dir: root.clone(),
            name: "note.md".to_string(),
        })
        .unwrap();
    let CommandResult::Ok(CommandOutput::Path(created)) = result else {
        panic!("create failed: {:?}", result);
    };

    assert!(pump_until(&mut app, |app| {
        matches!(app.session().unwrap().tree().get_file_item_by_path(&created), Ok(Some(_)))
    }));
    pump_for(&mut app, &rx, Duration::from_millis(300));

    let files = &app.session().unwrap().tree().root().children.files;
    assert_eq!(files.iter().filter(|f| f.basename == "note.md").count(), 1);
}
