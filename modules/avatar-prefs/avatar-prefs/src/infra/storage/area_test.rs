use super::*;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

async fn next_change(events: &mut StorageEvents) -> Option<StorageChange> {
    tokio::time::timeout(Duration::from_millis(200), events.recv())
        .await
        .ok()
        .and_then(Result::ok)
}

#[tokio::test]
async fn writes_reach_other_contexts_only() {
    let area = StorageArea::in_memory(8);
    let tab_a = area.attach();
    let tab_b = area.attach();
    assert_ne!(tab_a.context(), tab_b.context());

    let mut feed_a = tab_a.watch();
    let mut feed_b = tab_b.watch();

    tab_a.set_item("k", "v1").unwrap();
    assert_eq!(tab_b.get_item("k").unwrap().as_deref(), Some("v1"));

    let change = next_change(&mut feed_b).await.unwrap();
    assert_eq!(change.key.as_deref(), Some("k"));
    assert_eq!(change.old_value, None);
    assert_eq!(change.new_value.as_deref(), Some("v1"));
    assert_eq!(change.origin, tab_a.context());

    assert_eq!(next_change(&mut feed_a).await, None);
}

#[tokio::test]
async fn rewriting_the_same_value_is_silent() {
    let area = StorageArea::in_memory(8);
    let writer = area.attach();
    let mut feed = area.attach().watch();

    writer.set_item("k", "v").unwrap();
    assert!(next_change(&mut feed).await.is_some());
    writer.set_item("k", "v").unwrap();
    assert_eq!(next_change(&mut feed).await, None);

    writer.remove_item("k").unwrap();
    let change = next_change(&mut feed).await.unwrap();
    assert_eq!(change.old_value.as_deref(), Some("v"));
    assert_eq!(change.new_value, None);
}

#[tokio::test]
async fn clear_emits_a_keyless_change() {
    let area = StorageArea::in_memory(8);
    let writer = area.attach();
    let mut feed = area.attach().watch();
    writer.set_item("a", "1").unwrap();
    writer.set_item("b", "2").unwrap();
    let _ = next_change(&mut feed).await;
    let _ = next_change(&mut feed).await;

    writer.clear().unwrap();
    let change = next_change(&mut feed).await.unwrap();
    assert_eq!(change.key, None);
    assert_eq!(writer.get_item("a").unwrap(), None);
}

#[tokio::test]
async fn lagging_feed_reports_skipped_changes() {
    let area = StorageArea::in_memory(1);
    let writer = area.attach();
    let mut feed = area.attach().watch();
    writer.set_item("k", "1").unwrap();
    writer.set_item("k", "2").unwrap();
    writer.set_item("k", "3").unwrap();

    assert!(matches!(feed.recv().await, Err(RecvError::Lagged(_))));
    assert_eq!(feed.recv().await.unwrap().new_value.as_deref(), Some("3"));
}

#[test]
fn file_area_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("prefs.json");

    let area = StorageArea::open(&path, 8).unwrap();
    area.attach().set_item("nt/avatar-pref/u1", "{\"mode\":\"dicebear\"}").unwrap();
    assert!(path.exists());

    let reopened = StorageArea::open(&path, 8).unwrap();
    assert_eq!(
        reopened.attach().get_item("nt/avatar-pref/u1").unwrap().as_deref(),
        Some("{\"mode\":\"dicebear\"}")
    );
}

#[tokio::test]
async fn external_writes_are_picked_up_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prefs.json");

    // Two areas on one file stand for two processes.
    let ours = StorageArea::open(&path, 8).unwrap();
    let theirs = StorageArea::open(&path, 8).unwrap();
    let tab = ours.attach();
    let mut feed = tab.watch();

    theirs.attach().set_item("k", "from-elsewhere").unwrap();
    assert_eq!(ours.sync_from_disk().unwrap(), 1);

    let change = next_change(&mut feed).await.unwrap();
    assert_eq!(change.origin, ContextId::EXTERNAL);
    assert_eq!(change.new_value.as_deref(), Some("from-elsewhere"));
    assert_eq!(tab.get_item("k").unwrap().as_deref(), Some("from-elsewhere"));

    assert_eq!(ours.sync_from_disk().unwrap(), 0);
}

#[tokio::test]
async fn write_keeps_keys_written_by_other_processes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prefs.json");
    let ours = StorageArea::open(&path, 8).unwrap();
    let theirs = StorageArea::open(&path, 8).unwrap();

    theirs.attach().set_item("a", "1").unwrap();
    ours.attach().set_item("b", "2").unwrap();

    let fresh = StorageArea::open(&path, 8).unwrap().attach();
    assert_eq!(fresh.get_item("a").unwrap().as_deref(), Some("1"));
    assert_eq!(fresh.get_item("b").unwrap().as_deref(), Some("2"));
}

#[tokio::test]
async fn watcher_polls_for_external_writes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prefs.json");
    let ours = StorageArea::open(&path, 8).unwrap();
    let theirs = StorageArea::open(&path, 8).unwrap();
    let mut feed = ours.attach().watch();

    let token = CancellationToken::new();
    let watcher = ours
        .spawn_watcher(Duration::from_millis(20), token.clone())
        .unwrap();

    theirs.attach().set_item("k", "v").unwrap();
    let change = tokio::time::timeout(Duration::from_secs(2), feed.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(change.key.as_deref(), Some("k"));

    token.cancel();
    watcher.await.unwrap();
    assert!(StorageArea::in_memory(1).spawn_watcher(Duration::from_millis(20), token).is_none());
}

#[test]
fn failed_persist_rolls_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prefs.json");
    let area = StorageArea::open(&path, 8).unwrap();
    let tab = area.attach();
    tab.set_item("k", "old").unwrap();

    // Replace the document with a non-empty directory so the rename fails.
    std::fs::remove_file(&path).unwrap();
    std::fs::create_dir(&path).unwrap();
    std::fs::write(path.join("blocker"), b"x").unwrap();

    let err = tab.set_item("k", "new").unwrap_err();
    assert!(matches!(err, StorageError::Io { .. }));
    assert_eq!(tab.get_item("k").unwrap().as_deref(), Some("old"));
}

#[test]
fn unreadable_document_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prefs.json");
    std::fs::write(&path, b"{ not json").unwrap();

    let area = StorageArea::open(&path, 8).unwrap();
    let tab = area.attach();
    assert_eq!(tab.get_item("k").unwrap(), None);

    tab.set_item("k", "v").unwrap();
    let reopened = StorageArea::open(&path, 8).unwrap();
    assert_eq!(reopened.attach().get_item("k").unwrap().as_deref(), Some("v"));
}
