mod support;

use corkboard_storage::{BoardStore, KvStore};
use corkboard_sync::{create_sync_engine, SyncConfig, SyncHandle, SyncQueue, SyncStatus};
use corkboard_types::note::new_note_id;
use corkboard_types::NotePatch;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use support::{note_with, FakeRemote};

struct Harness {
    store: BoardStore,
    queue: SyncQueue,
    remote: Arc<FakeRemote>,
    handle: SyncHandle,
}

fn start_engine() -> Harness {
    let kv = KvStore::open_in_memory().unwrap();
    let store = BoardStore::open(kv.clone()).unwrap();
    let queue = SyncQueue::new(kv);
    let remote = Arc::new(FakeRemote::new());

    let (handle, intent_tx, mut engine) = create_sync_engine(
        store.clone(),
        queue.clone(),
        remote.clone(),
        SyncConfig::default(),
    );
    store.attach_sync(intent_tx);
    tokio::spawn(async move { engine.run().await });

    Harness {
        store,
        queue,
        remote,
        handle,
    }
}

/// Lets the engine task drain everything that is ready. With the paused
/// clock this also fires any due debounce timers.
async fn settle(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn content_edits_within_the_window_collapse_to_one_push() {
    let h = start_engine();
    h.handle.signed_in("owner-1").await.unwrap();
    settle(10).await;

    let id = h.store.add_note(None);
    settle(10).await;
    assert_eq!(h.remote.upsert_count(), 1);

    h.store.update_note(&id, NotePatch::content("a"));
    h.store.update_note(&id, NotePatch::content("ab"));
    h.store.update_note(&id, NotePatch::content("abc"));
    settle(700).await;

    // One debounced push carrying the state at fire time, not at schedule
    // time.
    assert_eq!(h.remote.upsert_count(), 2);
    assert_eq!(h.remote.row(&id).unwrap().content, "abc");
}

#[tokio::test(start_paused = true)]
async fn pushing_the_same_state_twice_keeps_one_row() {
    let h = start_engine();
    h.handle.signed_in("owner-1").await.unwrap();
    settle(10).await;

    let id = h.store.add_note(None);
    settle(10).await;
    h.store.move_note(&id, 5.0, 5.0);
    h.store.move_note(&id, 5.0, 5.0);
    settle(10).await;

    assert_eq!(h.remote.row_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn pushes_are_skipped_entirely_without_an_owner() {
    let h = start_engine();
    let id = h.store.add_note(None);
    h.store.update_note(&id, NotePatch::content("offline only"));
    settle(700).await;

    // No remote traffic, and nothing queued either — there is nothing to
    // eventually sync to.
    assert_eq!(h.remote.upsert_count(), 0);
    assert!(h.queue.is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_pushes_land_in_the_queue_and_drain_on_reconnect() {
    let h = start_engine();
    h.handle.signed_in("owner-1").await.unwrap();
    settle(10).await;

    h.remote.set_fail_all(true);
    let id = h.store.add_note(None);
    settle(10).await;
    assert_eq!(h.queue.len(), 1);
    assert!(h.remote.row(&id).is_none());

    h.remote.clear_failures();
    h.handle.connectivity_changed(true).await.unwrap();
    settle(10).await;

    assert!(h.queue.is_empty());
    assert!(h.remote.row(&id).is_some());
}

#[tokio::test(start_paused = true)]
async fn failed_deletes_queue_a_delete_entry() {
    let h = start_engine();
    h.handle.signed_in("owner-1").await.unwrap();
    settle(10).await;

    let id = h.store.add_note(None);
    settle(10).await;
    h.remote.set_fail_all(true);
    h.store.permanently_delete(&id);
    settle(10).await;

    assert_eq!(h.queue.len(), 1);
    h.remote.clear_failures();
    h.handle.force_drain().await.unwrap();
    settle(10).await;
    assert!(h.queue.is_empty());
    assert!(h.remote.row(&id).is_none());
}

#[tokio::test(start_paused = true)]
async fn failed_batch_falls_back_to_per_note_queue_entries() {
    let h = start_engine();
    h.handle.signed_in("owner-1").await.unwrap();
    settle(10).await;

    h.store.add_note(None);
    h.store.add_note(None);
    settle(10).await;
    h.remote.set_fail_all(true);
    let exported = h.store.export_notes();
    assert!(h.store.import_notes(&exported));
    settle(10).await;

    // The batch failed; each note got its own retry entry.
    assert_eq!(h.queue.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn sign_in_merges_local_and_remote_notes() {
    let h = start_engine();
    let local_id = h.store.add_note(None);
    h.store.update_note(&local_id, NotePatch::content("mine"));
    h.remote.seed(note_with(&new_note_id(), "theirs"));

    h.handle.signed_in("owner-1").await.unwrap();
    settle(10).await;

    let contents: Vec<String> = h.store.notes().iter().map(|n| n.content.clone()).collect();
    assert_eq!(contents.len(), 2);
    assert!(contents.contains(&"mine".to_string()));
    assert!(contents.contains(&"theirs".to_string()));
    assert_eq!(h.remote.fetch_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn repeated_sign_in_notifications_reconcile_once() {
    let h = start_engine();
    h.handle.signed_in("owner-1").await.unwrap();
    settle(10).await;
    h.handle.signed_in("owner-1").await.unwrap();
    settle(10).await;
    assert_eq!(h.remote.fetch_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn sign_out_clears_notes_queue_and_rearms_reconciliation() {
    let h = start_engine();
    h.handle.signed_in("owner-1").await.unwrap();
    settle(10).await;

    h.remote.set_fail_all(true);
    h.store.add_note(None);
    settle(10).await;
    assert_eq!(h.queue.len(), 1);

    h.handle.signed_out().await.unwrap();
    settle(10).await;
    assert!(h.store.notes().is_empty());
    assert!(h.queue.is_empty());
    assert_eq!(h.handle.status(), SyncStatus::LocalOnly);

    h.remote.clear_failures();
    h.handle.signed_in("owner-1").await.unwrap();
    settle(10).await;
    assert_eq!(h.remote.fetch_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_reconciliation_keeps_local_notes_usable() {
    let h = start_engine();
    let id = h.store.add_note(None);
    h.store.update_note(&id, NotePatch::content("survives"));
    h.remote.set_fail_all(true);

    h.handle.signed_in("owner-1").await.unwrap();
    settle(10).await;

    assert_eq!(h.store.notes().len(), 1);
    assert_eq!(h.store.note(&id).unwrap().content, "survives");
    assert_eq!(h.handle.status(), SyncStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn connectivity_transitions_update_status() {
    let h = start_engine();
    assert_eq!(h.handle.status(), SyncStatus::LocalOnly);

    h.handle.signed_in("owner-1").await.unwrap();
    settle(10).await;
    assert_eq!(h.handle.status(), SyncStatus::Idle);

    h.handle.connectivity_changed(false).await.unwrap();
    settle(10).await;
    assert_eq!(h.handle.status(), SyncStatus::Offline);

    h.handle.connectivity_changed(true).await.unwrap();
    settle(10).await;
    assert_eq!(h.handle.status(), SyncStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn going_offline_does_not_block_local_mutations() {
    let h = start_engine();
    h.handle.signed_in("owner-1").await.unwrap();
    settle(10).await;
    h.handle.connectivity_changed(false).await.unwrap();
    settle(10).await;

    let id = h.store.add_note(None);
    assert!(h.store.note(&id).is_some());
}

#[tokio::test(start_paused = true)]
async fn stop_flushes_pending_debounced_edits() {
    let h = start_engine();
    h.handle.signed_in("owner-1").await.unwrap();
    settle(10).await;

    let id = h.store.add_note(None);
    settle(10).await;
    h.store.update_note(&id, NotePatch::content("last words"));
    settle(10).await;

    h.handle.stop().await.unwrap();
    settle(10).await;
    assert_eq!(h.remote.row(&id).unwrap().content, "last words");

    // The engine is gone; further commands fail.
    assert!(h.handle.force_drain().await.is_err());
}

#[tokio::test(start_paused = true)]
async fn delete_account_data_wipes_the_owner_rows() {
    let h = start_engine();
    h.remote.seed(note_with(&new_note_id(), "doomed"));
    h.handle.signed_in("owner-1").await.unwrap();
    settle(10).await;
    assert!(h.remote.row_count() > 0);

    h.handle.delete_account_data().await.unwrap();
    settle(10).await;
    assert_eq!(h.remote.row_count(), 0);
}
