mod support;

use corkboard_storage::KvStore;
use corkboard_sync::{QueueKind, SyncQueue};
use corkboard_types::Note;
use pretty_assertions::assert_eq;
use support::{note_with, FakeRemote};

fn queue() -> SyncQueue {
    SyncQueue::new(KvStore::open_in_memory().unwrap())
}

#[test]
fn new_queue_is_empty() {
    let q = queue();
    assert!(q.is_empty());
    assert_eq!(q.len(), 0);
}

#[test]
fn enqueue_records_upsert_with_payload() {
    let q = queue();
    q.enqueue_upsert(note_with("n-1", "hello"));
    let entries = q.peek_all();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, QueueKind::Upsert);
    assert_eq!(entries[0].note_id, "n-1");
    assert_eq!(entries[0].payload.as_ref().unwrap().content, "hello");
}

#[test]
fn upsert_for_same_note_coalesces_to_newest() {
    let q = queue();
    q.enqueue_upsert(note_with("n-1", "first"));
    q.enqueue_upsert(note_with("n-1", "second"));
    let entries = q.peek_all();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].payload.as_ref().unwrap().content, "second");
}

#[test]
fn different_kinds_for_same_note_both_survive() {
    let q = queue();
    q.enqueue_upsert(note_with("n-1", "x"));
    q.enqueue_delete("n-1");
    assert_eq!(q.len(), 2);
}

#[test]
fn clear_empties_the_queue() {
    let q = queue();
    q.enqueue_delete("n-1");
    q.clear();
    assert!(q.is_empty());
}

#[test]
fn entries_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("board.db");
    {
        let q = SyncQueue::new(KvStore::open(&path).unwrap());
        q.enqueue_upsert(note_with("n-1", "pending"));
        q.enqueue_delete("n-2");
    }
    let q = SyncQueue::new(KvStore::open(&path).unwrap());
    let entries = q.peek_all();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].note_id, "n-1");
    assert_eq!(entries[1].kind, QueueKind::Delete);
}

#[tokio::test]
async fn drain_of_empty_queue_touches_nothing() {
    let q = queue();
    let remote = FakeRemote::new();
    assert_eq!(q.drain("owner-1", &remote).await, 0);
    assert_eq!(remote.upsert_count(), 0);
}

#[tokio::test]
async fn successful_drain_clears_the_queue() {
    let q = queue();
    let remote = FakeRemote::new();
    q.enqueue_upsert(note_with("n-1", "a"));
    q.enqueue_delete("n-2");

    assert_eq!(q.drain("owner-1", &remote).await, 0);
    assert!(q.is_empty());
    assert_eq!(remote.row("n-1").unwrap().content, "a");
    assert_eq!(remote.delete_calls.lock().unwrap().as_slice(), ["n-2"]);
}

#[tokio::test]
async fn drain_keeps_only_the_still_failing_entry() {
    let q = queue();
    let remote = FakeRemote::new();
    q.enqueue_upsert(note_with("n-1", "a"));
    q.enqueue_upsert(note_with("n-2", "b"));
    q.enqueue_upsert(note_with("n-3", "c"));
    remote.fail_note("n-2");

    assert_eq!(q.drain("owner-1", &remote).await, 1);

    let entries = q.peek_all();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].note_id, "n-2");
    // Entries 1 and 3 went through even though 2 failed between them.
    assert!(remote.row("n-1").is_some());
    assert!(remote.row("n-3").is_some());
}

#[tokio::test]
async fn failed_entries_succeed_on_a_later_drain() {
    let q = queue();
    let remote = FakeRemote::new();
    q.enqueue_upsert(note_with("n-1", "a"));
    remote.set_fail_all(true);

    assert_eq!(q.drain("owner-1", &remote).await, 1);
    assert_eq!(q.len(), 1);

    remote.clear_failures();
    assert_eq!(q.drain("owner-1", &remote).await, 0);
    assert!(q.is_empty());
    assert!(remote.row("n-1").is_some());
}

#[tokio::test]
async fn drain_replays_oldest_first() {
    let q = queue();
    let remote = FakeRemote::new();
    // Same note id with different kinds keeps both entries; replay order
    // follows enqueue time.
    let mut note = Note::new(0.0, 0.0);
    note.id = "n-1".into();
    q.enqueue_upsert(note);
    q.enqueue_delete("n-1");

    q.drain("owner-1", &remote).await;
    // The delete was enqueued last, so the row ends up gone.
    assert!(remote.row("n-1").is_none());
}
