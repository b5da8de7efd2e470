//! Sign-in session tracking and the one-time reconciliation merge.
//!
//! Reconciliation runs once per sign-in: it migrates legacy local note ids
//! to UUIDs, uploads the notes the remote store doesn't have, and replaces
//! local state with the union. On any id collision the remote row wins
//! outright — the remote store is authoritative for ids it already owns.

use crate::api_client::NotesRemote;
use crate::error::SyncResult;
use corkboard_storage::BoardStore;
use corkboard_types::note::{is_canonical_uuid, new_note_id};
use std::collections::HashSet;
use tracing::{debug, info};

/// Tracks the authenticated owner, connectivity, and the one-shot
/// reconciliation guard for the current session.
pub struct SessionState {
    owner: Option<String>,
    reconciled: bool,
    online: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            owner: None,
            reconciled: false,
            online: true,
        }
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn set_online(&mut self, online: bool) {
        self.online = online;
    }

    /// Records a sign-in and reports whether reconciliation should run.
    /// The guard arms on the first notification and stays armed for the
    /// rest of the session — repeated auth-state notifications (and failed
    /// attempts) do not re-trigger the merge.
    pub fn begin_sign_in(&mut self, owner_id: String) -> bool {
        self.owner = Some(owner_id);
        if self.reconciled {
            false
        } else {
            self.reconciled = true;
            true
        }
    }

    /// Clears the owner and re-arms the reconciliation guard so a
    /// subsequent sign-in merges again.
    pub fn sign_out(&mut self) {
        self.owner = None;
        self.reconciled = false;
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Merges local notes with the owner's remote set.
///
/// Local notes with legacy (non-UUID) ids get a fresh permanent UUID at
/// this point — the moment they first become account-owned. Notes absent
/// from the remote id set are uploaded in one batch; the store is then
/// silently replaced with `remote ∪ local-only`, so the merge itself
/// triggers no pushes.
///
/// Any failure abandons the merge and leaves local notes untouched; they
/// remain eligible for a future sign-in.
pub async fn reconcile(
    store: &BoardStore,
    remote: &dyn NotesRemote,
    owner_id: &str,
) -> SyncResult<()> {
    let local_notes = store.notes();

    let remote_notes = remote.fetch_all(owner_id).await?;
    let remote_ids: HashSet<String> = remote_notes.iter().map(|n| n.id.clone()).collect();

    let mut local_only = Vec::new();
    for note in local_notes {
        let migrated = if is_canonical_uuid(&note.id) {
            note
        } else {
            let mut migrated = note;
            debug!("migrating legacy note id {} to a UUID", migrated.id);
            migrated.id = new_note_id();
            migrated
        };
        if !remote_ids.contains(&migrated.id) {
            local_only.push(migrated);
        }
    }

    if !local_only.is_empty() {
        remote.batch_upsert(&local_only, owner_id).await?;
    }

    info!(
        "reconciled sign-in: {} remote, {} uploaded local-only",
        remote_notes.len(),
        local_only.len()
    );

    let mut merged = remote_notes;
    merged.extend(local_only);
    store.set_notes_directly(merged);

    Ok(())
}
