//! Sync engine — the event loop tying the store, dispatcher, queue, and
//! remote client together.
//!
//! Mutations arrive as [`SyncIntent`]s over an unbounded channel; the
//! external identity and connectivity collaborators drive the engine
//! through [`SyncCommand`]s on a [`SyncHandle`]. Every remote failure on
//! the push path lands in the durable queue and is replayed on the next
//! drain trigger (reconnect, sign-in, or an explicit force-drain).

use crate::api_client::NotesRemote;
use crate::config::SyncConfig;
use crate::dispatcher::{PushAction, SyncDispatcher};
use crate::error::{SyncError, SyncResult};
use crate::queue::SyncQueue;
use crate::session::{reconcile, SessionState};
use corkboard_storage::BoardStore;
use corkboard_types::{Note, SyncIntent};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Duration, Instant};
use tracing::{debug, error, info, warn};

/// Commands sent to the sync engine by the identity/connectivity
/// collaborators and the UI shell.
#[derive(Debug)]
pub enum SyncCommand {
    SignedIn { owner_id: String },
    SignedOut,
    ConnectivityChanged { online: bool },
    ForceDrain,
    /// Remove every remote row for the current owner (account deletion).
    DeleteAccountData,
    Stop,
}

/// Sync state reported to the UI.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncStatus {
    /// No authenticated owner; notes live locally only.
    LocalOnly,
    Idle,
    Syncing,
    /// Authenticated but the runtime reports no connectivity. Purely
    /// observational — local mutations proceed and queue up.
    Offline,
}

/// Handle for driving a running sync engine.
#[derive(Clone)]
pub struct SyncHandle {
    command_tx: mpsc::Sender<SyncCommand>,
    status_rx: watch::Receiver<SyncStatus>,
}

impl SyncHandle {
    pub async fn signed_in(&self, owner_id: impl Into<String>) -> SyncResult<()> {
        self.send(SyncCommand::SignedIn {
            owner_id: owner_id.into(),
        })
        .await
    }

    pub async fn signed_out(&self) -> SyncResult<()> {
        self.send(SyncCommand::SignedOut).await
    }

    pub async fn connectivity_changed(&self, online: bool) -> SyncResult<()> {
        self.send(SyncCommand::ConnectivityChanged { online }).await
    }

    pub async fn force_drain(&self) -> SyncResult<()> {
        self.send(SyncCommand::ForceDrain).await
    }

    pub async fn delete_account_data(&self) -> SyncResult<()> {
        self.send(SyncCommand::DeleteAccountData).await
    }

    pub async fn stop(&self) -> SyncResult<()> {
        self.send(SyncCommand::Stop).await
    }

    /// The engine's current sync status.
    pub fn status(&self) -> SyncStatus {
        *self.status_rx.borrow()
    }

    /// A watch receiver for observing status transitions.
    pub fn status_watch(&self) -> watch::Receiver<SyncStatus> {
        self.status_rx.clone()
    }

    async fn send(&self, command: SyncCommand) -> SyncResult<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| SyncError::EngineStopped)
    }
}

/// Creates a sync engine, its command handle, and the intent sender to
/// attach to the board store.
pub fn create_sync_engine(
    store: BoardStore,
    queue: SyncQueue,
    remote: Arc<dyn NotesRemote>,
    config: SyncConfig,
) -> (SyncHandle, mpsc::UnboundedSender<SyncIntent>, SyncEngine) {
    let (command_tx, command_rx) = mpsc::channel(64);
    let (intent_tx, intent_rx) = mpsc::unbounded_channel();
    let (status_tx, status_rx) = watch::channel(SyncStatus::LocalOnly);

    let handle = SyncHandle {
        command_tx,
        status_rx,
    };

    let dispatcher = SyncDispatcher::new(Duration::from_millis(config.debounce_ms));
    let engine = SyncEngine {
        store,
        queue,
        remote,
        dispatcher,
        session: SessionState::new(),
        intent_rx,
        command_rx,
        status_tx,
    };

    (handle, intent_tx, engine)
}

/// The sync engine event loop.
pub struct SyncEngine {
    store: BoardStore,
    queue: SyncQueue,
    remote: Arc<dyn NotesRemote>,
    dispatcher: SyncDispatcher,
    session: SessionState,
    intent_rx: mpsc::UnboundedReceiver<SyncIntent>,
    command_rx: mpsc::Receiver<SyncCommand>,
    status_tx: watch::Sender<SyncStatus>,
}

impl SyncEngine {
    /// Runs until `Stop` or until the command channel closes.
    pub async fn run(&mut self) {
        info!("sync engine started");

        loop {
            let deadline = self.dispatcher.next_deadline();
            let debounce_sleep = async {
                match deadline {
                    Some(at) => sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                Some(intent) = self.intent_rx.recv() => {
                    self.dispatcher.schedule(intent);
                    self.flush_due().await;
                }
                _ = debounce_sleep => {
                    self.flush_due().await;
                }
                command = self.command_rx.recv() => {
                    match command {
                        Some(command) => {
                            if !self.handle_command(command).await {
                                break;
                            }
                        }
                        None => {
                            info!("command channel closed, stopping sync engine");
                            break;
                        }
                    }
                }
            }
        }

        info!("sync engine stopped");
    }

    /// Executes every push that is due right now.
    async fn flush_due(&mut self) {
        for action in self.dispatcher.take_due(Instant::now()) {
            self.execute(action).await;
        }
    }

    /// Executes one push. With no authenticated owner this is a no-op —
    /// nothing is queued either, since there is nothing to eventually sync
    /// to. Failures land in the durable queue.
    async fn execute(&mut self, action: PushAction) {
        let Some(owner) = self.session.owner().map(str::to_owned) else {
            return;
        };
        match action {
            PushAction::Upsert(note_id) => {
                // Looked up at fire time so a debounced push carries the
                // latest state; the note may also be gone by now.
                let Some(note) = self.store.note(&note_id) else {
                    return;
                };
                if let Err(e) = self.remote.upsert(&note, &owner).await {
                    warn!("push failed for note {note_id}, queueing: {e}");
                    self.queue.enqueue_upsert(note);
                }
            }
            PushAction::Delete(note_id) => {
                if let Err(e) = self.remote.delete(&note_id).await {
                    warn!("remote delete failed for note {note_id}, queueing: {e}");
                    self.queue.enqueue_delete(note_id);
                }
            }
            PushAction::Batch(note_ids) => {
                let notes: Vec<Note> = note_ids
                    .iter()
                    .filter_map(|id| self.store.note(id))
                    .collect();
                if notes.is_empty() {
                    return;
                }
                if let Err(e) = self.remote.batch_upsert(&notes, &owner).await {
                    // Queue per note, not as one batch entry, so a later
                    // partial failure retries at note granularity.
                    warn!("batch push of {} notes failed, queueing: {e}", notes.len());
                    for note in notes {
                        self.queue.enqueue_upsert(note);
                    }
                }
            }
        }
    }

    /// Handles one command; returns `false` when the engine should stop.
    async fn handle_command(&mut self, command: SyncCommand) -> bool {
        match command {
            SyncCommand::SignedIn { owner_id } => {
                debug!("signed in as {owner_id}");
                let should_reconcile = self.session.begin_sign_in(owner_id.clone());
                if should_reconcile {
                    self.set_status(SyncStatus::Syncing);
                    if let Err(e) = reconcile(&self.store, self.remote.as_ref(), &owner_id).await {
                        // Best effort: keep local notes as the source of
                        // truth; they stay eligible for a future sign-in.
                        warn!("sign-in reconciliation failed: {e}");
                    }
                    if self.session.is_online() {
                        self.queue.drain(&owner_id, self.remote.as_ref()).await;
                    }
                }
                self.set_status(if self.session.is_online() {
                    SyncStatus::Idle
                } else {
                    SyncStatus::Offline
                });
                true
            }
            SyncCommand::SignedOut => {
                info!("signed out — clearing local notes and sync queue");
                self.dispatcher.clear();
                self.store.clear_all();
                self.queue.clear();
                self.session.sign_out();
                self.set_status(SyncStatus::LocalOnly);
                true
            }
            SyncCommand::ConnectivityChanged { online } => {
                self.session.set_online(online);
                if let Some(owner) = self.session.owner().map(str::to_owned) {
                    if online {
                        self.set_status(SyncStatus::Idle);
                        self.queue.drain(&owner, self.remote.as_ref()).await;
                    } else {
                        self.set_status(SyncStatus::Offline);
                    }
                }
                true
            }
            SyncCommand::ForceDrain => {
                if let Some(owner) = self.session.owner().map(str::to_owned) {
                    self.queue.drain(&owner, self.remote.as_ref()).await;
                }
                true
            }
            SyncCommand::DeleteAccountData => {
                if let Some(owner) = self.session.owner().map(str::to_owned) {
                    if let Err(e) = self.remote.delete_all_for_owner(&owner).await {
                        error!("account data deletion failed: {e}");
                    }
                }
                true
            }
            SyncCommand::Stop => {
                info!("sync engine stopping");
                for action in self.dispatcher.drain_all() {
                    self.execute(action).await;
                }
                false
            }
        }
    }

    fn set_status(&self, status: SyncStatus) {
        self.status_tx.send_replace(status);
    }
}
