//! Offline-first sync engine for Corkboard.
//!
//! Local state is the source of truth; the remote store is a lagging,
//! eventually-consistent replica. The pieces:
//!
//! - [`api_client`] — fail-fast HTTP client for the remote notes table;
//!   the sole translation boundary between local and wire shapes.
//! - [`queue`] — durable retry queue for failed pushes, replayed on
//!   reconnect or sign-in.
//! - [`dispatcher`] — per-note debounce/coalesce policy deciding when a
//!   mutation is pushed.
//! - [`session`] — sign-in tracking and the one-time merge of local notes
//!   with a newly authenticated owner's remote set.
//! - [`engine`] — the event loop tying the above together.

pub mod api_client;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod queue;
pub mod session;

pub use api_client::{NotesApiClient, NotesRemote};
pub use config::SyncConfig;
pub use engine::{create_sync_engine, SyncCommand, SyncEngine, SyncHandle, SyncStatus};
pub use error::{SyncError, SyncResult};
pub use queue::{QueueEntry, QueueKind, SyncQueue};
