//! Durable local persistence for Corkboard.
//!
//! Two layers:
//!
//! - [`KvStore`] — a SQLite-backed key-value store holding a handful of
//!   independently keyed JSON documents (notes, viewport, settings, sync
//!   queue), the durable stand-in for browser-local storage.
//! - [`BoardStore`] — the authoritative in-process note collection with a
//!   narrow mutation API, synchronous write-through persistence, and sync
//!   intents emitted toward the engine.

mod board_store;
mod error;
mod kv_store;
pub mod layout;

pub use board_store::BoardStore;
pub use error::{StorageError, StorageResult};
pub use kv_store::{keys, KvStore};
