//! Sync configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the sync engine and remote client.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Base URL for the Corkboard API (e.g., "https://api.corkboard.app").
    pub api_base_url: String,

    /// Debounce window for content edits, in milliseconds. Rapid edits to
    /// the same note within the window collapse into one push.
    pub debounce_ms: u64,

    /// Rows per batch-upsert request (keeps payloads under the request
    /// size limit).
    pub batch_size: usize,

    /// HTTP request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.corkboard.app".to_string(),
            debounce_ms: 500,
            batch_size: 50,
            request_timeout_secs: 30,
        }
    }
}
