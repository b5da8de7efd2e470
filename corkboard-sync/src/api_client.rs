//! HTTP client for the remote notes table.
//!
//! The one translation boundary between the local note shape (epoch-millis
//! timestamps) and the remote row shape (snake_case columns, ISO-8601
//! timestamps, owner-id scoping). Fail-fast by design: no retries or
//! backoff here — resilience lives in the sync queue.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use corkboard_types::{Note, NoteColor};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// The remote note-store seam. Implemented over HTTP by
/// [`NotesApiClient`]; tests script failures through in-memory fakes.
#[async_trait]
pub trait NotesRemote: Send + Sync {
    /// Every note owned by `owner_id`, ordered by creation time ascending.
    async fn fetch_all(&self, owner_id: &str) -> SyncResult<Vec<Note>>;

    /// Insert-or-replace by note id.
    async fn upsert(&self, note: &Note, owner_id: &str) -> SyncResult<()>;

    /// Remove by note id.
    async fn delete(&self, note_id: &str) -> SyncResult<()>;

    /// Upsert many notes, chunked to respect payload limits. The first
    /// failing chunk aborts the rest; upsert is idempotent, so partial
    /// application is safe to retry.
    async fn batch_upsert(&self, notes: &[Note], owner_id: &str) -> SyncResult<()>;

    /// Bulk remove of an owner's whole row set (account deletion only).
    async fn delete_all_for_owner(&self, owner_id: &str) -> SyncResult<()>;
}

// ── Wire shape ──

/// Remote row shape for a note.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NoteRow {
    pub id: String,
    pub owner_id: String,
    pub content: String,
    pub color: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub pinned: bool,
    pub archived: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NoteRow {
    pub fn from_note(note: &Note, owner_id: &str) -> Self {
        Self {
            id: note.id.clone(),
            owner_id: owner_id.to_owned(),
            content: note.content.clone(),
            color: note.color.as_str().to_owned(),
            x: note.x,
            y: note.y,
            width: note.width,
            height: note.height,
            pinned: note.pinned,
            archived: note.archived,
            archived_at: note.archived_at.and_then(millis_to_datetime),
            created_at: millis_to_datetime(note.created_at).unwrap_or(DateTime::UNIX_EPOCH),
            updated_at: millis_to_datetime(note.updated_at).unwrap_or(DateTime::UNIX_EPOCH),
        }
    }

    pub fn into_note(self) -> Note {
        Note {
            id: self.id,
            content: self.content,
            // Unknown tags degrade to the default instead of failing the
            // whole fetch.
            color: NoteColor::parse(&self.color).unwrap_or_default(),
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
            pinned: self.pinned,
            archived: self.archived,
            archived_at: self.archived_at.map(|dt| dt.timestamp_millis()),
            created_at: self.created_at.timestamp_millis(),
            updated_at: self.updated_at.timestamp_millis(),
        }
    }
}

fn millis_to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

// ── HTTP client ──

struct AuthState {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
}

/// HTTP client for the Corkboard API.
pub struct NotesApiClient {
    client: Client,
    config: SyncConfig,
    auth: Arc<RwLock<AuthState>>,
    /// Serializes refresh operations so concurrent 401s don't race the
    /// server-side token rotation.
    refresh_lock: Arc<tokio::sync::Mutex<()>>,
}

impl NotesApiClient {
    pub fn new(config: SyncConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            config,
            auth: Arc::new(RwLock::new(AuthState {
                access_token: None,
                refresh_token: None,
            })),
            refresh_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Sets auth tokens handed over by the identity provider (sign-in or
    /// restored session).
    pub async fn set_tokens(&self, access_token: String, refresh_token: String) {
        let mut auth = self.auth.write().await;
        auth.access_token = Some(access_token);
        auth.refresh_token = Some(refresh_token);
    }

    pub async fn is_authenticated(&self) -> bool {
        self.auth.read().await.access_token.is_some()
    }

    /// Drops the session tokens (sign-out).
    pub async fn clear_tokens(&self) {
        let mut auth = self.auth.write().await;
        auth.access_token = None;
        auth.refresh_token = None;
    }

    async fn refresh_access_token(&self) -> SyncResult<String> {
        // Only one HTTP refresh at a time; a waiter re-reads the tokens in
        // case the earlier refresh already replaced them.
        let _guard = self.refresh_lock.lock().await;

        let refresh_token = {
            let auth = self.auth.read().await;
            auth.refresh_token.clone().ok_or(SyncError::AuthRequired)?
        };

        let url = format!("{}/api/auth/refresh", self.config.api_base_url);
        let resp = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED
            || resp.status() == reqwest::StatusCode::FORBIDDEN
        {
            // Refresh token expired or revoked — clear the stale session.
            self.clear_tokens().await;
            return Err(SyncError::AuthFailed(
                "token refresh failed: session expired, re-authentication required".to_string(),
            ));
        }

        let resp: TokenResponse = resp
            .error_for_status()
            .map_err(|e| SyncError::AuthFailed(format!("token refresh failed: {e}")))?
            .json()
            .await?;

        let mut auth = self.auth.write().await;
        auth.access_token = Some(resp.access_token.clone());
        auth.refresh_token = Some(resp.refresh_token);

        Ok(resp.access_token)
    }

    async fn get_token(&self) -> SyncResult<String> {
        self.auth
            .read()
            .await
            .access_token
            .clone()
            .ok_or(SyncError::AuthRequired)
    }

    /// Makes an authenticated GET request, retrying once on 401.
    async fn auth_get(&self, path: &str) -> SyncResult<reqwest::Response> {
        let url = format!("{}{}", self.config.api_base_url, path);
        let token = self.get_token().await?;

        let resp = self.client.get(&url).bearer_auth(&token).send().await?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            debug!("401 on GET {path}, refreshing token");
            let new_token = self.refresh_access_token().await?;
            return Ok(self.client.get(&url).bearer_auth(&new_token).send().await?);
        }

        Ok(resp)
    }

    /// Makes an authenticated POST request, retrying once on 401.
    async fn auth_post(&self, path: &str, body: &impl Serialize) -> SyncResult<reqwest::Response> {
        let url = format!("{}{}", self.config.api_base_url, path);
        let token = self.get_token().await?;

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .json(body)
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            debug!("401 on POST {path}, refreshing token");
            let new_token = self.refresh_access_token().await?;
            return Ok(self
                .client
                .post(&url)
                .bearer_auth(&new_token)
                .json(body)
                .send()
                .await?);
        }

        Ok(resp)
    }

    /// Makes an authenticated DELETE request, retrying once on 401.
    async fn auth_delete(&self, path: &str) -> SyncResult<reqwest::Response> {
        let url = format!("{}{}", self.config.api_base_url, path);
        let token = self.get_token().await?;

        let resp = self.client.delete(&url).bearer_auth(&token).send().await?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            debug!("401 on DELETE {path}, refreshing token");
            let new_token = self.refresh_access_token().await?;
            return Ok(self
                .client
                .delete(&url)
                .bearer_auth(&new_token)
                .send()
                .await?);
        }

        Ok(resp)
    }
}

#[async_trait]
impl NotesRemote for NotesApiClient {
    async fn fetch_all(&self, owner_id: &str) -> SyncResult<Vec<Note>> {
        let resp = self
            .auth_get(&format!("/api/notes?owner_id={owner_id}"))
            .await?
            .error_for_status()
            .map_err(|e| SyncError::Api(e.to_string()))?;

        #[derive(Deserialize)]
        struct Resp {
            notes: Vec<NoteRow>,
        }
        let data: Resp = resp.json().await?;
        Ok(data.notes.into_iter().map(NoteRow::into_note).collect())
    }

    async fn upsert(&self, note: &Note, owner_id: &str) -> SyncResult<()> {
        self.auth_post("/api/notes/upsert", &NoteRow::from_note(note, owner_id))
            .await?
            .error_for_status()
            .map_err(|e| SyncError::Api(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, note_id: &str) -> SyncResult<()> {
        self.auth_delete(&format!("/api/notes/{note_id}"))
            .await?
            .error_for_status()
            .map_err(|e| SyncError::Api(e.to_string()))?;
        Ok(())
    }

    async fn batch_upsert(&self, notes: &[Note], owner_id: &str) -> SyncResult<()> {
        if notes.is_empty() {
            return Ok(());
        }
        for chunk in notes.chunks(self.config.batch_size.max(1)) {
            let rows: Vec<NoteRow> = chunk.iter().map(|n| NoteRow::from_note(n, owner_id)).collect();
            self.auth_post(
                "/api/notes/batch-upsert",
                &serde_json::json!({ "notes": rows }),
            )
            .await?
            .error_for_status()
            .map_err(|e| SyncError::Api(e.to_string()))?;
        }
        Ok(())
    }

    async fn delete_all_for_owner(&self, owner_id: &str) -> SyncResult<()> {
        self.auth_delete(&format!("/api/notes/owner/{owner_id}"))
            .await?
            .error_for_status()
            .map_err(|e| SyncError::Api(e.to_string()))?;
        Ok(())
    }
}
