//! Remote persistence: the row-oriented CRUD service behind the stores

pub mod memory;
pub mod supabase;

pub use memory::MemoryRemote;
pub use supabase::SupabaseClient;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

/// Table holding shopping items
pub const ITEMS_TABLE: &str = "shopping_items";
/// Table holding folders
pub const FOLDERS_TABLE: &str = "folders";

/// Row-level access to a remote table.
///
/// Rows travel as JSON objects; typed decoding is the caller's concern.
/// Every row carries `id`, `user_id`, `created_at` and `updated_at`.
#[async_trait]
pub trait RemoteTable: Send + Sync {
    /// All rows owned by `user_id`, newest `created_at` first
    async fn select_owned(&self, table: &str, user_id: Uuid) -> Result<Vec<Value>, RemoteError>;

    /// Insert one row; returns it with server-assigned id, timestamps and defaults
    async fn insert(&self, table: &str, row: Value) -> Result<Value, RemoteError>;

    /// Merge `patch` into the row with `id`; returns the updated row
    async fn update(&self, table: &str, id: Uuid, patch: Value) -> Result<Value, RemoteError>;

    /// Delete the row with `id`
    async fn delete(&self, table: &str, id: Uuid) -> Result<(), RemoteError>;
}

/// Remote service errors
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(reqwest::Error),

    #[error("Failed to decode row: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("No row in {table} with id {id}")]
    NotFound { table: String, id: Uuid },

    #[error("No row returned from insert")]
    NoRowReturned,
}

/// Coarse classification of a [`RemoteError`].
///
/// Informational only: every kind is surfaced once and never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request never got a response
    Transport,
    /// The server answered and refused the request
    Rejected,
    /// The targeted row does not exist (or is not visible to this user)
    NotFound,
    /// The server answered with something that could not be decoded
    Malformed,
}

impl RemoteError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Request(_) | Self::Transport(_) => ErrorKind::Transport,
            Self::Api { status: 404, .. } | Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Api { .. } => ErrorKind::Rejected,
            Self::Parse(_) | Self::Decode(_) | Self::NoRowReturned => ErrorKind::Malformed,
        }
    }

    pub(crate) fn not_found(table: &str, id: Uuid) -> Self {
        Self::NotFound {
            table: table.to_string(),
            id,
        }
    }
}
