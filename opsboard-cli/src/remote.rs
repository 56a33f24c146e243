//! The transport seam between the client cache and the server.

use async_trait::async_trait;
use thiserror::Error;

use opsboard_core::{FieldMap, Item};

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("request timed out")]
    Timeout,

    #[error("item not found on server")]
    NotFound,

    #[error("version conflict")]
    Conflict,

    /// The server refused the request itself (4xx); resending the same
    /// request cannot succeed.
    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("server error: {0}")]
    Server(String),
}

impl RemoteError {
    /// Whether retrying the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RemoteError::Transport(_) | RemoteError::Timeout | RemoteError::Server(_)
        )
    }
}


pub type RemoteResult<T> = Result<T, RemoteError>;

/// One server-side collection, as seen by the sync coordinator.
///
/// Implemented by the reqwest-backed [`HttpCollection`](crate::client::HttpCollection)
/// and by an in-memory mock in coordinator tests.
#[async_trait]
pub trait RemoteCollection {
    /// Full contents plus the current version token.
    async fn fetch_all(&self) -> RemoteResult<(u64, Vec<Item>)>;

    /// Append one item; the server assigns the id and returns the stored item.
    async fn append(&self, fields: FieldMap) -> RemoteResult<Item>;

    /// Merge fields into an existing item.
    async fn update_fields(&self, id: &str, fields: FieldMap) -> RemoteResult<Item>;

    /// Remove an item by id.
    async fn remove(&self, id: &str) -> RemoteResult<()>;

    /// Replace the whole collection, guarded by the version token.
    /// Returns the new version.
    async fn replace_all(&self, version: u64, items: Vec<Item>) -> RemoteResult<u64>;
}
