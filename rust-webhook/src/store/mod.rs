//! Message store abstraction.
//!
//! The webhook never creates message records; it only flips the `status`
//! field on records that already exist. Implementations must apply the
//! conditional update atomically.
//!
//! - [`HttpMessageStore`]: data-API backed store used in production
//! - [`InMemoryMessageStore`]: process-local store for tests and local runs

pub mod http;
pub mod memory;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::config::StoreConfig;
use crate::webhook::MessageStatus;

pub use http::HttpMessageStore;
pub use memory::InMemoryMessageStore;

/// Errors returned by message store backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// `body` is kept for logging and never rendered in `Display`
    #[error("store returned HTTP {status}")]
    Status { status: u16, body: String },

    #[error("failed to decode store response: {0}")]
    Decode(String),

    #[error("invalid store endpoint: {0}")]
    Endpoint(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistent store of previously sent messages.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Set `status` on the message whose provider ID equals `message_id`.
    ///
    /// Returns the number of matched records; `0` means the ID is unknown
    /// and nothing was written.
    async fn update_status_by_id(&self, message_id: &str, status: MessageStatus)
        -> StoreResult<u64>;

    /// Release any held connections. Called once during shutdown.
    async fn close(&self) {}
}

impl fmt::Debug for dyn MessageStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageStore")
    }
}

/// Build the configured store backend.
///
/// Without `url`, an in-memory store is only returned when
/// `in_memory_fallback` is set; otherwise status updates would be dropped.
pub fn from_config(config: &StoreConfig) -> StoreResult<Arc<dyn MessageStore>> {
    if config.url.is_some() {
        return Ok(Arc::new(HttpMessageStore::new(config)?));
    }

    if config.in_memory_fallback {
        warn!("message_store_in_memory_status_updates_not_persisted");
        return Ok(Arc::new(InMemoryMessageStore::new()));
    }

    Err(StoreError::Endpoint(
        "MESSAGE_STORE_URL is not set (set MESSAGE_STORE_IN_MEMORY=true for a non-persistent store)"
            .to_string(),
    ))
}
