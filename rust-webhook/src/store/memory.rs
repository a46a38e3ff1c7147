//! In-memory message store for tests and local development.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{MessageStore, StoreError, StoreResult};
use crate::webhook::MessageStatus;

/// A stored outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub message_id: String,
    pub status: Option<MessageStatus>,
}

/// Message store backed by a `HashMap`.
///
/// Clones share the same underlying map.
#[derive(Clone, Default)]
pub struct InMemoryMessageStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    messages: RwLock<HashMap<String, StoredMessage>>,
    failing_ids: RwLock<HashSet<String>>,
    update_calls: AtomicU64,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a message record with no status.
    pub async fn insert(&self, message_id: impl Into<String>) {
        let message_id = message_id.into();
        self.inner.messages.write().await.insert(
            message_id.clone(),
            StoredMessage {
                message_id,
                status: None,
            },
        );
    }

    pub async fn get(&self, message_id: &str) -> Option<StoredMessage> {
        self.inner.messages.read().await.get(message_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Make every update for `message_id` fail with [`StoreError::Unavailable`].
    pub async fn fail_updates_for(&self, message_id: impl Into<String>) {
        self.inner.failing_ids.write().await.insert(message_id.into());
    }

    /// Number of update calls received, including failed and unmatched ones.
    pub fn update_calls(&self) -> u64 {
        self.inner.update_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn update_status_by_id(
        &self,
        message_id: &str,
        status: MessageStatus,
    ) -> StoreResult<u64> {
        self.inner.update_calls.fetch_add(1, Ordering::SeqCst);

        if self.inner.failing_ids.read().await.contains(message_id) {
            return Err(StoreError::Unavailable(format!(
                "injected failure for {}",
                message_id
            )));
        }

        let mut messages = self.inner.messages.write().await;
        match messages.get_mut(message_id) {
            Some(message) => {
                message.status = Some(status);
                Ok(1)
            }
            None => Ok(0),
        }
    }
}
