//! Status ingestion: applies provider status callbacks to stored messages.
//!
//! ## Processing Flow
//!
//! ```text
//! WebhookPayload → messages changes → StatusRecord → StatusEvent → MessageStore
//! ```
//!
//! Each status entry is handled on its own. A store failure on one entry is
//! logged and the remaining entries are still applied; the failure is
//! reported once traversal is complete. Updates already applied are never
//! rolled back.

use tracing::{debug, error, info, warn};

use super::types::{StatusEvent, WebhookPayload};
use crate::store::{MessageStore, StoreError};

/// Errors surfaced by the ingestion handler.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("{failed} status update(s) failed; first failure for message {message_id}: {source}")]
    Store {
        failed: usize,
        message_id: String,
        #[source]
        source: StoreError,
    },
}

impl IngestError {
    /// Machine-readable error code for response bodies.
    pub fn code(&self) -> &'static str {
        match self {
            IngestError::InvalidJson(_) => "invalid_json",
            IngestError::InvalidPayload(_) => "invalid_payload",
            IngestError::Store { .. } => "store_unavailable",
        }
    }
}

/// Result of applying one status event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// A stored message matched and was updated
    Updated,
    /// No stored message has this ID
    Ignored,
}

/// Per-request ingestion counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub updated: usize,
    pub ignored: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Inbound user messages seen alongside statuses
    pub inbound_messages: usize,
}

/// Apply a single status event to the store.
pub async fn apply_status_event(
    store: &dyn MessageStore,
    event: &StatusEvent,
) -> Result<UpdateOutcome, StoreError> {
    let matched = store
        .update_status_by_id(&event.message_id, event.status)
        .await?;

    if matched > 0 {
        info!(
            message_id = %event.message_id,
            status = %event.status,
            timestamp = %event.timestamp,
            "status_update_applied"
        );
        Ok(UpdateOutcome::Updated)
    } else {
        info!(
            message_id = %event.message_id,
            status = %event.status,
            "status_update_ignored_unknown_message"
        );
        Ok(UpdateOutcome::Ignored)
    }
}

/// Walk every `messages` change in the payload and apply its statuses.
pub async fn ingest_statuses(
    store: &dyn MessageStore,
    payload: &WebhookPayload,
) -> Result<IngestSummary, IngestError> {
    let mut summary = IngestSummary::default();
    let mut first_failure: Option<(String, StoreError)> = None;

    for change in payload.message_changes() {
        if !change.value.messages.is_empty() {
            summary.inbound_messages += change.value.messages.len();
            debug!(
                count = change.value.messages.len(),
                "inbound_messages_received"
            );
        }

        for record in &change.value.statuses {
            let event = match record.to_event() {
                Ok(event) => event,
                Err(reason) => {
                    warn!(
                        message_id = ?record.id,
                        status = ?record.status,
                        reason = %reason,
                        "status_entry_skipped"
                    );
                    summary.skipped += 1;
                    continue;
                }
            };

            match apply_status_event(store, &event).await {
                Ok(UpdateOutcome::Updated) => summary.updated += 1,
                Ok(UpdateOutcome::Ignored) => summary.ignored += 1,
                Err(e) => {
                    error!(
                        message_id = %event.message_id,
                        status = %event.status,
                        error = %e,
                        error_detail = ?e,
                        "status_update_failed"
                    );
                    summary.failed += 1;
                    if first_failure.is_none() {
                        first_failure = Some((event.message_id.clone(), e));
                    }
                }
            }
        }
    }

    info!(
        updated = summary.updated,
        ignored = summary.ignored,
        skipped = summary.skipped,
        failed = summary.failed,
        inbound_messages = summary.inbound_messages,
        "status_ingest_complete"
    );

    match first_failure {
        Some((message_id, source)) => Err(IngestError::Store {
            failed: summary.failed,
            message_id,
            source,
        }),
        None => Ok(summary),
    }
}
