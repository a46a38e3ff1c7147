//! StatusHook - WhatsApp delivery-status webhook.
//!
//! Receives WhatsApp Cloud API webhooks, answers the subscription handshake,
//! and relays message status changes (sent, delivered, read, failed) into a
//! message store.
//!
//! ## Architecture
//!
//! ```text
//! WhatsApp → Web Server → ingest_statuses() → MessageStore (updateOne by message_id)
//! ```

pub mod config;
pub mod store;
pub mod web;
pub mod webhook;

// Re-export commonly used types
pub use config::{Config, StoreConfig};
pub use store::{HttpMessageStore, InMemoryMessageStore, MessageStore, StoreError};
pub use web::{router, AppState};
pub use webhook::{ingest_statuses, verify_subscription, MessageStatus, WebhookPayload};
