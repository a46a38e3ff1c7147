//! WhatsApp webhook domain logic.
//!
//! - `types`: provider envelope schema and status events
//! - `verify`: subscription handshake
//! - `signature`: `X-Hub-Signature-256` payload verification
//! - `ingest`: applying status events to the message store

pub mod ingest;
pub mod signature;
pub mod types;
pub mod verify;

pub use ingest::{apply_status_event, ingest_statuses, IngestError, IngestSummary, UpdateOutcome};
pub use signature::{
    compute_signature, is_signature_verification_enabled, verify_payload_signature,
    SIGNATURE_HEADER,
};
pub use types::{MessageStatus, SkipReason, StatusEvent, StatusRecord, WebhookPayload};
pub use verify::{
    verify_subscription, VerificationChallenge, VerificationError, VerificationOutcome,
};
