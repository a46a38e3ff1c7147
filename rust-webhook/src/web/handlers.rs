//! HTTP endpoint handlers.
//!
//! Both webhook handlers always answer with a JSON body. Verification
//! mismatches and ingestion failures are reported in the payload with a
//! 200 status, which is what the provider expects to see.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::store::MessageStore;
use crate::webhook::{
    ingest_statuses, is_signature_verification_enabled, verify_payload_signature,
    verify_subscription, IngestError, VerificationChallenge, VerificationError,
    VerificationOutcome, WebhookPayload, SIGNATURE_HEADER,
};
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn MessageStore>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn MessageStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }
}

// =============================================================================
// Root & Health
// =============================================================================

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Root endpoint, useful for smoke-testing a deployment.
pub async fn root() -> Json<MessageResponse> {
    info!("root_accessed");
    Json(MessageResponse {
        message: "Hello World",
    })
}

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

// =============================================================================
// Webhook Response
// =============================================================================

/// Body returned by the webhook endpoints.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

impl WebhookResponse {
    pub fn success() -> Self {
        Self {
            status: "success",
            message: None,
            error: None,
        }
    }

    pub fn unauthorized() -> Self {
        Self {
            status: "unauthorized",
            message: None,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            message: Some(message.into()),
            error: None,
        }
    }

    fn from_ingest_error(err: &IngestError) -> Self {
        Self {
            status: "error",
            message: Some(err.to_string()),
            error: Some(err.code()),
        }
    }
}

// =============================================================================
// WhatsApp Webhook Verification
// =============================================================================

/// Subscription handshake endpoint.
///
/// Query parameters are taken as raw pairs so a repeated key resolves to its
/// last value instead of rejecting the request.
///
/// Responds with:
/// - the challenge as a JSON number when mode and token match
/// - `"OK"` when they match but no challenge was sent
/// - `{"status":"error","message":"Invalid verification token"}` (200) otherwise
/// - 400 when the challenge is not an integer
pub async fn verify_webhook(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let params = VerificationChallenge::from_pairs(pairs);

    match verify_subscription(&params, &state.config.verify_token) {
        Ok(VerificationOutcome::Challenge(digits)) => (
            [(header::CONTENT_TYPE, "application/json")],
            digits,
        )
            .into_response(),
        Ok(VerificationOutcome::Acknowledged) => Json("OK").into_response(),
        Err(e @ VerificationError::InvalidToken) => {
            (StatusCode::OK, Json(WebhookResponse::error(e.to_string()))).into_response()
        }
        Err(e @ VerificationError::InvalidChallenge(_)) => {
            (StatusCode::BAD_REQUEST, Json(WebhookResponse::error(e.to_string()))).into_response()
        }
    }
}

// =============================================================================
// WhatsApp Status Callbacks
// =============================================================================

/// Status callback endpoint.
///
/// This endpoint:
/// 1. Verifies `X-Hub-Signature-256` (if an app secret is configured)
/// 2. Parses the provider envelope
/// 3. Applies every status entry to the message store
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<WebhookResponse>) {
    info!(body_length = body.len(), "whatsapp_webhook_received");
    debug!(payload = %String::from_utf8_lossy(&body), "whatsapp_webhook_payload");

    if is_signature_verification_enabled(&state.config.app_secret) {
        let app_secret = state.config.app_secret.as_deref().unwrap_or_default();
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok());

        if !verify_payload_signature(app_secret, &body, signature) {
            warn!(has_signature = signature.is_some(), "whatsapp_signature_invalid");
            return (StatusCode::UNAUTHORIZED, Json(WebhookResponse::unauthorized()));
        }
    }

    let result = match WebhookPayload::from_slice(&body) {
        Ok(payload) => ingest_statuses(state.store.as_ref(), &payload).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(_) => (StatusCode::OK, Json(WebhookResponse::success())),
        Err(e) => {
            error!(
                error = %e,
                error_detail = ?e,
                error_code = e.code(),
                "whatsapp_webhook_processing_failed"
            );
            (StatusCode::OK, Json(WebhookResponse::from_ingest_error(&e)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_root() {
        let Json(body) = root().await;
        assert_eq!(body.message, "Hello World");
    }

    #[tokio::test]
    async fn test_health() {
        let Json(body) = health().await;
        assert_eq!(body.status, "healthy");
    }

    #[test]
    fn test_success_response_serialization() {
        let json = serde_json::to_value(WebhookResponse::success()).unwrap();
        assert_eq!(json, serde_json::json!({"status": "success"}));
    }

    #[test]
    fn test_error_response_serialization() {
        let json = serde_json::to_value(WebhookResponse::error("Invalid verification token")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": "error", "message": "Invalid verification token"})
        );
    }

    #[test]
    fn test_ingest_error_response_carries_code() {
        let err = IngestError::InvalidPayload("expected a JSON object, got array".to_string());
        let json = serde_json::to_value(WebhookResponse::from_ingest_error(&err)).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"], "invalid_payload");
        assert_eq!(
            json["message"],
            "invalid payload: expected a JSON object, got array"
        );
    }
}
