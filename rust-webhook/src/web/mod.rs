//! Web server module.
//!
//! Routes:
//! - `GET /` and `GET /health`
//! - `GET /webhook/whatsapp`: subscription handshake
//! - `POST /webhook/whatsapp`: status callbacks

pub mod handlers;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

pub use handlers::{
    health, receive_webhook, root, verify_webhook, AppState, HealthResponse, MessageResponse,
    WebhookResponse,
};

/// Path of the WhatsApp webhook endpoint.
pub const WHATSAPP_WEBHOOK_PATH: &str = "/webhook/whatsapp";

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route(
            WHATSAPP_WEBHOOK_PATH,
            get(verify_webhook).post(receive_webhook),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
