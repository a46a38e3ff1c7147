//! StatusHook Web Server - WhatsApp status webhook receiver.
//!
//! This binary:
//! - Answers the WhatsApp subscription handshake
//! - Receives status callbacks and applies them to the message store
//! - Closes the store connection on shutdown

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use statushook::config::DEFAULT_VERIFY_TOKEN;
use statushook::webhook::is_signature_verification_enabled;
use statushook::{router, store, AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("web_server_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        port = config.port,
        app_secret_configured = is_signature_verification_enabled(&config.app_secret),
        store_url_set = config.store.url.is_some(),
        store_in_memory_fallback = config.store.in_memory_fallback,
        store_database = %config.store.database,
        store_collection = %config.store.collection,
        "config_loaded"
    );

    if config.verify_token == DEFAULT_VERIFY_TOKEN {
        warn!("verify_token_default_in_use");
    }
    if !is_signature_verification_enabled(&config.app_secret) {
        warn!("payload_signature_verification_disabled");
    }

    // Create the message store
    let store = store::from_config(&config.store).context("Failed to create message store")?;

    let port = config.port;
    let state = AppState::new(config, store.clone());
    let app = router(state);

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    store.close().await;

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "ctrl_c_handler_install_failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "sigterm_handler_install_failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");
}
