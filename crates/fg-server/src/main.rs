//! FileGate Server
//!
//! HTTP front end for the FileGate upload layer.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fg_core::config::AppConfig;
use fg_uploads::{upload_middleware, upload_multiple, upload_single, UploadOptions, UploadResult};

mod health;
mod uploads;

use health::HealthChecker;

/// Shared state for all handlers
pub struct AppState {
    pub health: HealthChecker,
    pub config: AppConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging
    init_tracing();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        AppConfig::default()
    });

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.server.host,
        port = config.server.port,
        upload_dir = %config.uploads.destination,
        "Starting FileGate"
    );

    let state = Arc::new(AppState {
        health: HealthChecker::new(&config.uploads.destination),
        config: config.clone(),
    });

    let app = build_router(state)?;

    let addr = config.server_addr();
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "info,fg_server=debug,fg_uploads=debug,tower_http=debug".into()
            }),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

/// Build the application router
fn build_router(state: Arc<AppState>) -> UploadResult<Router> {
    let options = UploadOptions::from(&state.config.uploads);
    let request_limit = state.config.server.max_body_size_bytes as u64;

    let single = upload_single(options.clone())?.with_request_limit(request_limit);
    let mut upload_routes = Router::new()
        .route(
            "/uploads",
            post(uploads::upload_one)
                .route_layer(middleware::from_fn_with_state(single, upload_middleware)),
        )
        .route("/uploads/:filename", delete(uploads::delete_upload));

    if !options.fields.is_empty() {
        let batch = upload_multiple(options)?.with_request_limit(request_limit);
        upload_routes = upload_routes.route(
            "/uploads/batch",
            post(uploads::upload_batch)
                .route_layer(middleware::from_fn_with_state(batch, upload_middleware)),
        );
    }

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness));

    let server = &state.config.server;
    let layers = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(server.max_body_size_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            server.request_timeout_seconds,
        )));

    Ok(Router::new()
        .merge(health_routes)
        .merge(upload_routes)
        .layer(layers)
        .with_state(state))
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
