//! `planta serve` -- HTTP JSON API over the coordinator.
//!
//! Security features:
//! - CORS headers on all responses (permissive for local dev)
//! - Per-IP rate limiting (default: 60 req/min, configurable)
//! - Optional API key authentication via `[server] api_key` / PLANTA_API_KEY
//!
//! Endpoints:
//! - GET  /health                       - Server status (exempt from auth)
//! - GET  /checklist                    - Startup checklist items
//! - GET  /shifts                       - Recent shifts, newest first
//! - GET  /shifts/active                - The active shift, if any
//! - POST /shifts                       - Open a shift
//! - POST /shifts/{id}/close            - Close a shift
//! - POST /authorize                    - Dry-run access decision
//! - GET  /equipment                    - Registered equipment
//! - GET  /equipment/{id}/state         - Current power state
//! - POST /equipment/{id}/state         - Record a power state change
//! - GET  /equipment/{id}/history       - State records, newest first
//! - GET  /equipment/{id}/monitoring    - Interval ledger and continuity report
//! - POST /equipment/{id}/monitoring    - Record a monitoring interval
//! - GET  /reconcile/startups           - On records without a checklist
//!
//! Operators are passed in request bodies as `{"operator": {id, name, role}}`.
//! All responses use Content-Type: application/json.

mod equipment;
mod error;
mod handlers;
mod middleware;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{middleware as axum_middleware, Json, Router};
use tower_http::cors::{Any, CorsLayer};

use self::equipment::{
    handle_current_state, handle_history, handle_ledger, handle_list_equipment,
    handle_record_monitoring, handle_set_state,
};
use self::handlers::{
    handle_active_shift, handle_authorize, handle_checklist, handle_close_shift, handle_health,
    handle_list_shifts, handle_not_found, handle_open_shift, handle_reconcile,
};
use self::middleware::{auth_middleware, rate_limit_middleware};
use self::state::{AppState, RateLimiter};
use crate::backend;
use crate::config::PlantaConfig;

/// Maximum request body size: 1 MB.
const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Rate limit window duration in seconds (1 minute).
const RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Construct a JSON error response with the given status code and message.
fn json_error(status: StatusCode, message: &str) -> impl IntoResponse {
    (status, Json(serde_json::json!({"error": message})))
}

/// Build the router over an already-constructed state.
pub(crate) fn router(state: Arc<AppState>) -> Router {
    // CORS: permissive for local dev
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/checklist", get(handle_checklist))
        .route("/shifts", get(handle_list_shifts).post(handle_open_shift))
        .route("/shifts/active", get(handle_active_shift))
        .route("/shifts/{id}/close", post(handle_close_shift))
        .route("/authorize", post(handle_authorize))
        .route("/equipment", get(handle_list_equipment))
        .route(
            "/equipment/{id}/state",
            get(handle_current_state).post(handle_set_state),
        )
        .route("/equipment/{id}/history", get(handle_history))
        .route(
            "/equipment/{id}/monitoring",
            get(handle_ledger).post(handle_record_monitoring),
        )
        .route("/reconcile/startups", get(handle_reconcile))
        .fallback(handle_not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}

/// Start the HTTP server on the given port.
///
/// When TLS cert/key paths are provided, the server listens over HTTPS
/// using `axum-server` with rustls. Otherwise it uses plain HTTP.
pub async fn start_server(
    config: PlantaConfig,
    port: u16,
    _tls_cert: Option<PathBuf>,
    _tls_key: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let coordinator = backend::build_coordinator(&config)?;

    let api_key = config.server.api_key.clone().filter(|k| !k.is_empty());
    if api_key.is_some() {
        tracing::info!("API key authentication enabled");
    }
    tracing::info!(
        rate_limit = config.server.rate_limit,
        "rate limit: requests per minute per IP"
    );

    let state = Arc::new(AppState {
        coordinator,
        rate_limiter: RateLimiter::new(config.server.rate_limit),
        api_key,
    });
    let app = router(state);

    let addr = format!("0.0.0.0:{}", port);

    // TLS support via axum-server + rustls (requires `tls` feature)
    #[cfg(feature = "tls")]
    if let (Some(cert_path), Some(key_path)) = (&_tls_cert, &_tls_key) {
        let tls =
            axum_server::tls_rustls::RustlsConfig::from_pem_file(cert_path, key_path).await?;
        let socket_addr: std::net::SocketAddr = addr.parse()?;
        tracing::info!(%socket_addr, "planta listening on https");
        axum_server::bind_rustls(socket_addr, tls)
            .serve(app.into_make_service_with_connect_info::<std::net::SocketAddr>())
            .await?;
        return Ok(());
    }

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(port, "planta listening on http://0.0.0.0:{}", port);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("server shut down");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received shutdown signal"),
        Err(e) => {
            tracing::error!(error = %e, "could not listen for Ctrl+C; running until killed");
            std::future::pending::<()>().await;
        }
    }
}
