//! # Mindtype HTTP API Module
//!
//! This module implements the JSON API the survey front end talks to, using
//! axum.
//!
//! ## Participant Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /instrument` - PHQ-9 items, copy text and writing prompt
//! - `POST /sessions` - Create a session (returns the session token)
//! - `GET /session` - Stage, progress and live readout
//! - `POST /session/consent` - Demographics and consent
//! - `POST /session/questionnaire` - PHQ-9 answers
//! - `POST /session/task/start` - Start the current typing task
//! - `PUT /session/task/transcript` - Replace the live transcript
//! - `POST /session/task/complete` - Finalize the current typing task
//! - `POST /session/finish` - Persist the record (idempotent)
//! - `DELETE /session` - Close the session
//!
//! Session routes take the token in the `X-Session-Id` header.
//!
//! ## Admin Endpoints
//!
//! - `GET /admin/count` - Number of stored records
//! - `GET /admin/export` - Base64 CSV export with BLAKE3 checksum
//!
//! Admin routes require `Authorization: Bearer <admin secret>` and have
//! their own per-minute rate limit.

mod auth;
mod handlers;
mod middleware;
mod sessions;
mod types;

// Re-exports for external use
pub use auth::{hash_secret, verify_secret};
pub use handlers::{ApiError, SESSION_HEADER};
pub use middleware::{create_admin_rate_limiter, create_rate_limiter};
pub use sessions::{SessionRegistry, SessionWizard};
pub use types::{
    AdvisoryJson, CompletedTaskResponse, CountResponse, CreateSessionResponse, ErrorResponse,
    ExportResponse, FinishResponse, HealthResponse, InstrumentResponse, OptionJson,
    QuestionnaireRequest, QuestionnaireResponse, SessionResponse, TaskResponse,
    TranscriptRequest,
};

use crate::config::Config;
use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post, put},
};
use mindtype_core::{MindtypeError, RecordStore, WizardConfig};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 256 * 1024;

/// How often idle sessions are swept.
const EVICTION_INTERVAL: Duration = Duration::from_secs(60);

// =============================================================================
// SERVER STATE
// =============================================================================

/// Server settings derived from the configuration.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub wizard: WizardConfig,
    /// Lowercase BLAKE3 hex digest of the admin secret.
    pub admin_secret_hash: Option<String>,
    /// Requests per second over all routes (0 disables).
    pub rate_limit: u32,
    /// Requests per minute over admin routes.
    pub admin_rate_limit: u32,
    pub cors_origins: Option<String>,
}

impl ApiSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            wizard: config.wizard_config(),
            admin_secret_hash: config
                .server
                .admin_secret_hash
                .as_ref()
                .map(|h| h.trim().to_ascii_lowercase()),
            rate_limit: config.server.rate_limit,
            admin_rate_limit: config.server.admin_rate_limit,
            cors_origins: config.server.cors_origins.clone(),
        }
    }
}

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionRegistry,
    pub store: Arc<dyn RecordStore>,
    pub settings: Arc<ApiSettings>,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, settings: ApiSettings, session_ttl: Duration) -> Self {
        Self {
            sessions: SessionRegistry::new(session_ttl),
            store,
            settings: Arc::new(settings),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

fn session_header() -> HeaderName {
    HeaderName::from_static(SESSION_HEADER)
}

/// Build the CORS layer from `server.cors_origins`.
///
/// - `"*"`: allows all origins
/// - unset: localhost only
/// - otherwise: comma-separated list of allowed origins
fn build_cors_layer(origins: Option<&str>) -> CorsLayer {
    match origins {
        Some("*") => {
            tracing::warn!("CORS: Allowing ALL origins. This is insecure for production!");
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!("CORS: No valid origins configured, defaulting to localhost only");
                build_localhost_cors()
            } else {
                restricted_cors(allowed_origins)
            }
        }
        None => {
            tracing::info!("CORS: No origins configured, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();
    restricted_cors(origins)
}

fn restricted_cors(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, session_header()])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Rate Limiting - all routes (if enabled)
/// 4. Admin rate limiting and authentication - admin routes only
pub fn create_router(state: AppState) -> Router {
    let settings = Arc::clone(&state.settings);
    let cors = build_cors_layer(settings.cors_origins.as_deref());

    if settings.admin_secret_hash.is_some() {
        tracing::info!("Admin authentication enabled");
    } else {
        tracing::warn!(
            "Admin routes DISABLED - no admin secret hash configured. \
             Run `mindtype hash-secret` and set MINDTYPE_ADMIN_SECRET_HASH to enable them."
        );
    }

    let participant = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/instrument", get(handlers::instrument_handler))
        .route("/sessions", post(handlers::create_session_handler))
        .route(
            "/session",
            get(handlers::session_handler).delete(handlers::close_session_handler),
        )
        .route("/session/consent", post(handlers::consent_handler))
        .route("/session/questionnaire", post(handlers::questionnaire_handler))
        .route("/session/task/start", post(handlers::start_task_handler))
        .route("/session/task/transcript", put(handlers::transcript_handler))
        .route("/session/task/complete", post(handlers::complete_task_handler))
        .route("/session/finish", post(handlers::finish_handler));

    let admin = Router::new()
        .route("/admin/count", get(handlers::admin_count_handler))
        .route("/admin/export", get(handlers::admin_export_handler))
        .layer(axum_middleware::from_fn_with_state(
            Arc::clone(&settings),
            auth::admin_auth_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            create_admin_rate_limiter(settings.admin_rate_limit),
            middleware::rate_limit_middleware,
        ));

    let mut router = participant.merge(admin);

    if settings.rate_limit > 0 {
        tracing::info!(
            "Rate limiting enabled: {} requests/second",
            settings.rate_limit
        );
        router = router.layer(axum_middleware::from_fn_with_state(
            create_rate_limiter(settings.rate_limit),
            middleware::rate_limit_middleware,
        ));
    } else {
        tracing::info!("Rate limiting disabled");
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server.
pub async fn run_server(addr: &str, state: AppState) -> Result<(), MindtypeError> {
    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(EVICTION_INTERVAL);
        loop {
            ticker.tick().await;
            let evicted = sessions.evict_expired();
            if evicted > 0 {
                tracing::info!(evicted, live = sessions.len(), "Evicted idle sessions");
            }
        }
    });

    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| MindtypeError::Io(format!("Bind failed: {}", e)))?;

    tracing::info!("Mindtype HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| MindtypeError::Io(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
