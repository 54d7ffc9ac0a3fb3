//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.
//!
//! Wizard operations may block (the high-distress advisory pause, storage
//! I/O), so every one of them runs on the tokio blocking pool while the
//! session's own mutex is held.

use super::{
    AppState,
    sessions::SessionWizard,
    types::{
        CompletedTaskResponse, CountResponse, CreateSessionResponse, ErrorResponse,
        ExportResponse, FinishResponse, HealthResponse, InstrumentResponse,
        QuestionnaireRequest, QuestionnaireResponse, SessionResponse, TaskResponse,
        TranscriptRequest,
    },
};
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use mindtype_core::{
    DemographicsInput, MindtypeError, SaveOutcome, SystemClock, Wizard, export::export_checksum,
};
use uuid::Uuid;

/// Header carrying the session token.
pub const SESSION_HEADER: &str = "x-session-id";

// =============================================================================
// ERROR MAPPING
// =============================================================================

/// Handler failure, rendered as an [`ErrorResponse`].
#[derive(Debug)]
pub enum ApiError {
    /// Missing or malformed session header.
    BadSessionHeader,
    /// No live session under the given token.
    UnknownSession,
    /// Error from the survey engine.
    Core(MindtypeError),
    /// A blocking task panicked or was cancelled.
    Internal(String),
}

impl From<MindtypeError> for ApiError {
    fn from(e: MindtypeError) -> Self {
        ApiError::Core(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadSessionHeader => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("session", "missing or malformed X-Session-Id header"),
            ),
            ApiError::UnknownSession => (
                StatusCode::NOT_FOUND,
                ErrorResponse::new("session", "unknown or expired session"),
            ),
            ApiError::Core(e) => {
                let (status, kind) = match &e {
                    MindtypeError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation"),
                    MindtypeError::TaskIncomplete { .. } => {
                        (StatusCode::BAD_REQUEST, "task_incomplete")
                    }
                    MindtypeError::InvalidTransition { .. } => {
                        (StatusCode::BAD_REQUEST, "invalid_transition")
                    }
                    MindtypeError::Persistence(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "persistence")
                    }
                    MindtypeError::Io(_)
                    | MindtypeError::Serialization(_)
                    | MindtypeError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
                };
                (status, ErrorResponse::new(kind, e.to_string()))
            }
            ApiError::Internal(msg) => {
                tracing::error!("Blocking task failed: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("internal", "internal error"),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

// =============================================================================
// SESSION PLUMBING
// =============================================================================

fn session_id(headers: &HeaderMap) -> Result<Uuid, ApiError> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .ok_or(ApiError::BadSessionHeader)
}

/// Run `op` against the session named in `headers` on the blocking pool.
async fn with_session<T, F>(state: &AppState, headers: &HeaderMap, op: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&mut SessionWizard) -> Result<T, MindtypeError> + Send + 'static,
{
    let id = session_id(headers)?;
    let wizard = state.sessions.get(&id).ok_or(ApiError::UnknownSession)?;

    tokio::task::spawn_blocking(move || {
        let mut wizard = wizard.lock().unwrap_or_else(|e| e.into_inner());
        op(&mut *wizard)
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))?
    .map_err(ApiError::from)
}

// =============================================================================
// HEALTH & INSTRUMENT
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

/// Static instrument content.
pub async fn instrument_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(InstrumentResponse::new(state.settings.wizard.min_age))
}

// =============================================================================
// SESSION LIFECYCLE
// =============================================================================

/// Create a session at Consent.
pub async fn create_session_handler(State(state): State<AppState>) -> impl IntoResponse {
    let wizard = Wizard::new(SystemClock, state.settings.wizard);
    let participant_id = wizard.session().participant_id().to_string();
    let stage = wizard.stage();
    let id = state.sessions.create(wizard);

    tracing::info!(session = %id, participant = %participant_id, "Session created");

    (
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: id.to_string(),
            participant_id,
            stage,
        }),
    )
}

/// Current stage, progress and live readout.
pub async fn session_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SessionResponse>, ApiError> {
    let response = with_session(&state, &headers, |wizard| {
        Ok(SessionResponse::from_wizard(wizard))
    })
    .await?;
    Ok(Json(response))
}

/// Close a session; its token becomes unknown.
pub async fn close_session_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let id = session_id(&headers)?;
    with_session(&state, &headers, |wizard| {
        wizard.close();
        Ok(())
    })
    .await?;
    state.sessions.remove(&id);
    tracing::info!(session = %id, "Session closed");
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// STAGE TRANSITIONS
// =============================================================================

/// Consent gate.
pub async fn consent_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<DemographicsInput>,
) -> Result<Json<SessionResponse>, ApiError> {
    let response = with_session(&state, &headers, move |wizard| {
        wizard.submit_consent(input)?;
        Ok(SessionResponse::from_wizard(wizard))
    })
    .await?;
    Ok(Json(response))
}

/// Questionnaire gate. Holds the response for the advisory pause when the
/// total is in the high-distress range.
pub async fn questionnaire_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<QuestionnaireRequest>,
) -> Result<Json<QuestionnaireResponse>, ApiError> {
    let pause_ms = u64::try_from(state.settings.wizard.advisory_pause.as_millis()).unwrap_or(0);
    let response = with_session(&state, &headers, move |wizard| {
        let outcome = wizard.submit_questionnaire(&request.answers)?;
        Ok(QuestionnaireResponse::new(outcome, pause_ms, wizard.stage()))
    })
    .await?;

    if response.advisory.is_some() {
        tracing::info!("High-distress advisory shown");
    }
    Ok(Json(response))
}

/// Start the typing task of the current stage.
pub async fn start_task_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<TaskResponse>, ApiError> {
    let response = with_session(&state, &headers, |wizard| {
        let task = wizard.start_task()?;
        Ok(TaskResponse {
            task,
            stage: wizard.stage(),
            readout: wizard.live_readout()?,
        })
    })
    .await?;
    Ok(Json(response))
}

/// Replace the live transcript.
pub async fn transcript_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<TranscriptRequest>,
) -> Result<Json<TaskResponse>, ApiError> {
    let response = with_session(&state, &headers, move |wizard| {
        wizard.update_transcript(&request.text)?;
        let task = wizard
            .stage()
            .task_kind()
            .ok_or_else(|| MindtypeError::Validation("no task in progress".to_string()))?;
        Ok(TaskResponse {
            task,
            stage: wizard.stage(),
            readout: wizard.live_readout()?,
        })
    })
    .await?;
    Ok(Json(response))
}

/// Finalize the started task.
pub async fn complete_task_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CompletedTaskResponse>, ApiError> {
    let response = with_session(&state, &headers, |wizard| {
        let task = wizard.complete_task()?.clone();
        Ok(CompletedTaskResponse::new(&task, wizard.stage()))
    })
    .await?;
    Ok(Json(response))
}

/// Persist the completed session. Idempotent: later calls return the
/// remembered outcome.
pub async fn finish_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<FinishResponse>, ApiError> {
    let store = state.store.clone();
    let outcome = with_session(&state, &headers, move |wizard| wizard.finish(store.as_ref())).await?;

    match &outcome {
        SaveOutcome::Saved { backend } => tracing::info!(backend = %backend, "Record saved"),
        SaveOutcome::Journaled { reason } => {
            tracing::warn!(reason = %reason, "Primary backend failed, record journaled");
        }
        SaveOutcome::Failed { reason } => tracing::error!(reason = %reason, "Record not saved"),
    }
    Ok(Json(FinishResponse::from(outcome)))
}

// =============================================================================
// ADMIN
// =============================================================================

/// Number of stored records.
pub async fn admin_count_handler(
    State(state): State<AppState>,
) -> Result<Json<CountResponse>, ApiError> {
    let store = state.store.clone();
    let backend = store.name().to_string();
    let count = tokio::task::spawn_blocking(move || store.count())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;
    Ok(Json(CountResponse {
        success: true,
        backend,
        count,
    }))
}

/// Full table as base64 CSV plus its BLAKE3 checksum.
pub async fn admin_export_handler(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.store.clone();
    match tokio::task::spawn_blocking(move || store.export()).await {
        Ok(Ok(data)) => {
            let checksum = export_checksum(&data);
            tracing::info!(bytes = data.len(), checksum = %checksum, "Export served");
            (
                StatusCode::OK,
                Json(ExportResponse::success(&data, checksum)),
            )
        }
        Ok(Err(e)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ExportResponse::error(format!("Export failed: {}", e))),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ExportResponse::error(format!("Export task failed: {}", e))),
        ),
    }
}
