//! HTTP handlers: one invocation per request, outcome mapped to status + JSON.

use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use scribe_engine::{EngineError, JobOutcome};

use crate::server::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct TranscribeQuery {
    #[serde(rename = "audioUrl")]
    pub audio_url: Option<String>,
}

/// Invocation failure rendered as `{ "error": ... }`.
#[derive(Debug)]
pub enum ApiError {
    Engine(EngineError),
    /// The invocation outlived the request deadline and was dropped.
    Timeout(Duration),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Engine(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            Self::Engine(e) if e.is_conflict() => StatusCode::CONFLICT,
            Self::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Engine(e) => e.error_kind(),
            Self::Timeout(_) => "timeout",
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Engine(e) => e.to_string(),
            Self::Timeout(limit) => format!("request timed out after {}ms", limit.as_millis()),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        Self::Engine(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.message();
        let kind = self.kind();
        if status.is_server_error() {
            error!(error = %message, kind, status = status.as_u16(), "invocation failed");
        } else {
            warn!(error = %message, kind, status = status.as_u16(), "invocation rejected");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Status code and body for a successful invocation.
pub fn outcome_response(outcome: JobOutcome) -> (StatusCode, Json<serde_json::Value>) {
    match outcome {
        JobOutcome::Created { chunk_count } => {
            (StatusCode::CREATED, Json(json!({ "chunkCount": chunk_count })))
        }
        JobOutcome::Complete { result } => (
            StatusCode::OK,
            Json(json!({ "status": "complete", "result": result })),
        ),
        JobOutcome::Progress {
            status,
            result,
            processed_chunks,
            chunk_count,
        } => (
            StatusCode::OK,
            Json(json!({
                "status": status,
                "result": result,
                "processedChunks": processed_chunks,
                "chunkCount": chunk_count,
            })),
        ),
    }
}

/// `GET /transcribe?audioUrl=...` (also served at `/`).
#[instrument(skip_all, fields(request_id = %Uuid::now_v7()))]
pub async fn transcribe(
    State(state): State<AppState>,
    Query(query): Query<TranscribeQuery>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let raw = query.audio_url.unwrap_or_default();
    let outcome = tokio::time::timeout(state.request_timeout, state.controller.handle(&raw))
        .await
        .map_err(|_| ApiError::Timeout(state.request_timeout))??;
    let (status, body) = outcome_response(outcome);
    info!(status = status.as_u16(), "invocation finished");
    Ok((status, body))
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
