//! Chat endpoint: query in, reply text + audio (+ lip-sync) out

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use uuid::Uuid;

use super::ApiState;
use crate::pipeline::{ChatOutcome, PipelineError, Query};

/// Build chat router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .with_state(state)
}

/// Chat request
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub query: Option<String>,
}

/// Chat response
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response_text: String,
    /// Audio bytes as lowercase hex
    pub audio_data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lip_sync_data: Option<String>,
}

impl From<ChatOutcome> for ChatResponse {
    fn from(outcome: ChatOutcome) -> Self {
        Self {
            response_text: outcome.response_text,
            audio_data: hex::encode(&outcome.audio),
            lip_sync_data: outcome.lip_sync,
        }
    }
}

/// Run the pipeline for one query inside a per-request span
async fn chat(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ChatError> {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("chat", %request_id);
    handle_chat(&state, payload).instrument(span).await
}

/// Malformed bodies, a missing `query` and an empty query are all rejected
/// before any upstream call.
async fn handle_chat(
    state: &ApiState,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ChatError> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "rejected chat body");
            return Err(ChatError::NoQuery);
        }
    };
    let query = request.query.and_then(Query::new).ok_or(ChatError::NoQuery)?;

    let started = Instant::now();
    let outcome = state.pipeline.run(&query).await?;

    tracing::info!(
        elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        audio_bytes = outcome.audio.len(),
        lip_sync = outcome.lip_sync.is_some(),
        "chat complete"
    );

    Ok(Json(ChatResponse::from(outcome)))
}

/// Chat API errors
#[derive(Debug)]
pub enum ChatError {
    NoQuery,
    Pipeline(PipelineError),
}

impl From<PipelineError> for ChatError {
    fn from(e: PipelineError) -> Self {
        Self::Pipeline(e)
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
            code: &'static str,
        }

        let (status, error, code) = match self {
            Self::NoQuery => (StatusCode::BAD_REQUEST, "No query provided", "bad_request"),
            Self::Pipeline(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                e.stage.message(),
                e.stage.code(),
            ),
        };

        (status, Json(ErrorResponse { error, code })).into_response()
    }
}
