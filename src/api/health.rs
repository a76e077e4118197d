//! Health check endpoints

use std::path::Path;
use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;

use super::ApiState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Detailed readiness response
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub checks: ReadinessChecks,
}

/// Individual readiness checks
#[derive(Serialize)]
pub struct ReadinessChecks {
    pub transcoder: CheckResult,
    pub lip_sync: CheckResult,
}

/// Result of a single health check
#[derive(Serialize)]
pub struct CheckResult {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CheckResult {
    const fn ok() -> Self {
        Self {
            status: "ok",
            message: None,
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            status: "fail",
            message: Some(message.into()),
        }
    }

    fn unavailable() -> Self {
        Self {
            status: "unavailable",
            message: Some("media stages disabled".to_string()),
        }
    }

    fn is_healthy(&self) -> bool {
        self.status != "fail"
    }
}

/// Build health router (liveness only, no state)
pub fn router() -> Router {
    Router::new().route("/health", get(health))
}

/// Build readiness router
pub fn ready_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/ready", get(ready))
        .with_state(state)
}

/// Liveness probe - is the service running?
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness probe - can the media tools be found?
///
/// Tools are only checked when the pipeline itself runs the media stages.
async fn ready(State(state): State<Arc<ApiState>>) -> (StatusCode, Json<ReadinessResponse>) {
    let (transcoder, lip_sync) = if state.pipeline.media_enabled() {
        (
            check_tool(&state.media.ffmpeg_path),
            check_tool(&state.media.rhubarb_path),
        )
    } else {
        (CheckResult::unavailable(), CheckResult::unavailable())
    };

    let all_ok = transcoder.is_healthy() && lip_sync.is_healthy();
    let (status, http_status) = if all_ok {
        ("ok", StatusCode::OK)
    } else {
        ("degraded", StatusCode::SERVICE_UNAVAILABLE)
    };

    (
        http_status,
        Json(ReadinessResponse {
            status,
            checks: ReadinessChecks {
                transcoder,
                lip_sync,
            },
        }),
    )
}

/// Check that a tool resolves to an executable
fn check_tool(program: &Path) -> CheckResult {
    match which::which(program) {
        Ok(_) => CheckResult::ok(),
        Err(e) => CheckResult::fail(format!("{}: {e}", program.display())),
    }
}
