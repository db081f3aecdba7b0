use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};

use crate::predict::Artifacts;
use crate::Config;

mod export;
mod health;
mod ingest;
mod maintenance;
mod predictions;
mod readings;

// ---

/// Shared application state: immutable config plus the pretrained artifacts
/// loaded once at startup. No database handle lives here; every request
/// opens and drops its own.
pub type AppState = (Config, Arc<Artifacts>);

pub fn router(config: Config, artifacts: Arc<Artifacts>) -> Router {
    // ---
    Router::new()
        .merge(ingest::router())
        .merge(readings::router())
        .merge(predictions::router())
        .merge(export::router())
        .merge(maintenance::router())
        .merge(health::router())
        .with_state((config, artifacts))
}

// ---

/// Structured failure body for endpoint-boundary errors. Data already
/// written before the failure point stays written; there is no rollback.
pub(crate) fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    // ---
    (
        status,
        Json(serde_json::json!({
            "status": "error",
            "message": message.into(),
        })),
    )
        .into_response()
}
