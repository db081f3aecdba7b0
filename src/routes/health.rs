//! API health check endpoint.
//!
//! Used by container orchestrators and the external scheduler to verify the
//! service is up before driving the maintenance endpoints. Deliberately
//! lightweight: no database or weather-feed access.

use axum::{routing::get, Json, Router};
use serde::Serialize;

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "flood-monitor",
    })
}

/// Create a subrouter containing the `/health` route, generic over the
/// application state so it merges cleanly with the gateway router.
pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/health", get(health))
}
