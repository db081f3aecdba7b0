//! Read endpoints for the prediction tiers.
//!
//! Each returns the most recent prediction row of its table, or an empty
//! object when no prediction has been made yet (the dashboard treats both
//! the same way).

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tracing::error;

use super::{failure, AppState};
use crate::db::Db;
use crate::models::PredictionTable;
use crate::Config;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/prediction", get(live))
        .route("/hourly_prediction", get(hourly))
        .route("/daily_prediction", get(daily))
}

async fn live(State((config, _)): State<AppState>) -> Response {
    latest(&config, PredictionTable::Live).await
}

async fn hourly(State((config, _)): State<AppState>) -> Response {
    latest(&config, PredictionTable::Hourly).await
}

async fn daily(State((config, _)): State<AppState>) -> Response {
    latest(&config, PredictionTable::Daily).await
}

// ---

async fn latest(config: &Config, table: PredictionTable) -> Response {
    // ---
    let mut db = match Db::connect(&config.db_url).await {
        Ok(db) => db,
        Err(e) => {
            error!("Can't open database: {e}");
            return failure(StatusCode::INTERNAL_SERVER_ERROR, "database unavailable");
        }
    };

    let mut rows = db.last_n_predictions(table, 1).await;
    let body = match rows.pop() {
        Some(prediction) => serde_json::to_value(prediction).unwrap_or_else(|_| json!({})),
        None => json!({}),
    };
    (StatusCode::OK, Json(body)).into_response()
}
