//! Maintenance endpoints, driven by an external scheduler.
//!
//! `POST /aggregate` folds today's hourly rows into one daily row;
//! `POST /predict` runs a standalone model prediction over the daily tier
//! and persists it to `daily_predictions`. Neither endpoint deduplicates:
//! invocation cadence is the scheduler's responsibility.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use tracing::{error, info, warn};

use super::{failure, AppState};
use crate::aggregate::aggregate_hourly_to_daily;
use crate::db::Db;
use crate::models::{PredictionTable, ReadingTable};
use crate::predict::{ModelPredictor, PredictError, RiskPredictor};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/aggregate", post(aggregate))
        .route("/predict", post(predict_daily))
}

/// `POST /aggregate` – hourly-to-daily aggregation for the current day.
async fn aggregate(State((config, _)): State<AppState>) -> Response {
    // ---
    info!("POST /aggregate - daily aggregation start");

    let mut db = match Db::connect(&config.db_url).await {
        Ok(db) => db,
        Err(e) => {
            error!("Can't open database: {e}");
            return failure(StatusCode::INTERNAL_SERVER_ERROR, "database unavailable");
        }
    };

    match aggregate_hourly_to_daily(&mut db).await {
        Ok(daily) => (
            StatusCode::OK,
            Json(json!({ "status": "Aggregation complete", "data": daily })),
        )
            .into_response(),
        Err(e) => {
            error!("Aggregation failed: {e}");
            failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// `POST /predict` – standalone model prediction over the daily tier.
async fn predict_daily(State((config, artifacts)): State<AppState>) -> Response {
    // ---
    info!("POST /predict - daily prediction start");

    let mut db = match Db::connect(&config.db_url).await {
        Ok(db) => db,
        Err(e) => {
            error!("Can't open database: {e}");
            return failure(StatusCode::INTERNAL_SERVER_ERROR, "database unavailable");
        }
    };

    let predictor = ModelPredictor::new(&artifacts);
    let rows = db
        .last_n(ReadingTable::Daily, predictor.required_rows() as u32)
        .await;
    match predictor.predict(&rows) {
        Ok((level_24, level_48)) => {
            if let Err(e) = db
                .insert_prediction(PredictionTable::Daily, (level_24, level_48))
                .await
            {
                error!("Can't store prediction: {e}");
                return failure(StatusCode::INTERNAL_SERVER_ERROR, format!("insert failed: {e}"));
            }
            (
                StatusCode::OK,
                Json(json!({
                    "status": "Prediction complete",
                    "prediction_24": level_24.as_i64(),
                    "prediction_48": level_48.as_i64(),
                })),
            )
                .into_response()
        }
        // Refusal for too-few rows is a checkable condition, not a crash
        Err(e @ PredictError::InsufficientData { .. }) => {
            warn!("Daily prediction refused: {e}");
            failure(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
        }
        Err(e) => {
            error!("Daily prediction failed: {e}");
            failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
