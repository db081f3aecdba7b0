//! Ingestion endpoints.
//!
//! Clients post the sensor-measured values; the server fills in rainfall and
//! soil moisture from the weather feed, persists one reading row, then runs
//! the tier's predictor and persists the result. A failed prediction never
//! rolls back the reading row that was already written.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use super::{failure, AppState};
use crate::db::Db;
use crate::models::{NewReading, PredictionTable, ReadingTable};
use crate::predict::{HeuristicPredictor, ModelPredictor, RiskPredictor};
use crate::weather::WeatherClient;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/newdata", post(newdata))
        .route("/hourly", post(hourly))
}

/// Sensor payload for the daily ingestion path (schema v1 features only).
#[derive(Debug, Deserialize)]
struct DailyIngest {
    temperature: f64,
    relative_humidity: f64,
    surface_pressure: f64,
}

/// Sensor payload for the hourly ingestion path, with the water metrics
/// added in schema v2.
#[derive(Debug, Deserialize)]
struct HourlyIngest {
    temperature: f64,
    relative_humidity: f64,
    surface_pressure: f64,
    #[serde(default)]
    water_flow: f64,
    #[serde(default)]
    water_depth: f64,
}

// ---

/// Merge client-supplied sensor values with the weather-fetched
/// `(rain, soil_moisture)` pair into one reading row.
fn combine(
    temperature: f64,
    relative_humidity: f64,
    surface_pressure: f64,
    weather: (f64, f64),
    water: Option<(f64, f64)>,
) -> NewReading {
    // ---
    let (rain, soil_moisture) = weather;
    NewReading {
        temperature,
        relative_humidity,
        rain,
        surface_pressure,
        soil_moisture,
        water_flow: water.map(|w| w.0),
        water_depth: water.map(|w| w.1),
    }
}

/// `POST /newdata` – daily ingestion.
///
/// Weather lookup failures on this path propagate as a failure response (the
/// hourly path degrades instead), matching the original behavior split.
async fn newdata(
    State((config, artifacts)): State<AppState>,
    Json(body): Json<DailyIngest>,
) -> Response {
    // ---
    info!("POST /newdata - ingestion pipeline start");

    let (rain, soil_moisture) = match WeatherClient::new(&config).previous_day().await {
        Ok(pair) => pair,
        Err(e) => {
            error!("Previous-day weather fetch failed: {e}");
            return failure(StatusCode::BAD_GATEWAY, format!("weather fetch failed: {e}"));
        }
    };

    let reading = combine(
        body.temperature,
        body.relative_humidity,
        body.surface_pressure,
        (rain, soil_moisture),
        None,
    );

    let mut db = match Db::connect(&config.db_url).await {
        Ok(db) => db,
        Err(e) => {
            error!("Can't open database: {e}");
            return failure(StatusCode::INTERNAL_SERVER_ERROR, "database unavailable");
        }
    };

    if let Err(e) = db.insert_reading(ReadingTable::Live, &reading).await {
        error!("Can't store reading: {e}");
        return failure(StatusCode::INTERNAL_SERVER_ERROR, format!("insert failed: {e}"));
    }

    // Model prediction over the daily tier; refusal (e.g. not enough rows
    // yet) is reported in the response but the reading stays written.
    let predictor = ModelPredictor::new(&artifacts);
    let rows = db
        .last_n(ReadingTable::Daily, predictor.required_rows() as u32)
        .await;
    let prediction = match predictor.predict(&rows) {
        Ok((level_24, level_48)) => {
            if let Err(e) = db
                .insert_prediction(PredictionTable::Live, (level_24, level_48))
                .await
            {
                error!("Can't store prediction: {e}");
            }
            json!({
                "prediction_24": level_24.as_i64(),
                "prediction_48": level_48.as_i64(),
            })
        }
        Err(e) => {
            warn!("Daily prediction skipped: {e}");
            json!({ "skipped": e.to_string() })
        }
    };

    (
        StatusCode::OK,
        Json(json!({
            "status": "Data updated successfully",
            "data": reading,
            "prediction": prediction,
        })),
    )
        .into_response()
}

/// `POST /hourly` – hourly ingestion.
///
/// See [`combine`] for the merge of client and weather values.
///
/// The weather lookup degrades to `(0.0, 0.0)` on failure, so this path only
/// fails on persistence errors. The response carries both horizon levels
/// (the heuristic sets them equal; an earlier revision computed the 48h
/// value but dropped it from the payload).
async fn hourly(
    State((config, _artifacts)): State<AppState>,
    Json(body): Json<HourlyIngest>,
) -> Response {
    // ---
    info!("POST /hourly - ingestion pipeline start");

    let weather = WeatherClient::new(&config).previous_hour().await;
    let reading = combine(
        body.temperature,
        body.relative_humidity,
        body.surface_pressure,
        weather,
        Some((body.water_flow, body.water_depth)),
    );

    let mut db = match Db::connect(&config.db_url).await {
        Ok(db) => db,
        Err(e) => {
            error!("Can't open database: {e}");
            return failure(StatusCode::INTERNAL_SERVER_ERROR, "database unavailable");
        }
    };

    if let Err(e) = db.insert_reading(ReadingTable::Hourly, &reading).await {
        error!("Can't store reading: {e}");
        return failure(StatusCode::INTERNAL_SERVER_ERROR, format!("insert failed: {e}"));
    }

    let predictor = HeuristicPredictor;
    let rows = db
        .last_n(ReadingTable::Hourly, predictor.required_rows() as u32)
        .await;
    let prediction = match predictor.predict(&rows) {
        Ok((level_24, level_48)) => {
            if let Err(e) = db
                .insert_prediction(PredictionTable::Hourly, (level_24, level_48))
                .await
            {
                error!("Can't store prediction: {e}");
            }
            json!({
                "prediction_24": level_24.as_i64(),
                "prediction_48": level_48.as_i64(),
            })
        }
        Err(e) => {
            warn!("Hourly prediction skipped: {e}");
            json!({ "skipped": e.to_string() })
        }
    };

    (
        StatusCode::OK,
        Json(json!({
            "status": "Data updated successfully",
            "data": reading,
            "prediction": prediction,
        })),
    )
        .into_response()
}

// ---

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn combine_merges_sensor_and_weather_values() {
        // ---
        let reading = combine(25.0, 60.0, 1010.0, (2.0, 0.3), None);
        assert_eq!(
            (
                reading.temperature,
                reading.relative_humidity,
                reading.rain,
                reading.surface_pressure,
                reading.soil_moisture,
            ),
            (25.0, 60.0, 2.0, 1010.0, 0.3)
        );
        assert_eq!(reading.water_flow, None);
        assert_eq!(reading.water_depth, None);
    }

    #[test]
    fn combine_carries_water_metrics_on_the_hourly_path() {
        // ---
        let reading = combine(21.0, 70.0, 1005.0, (0.0, 0.0), Some((3.5, 1.2)));
        assert_eq!(reading.water_flow, Some(3.5));
        assert_eq!(reading.water_depth, Some(1.2));
    }
}
