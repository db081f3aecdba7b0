//! CSV export endpoints.
//!
//! `GET /export/{kind}` renders a table as a downloadable CSV with a fixed
//! header per table kind (human-readable units in parentheses) and risk
//! levels rendered as their labels.

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tracing::{error, info};

use super::{failure, AppState};
use crate::db::Db;
use crate::models::{risk_label, Prediction, PredictionTable, Reading, ReadingTable};

// ---

const READING_HEADER: &str = "Datetime,Temperature (C),Relative Humidity (%),Rain (mm),\
Surface Pressure (hPa),Soil Moisture (m3/m3)";
const WATER_COLUMNS: &str = ",Water Flow (m3/s),Water Depth (m)";
const PREDICTION_HEADER: &str = "Datetime,24h Risk,48h Risk";

/// Rows per export when the caller gives no `limit` (the JSON read
/// endpoints take an explicit row count instead).
const DEFAULT_LIMIT: u32 = 1000;

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/export/{kind}", get(export))
}

#[derive(Debug, Deserialize)]
struct ExportQuery {
    limit: Option<u32>,
}

/// Exportable table kinds, keyed by URL segment.
enum ExportKind {
    Readings(ReadingTable),
    Predictions(PredictionTable),
}

impl ExportKind {
    fn from_segment(segment: &str) -> Option<Self> {
        // ---
        match segment {
            "raw" => Some(ExportKind::Readings(ReadingTable::Live)),
            "hourly" => Some(ExportKind::Readings(ReadingTable::Hourly)),
            "daily" => Some(ExportKind::Readings(ReadingTable::Daily)),
            "predictions" => Some(ExportKind::Predictions(PredictionTable::Live)),
            "hourly_predictions" => Some(ExportKind::Predictions(PredictionTable::Hourly)),
            "daily_predictions" => Some(ExportKind::Predictions(PredictionTable::Daily)),
            _ => None,
        }
    }
}

// ---

async fn export(
    State((config, _)): State<AppState>,
    Path(kind): Path<String>,
    Query(params): Query<ExportQuery>,
) -> Response {
    // ---
    info!("GET /export/{kind}");

    let Some(export_kind) = ExportKind::from_segment(&kind) else {
        return failure(StatusCode::NOT_FOUND, format!("unknown export kind: {kind}"));
    };

    let mut db = match Db::connect(&config.db_url).await {
        Ok(db) => db,
        Err(e) => {
            error!("Can't open database: {e}");
            return failure(StatusCode::INTERNAL_SERVER_ERROR, "database unavailable");
        }
    };

    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    let body = match export_kind {
        ExportKind::Readings(table) => {
            let rows = db.last_n(table, limit).await;
            reading_csv(&rows, table.has_water_metrics())
        }
        ExportKind::Predictions(table) => {
            let rows = db.last_n_predictions(table, limit).await;
            prediction_csv(&rows)
        }
    };

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{kind}.csv\""),
            ),
        ],
        body,
    )
        .into_response()
}

// ---

fn reading_csv(rows: &[Reading], with_water_metrics: bool) -> String {
    // ---
    let mut out = String::from(READING_HEADER);
    if with_water_metrics {
        out.push_str(WATER_COLUMNS);
    }
    out.push('\n');

    for row in rows {
        out.push_str(&format!(
            "{},{},{},{},{},{}",
            row.datetime.to_rfc3339(),
            row.temperature,
            row.relative_humidity,
            row.rain,
            row.surface_pressure,
            row.soil_moisture,
        ));
        if with_water_metrics {
            out.push_str(&format!(
                ",{},{}",
                row.water_flow.unwrap_or(0.0),
                row.water_depth.unwrap_or(0.0)
            ));
        }
        out.push('\n');
    }
    out
}

fn prediction_csv(rows: &[Prediction]) -> String {
    // ---
    let mut out = String::from(PREDICTION_HEADER);
    out.push('\n');
    for row in rows {
        out.push_str(&format!(
            "{},{},{}\n",
            row.datetime.to_rfc3339(),
            risk_label(row.prediction_24),
            risk_label(row.prediction_48),
        ));
    }
    out
}

// ---

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn reading_csv_has_units_in_header() {
        // ---
        let csv = reading_csv(&[], false);
        assert!(csv.starts_with("Datetime,Temperature (C),Relative Humidity (%)"));
        assert!(!csv.contains("Water Flow"));

        let csv = reading_csv(&[], true);
        assert!(csv.contains("Water Flow (m3/s),Water Depth (m)"));
    }

    #[test]
    fn prediction_csv_renders_risk_labels() {
        // ---
        let rows = vec![
            Prediction {
                datetime: Utc.with_ymd_and_hms(2025, 3, 26, 12, 0, 0).unwrap(),
                prediction_24: 0,
                prediction_48: 2,
            },
            Prediction {
                datetime: Utc.with_ymd_and_hms(2025, 3, 26, 13, 0, 0).unwrap(),
                prediction_24: 1,
                prediction_48: 7,
            },
        ];
        let csv = prediction_csv(&rows);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Datetime,24h Risk,48h Risk");
        assert!(lines[1].ends_with("Low Risk,High Risk"));
        assert!(lines[2].ends_with("Medium Risk,Unknown"));
    }

    #[test]
    fn export_kind_covers_all_tables() {
        // ---
        assert!(ExportKind::from_segment("raw").is_some());
        assert!(ExportKind::from_segment("daily_predictions").is_some());
        assert!(ExportKind::from_segment("bogus").is_none());
    }
}
