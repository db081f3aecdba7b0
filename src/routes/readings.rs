//! Read endpoints for the reading tiers.
//!
//! `GET /raw/{n}`, `/hourly/{n}` and `/daily/{n}` return the `n` most recent
//! rows of the corresponding table as JSON records, oldest first so the
//! dashboard can chart them without re-sorting.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tracing::{error, info};

use super::{failure, AppState};
use crate::db::Db;
use crate::models::ReadingTable;
use crate::Config;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/raw/{n}", get(raw))
        .route("/hourly/{n}", get(hourly))
        .route("/daily/{n}", get(daily))
}

async fn raw(State((config, _)): State<AppState>, Path(n): Path<u32>) -> Response {
    read_tier(&config, ReadingTable::Live, n).await
}

async fn hourly(State((config, _)): State<AppState>, Path(n): Path<u32>) -> Response {
    read_tier(&config, ReadingTable::Hourly, n).await
}

async fn daily(State((config, _)): State<AppState>, Path(n): Path<u32>) -> Response {
    read_tier(&config, ReadingTable::Daily, n).await
}

// ---

async fn read_tier(config: &Config, table: ReadingTable, n: u32) -> Response {
    // ---
    info!("GET /{}/{} readings", table.name(), n);

    let mut db = match Db::connect(&config.db_url).await {
        Ok(db) => db,
        Err(e) => {
            error!("Can't open database: {e}");
            return failure(StatusCode::INTERNAL_SERVER_ERROR, "database unavailable");
        }
    };

    // Query failures already degraded to an empty set inside the handle
    let rows = db.last_n(table, n).await;
    (StatusCode::OK, Json(rows)).into_response()
}
