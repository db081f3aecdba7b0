//! Persistence layer: a thin handle over one SQLite database.
//!
//! Each HTTP request opens its own [`Db`] and the underlying connection is
//! closed when the handle drops, mirroring the original per-request
//! open/close discipline instead of a shared pool. Read failures are logged
//! and degrade to empty result sets; callers treat "no rows" and "fewer rows
//! than requested" as a checkable condition, never a crash. Write failures
//! propagate.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::ConnectOptions;
use tracing::error;

use crate::models::{NewReading, Prediction, PredictionTable, Reading, ReadingTable, RiskLevel};

// ---

/// Handle bound to one database file.
pub struct Db {
    pub(crate) conn: SqliteConnection,
}

impl Db {
    /// Open a connection to the database at `url`, creating the file if it
    /// does not exist yet.
    pub async fn connect(url: &str) -> sqlx::Result<Self> {
        // ---
        let conn = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .connect()
            .await?;
        Ok(Self { conn })
    }

    // ---

    /// Append a reading row with a server-generated current timestamp.
    ///
    /// Column order is fixed per the table's schema version (the hourly
    /// table carries the two extra water columns).
    pub async fn insert_reading(
        &mut self,
        table: ReadingTable,
        reading: &NewReading,
    ) -> sqlx::Result<()> {
        // ---
        self.insert_reading_at(table, reading, Utc::now()).await
    }

    pub(crate) async fn insert_reading_at(
        &mut self,
        table: ReadingTable,
        reading: &NewReading,
        at: DateTime<Utc>,
    ) -> sqlx::Result<()> {
        // ---
        if table.has_water_metrics() {
            let sql = format!(
                "INSERT INTO {} (datetime, temperature, relative_humidity, rain, \
                 surface_pressure, soil_moisture, water_flow, water_depth) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                table.name()
            );
            sqlx::query(&sql)
                .bind(at)
                .bind(reading.temperature)
                .bind(reading.relative_humidity)
                .bind(reading.rain)
                .bind(reading.surface_pressure)
                .bind(reading.soil_moisture)
                .bind(reading.water_flow.unwrap_or(0.0))
                .bind(reading.water_depth.unwrap_or(0.0))
                .execute(&mut self.conn)
                .await?;
        } else {
            let sql = format!(
                "INSERT INTO {} (datetime, temperature, relative_humidity, rain, \
                 surface_pressure, soil_moisture) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                table.name()
            );
            sqlx::query(&sql)
                .bind(at)
                .bind(reading.temperature)
                .bind(reading.relative_humidity)
                .bind(reading.rain)
                .bind(reading.surface_pressure)
                .bind(reading.soil_moisture)
                .execute(&mut self.conn)
                .await?;
        }
        Ok(())
    }

    /// Append a prediction row with a server-generated current timestamp.
    pub async fn insert_prediction(
        &mut self,
        table: PredictionTable,
        levels: (RiskLevel, RiskLevel),
    ) -> sqlx::Result<()> {
        // ---
        let sql = format!(
            "INSERT INTO {} (datetime, prediction_24, prediction_48) VALUES (?1, ?2, ?3)",
            table.name()
        );
        sqlx::query(&sql)
            .bind(Utc::now())
            .bind(levels.0.as_i64())
            .bind(levels.1.as_i64())
            .execute(&mut self.conn)
            .await?;
        Ok(())
    }

    // ---

    /// The `n` most recent reading rows, oldest-to-newest. Downstream
    /// consumers (window building, charting) rely on chronological order, so
    /// the descending fetch is reversed before returning.
    pub async fn last_n(&mut self, table: ReadingTable, n: u32) -> Vec<Reading> {
        // ---
        match self.try_last_n(table, n).await {
            Ok(rows) => rows,
            Err(e) => {
                error!("Can't fetch last {} rows from {}: {}", n, table.name(), e);
                Vec::new()
            }
        }
    }

    async fn try_last_n(&mut self, table: ReadingTable, n: u32) -> sqlx::Result<Vec<Reading>> {
        // ---
        let sql = format!(
            "SELECT {} FROM {} ORDER BY datetime DESC LIMIT ?1",
            reading_columns(table),
            table.name()
        );
        let mut rows = sqlx::query_as::<_, Reading>(&sql)
            .bind(n as i64)
            .fetch_all(&mut self.conn)
            .await?;
        rows.reverse();
        Ok(rows)
    }

    /// All reading rows with timestamp in `[start, end)`, ascending.
    pub async fn range(
        &mut self,
        table: ReadingTable,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<Reading> {
        // ---
        match self.try_range(table, start, end).await {
            Ok(rows) => rows,
            Err(e) => {
                error!("Can't fetch range from {}: {}", table.name(), e);
                Vec::new()
            }
        }
    }

    async fn try_range(
        &mut self,
        table: ReadingTable,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> sqlx::Result<Vec<Reading>> {
        // ---
        let sql = format!(
            "SELECT {} FROM {} WHERE datetime >= ?1 AND datetime < ?2 ORDER BY datetime ASC",
            reading_columns(table),
            table.name()
        );
        sqlx::query_as::<_, Reading>(&sql)
            .bind(start)
            .bind(end)
            .fetch_all(&mut self.conn)
            .await
    }

    /// The `n` most recent prediction rows, oldest-to-newest.
    pub async fn last_n_predictions(&mut self, table: PredictionTable, n: u32) -> Vec<Prediction> {
        // ---
        let sql = format!(
            "SELECT datetime, prediction_24, prediction_48 FROM {} \
             ORDER BY datetime DESC LIMIT ?1",
            table.name()
        );
        let fetched = sqlx::query_as::<_, Prediction>(&sql)
            .bind(n as i64)
            .fetch_all(&mut self.conn)
            .await;
        match fetched {
            Ok(mut rows) => {
                rows.reverse();
                rows
            }
            Err(e) => {
                error!("Can't fetch predictions from {}: {}", table.name(), e);
                Vec::new()
            }
        }
    }
}

/// Select list matching the [`Reading`] struct; schema v1 tables surface the
/// missing water columns as NULL so one row type covers both versions.
fn reading_columns(table: ReadingTable) -> &'static str {
    if table.has_water_metrics() {
        "datetime, temperature, relative_humidity, rain, surface_pressure, \
         soil_moisture, water_flow, water_depth"
    } else {
        "datetime, temperature, relative_humidity, rain, surface_pressure, \
         soil_moisture, NULL AS water_flow, NULL AS water_depth"
    }
}

// ---
