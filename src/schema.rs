//! Database schema management for the flood monitoring service.
//!
//! Ensures the reading and prediction tables exist before serving requests.
//! Applied once on startup from `main.rs`.

use sqlx::Result;

use crate::db::Db;

// ---

/// Create the database schema (idempotent).
///
/// One reading table and one prediction table per granularity tier. The
/// hourly reading table is schema v2 and carries the water metrics; the live
/// and daily tables stay on the original five-feature layout. Safe to call
/// on every startup; no-op if the tables already exist.
pub async fn create_schema(db: &mut Db) -> Result<()> {
    // ---
    for table in ["live_dataset", "daily_data"] {
        let sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id                INTEGER PRIMARY KEY AUTOINCREMENT,
                datetime          TEXT NOT NULL,
                temperature       REAL NOT NULL,
                relative_humidity REAL NOT NULL,
                rain              REAL NOT NULL,
                surface_pressure  REAL NOT NULL,
                soil_moisture     REAL NOT NULL
            );
            "#
        );
        sqlx::query(&sql).execute(&mut db.conn).await?;
    }

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS hourly_data (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            datetime          TEXT NOT NULL,
            temperature       REAL NOT NULL,
            relative_humidity REAL NOT NULL,
            rain              REAL NOT NULL,
            surface_pressure  REAL NOT NULL,
            soil_moisture     REAL NOT NULL,
            water_flow        REAL NOT NULL DEFAULT 0,
            water_depth       REAL NOT NULL DEFAULT 0
        );
        "#,
    )
    .execute(&mut db.conn)
    .await?;

    for table in ["predictions", "hourly_predictions", "daily_predictions"] {
        let sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                datetime      TEXT NOT NULL,
                prediction_24 INTEGER NOT NULL,
                prediction_48 INTEGER NOT NULL
            );
            "#
        );
        sqlx::query(&sql).execute(&mut db.conn).await?;
    }

    // Reads are always "most recent first by datetime"
    for table in [
        "live_dataset",
        "hourly_data",
        "daily_data",
        "predictions",
        "hourly_predictions",
        "daily_predictions",
    ] {
        let sql =
            format!("CREATE INDEX IF NOT EXISTS idx_{table}_datetime ON {table} (datetime);");
        sqlx::query(&sql).execute(&mut db.conn).await?;
    }

    Ok(())
}
