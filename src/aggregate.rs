//! Hourly-to-daily aggregation.
//!
//! Folds the current calendar day's hourly rows into one daily row: rainfall
//! sums, everything else averages. There is no dedup guard; re-running
//! within the same day inserts another daily row, and spacing invocations is
//! the external scheduler's job.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, NaiveTime, Utc};
use tracing::info;

use crate::db::Db;
use crate::models::{station_offset, NewReading, Reading, ReadingTable};

// ---

/// Aggregate today's hourly rows into one daily row.
///
/// Errors (and writes nothing) when no hourly rows exist in the current
/// calendar day. Returns the row that was written.
pub async fn aggregate_hourly_to_daily(db: &mut Db) -> Result<NewReading> {
    // ---
    let (start, end) = current_day_bounds(Utc::now());
    let rows = db.range(ReadingTable::Hourly, start, end).await;

    let daily = fold_daily(&rows)
        .ok_or_else(|| anyhow!("no hourly rows between {start} and {end}, nothing to aggregate"))?;

    db.insert_reading(ReadingTable::Daily, &daily).await?;
    info!(
        "Aggregated {} hourly rows into one daily row (rain total {})",
        rows.len(),
        daily.rain
    );
    Ok(daily)
}

/// `[start, end)` of the calendar day containing `now` at the station's
/// fixed UTC offset, expressed in UTC.
pub fn current_day_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    // ---
    let offset = station_offset();
    let local_midnight = now.with_timezone(&offset).date_naive().and_time(NaiveTime::MIN);
    let start_naive_utc = local_midnight - Duration::seconds(offset.local_minus_utc() as i64);
    let start = DateTime::<Utc>::from_naive_utc_and_offset(start_naive_utc, Utc);
    (start, start + Duration::days(1))
}

/// Mean of every feature except rainfall, which sums. `None` on an empty
/// input set. Daily rows stay on schema v1, so the water metrics are
/// dropped.
pub fn fold_daily(rows: &[Reading]) -> Option<NewReading> {
    // ---
    if rows.is_empty() {
        return None;
    }
    let n = rows.len() as f64;
    let mean = |f: fn(&Reading) -> f64| rows.iter().map(f).sum::<f64>() / n;

    Some(NewReading {
        temperature: mean(|r| r.temperature),
        relative_humidity: mean(|r| r.relative_humidity),
        rain: rows.iter().map(|r| r.rain).sum(),
        surface_pressure: mean(|r| r.surface_pressure),
        soil_moisture: mean(|r| r.soil_moisture),
        water_flow: None,
        water_depth: None,
    })
}

// ---

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::schema;
    use chrono::TimeZone;

    fn reading(temperature: f64, rain: f64) -> Reading {
        // ---
        Reading {
            datetime: Utc.with_ymd_and_hms(2025, 3, 26, 6, 0, 0).unwrap(),
            temperature,
            relative_humidity: 60.0,
            rain,
            surface_pressure: 1010.0,
            soil_moisture: 0.3,
            water_flow: Some(1.0),
            water_depth: Some(0.5),
        }
    }

    #[test]
    fn fold_daily_of_nothing_is_none() {
        // ---
        assert!(fold_daily(&[]).is_none());
    }

    #[test]
    fn fold_daily_sums_rain_and_averages_the_rest() {
        // ---
        let rows = vec![reading(20.0, 1.0), reading(30.0, 2.5)];
        let daily = fold_daily(&rows).unwrap();

        assert_eq!(daily.temperature, 25.0);
        assert_eq!(daily.rain, 3.5);
        assert_eq!(daily.relative_humidity, 60.0);
        assert_eq!(daily.surface_pressure, 1010.0);
        assert!((daily.soil_moisture - 0.3).abs() < 1e-12);
        assert_eq!(daily.water_flow, None);
        assert_eq!(daily.water_depth, None);
    }

    #[test]
    fn day_bounds_follow_the_station_offset() {
        // ---
        // 20:00 UTC is already past local midnight (+05:30), so the local
        // day runs from 18:30 UTC to 18:30 UTC the next day.
        let now = Utc.with_ymd_and_hms(2025, 3, 26, 20, 0, 0).unwrap();
        let (start, end) = current_day_bounds(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 3, 26, 18, 30, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 3, 27, 18, 30, 0).unwrap());

        // 06:00 UTC is mid-day local on the same date
        let now = Utc.with_ymd_and_hms(2025, 3, 26, 6, 0, 0).unwrap();
        let (start, _) = current_day_bounds(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 3, 25, 18, 30, 0).unwrap());
    }

    #[tokio::test]
    async fn aggregation_over_empty_day_writes_nothing() {
        // ---
        let mut db = Db::connect("sqlite::memory:").await.unwrap();
        schema::create_schema(&mut db).await.unwrap();

        assert!(aggregate_hourly_to_daily(&mut db).await.is_err());
        assert!(db.last_n(ReadingTable::Daily, 1).await.is_empty());
    }

    #[tokio::test]
    async fn aggregation_writes_exactly_one_daily_row() {
        // ---
        let mut db = Db::connect("sqlite::memory:").await.unwrap();
        schema::create_schema(&mut db).await.unwrap();

        let (start, _) = current_day_bounds(Utc::now());
        for i in 0..3 {
            let r = NewReading {
                temperature: 20.0 + i as f64,
                relative_humidity: 60.0,
                rain: 1.0,
                surface_pressure: 1010.0,
                soil_moisture: 0.3,
                water_flow: Some(0.0),
                water_depth: Some(0.0),
            };
            db.insert_reading_at(ReadingTable::Hourly, &r, start + Duration::hours(i))
                .await
                .unwrap();
        }

        let daily = aggregate_hourly_to_daily(&mut db).await.unwrap();
        assert_eq!(daily.temperature, 21.0);
        assert_eq!(daily.rain, 3.0);

        let rows = db.last_n(ReadingTable::Daily, 10).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].rain, 3.0);
    }
}
