//! Data models for the flood monitoring pipeline.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

// ---

/// Fixed station timezone offset (UTC+05:30). The deployment site does not
/// observe DST, so a constant offset is sufficient for hour keys and
/// calendar-day boundaries.
pub fn station_offset() -> FixedOffset {
    // east_opt only fails for offsets outside +/-24h
    FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap_or_else(|| Utc.fix())
}

// ---

/// Reading tables, one per granularity tier. Each tier is an independent
/// append log; rows are never updated or deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingTable {
    /// `live_dataset` – one row per daily ingestion event (schema v1).
    Live,
    /// `hourly_data` – one row per hour, with water metrics (schema v2).
    Hourly,
    /// `daily_data` – one row per day, produced by aggregation (schema v1).
    Daily,
}

impl ReadingTable {
    pub fn name(self) -> &'static str {
        match self {
            ReadingTable::Live => "live_dataset",
            ReadingTable::Hourly => "hourly_data",
            ReadingTable::Daily => "daily_data",
        }
    }

    /// Schema v2 tables carry the two extra water columns; insert column
    /// order must match the table's schema version exactly.
    pub fn has_water_metrics(self) -> bool {
        matches!(self, ReadingTable::Hourly)
    }
}

/// Prediction tables, parallel to the reading tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionTable {
    Live,
    Hourly,
    Daily,
}

impl PredictionTable {
    pub fn name(self) -> &'static str {
        match self {
            PredictionTable::Live => "predictions",
            PredictionTable::Hourly => "hourly_predictions",
            PredictionTable::Daily => "daily_predictions",
        }
    }
}

// ---

/// Feature values for one ingestion event, before a server timestamp is
/// assigned. The water metrics only exist on the hourly tier.
#[derive(Debug, Clone, Serialize)]
pub struct NewReading {
    pub temperature: f64,
    pub relative_humidity: f64,
    pub rain: f64,
    pub surface_pressure: f64,
    pub soil_moisture: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub water_flow: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub water_depth: Option<f64>,
}

/// One persisted reading row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Reading {
    pub datetime: DateTime<Utc>,
    pub temperature: f64,
    pub relative_humidity: f64,
    pub rain: f64,
    pub surface_pressure: f64,
    pub soil_moisture: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub water_flow: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub water_depth: Option<f64>,
}

/// Number of numeric feature columns fed to the classifiers.
pub const FEATURE_COLUMNS: usize = 5;

impl Reading {
    /// The model feature vector, in the fixed column order the classifiers
    /// were trained on.
    pub fn features(&self) -> [f64; FEATURE_COLUMNS] {
        [
            self.temperature,
            self.relative_humidity,
            self.rain,
            self.surface_pressure,
            self.soil_moisture,
        ]
    }
}

/// One persisted prediction row. Levels are stored as raw integers so that
/// out-of-range values written by older revisions still round-trip.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Prediction {
    pub datetime: DateTime<Utc>,
    pub prediction_24: i64,
    pub prediction_48: i64,
}

// ---

/// Discrete flood risk level emitted by the predictors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Map a classifier output class index onto a level.
    pub fn from_class_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(RiskLevel::Low),
            1 => Some(RiskLevel::Medium),
            2 => Some(RiskLevel::High),
            _ => None,
        }
    }

    pub fn as_i64(self) -> i64 {
        match self {
            RiskLevel::Low => 0,
            RiskLevel::Medium => 1,
            RiskLevel::High => 2,
        }
    }
}

/// Human-readable label for a stored risk level, as rendered in exports and
/// on the dashboard.
pub fn risk_label(level: i64) -> &'static str {
    match level {
        0 => "Low Risk",
        1 => "Medium Risk",
        2 => "High Risk",
        _ => "Unknown",
    }
}

// ---

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn risk_labels_cover_all_levels() {
        // ---
        assert_eq!(risk_label(0), "Low Risk");
        assert_eq!(risk_label(1), "Medium Risk");
        assert_eq!(risk_label(2), "High Risk");
        assert_eq!(risk_label(3), "Unknown");
        assert_eq!(risk_label(-1), "Unknown");
    }

    #[test]
    fn class_index_maps_onto_levels() {
        // ---
        assert_eq!(RiskLevel::from_class_index(0), Some(RiskLevel::Low));
        assert_eq!(RiskLevel::from_class_index(2), Some(RiskLevel::High));
        assert_eq!(RiskLevel::from_class_index(3), None);
        assert_eq!(RiskLevel::High.as_i64(), 2);
        assert!(RiskLevel::Low < RiskLevel::High);
    }

    #[test]
    fn feature_order_is_fixed() {
        // ---
        let r = Reading {
            datetime: Utc.with_ymd_and_hms(2025, 3, 26, 18, 0, 0).unwrap(),
            temperature: 25.0,
            relative_humidity: 60.0,
            rain: 2.0,
            surface_pressure: 1010.0,
            soil_moisture: 0.3,
            water_flow: None,
            water_depth: None,
        };
        assert_eq!(r.features(), [25.0, 60.0, 2.0, 1010.0, 0.3]);
    }

    #[test]
    fn new_reading_json_omits_missing_water_metrics() {
        // ---
        let reading = NewReading {
            temperature: 25.0,
            relative_humidity: 60.0,
            rain: 2.0,
            surface_pressure: 1010.0,
            soil_moisture: 0.3,
            water_flow: None,
            water_depth: None,
        };
        let json = serde_json::to_value(&reading).unwrap();
        assert_eq!(json["temperature"], 25.0);
        assert_eq!(json["soil_moisture"], 0.3);
        assert!(json.get("water_flow").is_none());
        assert!(json.get("water_depth").is_none());
    }

    #[test]
    fn table_names_match_schema() {
        // ---
        assert_eq!(ReadingTable::Live.name(), "live_dataset");
        assert_eq!(ReadingTable::Hourly.name(), "hourly_data");
        assert_eq!(ReadingTable::Daily.name(), "daily_data");
        assert!(ReadingTable::Hourly.has_water_metrics());
        assert!(!ReadingTable::Daily.has_water_metrics());
        assert_eq!(PredictionTable::Live.name(), "predictions");
        assert_eq!(PredictionTable::Hourly.name(), "hourly_predictions");
        assert_eq!(PredictionTable::Daily.name(), "daily_predictions");
    }

    #[test]
    fn station_offset_is_five_thirty() {
        // ---
        assert_eq!(station_offset().local_minus_utc(), 5 * 3600 + 30 * 60);
    }
}
