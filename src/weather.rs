//! Open-Meteo weather client.
//!
//! Supplies the two feature values the station sensors do not measure:
//! rainfall and shallow soil moisture. Two lookup modes exist and they
//! deliberately fail differently:
//!
//! - previous hour: any failure degrades to `(0.0, 0.0)` ("no rain / dry
//!   soil") with a warning, so hourly ingestion never blocks on the feed;
//! - previous day: failures propagate to the caller.

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::models::station_offset;
use crate::Config;

// ---

/// Hourly variables requested from the feed.
const HOURLY_VARIABLES: &str = "rain,soil_moisture_0_to_1cm";

/// Samples making up one calendar day in the hourly feed.
const HOURS_PER_DAY: usize = 24;

#[derive(Clone)]
pub struct WeatherClient {
    client: reqwest::Client,
    base_url: String,
    latitude: f64,
    longitude: f64,
}

/// Open-Meteo JSON response: parallel arrays under `hourly`.
#[derive(Debug, Deserialize)]
struct MeteoResponse {
    hourly: MeteoHourly,
}

#[derive(Debug, Deserialize)]
struct MeteoHourly {
    time: Vec<String>,
    rain: Vec<f64>,
    #[serde(rename = "soil_moisture_0_to_1cm")]
    soil_moisture: Vec<f64>,
}

impl WeatherClient {
    pub fn new(config: &Config) -> Self {
        // ---
        Self {
            client: reqwest::Client::new(),
            base_url: config.weather_api_url.clone(),
            latitude: config.latitude,
            longitude: config.longitude,
        }
    }

    /// Create a client against a custom endpoint (for testing).
    #[cfg(test)]
    pub fn with_base_url(base_url: String, latitude: f64, longitude: f64) -> Self {
        // ---
        Self {
            client: reqwest::Client::new(),
            base_url,
            latitude,
            longitude,
        }
    }

    // ---

    /// Rainfall and soil moisture for the previous full hour.
    ///
    /// Never fails: network errors, malformed responses, and a missing hour
    /// key all degrade to `(0.0, 0.0)`.
    pub async fn previous_hour(&self) -> (f64, f64) {
        // ---
        match self.fetch_previous_hour().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!("Previous-hour weather fetch failed, using defaults: {e}");
                (0.0, 0.0)
            }
        }
    }

    async fn fetch_previous_hour(&self) -> Result<(f64, f64)> {
        // ---
        let url = format!(
            "{}?latitude={}&longitude={}&hourly={}&forecast_days=1",
            self.base_url, self.latitude, self.longitude, HOURLY_VARIABLES
        );
        debug!("Fetching previous-hour weather from {url}");

        let response: MeteoResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let key = previous_hour_key(Utc::now());
        let index = response
            .hourly
            .time
            .iter()
            .position(|t| t == &key)
            .ok_or_else(|| anyhow!("hour {key} not present in weather feed"))?;

        let rain = *response
            .hourly
            .rain
            .get(index)
            .ok_or_else(|| anyhow!("rain series shorter than time series"))?;
        let soil_moisture = *response
            .hourly
            .soil_moisture
            .get(index)
            .ok_or_else(|| anyhow!("soil moisture series shorter than time series"))?;

        Ok((rain, soil_moisture))
    }

    /// Total rainfall and mean soil moisture over the previous day: the sum
    /// and the mean of the first 24 hourly samples of a past+forecast
    /// window. Failures propagate.
    pub async fn previous_day(&self) -> Result<(f64, f64)> {
        // ---
        let url = format!(
            "{}?latitude={}&longitude={}&hourly={}&past_days=1&forecast_days=1",
            self.base_url, self.latitude, self.longitude, HOURLY_VARIABLES
        );
        debug!("Fetching previous-day weather from {url}");

        let response: MeteoResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        daily_totals(&response.hourly.rain, &response.hourly.soil_moisture)
    }
}

// ---

/// Timestamp key for the previous full hour in station-local time, matching
/// the feed's `hourly.time` format.
fn previous_hour_key(now_utc: DateTime<Utc>) -> String {
    // ---
    let local = now_utc.with_timezone(&station_offset());
    let previous_hour = local - Duration::hours(1);
    previous_hour.format("%Y-%m-%dT%H:00").to_string()
}

/// Sum of rainfall and mean of soil moisture over the first day of samples.
fn daily_totals(rain: &[f64], soil_moisture: &[f64]) -> Result<(f64, f64)> {
    // ---
    if soil_moisture.is_empty() {
        bail!("weather feed returned no soil moisture samples");
    }
    let total_rainfall: f64 = rain.iter().take(HOURS_PER_DAY).sum();
    let day = &soil_moisture[..soil_moisture.len().min(HOURS_PER_DAY)];
    let avg_soil_moisture = day.iter().sum::<f64>() / day.len() as f64;
    Ok((total_rainfall, avg_soil_moisture))
}

// ---
