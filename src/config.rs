//! Configuration loader for the flood monitoring backend service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). By consolidating configuration logic here, we
//! avoid scattering `env::var` calls throughout the codebase.

use std::env;

use anyhow::{anyhow, Result};

/// Parse an optional float environment variable with a default value.
macro_rules! parse_env_f64 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<f64>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Read an optional string environment variable with a default value.
macro_rules! env_or {
    ($var_name:expr, $default:expr) => {
        env::var($var_name).unwrap_or_else(|_| $default.to_string())
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// SQLite connection string, e.g. `sqlite://dataset.db`.
    pub db_url: String,

    /// Open-Meteo forecast endpoint.
    pub weather_api_url: String,

    /// Station coordinates for the weather lookup.
    pub latitude: f64,
    pub longitude: f64,

    /// Pretrained classifier artifacts (24h / 48h horizons) and the fitted
    /// feature scaler, loaded once at startup.
    pub model_24_path: String,
    pub model_48_path: String,
    pub scaler_path: String,

    /// HTTP listen address.
    pub bind_addr: String,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `DATABASE_URL` – SQLite connection string
///
/// Optional:
/// - `WEATHER_API_URL` – Open-Meteo endpoint (default: public API)
/// - `LATITUDE` / `LONGITUDE` – station coordinates (default: 11.3046 / 75.8777)
/// - `MODEL_24_PATH` / `MODEL_48_PATH` – classifier artifacts
/// - `SCALER_PATH` – fitted feature scaler (JSON)
/// - `BIND_ADDR` – listen address (default: 0.0.0.0:8080)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let db_url = require_env!("DATABASE_URL");
    let weather_api_url = env_or!("WEATHER_API_URL", "https://api.open-meteo.com/v1/forecast");
    let latitude = parse_env_f64!("LATITUDE", 11.3046);
    let longitude = parse_env_f64!("LONGITUDE", 75.8777);
    let model_24_path = env_or!("MODEL_24_PATH", "models/flood_prediction_24h.onnx");
    let model_48_path = env_or!("MODEL_48_PATH", "models/flood_prediction_48h.onnx");
    let scaler_path = env_or!("SCALER_PATH", "models/scaler.json");
    let bind_addr = env_or!("BIND_ADDR", "0.0.0.0:8080");

    Ok(Config {
        db_url,
        weather_api_url,
        latitude,
        longitude,
        model_24_path,
        model_48_path,
        scaler_path,
        bind_addr,
    })
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!("  DATABASE_URL    : {}", self.db_url);
        tracing::info!("  WEATHER_API_URL : {}", self.weather_api_url);
        tracing::info!("  LATITUDE        : {}", self.latitude);
        tracing::info!("  LONGITUDE       : {}", self.longitude);
        tracing::info!("  MODEL_24_PATH   : {}", self.model_24_path);
        tracing::info!("  MODEL_48_PATH   : {}", self.model_48_path);
        tracing::info!("  SCALER_PATH     : {}", self.scaler_path);
        tracing::info!("  BIND_ADDR       : {}", self.bind_addr);
    }
}
