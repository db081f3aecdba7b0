//! Application entry point for the flood monitoring backend service.
//!
//! This binary orchestrates the full startup sequence for the monitoring
//! pipeline API, including:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Creating the SQLite schema if it does not exist
//! - Loading the pretrained classifier and scaler artifacts (once, shared
//!   by reference for the lifetime of the process)
//! - Mounting all API routes via the `routes` gateway
//! - Binding the Axum HTTP server and serving requests
//!
//! # Environment Variables
//! - `DATABASE_URL` (**required**) – SQLite connection string
//! - `WEATHER_API_URL`, `LATITUDE`, `LONGITUDE` – weather feed settings
//! - `MODEL_24_PATH`, `MODEL_48_PATH`, `SCALER_PATH` – artifact locations
//! - `BIND_ADDR` (optional) – listen address (default: 0.0.0.0:8080)
//! - `LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `SPAN_EVENTS` (optional) – span event mode for tracing

use std::{env, io::IsTerminal, net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use axum::Router;
use dotenvy::dotenv;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

mod aggregate;
mod config;
mod db;
mod models;
mod predict;
mod routes;
mod schema;
mod weather;

pub use config::Config;

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    init_tracing();
    dotenv().ok();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    tracing::info!("Preparing database: {}", cfg.db_url);
    let mut startup_db = db::Db::connect(&cfg.db_url)
        .await
        .with_context(|| format!("Failed to open database '{}'", cfg.db_url))?;
    schema::create_schema(&mut startup_db).await?;
    drop(startup_db);

    // Artifacts load once; every prediction borrows them from here
    let artifacts = Arc::new(predict::Artifacts::load(&cfg)?);

    let addr: SocketAddr = cfg
        .bind_addr
        .parse()
        .with_context(|| format!("Invalid BIND_ADDR '{}'", cfg.bind_addr))?;

    // Build app from routes gateway
    let app: Router = routes::router(cfg, artifacts);

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// Configures [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by `RUST_LOG`, falling back to `LOG_LEVEL`
///
/// This should be called once at application startup before any logging
/// or tracing macros are invoked. It installs the subscriber globally
/// for the lifetime of the process.
fn init_tracing() {
    // ---
    let span_events = match env::var("SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    // Determine if we should use colors
    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    // Use RUST_LOG if available, otherwise fall back to LOG_LEVEL
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},sqlx::query=warn"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
