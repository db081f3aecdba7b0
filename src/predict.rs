//! Flood risk predictors.
//!
//! Two independent strategies implement the [`RiskPredictor`] capability and
//! are selected explicitly by the caller:
//!
//! - [`ModelPredictor`] feeds a 30-day rolling window of daily readings
//!   through two pretrained sequence classifiers (24h and 48h horizons);
//! - [`HeuristicPredictor`] classifies 7-hour means of humidity, rainfall
//!   and soil moisture against fixed percentile thresholds.
//!
//! Both are read-only: they compute a `(24h, 48h)` level pair and the caller
//! persists it.

use std::cmp::Ordering;
use std::fs::File;

use anyhow::Context;
use serde::Deserialize;
use thiserror::Error;
use tract_onnx::prelude::*;

use crate::models::{Reading, RiskLevel, FEATURE_COLUMNS};
use crate::Config;

// ---

/// Rolling-window length for the model-based predictor (days).
pub const MODEL_WINDOW: usize = 30;

/// Rolling-window length for the heuristic predictor (hours).
pub const HEURISTIC_WINDOW: usize = 7;

/// Checkable failure modes of a prediction run. Insufficient data is the
/// common, expected one; the rest indicate a broken artifact or feed.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error("insufficient data: have {have} rows, need {need}")]
    InsufficientData { have: usize, need: usize },

    #[error("feature matrix has {0} columns, expected {FEATURE_COLUMNS}")]
    BadFeatureShape(usize),

    #[error("scaling failed: {0}")]
    Scaling(String),

    #[error("model inference failed: {0}")]
    Inference(String),
}

/// A flood risk prediction strategy over a chronological reading window.
pub trait RiskPredictor {
    /// Number of trailing rows the strategy needs.
    fn required_rows(&self) -> usize;

    /// Compute `(24h, 48h)` risk levels from `rows` (oldest first). Refuses
    /// with [`PredictError::InsufficientData`] when too few rows exist.
    fn predict(&self, rows: &[Reading]) -> Result<(RiskLevel, RiskLevel), PredictError>;
}

// ---

/// Fitted per-feature standard scaler, the same one used at training time.
/// Stored as a small JSON artifact with parallel `mean` / `scale` arrays.
#[derive(Debug, Clone, Deserialize)]
pub struct Scaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl Scaler {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        // ---
        let file = File::open(path).with_context(|| format!("opening scaler {path}"))?;
        let scaler: Scaler =
            serde_json::from_reader(file).with_context(|| format!("parsing scaler {path}"))?;
        if scaler.mean.len() != FEATURE_COLUMNS || scaler.scale.len() != FEATURE_COLUMNS {
            anyhow::bail!(
                "scaler {path} has {}x{} parameters, expected {FEATURE_COLUMNS} per array",
                scaler.mean.len(),
                scaler.scale.len()
            );
        }
        if scaler.scale.iter().any(|s| *s == 0.0) {
            anyhow::bail!("scaler {path} has a zero scale entry");
        }
        Ok(scaler)
    }

    /// Normalize one feature row.
    pub fn transform(
        &self,
        features: &[f64; FEATURE_COLUMNS],
    ) -> Result<[f64; FEATURE_COLUMNS], PredictError> {
        // ---
        if self.mean.len() != FEATURE_COLUMNS {
            return Err(PredictError::BadFeatureShape(self.mean.len()));
        }
        let mut scaled = [0.0; FEATURE_COLUMNS];
        for (i, value) in features.iter().enumerate() {
            let scale = self.scale[i];
            if !scale.is_finite() || scale == 0.0 {
                return Err(PredictError::Scaling(format!(
                    "non-finite or zero scale for feature column {i}"
                )));
            }
            scaled[i] = (value - self.mean[i]) / scale;
        }
        Ok(scaled)
    }

    #[cfg(test)]
    fn identity() -> Self {
        // ---
        Scaler {
            mean: vec![0.0; FEATURE_COLUMNS],
            scale: vec![1.0; FEATURE_COLUMNS],
        }
    }
}

type ClassifierPlan = TypedSimplePlan<TypedModel>;

/// Pretrained artifacts, loaded once at startup and shared by reference
/// across all prediction runs.
pub struct Artifacts {
    model_24: ClassifierPlan,
    model_48: ClassifierPlan,
    scaler: Scaler,
}

impl Artifacts {
    pub fn load(config: &Config) -> anyhow::Result<Self> {
        // ---
        let model_24 = load_classifier(&config.model_24_path)?;
        let model_48 = load_classifier(&config.model_48_path)?;
        let scaler = Scaler::load(&config.scaler_path)?;
        tracing::info!(
            "Loaded classifier artifacts: {}, {}, {}",
            config.model_24_path,
            config.model_48_path,
            config.scaler_path
        );
        Ok(Self {
            model_24,
            model_48,
            scaler,
        })
    }
}

/// Load one pretrained sequence classifier, pinned to the training-time
/// input shape of one sample of `MODEL_WINDOW` timesteps.
fn load_classifier(path: &str) -> anyhow::Result<ClassifierPlan> {
    // ---
    let plan = tract_onnx::onnx()
        .model_for_path(path)
        .with_context(|| format!("loading classifier {path}"))?
        .with_input_fact(
            0,
            f32::fact([1, MODEL_WINDOW as i64, FEATURE_COLUMNS as i64]).into(),
        )?
        .into_optimized()?
        .into_runnable()?;
    Ok(plan)
}

// ---

/// Model-based strategy: scale the most recent `MODEL_WINDOW` daily rows and
/// run both horizon classifiers; the predicted level is the argmax of each
/// classifier's 3-class probability output.
pub struct ModelPredictor<'a> {
    artifacts: &'a Artifacts,
}

impl<'a> ModelPredictor<'a> {
    pub fn new(artifacts: &'a Artifacts) -> Self {
        Self { artifacts }
    }
}

impl RiskPredictor for ModelPredictor<'_> {
    fn required_rows(&self) -> usize {
        MODEL_WINDOW
    }

    fn predict(&self, rows: &[Reading]) -> Result<(RiskLevel, RiskLevel), PredictError> {
        // ---
        let scaled = scale_window(&self.artifacts.scaler, rows)?;
        let level_24 = run_classifier(&self.artifacts.model_24, &scaled)?;
        let level_48 = run_classifier(&self.artifacts.model_48, &scaled)?;
        Ok((level_24, level_48))
    }
}

/// Build the flattened, scaled `MODEL_WINDOW x FEATURE_COLUMNS` input from
/// the most recent rows, chronological, row-major.
fn scale_window(scaler: &Scaler, rows: &[Reading]) -> Result<Vec<f32>, PredictError> {
    // ---
    if rows.len() < MODEL_WINDOW {
        return Err(PredictError::InsufficientData {
            have: rows.len(),
            need: MODEL_WINDOW,
        });
    }

    let window = &rows[rows.len() - MODEL_WINDOW..];
    let mut scaled = Vec::with_capacity(MODEL_WINDOW * FEATURE_COLUMNS);
    for reading in window {
        let row = scaler.transform(&reading.features())?;
        scaled.extend(row.iter().map(|v| *v as f32));
    }
    Ok(scaled)
}

/// Feed one scaled `(1, MODEL_WINDOW, FEATURE_COLUMNS)` window through a
/// classifier and take the argmax over its class probabilities.
fn run_classifier(plan: &ClassifierPlan, scaled: &[f32]) -> Result<RiskLevel, PredictError> {
    // ---
    let input = tract_ndarray::Array3::from_shape_vec(
        (1, MODEL_WINDOW, FEATURE_COLUMNS),
        scaled.to_vec(),
    )
    .map_err(|e| PredictError::Inference(e.to_string()))?;

    let outputs = plan
        .run(tvec!(Tensor::from(input).into()))
        .map_err(|e| PredictError::Inference(e.to_string()))?;
    let probabilities = outputs[0]
        .to_array_view::<f32>()
        .map_err(|e| PredictError::Inference(e.to_string()))?;

    let class = probabilities
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(Ordering::Equal))
        .map(|(index, _)| index)
        .ok_or_else(|| PredictError::Inference("classifier emitted no probabilities".into()))?;

    RiskLevel::from_class_index(class).ok_or_else(|| {
        PredictError::Inference(format!("classifier emitted out-of-range class {class}"))
    })
}

// ---

/// One variable's ascending risk cut points: below `medium` is Low, at or
/// above `medium` is Medium, at or above `high` is High.
struct Band {
    medium: f64,
    high: f64,
}

impl Band {
    fn classify(&self, value: f64) -> RiskLevel {
        // ---
        if value >= self.high {
            RiskLevel::High
        } else if value >= self.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

// Hand-derived from historical percentiles of the station dataset.
const HUMIDITY_BAND: Band = Band {
    medium: 85.0,
    high: 95.0,
};
const RAIN_BAND: Band = Band {
    medium: 10.0,
    high: 25.0,
};
const SOIL_MOISTURE_BAND: Band = Band {
    medium: 0.25,
    high: 0.40,
};

/// Heuristic strategy: classify the 7-hour means of humidity, rainfall and
/// soil moisture independently and take the worst of the three. There is no
/// distinct trend model, so the 48h estimate equals the 24h estimate.
pub struct HeuristicPredictor;

impl RiskPredictor for HeuristicPredictor {
    fn required_rows(&self) -> usize {
        HEURISTIC_WINDOW
    }

    fn predict(&self, rows: &[Reading]) -> Result<(RiskLevel, RiskLevel), PredictError> {
        // ---
        if rows.len() < HEURISTIC_WINDOW {
            return Err(PredictError::InsufficientData {
                have: rows.len(),
                need: HEURISTIC_WINDOW,
            });
        }

        let window = &rows[rows.len() - HEURISTIC_WINDOW..];
        let n = window.len() as f64;
        let mean = |f: fn(&Reading) -> f64| window.iter().map(f).sum::<f64>() / n;

        let level = HUMIDITY_BAND
            .classify(mean(|r| r.relative_humidity))
            .max(RAIN_BAND.classify(mean(|r| r.rain)))
            .max(SOIL_MOISTURE_BAND.classify(mean(|r| r.soil_moisture)));

        Ok((level, level))
    }
}

// ---

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn window(
        n: usize,
        humidity: f64,
        rain: f64,
        soil_moisture: f64,
    ) -> Vec<Reading> {
        // ---
        let base = Utc.with_ymd_and_hms(2025, 3, 26, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| Reading {
                datetime: base + Duration::hours(i as i64),
                temperature: 25.0,
                relative_humidity: humidity,
                rain,
                surface_pressure: 1010.0,
                soil_moisture,
                water_flow: None,
                water_depth: None,
            })
            .collect()
    }

    #[test]
    fn heuristic_refuses_short_windows() {
        // ---
        let rows = window(6, 50.0, 0.0, 0.1);
        match HeuristicPredictor.predict(&rows) {
            Err(PredictError::InsufficientData { have, need }) => {
                assert_eq!(have, 6);
                assert_eq!(need, HEURISTIC_WINDOW);
            }
            other => panic!("expected insufficient data, got {other:?}"),
        }
    }

    #[test]
    fn heuristic_all_low_means_low() {
        // ---
        let rows = window(7, 50.0, 1.0, 0.1);
        let (l24, l48) = HeuristicPredictor.predict(&rows).unwrap();
        assert_eq!(l24, RiskLevel::Low);
        assert_eq!(l48, RiskLevel::Low);
    }

    #[test]
    fn heuristic_takes_the_worst_variable() {
        // ---
        // Soil moisture alone in the High band lifts the overall level to
        // High, regardless of the other two.
        let rows = window(7, 50.0, 1.0, 0.45);
        let (l24, l48) = HeuristicPredictor.predict(&rows).unwrap();
        assert_eq!(l24, RiskLevel::High);
        assert_eq!(l48, l24);

        // Rain alone at the Medium cut point
        let rows = window(7, 50.0, 10.0, 0.1);
        let (l24, _) = HeuristicPredictor.predict(&rows).unwrap();
        assert_eq!(l24, RiskLevel::Medium);
    }

    #[test]
    fn heuristic_uses_the_most_recent_rows() {
        // ---
        // Ten rows, the last seven of which are wet: the three dry leading
        // rows must not dilute the means.
        let mut rows = window(3, 40.0, 0.0, 0.05);
        rows.extend(window(7, 96.0, 30.0, 0.5));
        let (l24, _) = HeuristicPredictor.predict(&rows).unwrap();
        assert_eq!(l24, RiskLevel::High);
    }

    #[test]
    fn band_edges_are_inclusive() {
        // ---
        assert_eq!(RAIN_BAND.classify(9.99), RiskLevel::Low);
        assert_eq!(RAIN_BAND.classify(10.0), RiskLevel::Medium);
        assert_eq!(RAIN_BAND.classify(25.0), RiskLevel::High);
    }

    #[test]
    fn scaler_normalizes_per_feature() {
        // ---
        let scaler = Scaler {
            mean: vec![10.0, 0.0, 0.0, 1000.0, 0.0],
            scale: vec![5.0, 1.0, 2.0, 10.0, 1.0],
        };
        let scaled = scaler.transform(&[15.0, 3.0, 4.0, 1010.0, 0.5]).unwrap();
        assert_eq!(scaled, [1.0, 3.0, 2.0, 1.0, 0.5]);
    }

    #[test]
    fn scaler_rejects_zero_scale() {
        // ---
        let scaler = Scaler {
            mean: vec![0.0; FEATURE_COLUMNS],
            scale: vec![1.0, 1.0, 0.0, 1.0, 1.0],
        };
        assert!(matches!(
            scaler.transform(&[1.0; FEATURE_COLUMNS]),
            Err(PredictError::Scaling(_))
        ));
    }

    #[test]
    fn model_window_refuses_fewer_than_thirty_rows() {
        // ---
        let rows = window(29, 60.0, 2.0, 0.3);
        match scale_window(&Scaler::identity(), &rows) {
            Err(PredictError::InsufficientData { have, need }) => {
                assert_eq!(have, 29);
                assert_eq!(need, MODEL_WINDOW);
            }
            other => panic!("expected insufficient data, got {other:?}"),
        }
    }

    #[test]
    fn model_window_is_row_major_and_takes_the_tail() {
        // ---
        // 31 rows; the oldest must be dropped, leaving the most recent 30.
        let mut rows = window(1, 99.0, 99.0, 99.0);
        rows.extend(window(30, 60.0, 2.0, 0.3));

        let scaled = scale_window(&Scaler::identity(), &rows).unwrap();
        assert_eq!(scaled.len(), MODEL_WINDOW * FEATURE_COLUMNS);
        // First row of the window is the second input row
        assert_eq!(&scaled[..5], &[25.0, 60.0, 2.0, 1010.0, 0.3]);
    }

    #[test]
    fn identity_scaler_passes_values_through() {
        // ---
        let scaler = Scaler::identity();
        let features = [25.0, 60.0, 2.0, 1010.0, 0.3];
        assert_eq!(scaler.transform(&features).unwrap(), features);
    }
}
