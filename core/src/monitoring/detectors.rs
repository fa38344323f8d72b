//! Independent anomaly detectors
//!
//! Each detector reads the same immutable window (plus an optional shared
//! model) and produces its own candidate anomalies. No detector sees
//! another's output, so the set can be evaluated in any order or in
//! parallel with identical results.
//!
//! # Outcome contract
//!
//! A detector returns one of three things, and the engine logs each
//! differently:
//!
//! - `Ok(Flagged(v))`: it ran; `v` may be empty.
//! - `Ok(Abstained(reason))`: a prerequisite was unmet (no model loaded,
//!   series too short). Expected, not a fault.
//! - `Err(DetectorError)`: something went wrong inside the detector.
//!
//! All three collapse to "contribute `v` or nothing" at fusion time. A
//! failing detector never aborts the request.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::fmt;

use log::trace;
use thiserror::Error;

use super::anomaly::{AnomalyKind, DetectedAnomaly, Severity};
use super::features::{
    detect_fall_with_angle, detect_outliers_statistical, extract_time_series_stats, mean_std,
    to_model_input, NORMAL_HEART_RATE, NORMAL_ISOLATION_SCORE, NORMAL_POSTURE_ANGLE,
};
use super::reading::SensorReading;
use crate::config::DetectionConfig;
use crate::models::{check_dimension, ModelError, ModelRegistry};

/// Error types for detector-internal failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DetectorError {
    #[error("Model invocation failed: {0}")]
    Model(#[from] ModelError),

    #[error("Reconstruction length mismatch: expected {expected}, got {actual}")]
    ReconstructionLength { expected: usize, actual: usize },

    #[error("Non-finite detector statistic: {0}")]
    NonFinite(f64),
}

/// Result type for detector runs
pub type DetectorResult<T> = Result<T, DetectorError>;

/// Why a detector contributed nothing without failing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbstainReason {
    /// The detector's model is not registered
    ModelNotLoaded,

    /// Not enough samples for the statistic to be meaningful
    InsufficientData { required: usize, available: usize },

    /// The window has no readings at all
    EmptyWindow,
}

impl fmt::Display for AbstainReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbstainReason::ModelNotLoaded => f.write_str("model not loaded"),
            AbstainReason::InsufficientData { required, available } => {
                write!(f, "insufficient data ({} < {})", available, required)
            }
            AbstainReason::EmptyWindow => f.write_str("empty window"),
        }
    }
}

/// Successful detector outcome
#[derive(Debug, Clone, PartialEq)]
pub enum DetectorOutcome {
    Flagged(Vec<DetectedAnomaly>),
    Abstained(AbstainReason),
}

impl DetectorOutcome {
    pub fn into_anomalies(self) -> Vec<DetectedAnomaly> {
        match self {
            DetectorOutcome::Flagged(anomalies) => anomalies,
            DetectorOutcome::Abstained(_) => Vec::new(),
        }
    }
}

/// Per-detector summary kept alongside the fused result
#[derive(Debug, Clone, PartialEq)]
pub enum DetectorReport {
    Flagged { detector: &'static str, count: usize },
    Abstained { detector: &'static str, reason: AbstainReason },
    Failed { detector: &'static str, error: DetectorError },
}

impl DetectorReport {
    pub fn detector(&self) -> &'static str {
        match self {
            DetectorReport::Flagged { detector, .. }
            | DetectorReport::Abstained { detector, .. }
            | DetectorReport::Failed { detector, .. } => detector,
        }
    }
}

/// Inputs shared by every detector for one request
#[derive(Debug, Clone, Copy)]
pub struct DetectionContext<'a> {
    pub readings: &'a [SensorReading],
    pub models: &'a ModelRegistry,
    pub config: &'a DetectionConfig,
}

/// Anomaly detector over a reading window
pub trait Detector: Send + Sync + fmt::Debug {
    /// Stable identifier used in logs and reports
    fn identifier(&self) -> &'static str;

    /// Produce candidate anomalies for the window
    fn detect(&self, ctx: &DetectionContext<'_>) -> DetectorResult<DetectorOutcome>;
}

/// Present heart rates paired with their index in the window
fn heart_rate_series(readings: &[SensorReading]) -> (Vec<usize>, Vec<f64>) {
    readings
        .iter()
        .enumerate()
        .filter_map(|(idx, r)| r.heart_rate.map(|bpm| (idx, f64::from(bpm))))
        .unzip()
}

/// Z-score outliers over the heart-rate series
#[derive(Debug, Default, Clone, Copy)]
pub struct StatisticalDetector;

impl Detector for StatisticalDetector {
    fn identifier(&self) -> &'static str {
        "statistical"
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> DetectorResult<DetectorOutcome> {
        let (positions, values) = heart_rate_series(ctx.readings);
        if values.len() < 2 {
            return Ok(DetectorOutcome::Abstained(AbstainReason::InsufficientData {
                required: 2,
                available: values.len(),
            }));
        }

        let anomalies = detect_outliers_statistical(&values, ctx.config.z_threshold)
            .into_iter()
            .map(|series_idx| {
                let reading = &ctx.readings[positions[series_idx]];
                DetectedAnomaly::new(
                    reading.timestamp,
                    AnomalyKind::HeartRateSpike,
                    values[series_idx],
                    NORMAL_HEART_RATE,
                    Severity::Medium,
                )
            })
            .collect();

        Ok(DetectorOutcome::Flagged(anomalies))
    }
}

/// Window-level Isolation-Forest decision score
#[derive(Debug, Default, Clone, Copy)]
pub struct IsolationForestDetector;

impl Detector for IsolationForestDetector {
    fn identifier(&self) -> &'static str {
        "isolation_forest"
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> DetectorResult<DetectorOutcome> {
        let Some(model) = ctx.models.isolation_forest() else {
            return Ok(DetectorOutcome::Abstained(AbstainReason::ModelNotLoaded));
        };
        let Some(last) = ctx.readings.last() else {
            return Ok(DetectorOutcome::Abstained(AbstainReason::EmptyWindow));
        };

        let vector = to_model_input(&extract_time_series_stats(ctx.readings));
        check_dimension(model.input_dimension(), vector.as_slice())?;
        let score = model.decision_score(vector.as_slice())?;
        if !score.is_finite() {
            return Err(DetectorError::NonFinite(score));
        }
        trace!("Isolation forest decision score {:.4}", score);

        if score < ctx.config.isolation_threshold {
            return Ok(DetectorOutcome::Flagged(vec![DetectedAnomaly::new(
                last.timestamp,
                AnomalyKind::IsolationForestAnomaly,
                score,
                NORMAL_ISOLATION_SCORE,
                Severity::Medium,
            )]));
        }

        Ok(DetectorOutcome::Flagged(Vec::new()))
    }
}

/// Reconstruction-error outliers from a sequence model
#[derive(Debug, Default, Clone, Copy)]
pub struct LstmDetector;

impl Detector for LstmDetector {
    fn identifier(&self) -> &'static str {
        "lstm"
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> DetectorResult<DetectorOutcome> {
        let Some(model) = ctx.models.lstm() else {
            return Ok(DetectorOutcome::Abstained(AbstainReason::ModelNotLoaded));
        };

        let (positions, values) = heart_rate_series(ctx.readings);
        if values.len() < ctx.config.lstm_min_series {
            return Ok(DetectorOutcome::Abstained(AbstainReason::InsufficientData {
                required: ctx.config.lstm_min_series,
                available: values.len(),
            }));
        }

        let reconstructed = model.reconstruct(&values)?;
        if reconstructed.len() != values.len() {
            return Err(DetectorError::ReconstructionLength {
                expected: values.len(),
                actual: reconstructed.len(),
            });
        }

        let errors: Vec<f64> = values
            .iter()
            .zip(&reconstructed)
            .map(|(v, r)| (v - r).abs())
            .collect();

        // non-empty: length checked against lstm_min_series above
        let (mean, std) = mean_std(&errors).unwrap_or((0.0, 0.0));
        let threshold = mean + ctx.config.lstm_sigma * std;
        if !threshold.is_finite() {
            return Err(DetectorError::NonFinite(threshold));
        }

        let anomalies = errors
            .iter()
            .enumerate()
            .filter(|(_, &e)| e > threshold)
            .map(|(series_idx, _)| {
                let reading = &ctx.readings[positions[series_idx]];
                DetectedAnomaly::new(
                    reading.timestamp,
                    AnomalyKind::LstmAnomaly,
                    values[series_idx],
                    NORMAL_HEART_RATE,
                    Severity::Low,
                )
            })
            .collect();

        Ok(DetectorOutcome::Flagged(anomalies))
    }
}

/// Fall and critical heart-rate rules, evaluated per reading
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleBasedDetector;

impl Detector for RuleBasedDetector {
    fn identifier(&self) -> &'static str {
        "rule_based"
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> DetectorResult<DetectorOutcome> {
        let mut anomalies = Vec::new();

        for reading in ctx.readings {
            if let Some(posture) = reading.posture.as_ref() {
                if detect_fall_with_angle(Some(posture), reading.activity, ctx.config.fall_angle) {
                    anomalies.push(DetectedAnomaly::new(
                        reading.timestamp,
                        AnomalyKind::FallDetected,
                        posture.angle,
                        NORMAL_POSTURE_ANGLE,
                        Severity::High,
                    ));
                }
            }

            if let Some(bpm) = reading.heart_rate {
                if bpm > ctx.config.critical_heart_rate {
                    anomalies.push(DetectedAnomaly::new(
                        reading.timestamp,
                        AnomalyKind::HighHeartRateCritical,
                        f64::from(bpm),
                        NORMAL_HEART_RATE,
                        Severity::High,
                    ));
                }
            }
        }

        Ok(DetectorOutcome::Flagged(anomalies))
    }
}

/// The production detector set, in evaluation order
pub fn default_detectors() -> Vec<Box<dyn Detector>> {
    vec![
        Box::new(StatisticalDetector),
        Box::new(IsolationForestDetector),
        Box::new(LstmDetector),
        Box::new(RuleBasedDetector),
    ]
}
