//! Senior-worker platform scoring core
//!
//! Stateless scorers consumed by the platform's ML service:
//!
//! - [`monitoring`]: wearable sensor anomaly detection. Four independent
//!   detectors feed a fusion engine that deduplicates by (timestamp, type),
//!   scores the window and maps the score to an alert level.
//! - [`scoring`]: health, job-risk and matching scorers that fall back to a
//!   weighted rule formula whenever no trained model is registered.
//! - [`models`]: the read-only model registry injected into every scorer.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod config;
pub mod error;
pub mod models;
pub mod monitoring;
pub mod scoring;

pub use self::config::DetectionConfig;
pub use self::error::{ErrorResponse, ServiceError, ServiceResult, ValidationError};
pub use self::models::{IsolationScorer, ModelError, ModelRegistry, ScoreModel, SequenceReconstructor};
pub use self::monitoring::{
    ActivityType, AlertLevel, AnomalyDetectionEngine, AnomalyDetectionRequest,
    AnomalyDetectionResponse, AnomalyDetectionResult, DetectedAnomaly, FeatureVector, Posture,
    SensorReading, Severity,
};
pub use self::scoring::ScoringService;

/// Crate version reported by the service status endpoint
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Round to two decimals the way every score leaves the service boundary.
///
/// Halves go to the even neighbour, so 0.125 becomes 0.12.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}
