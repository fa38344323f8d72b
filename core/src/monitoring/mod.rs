//! Wearable sensor monitoring
//!
//! Readings flow one way: [`features`] derives statistics and the frozen
//! model vector, the four [`detectors`] run independently over the same
//! immutable window, [`fusion`] merges and scores their output and
//! [`engine`] ties the stages together for one request.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod anomaly;
pub mod detectors;
pub mod engine;
pub mod features;
pub mod fusion;
pub mod reading;

pub use self::anomaly::{
    AlertLevel, AnomalyDetectionResponse, AnomalyDetectionResult, AnomalyKind, DetectedAnomaly,
    Severity,
};
pub use self::detectors::{AbstainReason, Detector, DetectorError, DetectorOutcome, DetectorReport};
pub use self::engine::AnomalyDetectionEngine;
pub use self::features::{
    detect_fall, detect_outliers_statistical, extract_time_series_stats, to_model_input,
    FeatureVector, TimeSeriesStats, FEATURE_VECTOR_VERSION,
};
pub use self::reading::{ActivityType, AnomalyDetectionRequest, Posture, SensorReading};
