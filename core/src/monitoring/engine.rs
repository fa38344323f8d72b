//! Ensemble anomaly detection engine
//!
//! Holds the registered detectors, the shared read-only model registry and
//! the detection configuration. One call to [`AnomalyDetectionEngine::detect`]
//! evaluates every detector over the same window, collapses failures and
//! abstentions to empty contributions, and fuses the rest.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use rayon::prelude::*;
use thiserror::Error;

use super::anomaly::{AnomalyDetectionResponse, AnomalyDetectionResult, DetectedAnomaly};
use super::detectors::{default_detectors, DetectionContext, Detector, DetectorOutcome, DetectorReport, DetectorResult};
use super::fusion::{fuse, FusionError};
use super::reading::{AnomalyDetectionRequest, SensorReading};
use crate::config::DetectionConfig;
use crate::error::ServiceResult;
use crate::models::ModelRegistry;

/// Engine configuration errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("Detector '{0}' already registered")]
    DuplicateDetector(&'static str),
}

/// Fused result plus what each detector did
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionRun {
    pub result: AnomalyDetectionResult,
    pub reports: Vec<DetectorReport>,
}

/// Multi-detector anomaly engine
#[derive(Debug)]
pub struct AnomalyDetectionEngine {
    detectors: Vec<Box<dyn Detector>>,
    models: Arc<ModelRegistry>,
    config: DetectionConfig,
}

impl AnomalyDetectionEngine {
    /// Engine with the production detector set and default configuration
    pub fn new(models: Arc<ModelRegistry>) -> Self {
        Self::with_config(models, DetectionConfig::default())
    }

    pub fn with_config(models: Arc<ModelRegistry>, config: DetectionConfig) -> Self {
        Self {
            detectors: default_detectors(),
            models,
            config,
        }
    }

    /// Engine without detectors, for assembling a custom set
    pub fn bare(models: Arc<ModelRegistry>, config: DetectionConfig) -> Self {
        Self {
            detectors: Vec::new(),
            models,
            config,
        }
    }

    /// Register an additional detector
    pub fn register_detector<D>(&mut self, detector: D) -> Result<(), EngineError>
    where
        D: Detector + 'static,
    {
        let identifier = detector.identifier();
        if self.detectors.iter().any(|d| d.identifier() == identifier) {
            return Err(EngineError::DuplicateDetector(identifier));
        }

        self.detectors.push(Box::new(detector));
        Ok(())
    }

    pub fn detector_ids(&self) -> Vec<&'static str> {
        self.detectors.iter().map(|d| d.identifier()).collect()
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    /// Detect and fuse anomalies over one window
    pub fn detect(&self, readings: &[SensorReading]) -> Result<AnomalyDetectionResult, FusionError> {
        self.detect_with_report(readings).map(|run| run.result)
    }

    /// Like [`detect`](Self::detect), keeping per-detector reports
    pub fn detect_with_report(&self, readings: &[SensorReading]) -> Result<DetectionRun, FusionError> {
        let start_time = Instant::now();
        let ctx = DetectionContext {
            readings,
            models: &self.models,
            config: &self.config,
        };

        // collect() preserves detector order in both branches
        let outcomes: Vec<(&'static str, DetectorResult<DetectorOutcome>)> = if self.config.parallel_detectors {
            self.detectors
                .par_iter()
                .map(|detector| (detector.identifier(), detector.detect(&ctx)))
                .collect()
        } else {
            self.detectors
                .iter()
                .map(|detector| (detector.identifier(), detector.detect(&ctx)))
                .collect()
        };

        let mut candidates: Vec<DetectedAnomaly> = Vec::new();
        let mut reports = Vec::with_capacity(outcomes.len());

        for (detector, outcome) in outcomes {
            match outcome {
                Ok(DetectorOutcome::Flagged(anomalies)) => {
                    debug!("Detector '{}' flagged {} candidates", detector, anomalies.len());
                    reports.push(DetectorReport::Flagged {
                        detector,
                        count: anomalies.len(),
                    });
                    candidates.extend(anomalies);
                }
                Ok(DetectorOutcome::Abstained(reason)) => {
                    debug!("Detector '{}' abstained: {}", detector, reason);
                    reports.push(DetectorReport::Abstained { detector, reason });
                }
                Err(error) => {
                    warn!("Detector '{}' failed, contributing nothing: {}", detector, error);
                    reports.push(DetectorReport::Failed { detector, error });
                }
            }
        }

        let result = fuse(candidates, readings.len(), self.config.max_recommendations)?;

        debug!(
            "Fused {} readings into {} anomalies in {:?}",
            readings.len(),
            result.detected_anomalies.len(),
            start_time.elapsed()
        );

        Ok(DetectionRun { result, reports })
    }

    /// Validate a wire request, detect, and build the wire response
    pub fn handle(&self, request: &AnomalyDetectionRequest) -> ServiceResult<AnomalyDetectionResponse> {
        request.validate()?;

        info!(
            "Anomaly detection started: senior_profile_id={}, readings={}",
            request.senior_profile_id,
            request.sensor_readings.len()
        );

        let result = self.detect(&request.sensor_readings)?;

        info!(
            "Anomaly detection finished: senior_profile_id={}, anomalies={}, score={:.2}, alert_level={}",
            request.senior_profile_id,
            result.detected_anomalies.len(),
            result.anomaly_score,
            result.alert_level
        );

        Ok(AnomalyDetectionResponse::from_result(
            request.senior_profile_id,
            request.matching_id,
            result,
        ))
    }
}
