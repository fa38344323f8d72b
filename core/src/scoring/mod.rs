//! Request scorers and the facade the service dispatches into
//!
//! Health, job-risk and matching scores all follow one pattern: build a
//! fixed-order feature vector, ask the registered [`ScoreModel`] for a
//! prediction, and fall back to a weighted rule formula when no model is
//! registered. Anomaly detection goes through the monitoring engine.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod health;
pub mod job_risk;
pub mod matching;

use std::fmt;
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::DetectionConfig;
use crate::error::ServiceResult;
use crate::models::{check_dimension, finite, ModelRegistry, ScoreModel};
use crate::monitoring::{AnomalyDetectionEngine, AnomalyDetectionRequest, AnomalyDetectionResponse};

pub use self::health::{HealthRequest, HealthResponse};
pub use self::job_risk::{JobRiskRequest, JobRiskResponse};
pub use self::matching::{MatchingRequest, MatchingResponse};

/// Three-level risk classification shared by the health and job-risk scorers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        };
        f.write_str(name)
    }
}

/// Clip a 0-100 score
pub(crate) fn clip_score(score: f64) -> f64 {
    score.clamp(0.0, 100.0)
}

/// Model prediction when one is registered, otherwise the rule baseline
pub(crate) fn predict_or_baseline<F>(
    model: Option<&dyn ScoreModel>,
    scorer: &str,
    features: &[f64],
    baseline: F,
) -> ServiceResult<f64>
where
    F: FnOnce() -> f64,
{
    match model {
        Some(model) => {
            check_dimension(model.input_dimension(), features)?;
            let raw = model.predict(features).and_then(finite)?;
            Ok(clip_score(raw))
        }
        None => {
            debug!("No {} model registered, using baseline formula", scorer);
            Ok(baseline())
        }
    }
}

/// Entry point for every scoring operation, sharing one model registry
#[derive(Debug)]
pub struct ScoringService {
    models: Arc<ModelRegistry>,
    engine: AnomalyDetectionEngine,
}

impl ScoringService {
    pub fn new(models: Arc<ModelRegistry>) -> Self {
        Self::with_config(models, DetectionConfig::default())
    }

    pub fn with_config(models: Arc<ModelRegistry>, config: DetectionConfig) -> Self {
        let engine = AnomalyDetectionEngine::with_config(Arc::clone(&models), config);
        Self { models, engine }
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    pub fn engine(&self) -> &AnomalyDetectionEngine {
        &self.engine
    }

    pub fn detect_anomalies(&self, request: &AnomalyDetectionRequest) -> ServiceResult<AnomalyDetectionResponse> {
        self.engine.handle(request)
    }

    pub fn health_score(&self, request: &HealthRequest) -> ServiceResult<HealthResponse> {
        health::score(&self.models, request)
    }

    pub fn job_risk(&self, request: &JobRiskRequest) -> ServiceResult<JobRiskResponse> {
        job_risk::score(&self.models, request)
    }

    pub fn matching_score(&self, request: &MatchingRequest) -> ServiceResult<MatchingResponse> {
        matching::score(&self.models, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::models::{ModelError, ModelResult};

    #[derive(Debug)]
    struct Constant(f64);

    impl ScoreModel for Constant {
        fn predict(&self, _features: &[f64]) -> ModelResult<f64> {
            Ok(self.0)
        }
    }

    #[test]
    fn test_baseline_used_without_model() {
        let score = predict_or_baseline(None, "health", &[1.0], || 42.0).unwrap();
        assert_eq!(score, 42.0);
    }

    #[test]
    fn test_model_prediction_is_clipped() {
        let model = Constant(130.0);
        let score = predict_or_baseline(Some(&model), "health", &[], || 0.0).unwrap();
        assert_eq!(score, 100.0);
    }

    #[test]
    fn test_non_finite_prediction_is_model_error() {
        let model = Constant(f64::NAN);
        let err = predict_or_baseline(Some(&model), "matching", &[], || 0.0).unwrap_err();
        assert!(matches!(err, ServiceError::ModelPrediction(ModelError::NonFinite(_))));
    }

    #[derive(Debug)]
    struct Fixed19;

    impl ScoreModel for Fixed19 {
        fn predict(&self, _features: &[f64]) -> ModelResult<f64> {
            Ok(50.0)
        }

        fn input_dimension(&self) -> Option<usize> {
            Some(19)
        }
    }

    #[test]
    fn test_model_with_wrong_width_is_rejected() {
        let err = predict_or_baseline(Some(&Fixed19), "job_risk", &[0.0; 12], || 0.0).unwrap_err();
        assert!(matches!(
            err,
            ServiceError::ModelPrediction(ModelError::DimensionMismatch { expected: 19, actual: 12 })
        ));
        assert_eq!(err.error_code(), "MODEL_PREDICTION_ERROR");

        let score = predict_or_baseline(Some(&Fixed19), "job_risk", &[0.0; 19], || 0.0).unwrap();
        assert_eq!(score, 50.0);
    }

    #[test]
    fn test_facade_routes_to_registered_model() {
        let models = ModelRegistry::empty().with_job_risk_model(Arc::new(Constant(12.5)));
        let service = ScoringService::new(Arc::new(models));

        let request: JobRiskRequest = serde_json::from_value(serde_json::json!({
            "job_type": "mining"
        }))
        .unwrap();
        let response = service.job_risk(&request).unwrap();

        assert_eq!(response.risk_score, 12.5);
        assert_eq!(response.risk_level, RiskLevel::Low);
        assert_eq!(service.engine().detector_ids().len(), 4);
    }
}
