//! Read-only model registry
//!
//! Trained models are external collaborators: something outside this crate
//! loads them once at process start and hands them over as trait objects.
//! The registry is then shared (`Arc<ModelRegistry>`) across concurrent
//! requests and never mutated again. A missing model is the expected state
//! in most deployments and every consumer treats it as "abstain" or "use
//! the baseline formula", never as a fault.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::fmt;
use std::sync::Arc;

use log::{info, warn};
use thiserror::Error;

/// Errors raised while invoking a loaded model
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("Prediction failed: {0}")]
    PredictionFailed(String),

    #[error("Input dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Model produced a non-finite value: {0}")]
    NonFinite(f64),
}

/// Result type for model invocations
pub type ModelResult<T> = Result<T, ModelError>;

/// Isolation-Forest-like scorer over one feature vector.
///
/// Follows the decision-function convention: lower is more anomalous,
/// negative values are outliers.
pub trait IsolationScorer: Send + Sync + fmt::Debug {
    fn decision_score(&self, features: &[f64]) -> ModelResult<f64>;

    /// Feature width the model was trained on, when it is fixed
    fn input_dimension(&self) -> Option<usize> {
        None
    }
}

/// Sequence model that reconstructs a numeric series point by point
pub trait SequenceReconstructor: Send + Sync + fmt::Debug {
    /// Must return exactly one value per input value
    fn reconstruct(&self, series: &[f64]) -> ModelResult<Vec<f64>>;
}

/// Regression model predicting a score from a fixed-order feature vector
pub trait ScoreModel: Send + Sync + fmt::Debug {
    fn predict(&self, features: &[f64]) -> ModelResult<f64>;

    fn input_dimension(&self) -> Option<usize> {
        None
    }
}

/// Process-wide model handles, each optional
#[derive(Clone, Default)]
pub struct ModelRegistry {
    isolation_forest: Option<Arc<dyn IsolationScorer>>,
    lstm: Option<Arc<dyn SequenceReconstructor>>,
    health: Option<Arc<dyn ScoreModel>>,
    job_risk: Option<Arc<dyn ScoreModel>>,
    matching: Option<Arc<dyn ScoreModel>>,
}

impl ModelRegistry {
    /// Registry with every model absent
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_isolation_forest(mut self, model: Arc<dyn IsolationScorer>) -> Self {
        self.isolation_forest = Some(model);
        self
    }

    pub fn with_lstm(mut self, model: Arc<dyn SequenceReconstructor>) -> Self {
        self.lstm = Some(model);
        self
    }

    pub fn with_health_model(mut self, model: Arc<dyn ScoreModel>) -> Self {
        self.health = Some(model);
        self
    }

    pub fn with_job_risk_model(mut self, model: Arc<dyn ScoreModel>) -> Self {
        self.job_risk = Some(model);
        self
    }

    pub fn with_matching_model(mut self, model: Arc<dyn ScoreModel>) -> Self {
        self.matching = Some(model);
        self
    }

    pub fn isolation_forest(&self) -> Option<&dyn IsolationScorer> {
        self.isolation_forest.as_deref()
    }

    pub fn lstm(&self) -> Option<&dyn SequenceReconstructor> {
        self.lstm.as_deref()
    }

    pub fn health(&self) -> Option<&dyn ScoreModel> {
        self.health.as_deref()
    }

    pub fn job_risk(&self) -> Option<&dyn ScoreModel> {
        self.job_risk.as_deref()
    }

    pub fn matching(&self) -> Option<&dyn ScoreModel> {
        self.matching.as_deref()
    }

    /// Names of the registered models, in a fixed order
    pub fn loaded(&self) -> Vec<&'static str> {
        [
            ("isolation_forest", self.isolation_forest.is_some()),
            ("lstm", self.lstm.is_some()),
            ("health", self.health.is_some()),
            ("job_risk", self.job_risk.is_some()),
            ("matching", self.matching.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, present)| present.then_some(name))
        .collect()
    }

    /// Log which models are present at startup
    pub fn log_inventory(&self) {
        let loaded = self.loaded();
        for name in ["isolation_forest", "lstm", "health", "job_risk", "matching"] {
            if !loaded.contains(&name) {
                warn!("Model '{}' not loaded; dependent scorer will abstain or use its baseline", name);
            }
        }
        info!("Model registry ready: {} of 5 models loaded", loaded.len());
    }
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("loaded", &self.loaded())
            .finish()
    }
}

/// Reject non-finite model output before it reaches scoring arithmetic
pub(crate) fn finite(value: f64) -> ModelResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ModelError::NonFinite(value))
    }
}

/// Reject a feature vector the model was not trained on
pub(crate) fn check_dimension(expected: Option<usize>, features: &[f64]) -> ModelResult<()> {
    match expected {
        Some(expected) if expected != features.len() => Err(ModelError::DimensionMismatch {
            expected,
            actual: features.len(),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct ConstantScore(f64);

    impl ScoreModel for ConstantScore {
        fn predict(&self, _features: &[f64]) -> ModelResult<f64> {
            Ok(self.0)
        }
    }

    #[test]
    fn test_empty_registry() {
        let registry = ModelRegistry::empty();
        assert!(registry.isolation_forest().is_none());
        assert!(registry.lstm().is_none());
        assert!(registry.loaded().is_empty());
    }

    #[test]
    fn test_builder_registers_models() {
        let registry = ModelRegistry::empty()
            .with_health_model(Arc::new(ConstantScore(88.0)))
            .with_matching_model(Arc::new(ConstantScore(70.0)));

        assert_eq!(registry.loaded(), vec!["health", "matching"]);
        assert_eq!(registry.health().unwrap().predict(&[]).unwrap(), 88.0);
        assert!(format!("{:?}", registry).contains("health"));
    }

    #[test]
    fn test_finite_guard() {
        assert_eq!(finite(1.5), Ok(1.5));
        assert!(matches!(finite(f64::INFINITY), Err(ModelError::NonFinite(_))));
    }

    #[test]
    fn test_dimension_check() {
        assert!(check_dimension(None, &[1.0, 2.0]).is_ok());
        assert!(check_dimension(Some(2), &[1.0, 2.0]).is_ok());
        assert_eq!(
            check_dimension(Some(10), &[1.0; 19]),
            Err(ModelError::DimensionMismatch {
                expected: 10,
                actual: 19
            })
        );
    }
}
