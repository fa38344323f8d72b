//! Service-level error taxonomy
//!
//! Detector faults never reach this layer (they collapse to an empty
//! contribution inside the ensemble). What does reach it is a rejected
//! request, a failed model prediction in one of the scorers, or a logic
//! defect in fusion. Each maps to a stable error code for the caller.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::models::ModelError;
use crate::monitoring::fusion::FusionError;

/// Field-level request validation failure
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{field}: {value} violates {constraint}")]
pub struct ValidationError {
    /// Offending field path, e.g. `sensor_readings[3].heart_rate`
    pub field: String,

    /// Rendered offending value
    pub value: String,

    /// Human-readable constraint
    pub constraint: String,
}

impl ValidationError {
    pub fn new(
        field: impl Into<String>,
        value: impl ToString,
        constraint: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            value: value.to_string(),
            constraint: constraint.into(),
        }
    }
}

/// Errors surfaced to callers of the scoring services
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("Model prediction failed: {0}")]
    ModelPrediction(#[from] ModelError),

    #[error("Anomaly fusion failed: {0}")]
    Fusion(#[from] FusionError),

    #[error("Malformed request payload: {0}")]
    Payload(String),

    #[error("Internal service error: {0}")]
    Internal(String),
}

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    /// Stable machine-readable code
    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) | ServiceError::Payload(_) => "VALIDATION_ERROR",
            ServiceError::ModelPrediction(_) => "MODEL_PREDICTION_ERROR",
            ServiceError::Fusion(_) | ServiceError::Internal(_) => "SERVICE_ERROR",
        }
    }

    /// Structured details for the error body
    fn details(&self) -> Option<Value> {
        match self {
            ServiceError::Validation(e) => Some(json!({
                "field": e.field,
                "value": e.value,
                "constraint": e.constraint,
            })),
            _ => None,
        }
    }

    /// Render into the wire error body
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error_code: self.error_code().to_string(),
            message: self.to_string(),
            details: self.details(),
        }
    }
}

/// Error body returned instead of a score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error_code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}
