//! Health score
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use log::info;
use serde::{Deserialize, Serialize};

use super::{clip_score, predict_or_baseline, RiskLevel};
use crate::error::{ServiceResult, ValidationError};
use crate::models::ModelRegistry;

/// Oldest accepted age
pub const MAX_AGE: u32 = 120;

/// Conditions with a dedicated one-hot slot in the feature vector
pub const MAJOR_CONDITIONS: [&str; 4] = ["diabetes", "hypertension", "heart_disease", "cancer"];

/// Length of the health feature vector
pub const HEALTH_FEATURE_DIMENSION: usize = 12;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifestyleFactors {
    pub smoking: bool,
    pub exercise: bool,
    pub exercise_hours_per_week: f64,
    pub alcohol_consumption: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRequest {
    pub age: u32,

    /// `M` or `F`
    pub gender: String,

    #[serde(default)]
    pub health_conditions: Vec<String>,

    #[serde(default)]
    pub lifestyle_factors: LifestyleFactors,
}

impl HealthRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.age > MAX_AGE {
            return Err(ValidationError::new("age", self.age, format!("0..={}", MAX_AGE)));
        }
        if self.gender != "M" && self.gender != "F" {
            return Err(ValidationError::new("gender", &self.gender, "one of M, F"));
        }
        Ok(())
    }

    fn age_group(&self) -> f64 {
        match self.age {
            a if a < 30 => 0.0,
            a if a < 50 => 1.0,
            _ => 2.0,
        }
    }

    fn has_condition(&self, condition: &str) -> bool {
        self.health_conditions.iter().any(|c| c == condition)
    }
}

/// Signed contribution of each factor to the score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthFactors {
    pub age_impact: f64,
    pub health_conditions_impact: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub score: f64,
    pub risk_level: RiskLevel,
    pub factors: HealthFactors,
    pub recommendations: Vec<String>,
}

pub fn extract_features(request: &HealthRequest) -> [f64; HEALTH_FEATURE_DIMENSION] {
    let bit = |flag: bool| if flag { 1.0 } else { 0.0 };
    let lifestyle = &request.lifestyle_factors;

    [
        f64::from(request.age),
        bit(request.gender == "M"),
        request.health_conditions.len() as f64,
        bit(request.has_condition(MAJOR_CONDITIONS[0])),
        bit(request.has_condition(MAJOR_CONDITIONS[1])),
        bit(request.has_condition(MAJOR_CONDITIONS[2])),
        bit(request.has_condition(MAJOR_CONDITIONS[3])),
        bit(lifestyle.smoking),
        bit(lifestyle.exercise),
        lifestyle.exercise_hours_per_week,
        lifestyle.alcohol_consumption,
        request.age_group(),
    ]
}

/// Rule score: age penalty past 30 plus ten points per condition
pub fn baseline_score(request: &HealthRequest) -> f64 {
    let age_penalty = ((f64::from(request.age) - 30.0) * 0.5).max(0.0);
    let condition_penalty = request.health_conditions.len() as f64 * 10.0;
    clip_score(100.0 - age_penalty - condition_penalty)
}

pub fn risk_level(score: f64) -> RiskLevel {
    if score >= 80.0 {
        RiskLevel::Low
    } else if score >= 60.0 {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    }
}

fn analyze_factors(request: &HealthRequest) -> HealthFactors {
    let age_impact = if request.age > 50 {
        -5.0
    } else if request.age < 30 {
        5.0
    } else {
        0.0
    };

    HealthFactors {
        age_impact,
        health_conditions_impact: -(request.health_conditions.len() as f64) * 5.0,
    }
}

fn recommendations(request: &HealthRequest, score: f64) -> Vec<String> {
    let mut out = Vec::new();
    if score < 60.0 {
        out.push("Schedule regular health check-ups".to_string());
        out.push("Improve daily lifestyle habits".to_string());
    }
    if !request.health_conditions.is_empty() {
        out.push("Keep existing health conditions under management".to_string());
    }
    if request.age > 50 {
        out.push("Follow age-appropriate health care".to_string());
    }
    out
}

pub fn score(models: &ModelRegistry, request: &HealthRequest) -> ServiceResult<HealthResponse> {
    request.validate()?;

    let features = extract_features(request);
    let score = predict_or_baseline(models.health(), "health", &features, || baseline_score(request))?;
    let risk_level = risk_level(score);

    info!("Health score computed: score={:.2}, risk_level={}", score, risk_level);

    Ok(HealthResponse {
        score,
        risk_level,
        factors: analyze_factors(request),
        recommendations: recommendations(request, score),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use approx::assert_relative_eq;

    fn request(age: u32, conditions: &[&str]) -> HealthRequest {
        HealthRequest {
            age,
            gender: "M".to_string(),
            health_conditions: conditions.iter().map(|c| c.to_string()).collect(),
            lifestyle_factors: LifestyleFactors::default(),
        }
    }

    #[test]
    fn test_feature_vector_layout() {
        let mut req = request(45, &["diabetes", "hypertension"]);
        req.lifestyle_factors.exercise = true;
        req.lifestyle_factors.exercise_hours_per_week = 3.5;

        let features = extract_features(&req);
        assert_eq!(
            features,
            [45.0, 1.0, 2.0, 1.0, 1.0, 0.0, 0.0, 0.0, 1.0, 3.5, 0.0, 1.0]
        );
    }

    #[test]
    fn test_baseline_score() {
        assert_relative_eq!(baseline_score(&request(25, &[])), 100.0);
        assert_relative_eq!(baseline_score(&request(45, &["diabetes", "hypertension"])), 72.5);
        assert_relative_eq!(baseline_score(&request(120, &["a", "b", "c", "d", "e", "f"])), 0.0);
    }

    #[test]
    fn test_risk_level_boundaries() {
        assert_eq!(risk_level(80.0), RiskLevel::Low);
        assert_eq!(risk_level(79.9), RiskLevel::Medium);
        assert_eq!(risk_level(60.0), RiskLevel::Medium);
        assert_eq!(risk_level(59.9), RiskLevel::High);
    }

    #[test]
    fn test_score_without_model() {
        let response = score(&ModelRegistry::empty(), &request(70, &["cancer", "diabetes"])).unwrap();

        assert_relative_eq!(response.score, 60.0);
        assert_eq!(response.risk_level, RiskLevel::Medium);
        assert_eq!(response.factors.age_impact, -5.0);
        assert_eq!(response.factors.health_conditions_impact, -10.0);
        assert_eq!(
            response.recommendations,
            vec![
                "Keep existing health conditions under management",
                "Follow age-appropriate health care",
            ]
        );
    }

    #[test]
    fn test_low_score_recommends_checkups() {
        let response = score(&ModelRegistry::empty(), &request(40, &["a", "b", "c", "d"])).unwrap();
        assert_eq!(response.risk_level, RiskLevel::High);
        assert_eq!(response.recommendations[0], "Schedule regular health check-ups");
        assert_eq!(response.recommendations.len(), 3);
    }

    #[test]
    fn test_validation() {
        let mut req = request(121, &[]);
        assert!(matches!(
            score(&ModelRegistry::empty(), &req),
            Err(ServiceError::Validation(_))
        ));

        req.age = 60;
        req.gender = "X".to_string();
        assert_eq!(req.validate().unwrap_err().field, "gender");
    }

    #[test]
    fn test_wire_defaults() {
        let req: HealthRequest = serde_json::from_str(r#"{"age": 33, "gender": "F"}"#).unwrap();
        assert!(req.health_conditions.is_empty());
        assert!(!req.lifestyle_factors.smoking);
        assert_eq!(extract_features(&req)[1], 0.0);
    }
}
