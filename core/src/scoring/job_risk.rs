//! Industrial accident risk score for a job placement
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use log::info;
use serde::{Deserialize, Serialize};

use super::{clip_score, predict_or_baseline, RiskLevel};
use crate::error::{ServiceResult, ValidationError};
use crate::models::ModelRegistry;

/// Job types with a one-hot slot, in feature order
pub const JOB_TYPES: [&str; 6] = ["construction", "mining", "manufacturing", "office", "service", "other"];

/// Job types that carry the elevated base risk
pub const HIGH_RISK_JOBS: [&str; 3] = ["construction", "mining", "manufacturing"];

/// Safety equipment with a one-hot slot, in feature order
pub const SAFETY_ITEMS: [&str; 5] = ["helmet", "safety_harness", "gloves", "safety_shoes", "goggles"];

pub const JOB_RISK_FEATURE_DIMENSION: usize = 19;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkEnvironment {
    /// Working height label; only `"high"` affects the score
    pub height: Option<String>,
    pub machinery: bool,
    pub chemicals: bool,
    pub noise: bool,
}

impl WorkEnvironment {
    pub fn at_height(&self) -> bool {
        self.height.as_deref() == Some("high")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRiskRequest {
    pub job_type: String,

    #[serde(default)]
    pub work_environment: WorkEnvironment,

    #[serde(default)]
    pub safety_equipment: Vec<String>,

    #[serde(default)]
    pub experience_years: u32,
}

impl JobRiskRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.job_type.trim().is_empty() {
            return Err(ValidationError::new("job_type", format!("{:?}", self.job_type), "non-empty job type"));
        }
        Ok(())
    }

    fn is_high_risk_job(&self) -> bool {
        HIGH_RISK_JOBS.contains(&self.job_type.as_str())
    }

    fn wears(&self, item: &str) -> bool {
        self.safety_equipment.iter().any(|e| e == item)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactors {
    pub job_type_risk: f64,
    pub environment_risk: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRiskResponse {
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub risk_factors: RiskFactors,
    pub safety_recommendations: Vec<String>,
}

pub fn extract_features(request: &JobRiskRequest) -> Vec<f64> {
    let bit = |flag: bool| if flag { 1.0 } else { 0.0 };
    let env = &request.work_environment;
    let years = request.experience_years;

    let mut features = Vec::with_capacity(JOB_RISK_FEATURE_DIMENSION);
    features.extend(JOB_TYPES.iter().map(|job| bit(request.job_type == *job)));
    features.extend([
        bit(env.at_height()),
        bit(env.machinery),
        bit(env.chemicals),
        bit(env.noise),
        request.safety_equipment.len() as f64,
    ]);
    features.extend(SAFETY_ITEMS.iter().map(|item| bit(request.wears(item))));
    features.push(f64::from(years));
    features.push(match years {
        0 => 0.0,
        1..=4 => 1.0,
        _ => 2.0,
    });

    features
}

/// Rule score: job and height surcharges, equipment and experience discounts
pub fn baseline_score(request: &JobRiskRequest) -> f64 {
    let mut risk = 30.0;
    if request.is_high_risk_job() {
        risk += 30.0;
    }
    if request.work_environment.at_height() {
        risk += 20.0;
    }
    risk -= request.safety_equipment.len() as f64 * 5.0;
    risk -= f64::from(request.experience_years).min(10.0);
    clip_score(risk)
}

pub fn risk_level(score: f64) -> RiskLevel {
    if score >= 70.0 {
        RiskLevel::High
    } else if score >= 40.0 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

fn analyze_factors(request: &JobRiskRequest) -> RiskFactors {
    let env = &request.work_environment;
    let mut environment_risk = 0.0;
    if env.at_height() {
        environment_risk += 15.0;
    }
    if env.machinery {
        environment_risk += 10.0;
    }

    RiskFactors {
        job_type_risk: if request.is_high_risk_job() { 40.0 } else { 20.0 },
        environment_risk,
    }
}

fn safety_recommendations(request: &JobRiskRequest, score: f64) -> Vec<String> {
    let mut out = Vec::new();
    if score >= 70.0 {
        out.push("High risk: safety measures are mandatory".to_string());
    }
    if request.safety_equipment.len() < 3 {
        out.push("Wear additional safety equipment".to_string());
    }
    if request.work_environment.at_height() {
        out.push("Follow working-at-height safety rules".to_string());
    }
    if request.experience_years < 2 {
        out.push("Safety training is mandatory for new workers".to_string());
    }
    out
}

pub fn score(models: &ModelRegistry, request: &JobRiskRequest) -> ServiceResult<JobRiskResponse> {
    request.validate()?;

    let features = extract_features(request);
    let risk_score = predict_or_baseline(models.job_risk(), "job_risk", &features, || {
        baseline_score(request)
    })?;
    let risk_level = risk_level(risk_score);

    info!(
        "Job risk computed: job_type={}, score={:.2}, risk_level={}",
        request.job_type, risk_score, risk_level
    );

    Ok(JobRiskResponse {
        risk_score,
        risk_level,
        risk_factors: analyze_factors(request),
        safety_recommendations: safety_recommendations(request, risk_score),
    })
}
