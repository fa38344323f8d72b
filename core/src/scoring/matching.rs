//! Job seeker to job posting matching score
//!
//! Three component scores (skills, experience, education), each 0-100,
//! combined with caller-supplied weights. Skills are compared as sets.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::collections::BTreeSet;

use log::info;
use serde::{Deserialize, Serialize};

use super::predict_or_baseline;
use crate::error::{ServiceResult, ValidationError};
use crate::models::ModelRegistry;
use crate::round2;

pub const MATCHING_FEATURE_DIMENSION: usize = 15;

/// Score at or above which applying is recommended
pub const APPLY_THRESHOLD: f64 = 80.0;

/// Missing skills listed in the recommendation
const MAX_LISTED_SKILLS: usize = 3;

/// Ordinal rank of an education level; unknown levels rank 0
pub fn education_rank(level: &str) -> u8 {
    match level {
        "high_school" => 1,
        "bachelor" => 2,
        "master" => 3,
        "phd" => 4,
        _ => 0,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeekerProfile {
    pub skills: Vec<String>,
    pub experience: u32,
    pub education: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobPosting {
    pub required_skills: Vec<String>,
    pub required_experience: u32,
    pub education_level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingWeights {
    pub skills: f64,
    pub experience: f64,
    pub education: f64,
}

impl Default for MatchingWeights {
    fn default() -> Self {
        Self {
            skills: 0.4,
            experience: 0.3,
            education: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingRequest {
    pub job_seeker_profile: SeekerProfile,
    pub job_posting: JobPosting,

    #[serde(default)]
    pub weights: MatchingWeights,
}

impl MatchingRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let weights = [
            ("weights.skills", self.weights.skills),
            ("weights.experience", self.weights.experience),
            ("weights.education", self.weights.education),
        ];
        for (field, weight) in weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ValidationError::new(field, weight, "finite and >= 0"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub skills_match: f64,
    pub experience_match: f64,
    pub education_match: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingResponse {
    pub matching_score: f64,
    pub score_breakdown: ScoreBreakdown,
    pub recommendations: Vec<String>,
}

/// Set comparison of seeker and posting, computed once per request
struct Comparison<'a> {
    seeker_skills: BTreeSet<&'a str>,
    required_skills: BTreeSet<&'a str>,
    seeker_years: f64,
    required_years: f64,
    seeker_rank: u8,
    required_rank: u8,
}

impl<'a> Comparison<'a> {
    fn new(request: &'a MatchingRequest) -> Self {
        let seeker = &request.job_seeker_profile;
        let posting = &request.job_posting;
        Self {
            seeker_skills: seeker.skills.iter().map(String::as_str).collect(),
            required_skills: posting.required_skills.iter().map(String::as_str).collect(),
            seeker_years: f64::from(seeker.experience),
            required_years: f64::from(posting.required_experience),
            seeker_rank: education_rank(&seeker.education),
            required_rank: education_rank(&posting.education_level),
        }
    }

    fn overlap(&self) -> usize {
        self.seeker_skills.intersection(&self.required_skills).count()
    }

    /// Sorted
    fn missing_skills(&self) -> Vec<&'a str> {
        self.required_skills.difference(&self.seeker_skills).copied().collect()
    }

    fn skills_ratio(&self) -> f64 {
        if self.required_skills.is_empty() {
            1.0
        } else {
            self.overlap() as f64 / self.required_skills.len() as f64
        }
    }

    fn experience_ratio(&self) -> f64 {
        if self.required_years == 0.0 || self.seeker_years >= self.required_years {
            1.0
        } else {
            self.seeker_years / self.required_years
        }
    }

    fn education_ratio(&self) -> f64 {
        if self.seeker_rank >= self.required_rank {
            1.0
        } else {
            f64::from(self.seeker_rank) / f64::from(self.required_rank)
        }
    }

    fn breakdown(&self) -> ScoreBreakdown {
        ScoreBreakdown {
            skills_match: self.skills_ratio() * 100.0,
            experience_match: self.experience_ratio() * 100.0,
            education_match: self.education_ratio() * 100.0,
        }
    }
}

pub fn extract_features(request: &MatchingRequest) -> [f64; MATCHING_FEATURE_DIMENSION] {
    let cmp = Comparison::new(request);
    let w = &request.weights;

    [
        cmp.skills_ratio(),
        cmp.seeker_skills.len() as f64,
        cmp.required_skills.len() as f64,
        cmp.overlap() as f64,
        cmp.missing_skills().len() as f64,
        cmp.experience_ratio(),
        cmp.seeker_years,
        cmp.required_years,
        (cmp.required_years - cmp.seeker_years).max(0.0),
        cmp.education_ratio(),
        f64::from(cmp.seeker_rank),
        f64::from(cmp.required_rank),
        w.skills,
        w.experience,
        w.education,
    ]
}

/// Weighted sum of the component scores, capped at 100
pub fn baseline_score(request: &MatchingRequest) -> f64 {
    let b = Comparison::new(request).breakdown();
    let w = &request.weights;
    let total = b.skills_match * w.skills + b.experience_match * w.experience + b.education_match * w.education;
    total.min(100.0)
}

fn recommendations(request: &MatchingRequest, cmp: &Comparison<'_>, score: f64) -> Vec<String> {
    let mut out = Vec::new();

    let missing = cmp.missing_skills();
    if !missing.is_empty() {
        let listed: Vec<&str> = missing.into_iter().take(MAX_LISTED_SKILLS).collect();
        out.push(format!("Learn {} to close the skill gap", listed.join(", ")));
    }

    let seeker = request.job_seeker_profile.experience;
    let required = request.job_posting.required_experience;
    if seeker < required {
        out.push(format!("{} more year(s) of experience required", required - seeker));
    }

    if cmp.seeker_rank < cmp.required_rank {
        out.push(format!(
            "Education requirement not met ({})",
            request.job_posting.education_level
        ));
    }

    if score >= APPLY_THRESHOLD {
        out.push("High matching score: applying is recommended".to_string());
    }

    out
}

pub fn score(models: &ModelRegistry, request: &MatchingRequest) -> ServiceResult<MatchingResponse> {
    request.validate()?;

    let features = extract_features(request);
    let matching_score = predict_or_baseline(models.matching(), "matching", &features, || {
        baseline_score(request)
    })?;

    let cmp = Comparison::new(request);
    let raw = cmp.breakdown();
    let score_breakdown = ScoreBreakdown {
        skills_match: round2(raw.skills_match),
        experience_match: round2(raw.experience_match),
        education_match: round2(raw.education_match),
    };

    info!("Matching score computed: score={:.2}", matching_score);

    Ok(MatchingResponse {
        matching_score,
        score_breakdown,
        recommendations: recommendations(request, &cmp, matching_score),
    })
}
