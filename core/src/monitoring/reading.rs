//! Sensor reading data model and request boundary
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Maximum readings accepted in one detection request
pub const MAX_READINGS: usize = 1000;

/// Valid heart-rate range (bpm), inclusive
pub const HEART_RATE_BOUNDS: (u16, u16) = (30, 200);

/// Valid posture angle range (degrees), inclusive
pub const POSTURE_ANGLE_BOUNDS: (f64, f64) = (0.0, 180.0);

/// Activity label reported by the wearable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    #[default]
    Walking,
    Sitting,
    Standing,
    Lying,
    Moving,
}

impl ActivityType {
    /// Nominally upright activities, where a low torso angle means a fall
    pub fn is_upright(self) -> bool {
        matches!(self, ActivityType::Walking | ActivityType::Standing)
    }
}

/// Torso posture sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posture {
    /// Torso angle from horizontal, degrees
    pub angle: f64,

    /// Free-form balance state from the device
    pub balance: String,
}

/// Reading timestamps: RFC 3339, or ISO-8601 without an offset read as UTC
mod timestamp {
    use chrono::{DateTime, NaiveDateTime, ParseError, Utc};
    use serde::{de, Deserialize, Deserializer};

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    pub(super) fn parse(raw: &str) -> Result<DateTime<Utc>, ParseError> {
        let offset_err = match DateTime::parse_from_rfc3339(raw) {
            Ok(dt) => return Ok(dt.with_timezone(&Utc)),
            Err(e) => e,
        };
        NAIVE_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
            .map(|naive| naive.and_utc())
            .ok_or(offset_err)
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(|e| de::Error::custom(format!("invalid timestamp {:?}: {}", raw, e)))
    }
}

/// One timestamped observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub heart_rate: Option<u16>,

    #[serde(default)]
    pub step_count: Option<u32>,

    #[serde(default)]
    pub posture: Option<Posture>,

    #[serde(default)]
    pub activity: ActivityType,
}

impl SensorReading {
    /// Reading carrying only a timestamp and the default activity
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            heart_rate: None,
            step_count: None,
            posture: None,
            activity: ActivityType::default(),
        }
    }

    pub fn with_heart_rate(mut self, bpm: u16) -> Self {
        self.heart_rate = Some(bpm);
        self
    }

    pub fn with_steps(mut self, steps: u32) -> Self {
        self.step_count = Some(steps);
        self
    }

    pub fn with_posture(mut self, angle: f64, balance: &str) -> Self {
        self.posture = Some(Posture {
            angle,
            balance: balance.to_string(),
        });
        self
    }

    pub fn with_activity(mut self, activity: ActivityType) -> Self {
        self.activity = activity;
        self
    }

    fn validate(&self, index: usize) -> Result<(), ValidationError> {
        if let Some(bpm) = self.heart_rate {
            let (lo, hi) = HEART_RATE_BOUNDS;
            if bpm < lo || bpm > hi {
                return Err(ValidationError::new(
                    format!("sensor_readings[{}].heart_rate", index),
                    bpm,
                    format!("{}..={}", lo, hi),
                ));
            }
        }

        if let Some(posture) = &self.posture {
            let (lo, hi) = POSTURE_ANGLE_BOUNDS;
            if !(lo..=hi).contains(&posture.angle) {
                return Err(ValidationError::new(
                    format!("sensor_readings[{}].posture.angle", index),
                    posture.angle,
                    format!("{}..={}", lo, hi),
                ));
            }
        }

        Ok(())
    }
}

/// Detection request as received from the platform backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyDetectionRequest {
    pub senior_profile_id: i64,
    pub matching_id: i64,
    pub sensor_readings: Vec<SensorReading>,
}

impl AnomalyDetectionRequest {
    /// Enforce the request-boundary constraints
    pub fn validate(&self) -> Result<(), ValidationError> {
        let count = self.sensor_readings.len();
        if count == 0 || count > MAX_READINGS {
            return Err(ValidationError::new(
                "sensor_readings",
                format!("{} readings", count),
                format!("1..={} readings", MAX_READINGS),
            ));
        }

        self.sensor_readings
            .iter()
            .enumerate()
            .try_for_each(|(index, reading)| reading.validate(index))
    }
}
