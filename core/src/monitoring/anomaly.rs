//! Anomaly records, severity ordering and the detection result
//!
//! Severity is ordered by an explicit integer rank (low < medium < high).
//! The wire names sort differently ("high" < "low" < "medium"), so no
//! comparison may ever go through the string form.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::round2;

/// Severity of one detected anomaly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Ordinal used for merge tie-breaking and escalation
    pub const fn rank(self) -> u8 {
        match self {
            Severity::Low => 0,
            Severity::Medium => 1,
            Severity::High => 2,
        }
    }

    /// Contribution to the composite anomaly score
    pub const fn weight(self) -> f64 {
        match self {
            Severity::Low => 0.2,
            Severity::Medium => 0.5,
            Severity::High => 1.0,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl Ord for Severity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl PartialOrd for Severity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert level of a whole detection request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
}

impl AlertLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            AlertLevel::Info => "info",
            AlertLevel::Warning => "warning",
            AlertLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anomaly type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    HeartRateSpike,
    IsolationForestAnomaly,
    LstmAnomaly,
    FallDetected,
    HighHeartRateCritical,
}

impl AnomalyKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            AnomalyKind::HeartRateSpike => "heart_rate_spike",
            AnomalyKind::IsolationForestAnomaly => "isolation_forest_anomaly",
            AnomalyKind::LstmAnomaly => "lstm_anomaly",
            AnomalyKind::FallDetected => "fall_detected",
            AnomalyKind::HighHeartRateCritical => "high_heart_rate_critical",
        }
    }

    /// Canned guidance for this anomaly type, if any.
    ///
    /// The Korean text is the wire contract consumed by the platform UI.
    pub const fn recommendation(self) -> Option<&'static str> {
        match self {
            AnomalyKind::FallDetected => Some("즉시 보호자 및 응급 대응이 필요합니다."),
            AnomalyKind::HighHeartRateCritical => Some("휴식 후 병원 방문을 권장합니다."),
            AnomalyKind::HeartRateSpike => Some("휴식 및 수분 섭취를 권장합니다."),
            AnomalyKind::LstmAnomaly => Some("비정상 패턴 지속 관찰이 필요합니다."),
            AnomalyKind::IsolationForestAnomaly => None,
        }
    }
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One flagged event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedAnomaly {
    pub timestamp: DateTime<Utc>,

    #[serde(rename = "type")]
    pub kind: AnomalyKind,

    /// Observed metric value
    pub value: f64,

    /// Expected `[min, max]` for the metric
    pub normal_range: [f64; 2],

    pub severity: Severity,
}

impl DetectedAnomaly {
    pub fn new(
        timestamp: DateTime<Utc>,
        kind: AnomalyKind,
        value: f64,
        normal_range: [f64; 2],
        severity: Severity,
    ) -> Self {
        Self {
            timestamp,
            kind,
            value,
            normal_range,
            severity,
        }
    }

    /// Merge key: at most one surviving anomaly per key
    pub fn key(&self) -> (DateTime<Utc>, AnomalyKind) {
        (self.timestamp, self.kind)
    }
}

/// Outcome of one detection pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyDetectionResult {
    pub anomalies_detected: bool,

    /// Composite score in [0, 1], unrounded
    pub anomaly_score: f64,

    pub alert_level: AlertLevel,

    pub detected_anomalies: Vec<DetectedAnomaly>,

    pub recommendations: Vec<String>,
}

impl AnomalyDetectionResult {
    /// Result of a window where nothing was flagged
    pub fn quiet() -> Self {
        Self {
            anomalies_detected: false,
            anomaly_score: 0.0,
            alert_level: AlertLevel::Info,
            detected_anomalies: Vec::new(),
            recommendations: Vec::new(),
        }
    }
}

/// Wire response for a detection request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyDetectionResponse {
    pub senior_profile_id: i64,
    pub matching_id: i64,
    pub anomalies_detected: bool,

    /// Composite score rounded to two decimals
    pub anomaly_score: f64,

    pub alert_level: AlertLevel,
    pub detected_anomalies: Vec<DetectedAnomaly>,
    pub recommendations: Vec<String>,
}

impl AnomalyDetectionResponse {
    pub fn from_result(senior_profile_id: i64, matching_id: i64, result: AnomalyDetectionResult) -> Self {
        Self {
            senior_profile_id,
            matching_id,
            anomalies_detected: result.anomalies_detected,
            anomaly_score: round2(result.anomaly_score),
            alert_level: result.alert_level,
            detected_anomalies: result.detected_anomalies,
            recommendations: result.recommendations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_severity_orders_by_rank_not_name() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert_eq!(
            [Severity::Medium, Severity::High, Severity::Low].iter().max(),
            Some(&Severity::High)
        );
        // lexical order would put "high" first
        assert!(Severity::High.as_str() < Severity::Low.as_str());
        assert!(Severity::High > Severity::Low);
    }

    #[test]
    fn test_anomaly_wire_format() {
        let anomaly = DetectedAnomaly::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 10, 15, 0).unwrap(),
            AnomalyKind::HeartRateSpike,
            95.0,
            [60.0, 85.0],
            Severity::Medium,
        );
        let value = serde_json::to_value(&anomaly).unwrap();

        assert_eq!(value["type"], "heart_rate_spike");
        assert_eq!(value["severity"], "medium");
        assert_eq!(value["timestamp"], "2025-01-01T10:15:00Z");
        assert_eq!(value["normal_range"], serde_json::json!([60.0, 85.0]));
    }

    #[test]
    fn test_response_rounds_score() {
        let mut result = AnomalyDetectionResult::quiet();
        result.anomaly_score = 0.456_78;
        let response = AnomalyDetectionResponse::from_result(7, 9, result);

        assert_eq!(response.anomaly_score, 0.46);
        assert_eq!(response.senior_profile_id, 7);
        assert_eq!(serde_json::to_value(&response).unwrap()["alert_level"], "info");
    }

    #[test]
    fn test_isolation_forest_has_no_canned_recommendation() {
        assert!(AnomalyKind::IsolationForestAnomaly.recommendation().is_none());
        assert_eq!(
            AnomalyKind::FallDetected.recommendation(),
            Some("즉시 보호자 및 응급 대응이 필요합니다.")
        );
        assert_eq!(
            AnomalyKind::HeartRateSpike.recommendation(),
            Some("휴식 및 수분 섭취를 권장합니다.")
        );
    }
}
