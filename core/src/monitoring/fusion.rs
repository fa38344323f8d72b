//! Anomaly fusion
//!
//! Combines the candidate lists of independent detectors into one result:
//! merge by `(timestamp, kind)`, score the surviving set against the window
//! size, map the score to an alert level and collect recommendation text.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::collections::HashMap;

use thiserror::Error;

use super::anomaly::{AlertLevel, AnomalyDetectionResult, DetectedAnomaly, Severity};

/// Readings per unit of normalization in the composite score
pub const READINGS_PER_UNIT: f64 = 10.0;

/// Composite score above which the alert is critical
pub const CRITICAL_SCORE: f64 = 0.7;

/// Composite score above which the alert is at least a warning
pub const WARNING_SCORE: f64 = 0.4;

/// Fusion-stage failures. These indicate a logic defect, never bad input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FusionError {
    #[error("Composite score is not finite (raw value {raw})")]
    NonFiniteScore { raw: f64 },
}

/// Deduplicate by `(timestamp, kind)` keeping the most severe entry.
///
/// Output follows first-seen order of each key. A later candidate replaces
/// the kept one only when its severity rank is strictly higher, so equal
/// ranks keep the earlier candidate.
pub fn merge_anomalies<I>(candidates: I) -> Vec<DetectedAnomaly>
where
    I: IntoIterator<Item = DetectedAnomaly>,
{
    let mut merged: Vec<DetectedAnomaly> = Vec::new();
    let mut slots = HashMap::new();

    for candidate in candidates {
        let key = candidate.key();
        if let Some(&slot) = slots.get(&key) {
            let kept: &mut DetectedAnomaly = &mut merged[slot];
            if candidate.severity.rank() > kept.severity.rank() {
                *kept = candidate;
            }
        } else {
            slots.insert(key, merged.len());
            merged.push(candidate);
        }
    }

    merged
}

/// Severity-weighted anomaly density, clipped to [0, 1]
pub fn composite_score(anomalies: &[DetectedAnomaly], total_readings: usize) -> Result<f64, FusionError> {
    if anomalies.is_empty() {
        return Ok(0.0);
    }

    let weight: f64 = anomalies.iter().map(|a| a.severity.weight()).sum();
    let divisor = (total_readings as f64 / READINGS_PER_UNIT).max(1.0);
    let raw = weight / divisor;

    if !raw.is_finite() {
        return Err(FusionError::NonFiniteScore { raw });
    }

    Ok(raw.clamp(0.0, 1.0))
}

/// Alert level: any high-severity anomaly escalates to critical regardless of score
pub fn determine_alert_level(anomalies: &[DetectedAnomaly], score: f64) -> AlertLevel {
    if anomalies.iter().any(|a| a.severity == Severity::High) {
        AlertLevel::Critical
    } else if score > CRITICAL_SCORE {
        AlertLevel::Critical
    } else if score > WARNING_SCORE {
        AlertLevel::Warning
    } else {
        AlertLevel::Info
    }
}

/// Canned guidance per distinct anomaly kind, first appearance order, at most `cap`
pub fn generate_recommendations(anomalies: &[DetectedAnomaly], cap: usize) -> Vec<String> {
    let mut recommendations: Vec<String> = Vec::new();

    for text in anomalies.iter().filter_map(|a| a.kind.recommendation()) {
        if recommendations.len() >= cap {
            break;
        }
        if !recommendations.iter().any(|r| r == text) {
            recommendations.push(text.to_string());
        }
    }

    recommendations
}

/// Run every fusion stage over the merged candidates of one window
pub fn fuse(
    candidates: Vec<DetectedAnomaly>,
    total_readings: usize,
    max_recommendations: usize,
) -> Result<AnomalyDetectionResult, FusionError> {
    let detected_anomalies = merge_anomalies(candidates);
    if detected_anomalies.is_empty() {
        return Ok(AnomalyDetectionResult::quiet());
    }

    let anomaly_score = composite_score(&detected_anomalies, total_readings)?;
    let alert_level = determine_alert_level(&detected_anomalies, anomaly_score);
    let recommendations = generate_recommendations(&detected_anomalies, max_recommendations);

    Ok(AnomalyDetectionResult {
        anomalies_detected: true,
        anomaly_score,
        alert_level,
        detected_anomalies,
        recommendations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::anomaly::AnomalyKind;
    use approx::assert_relative_eq;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn ts(offset: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap() + Duration::minutes(offset)
    }

    fn anomaly(offset: i64, kind: AnomalyKind, severity: Severity) -> DetectedAnomaly {
        DetectedAnomaly::new(ts(offset), kind, 100.0, [60.0, 85.0], severity)
    }

    #[test]
    fn test_merge_keeps_highest_severity_in_first_seen_slot() {
        let merged = merge_anomalies(vec![
            anomaly(0, AnomalyKind::HeartRateSpike, Severity::Low),
            anomaly(1, AnomalyKind::FallDetected, Severity::High),
            anomaly(0, AnomalyKind::HeartRateSpike, Severity::High),
            anomaly(0, AnomalyKind::HeartRateSpike, Severity::Medium),
        ]);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].kind, AnomalyKind::HeartRateSpike);
        assert_eq!(merged[0].severity, Severity::High);
        assert_eq!(merged[1].kind, AnomalyKind::FallDetected);
    }

    #[test]
    fn test_merge_tie_keeps_earlier_candidate() {
        let mut first = anomaly(0, AnomalyKind::LstmAnomaly, Severity::Medium);
        first.value = 1.0;
        let mut second = first.clone();
        second.value = 2.0;

        let merged = merge_anomalies(vec![first, second]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].value, 1.0);
    }

    #[test]
    fn test_merge_distinct_kinds_at_same_timestamp_both_survive() {
        let merged = merge_anomalies(vec![
            anomaly(3, AnomalyKind::HeartRateSpike, Severity::Medium),
            anomaly(3, AnomalyKind::HighHeartRateCritical, Severity::High),
        ]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_composite_score_normalizes_by_window() {
        let one = vec![anomaly(0, AnomalyKind::HeartRateSpike, Severity::Medium)];

        assert_relative_eq!(composite_score(&one, 10).unwrap(), 0.5);
        assert_relative_eq!(composite_score(&one, 3).unwrap(), 0.5);
        assert_relative_eq!(composite_score(&one, 1000).unwrap(), 0.005);
        assert_relative_eq!(composite_score(&one, 25).unwrap(), 0.2);
        assert_eq!(composite_score(&[], 50).unwrap(), 0.0);
    }

    #[test]
    fn test_composite_score_clips_to_one() {
        let many: Vec<_> = (0..4)
            .map(|i| anomaly(i, AnomalyKind::FallDetected, Severity::High))
            .collect();
        assert_eq!(composite_score(&many, 10).unwrap(), 1.0);
    }

    #[test]
    fn test_alert_level_order() {
        let low = vec![anomaly(0, AnomalyKind::LstmAnomaly, Severity::Low)];
        let high = vec![anomaly(0, AnomalyKind::FallDetected, Severity::High)];

        assert_eq!(determine_alert_level(&high, 0.0), AlertLevel::Critical);
        assert_eq!(determine_alert_level(&low, 0.71), AlertLevel::Critical);
        assert_eq!(determine_alert_level(&low, 0.7), AlertLevel::Warning);
        assert_eq!(determine_alert_level(&low, 0.4), AlertLevel::Info);
        assert_eq!(determine_alert_level(&[], 0.0), AlertLevel::Info);
    }

    #[test]
    fn test_recommendations_dedupe_and_skip_isolation_forest() {
        let anomalies = vec![
            anomaly(0, AnomalyKind::HeartRateSpike, Severity::Medium),
            anomaly(1, AnomalyKind::IsolationForestAnomaly, Severity::Medium),
            anomaly(2, AnomalyKind::HeartRateSpike, Severity::Medium),
            anomaly(3, AnomalyKind::FallDetected, Severity::High),
        ];

        let recs = generate_recommendations(&anomalies, 5);
        assert_eq!(
            recs,
            vec![
                AnomalyKind::HeartRateSpike.recommendation().unwrap().to_string(),
                AnomalyKind::FallDetected.recommendation().unwrap().to_string(),
            ]
        );
        assert_eq!(generate_recommendations(&anomalies, 1).len(), 1);
    }

    #[test]
    fn test_fuse_empty_is_quiet() {
        assert_eq!(fuse(Vec::new(), 0, 5).unwrap(), AnomalyDetectionResult::quiet());
    }

    fn severity_strategy() -> impl Strategy<Value = Severity> {
        prop_oneof![Just(Severity::Low), Just(Severity::Medium), Just(Severity::High)]
    }

    proptest! {
        #[test]
        fn prop_score_is_clipped(
            severities in prop::collection::vec(severity_strategy(), 0..60),
            readings in 0usize..2000,
        ) {
            let anomalies: Vec<_> = severities
                .iter()
                .enumerate()
                .map(|(i, &s)| anomaly(i as i64, AnomalyKind::HeartRateSpike, s))
                .collect();
            let score = composite_score(&anomalies, readings).unwrap();
            prop_assert!((0.0..=1.0).contains(&score));
        }

        #[test]
        fn prop_score_monotone_in_added_anomalies(
            severities in prop::collection::vec(severity_strategy(), 0..30),
            extra in severity_strategy(),
            readings in 1usize..1000,
        ) {
            let mut anomalies: Vec<_> = severities
                .iter()
                .enumerate()
                .map(|(i, &s)| anomaly(i as i64, AnomalyKind::LstmAnomaly, s))
                .collect();
            let before = composite_score(&anomalies, readings).unwrap();
            anomalies.push(anomaly(-1, AnomalyKind::LstmAnomaly, extra));
            let after = composite_score(&anomalies, readings).unwrap();
            prop_assert!(after >= before);
        }

        #[test]
        fn prop_merge_leaves_unique_keys(
            keys in prop::collection::vec((0i64..5, severity_strategy()), 0..40),
        ) {
            let merged = merge_anomalies(
                keys.iter().map(|&(t, s)| anomaly(t, AnomalyKind::HeartRateSpike, s)),
            );
            let unique: HashSet<_> = merged.iter().map(|a| a.key()).collect();
            prop_assert_eq!(unique.len(), merged.len());
            for a in &merged {
                let max = keys
                    .iter()
                    .filter(|&&(t, _)| ts(t) == a.timestamp)
                    .map(|&(_, s)| s)
                    .max();
                prop_assert_eq!(Some(a.severity), max);
            }
        }
    }
}
