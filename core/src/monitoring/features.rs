//! Sensor window feature extraction
//!
//! Two products are derived from one reading window:
//!
//! 1. [`TimeSeriesStats`], aggregate statistics with an explicit optional
//!    field per quantity (absent when no reading carries the input).
//! 2. [`FeatureVector`], the fixed 10-element input of the window models:
//!
//! ```text
//! [hr_mean, hr_std, hr_max, hr_min, hr_trend, step_rate,
//!  activity_walking, activity_sitting, activity_lying, activity_standing]
//! ```
//!
//! The vector order is a binding contract with every persisted model.
//! Changing it requires bumping [`FEATURE_VECTOR_VERSION`].
//!
//! Standard deviations are population (ddof = 0) throughout.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use serde::{Deserialize, Serialize};

use super::reading::{ActivityType, Posture, SensorReading};
use crate::config::DEFAULT_FALL_ANGLE;

/// Version of the model-input layout
pub const FEATURE_VECTOR_VERSION: u32 = 1;

/// Model-input dimensionality
pub const FEATURE_DIMENSION: usize = 10;

/// Names of the model-input slots, in order
pub const FEATURE_NAMES: [&str; FEATURE_DIMENSION] = [
    "hr_mean",
    "hr_std",
    "hr_max",
    "hr_min",
    "hr_trend",
    "step_rate",
    "activity_walking",
    "activity_sitting",
    "activity_lying",
    "activity_standing",
];

/// Expected heart-rate range (bpm)
pub const NORMAL_HEART_RATE: [f64; 2] = [60.0, 85.0];

/// Expected upright torso angle range (degrees)
pub const NORMAL_POSTURE_ANGLE: [f64; 2] = [80.0, 100.0];

/// Expected Isolation-Forest decision score range
pub const NORMAL_ISOLATION_SCORE: [f64; 2] = [-0.5, 1.0];

/// Share of the window spent in each activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityRatios {
    pub walking: f64,
    pub sitting: f64,
    pub standing: f64,
    pub lying: f64,
    pub moving: f64,
}

/// Aggregate statistics of a reading window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesStats {
    pub hr_mean: Option<f64>,
    pub hr_std: Option<f64>,
    pub hr_max: Option<f64>,
    pub hr_min: Option<f64>,

    /// Last heart rate minus first heart rate, in input order
    pub hr_trend: Option<f64>,

    pub step_mean: Option<f64>,
    pub step_std: Option<f64>,

    /// Mean step count over readings that report one
    pub step_rate: Option<f64>,

    /// Absent only for an empty window
    pub activity: Option<ActivityRatios>,
}

impl TimeSeriesStats {
    /// True when nothing could be computed
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Fixed-order model input
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(pub [f64; FEATURE_DIMENSION]);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Value of a named slot
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|&n| n == name)
            .map(|idx| self.0[idx])
    }
}

/// Population mean and standard deviation; `None` for an empty slice
pub(crate) fn mean_std(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / n;

    Some((mean, variance.sqrt()))
}

/// Derive aggregate statistics from a reading window
pub fn extract_time_series_stats(readings: &[SensorReading]) -> TimeSeriesStats {
    if readings.is_empty() {
        return TimeSeriesStats::default();
    }

    let mut stats = TimeSeriesStats::default();

    let heart_rates: Vec<f64> = readings
        .iter()
        .filter_map(|r| r.heart_rate)
        .map(f64::from)
        .collect();

    if let Some((mean, std)) = mean_std(&heart_rates) {
        stats.hr_mean = Some(mean);
        stats.hr_std = Some(std);
        stats.hr_max = heart_rates.iter().copied().reduce(f64::max);
        stats.hr_min = heart_rates.iter().copied().reduce(f64::min);
        stats.hr_trend = Some(heart_rates[heart_rates.len() - 1] - heart_rates[0]);
    }

    let steps: Vec<f64> = readings
        .iter()
        .filter_map(|r| r.step_count)
        .map(f64::from)
        .collect();

    if let Some((mean, std)) = mean_std(&steps) {
        stats.step_mean = Some(mean);
        stats.step_std = Some(std);
        stats.step_rate = Some(mean);
    }

    // every reading carries an activity (walking when unreported)
    let total = readings.len() as f64;
    let ratio = |activity: ActivityType| {
        readings.iter().filter(|r| r.activity == activity).count() as f64 / total
    };
    stats.activity = Some(ActivityRatios {
        walking: ratio(ActivityType::Walking),
        sitting: ratio(ActivityType::Sitting),
        standing: ratio(ActivityType::Standing),
        lying: ratio(ActivityType::Lying),
        moving: ratio(ActivityType::Moving),
    });

    stats
}

/// Map statistics onto the frozen model-input order, 0.0 for absent values
pub fn to_model_input(stats: &TimeSeriesStats) -> FeatureVector {
    let activity = stats.activity.unwrap_or_default();

    FeatureVector([
        stats.hr_mean.unwrap_or(0.0),
        stats.hr_std.unwrap_or(0.0),
        stats.hr_max.unwrap_or(0.0),
        stats.hr_min.unwrap_or(0.0),
        stats.hr_trend.unwrap_or(0.0),
        stats.step_rate.unwrap_or(0.0),
        activity.walking,
        activity.sitting,
        activity.lying,
        activity.standing,
    ])
}

/// Indices whose absolute z-score exceeds `threshold`.
///
/// Empty for fewer than two values (z-score undefined) and for a
/// zero-variance series (no outliers by definition).
pub fn detect_outliers_statistical(values: &[f64], threshold: f64) -> Vec<usize> {
    if values.len() < 2 {
        return Vec::new();
    }

    // a constant series can still pick up rounding noise in its std
    if values.iter().all(|&x| x == values[0]) {
        return Vec::new();
    }

    let Some((mean, std)) = mean_std(values) else {
        return Vec::new();
    };
    if std == 0.0 || !std.is_finite() {
        return Vec::new();
    }

    values
        .iter()
        .enumerate()
        .filter(|(_, &x)| ((x - mean) / std).abs() > threshold)
        .map(|(idx, _)| idx)
        .collect()
}

/// Fall check with an explicit angle limit
pub fn detect_fall_with_angle(posture: Option<&Posture>, activity: ActivityType, max_angle: f64) -> bool {
    match posture {
        Some(p) => p.angle < max_angle && activity.is_upright(),
        None => false,
    }
}

/// A low torso angle is a fall only while the subject is nominally upright
pub fn detect_fall(posture: Option<&Posture>, activity: ActivityType) -> bool {
    detect_fall_with_angle(posture, activity, DEFAULT_FALL_ANGLE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_Z_THRESHOLD;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;

    fn window(heart_rates: &[Option<u16>]) -> Vec<SensorReading> {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
        heart_rates
            .iter()
            .enumerate()
            .map(|(i, hr)| {
                let mut r = SensorReading::at(start + Duration::minutes(i as i64));
                r.heart_rate = *hr;
                r
            })
            .collect()
    }

    fn posture(angle: f64) -> Posture {
        Posture {
            angle,
            balance: "normal".to_string(),
        }
    }

    #[test]
    fn test_empty_window_yields_empty_stats() {
        let stats = extract_time_series_stats(&[]);
        assert!(stats.is_empty());
        assert_eq!(to_model_input(&stats).0, [0.0; FEATURE_DIMENSION]);
    }

    #[test]
    fn test_heart_rate_statistics() {
        let readings = window(&[Some(70), None, Some(80), Some(90)]);
        let stats = extract_time_series_stats(&readings);

        assert_relative_eq!(stats.hr_mean.unwrap(), 80.0);
        assert_relative_eq!(stats.hr_std.unwrap(), (200.0f64 / 3.0).sqrt(), epsilon = 1e-12);
        assert_eq!(stats.hr_max, Some(90.0));
        assert_eq!(stats.hr_min, Some(70.0));
        assert_eq!(stats.hr_trend, Some(20.0));
        assert!(stats.step_rate.is_none());
    }

    #[test]
    fn test_trend_follows_input_order_not_slope() {
        let readings = window(&[Some(100), Some(60), Some(140), Some(90)]);
        let stats = extract_time_series_stats(&readings);
        assert_eq!(stats.hr_trend, Some(-10.0));
    }

    #[test]
    fn test_step_and_activity_features() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
        let readings = vec![
            SensorReading::at(start).with_steps(100),
            SensorReading::at(start).with_steps(300).with_activity(ActivityType::Sitting),
            SensorReading::at(start).with_activity(ActivityType::Lying),
            SensorReading::at(start).with_activity(ActivityType::Moving),
        ];
        let stats = extract_time_series_stats(&readings);

        assert_eq!(stats.step_rate, Some(200.0));
        assert_eq!(stats.step_mean, Some(200.0));
        assert_eq!(stats.step_std, Some(100.0));

        let vector = to_model_input(&stats);
        assert_eq!(vector.get("step_rate"), Some(200.0));
        assert_eq!(vector.get("activity_walking"), Some(0.25));
        assert_eq!(vector.get("activity_sitting"), Some(0.25));
        assert_eq!(vector.get("activity_lying"), Some(0.25));
        assert_eq!(vector.get("activity_standing"), Some(0.0));
        assert_eq!(stats.activity.unwrap().moving, 0.25);
    }

    #[test]
    fn test_model_input_order_is_frozen() {
        let stats = TimeSeriesStats {
            hr_mean: Some(1.0),
            hr_std: Some(2.0),
            hr_max: Some(3.0),
            hr_min: Some(4.0),
            hr_trend: Some(5.0),
            step_mean: Some(99.0),
            step_std: Some(99.0),
            step_rate: Some(6.0),
            activity: Some(ActivityRatios {
                walking: 7.0,
                sitting: 8.0,
                standing: 10.0,
                lying: 9.0,
                moving: 99.0,
            }),
        };
        let vector = to_model_input(&stats);

        assert_eq!(vector.0, [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]);
        assert_eq!(FEATURE_NAMES[5], "step_rate");
    }

    #[test]
    fn test_outlier_detection_flags_spike() {
        let mut values = vec![75.0; 15];
        values[7] = 200.0;
        assert_eq!(detect_outliers_statistical(&values, DEFAULT_Z_THRESHOLD), vec![7]);
    }

    #[test]
    fn test_outlier_detection_guards() {
        assert!(detect_outliers_statistical(&[], DEFAULT_Z_THRESHOLD).is_empty());
        assert!(detect_outliers_statistical(&[180.0], DEFAULT_Z_THRESHOLD).is_empty());
        assert!(detect_outliers_statistical(&[72.0; 20], 0.0).is_empty());
    }

    #[test]
    fn test_fall_detection_rules() {
        assert!(detect_fall(Some(&posture(30.0)), ActivityType::Walking));
        assert!(detect_fall(Some(&posture(44.9)), ActivityType::Standing));
        assert!(!detect_fall(Some(&posture(45.0)), ActivityType::Walking));
        assert!(!detect_fall(Some(&posture(10.0)), ActivityType::Lying));
        assert!(!detect_fall(Some(&posture(10.0)), ActivityType::Sitting));
        assert!(!detect_fall(Some(&posture(10.0)), ActivityType::Moving));
        assert!(!detect_fall(None, ActivityType::Walking));
    }

    proptest! {
        #[test]
        fn prop_model_input_always_ten_finite_values(
            hrs in proptest::collection::vec(proptest::option::of(30u16..=200), 0..64)
        ) {
            let stats = extract_time_series_stats(&window(&hrs));
            let vector = to_model_input(&stats);
            prop_assert_eq!(vector.as_slice().len(), FEATURE_DIMENSION);
            prop_assert!(vector.as_slice().iter().all(|v| v.is_finite()));
        }

        #[test]
        fn prop_constant_series_has_no_outliers(
            value in -1000.0f64..1000.0,
            len in 0usize..50,
            threshold in 0.0f64..10.0,
        ) {
            prop_assert!(detect_outliers_statistical(&vec![value; len], threshold).is_empty());
        }

        #[test]
        fn prop_fewer_than_two_values_have_no_outliers(
            values in proptest::collection::vec(-1e6f64..1e6, 0..2),
            threshold in 0.0f64..10.0,
        ) {
            prop_assert!(detect_outliers_statistical(&values, threshold).is_empty());
        }

        #[test]
        fn prop_fall_iff_low_angle_and_upright(angle in 0.0f64..=180.0, idx in 0usize..5) {
            let activity = [
                ActivityType::Walking,
                ActivityType::Sitting,
                ActivityType::Standing,
                ActivityType::Lying,
                ActivityType::Moving,
            ][idx];
            let expected = angle < 45.0
                && matches!(activity, ActivityType::Walking | ActivityType::Standing);
            prop_assert_eq!(detect_fall(Some(&posture(angle)), activity), expected);
        }
    }
}
