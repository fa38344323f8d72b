//! Detection tuning parameters
//!
//! Every constant the anomaly ensemble depends on lives here so that a
//! deployment can override it without touching detector code. The defaults
//! reproduce the production thresholds.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use serde::{Deserialize, Serialize};

/// Z-score above which a heart-rate sample is a statistical outlier
pub const DEFAULT_Z_THRESHOLD: f64 = 3.0;

/// Isolation-Forest decision score below which the window is anomalous.
/// Chosen empirically, not derived from training data.
pub const DEFAULT_ISOLATION_THRESHOLD: f64 = -0.5;

/// Minimum heart-rate series length for reconstruction scoring
pub const DEFAULT_LSTM_MIN_SERIES: usize = 10;

/// Standard deviations above mean reconstruction error that flag a sample
pub const DEFAULT_LSTM_SIGMA: f64 = 2.0;

/// Heart rate (bpm) strictly above which a reading is critical
pub const DEFAULT_CRITICAL_HEART_RATE: u16 = 150;

/// Torso angle (degrees) strictly below which an upright subject has fallen
pub const DEFAULT_FALL_ANGLE: f64 = 45.0;

/// Maximum number of recommendation strings in a response
pub const DEFAULT_MAX_RECOMMENDATIONS: usize = 5;

/// Configuration of the anomaly detection ensemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Z-score threshold for the statistical detector
    pub z_threshold: f64,

    /// Decision-score threshold for the Isolation-Forest detector
    pub isolation_threshold: f64,

    /// Minimum series length before the reconstruction detector runs
    pub lstm_min_series: usize,

    /// Sigma multiplier of the reconstruction-error threshold
    pub lstm_sigma: f64,

    /// Critical heart-rate limit for the rule detector
    pub critical_heart_rate: u16,

    /// Fall angle limit for the rule detector
    pub fall_angle: f64,

    /// Recommendation cap
    pub max_recommendations: usize,

    /// Evaluate detectors on the rayon pool instead of sequentially
    pub parallel_detectors: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            z_threshold: DEFAULT_Z_THRESHOLD,
            isolation_threshold: DEFAULT_ISOLATION_THRESHOLD,
            lstm_min_series: DEFAULT_LSTM_MIN_SERIES,
            lstm_sigma: DEFAULT_LSTM_SIGMA,
            critical_heart_rate: DEFAULT_CRITICAL_HEART_RATE,
            fall_angle: DEFAULT_FALL_ANGLE,
            max_recommendations: DEFAULT_MAX_RECOMMENDATIONS,
            parallel_detectors: true,
        }
    }
}

impl DetectionConfig {
    /// Run detectors one after another (useful for deterministic tracing)
    pub fn sequential(mut self) -> Self {
        self.parallel_detectors = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        let config = DetectionConfig::default();
        assert_eq!(config.z_threshold, 3.0);
        assert_eq!(config.isolation_threshold, -0.5);
        assert_eq!(config.lstm_min_series, 10);
        assert_eq!(config.critical_heart_rate, 150);
        assert_eq!(config.max_recommendations, 5);
        assert!(config.parallel_detectors);
    }

    #[test]
    fn test_partial_override_from_json() {
        let config: DetectionConfig =
            serde_json::from_str(r#"{"isolation_threshold": -0.3}"#).unwrap();
        assert_eq!(config.isolation_threshold, -0.3);
        assert_eq!(config.z_threshold, DEFAULT_Z_THRESHOLD);
    }
}
