//! Engine configuration
//!
//! All tunable policy values live here as named fields with documented
//! defaults. The risk formula constants in particular are policy, not
//! physics: they can be adjusted without touching the arithmetic in
//! [`crate::risk`].

use serde::{Deserialize, Serialize};

/// Ordinal answer ceiling for the questionnaire (answers are 0..=3)
pub const MAX_ANSWER_VALUE: u8 = 3;

/// Aggregate answer score above which the mapper concentrates mass on the
/// negative target categories
pub const NEGATIVE_SCORE_THRESHOLD: f64 = 0.6;

/// Gaussian noise sigma applied by the vector mapper
pub const MAPPER_NOISE_SIGMA: f64 = 0.05;

/// Gaussian noise sigma applied per synthesized frame
pub const SYNTH_NOISE_SIGMA: f64 = 0.02;

/// Frames synthesized from a single questionnaire snapshot
pub const DEFAULT_SNAPSHOT_FRAMES: usize = 30;

/// Days in a behavioral sliding window
pub const DEFAULT_WINDOW_DAYS: usize = 7;

/// Stress label (ordinal 1-5) at or above which a window is labeled positive
pub const STRESS_BINARY_THRESHOLD: u8 = 3;

/// Epsilon used to stabilize normalization denominators
pub const NORM_EPSILON: f64 = 1e-5;

/// Risk scoring policy: weights, rescale and label thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskPolicy {
    /// Weight of negative-band dominance in the risk score
    pub negative_weight: f64,
    /// Weight of cross-time volatility in the risk score
    pub volatility_weight: f64,
    /// Calibration constant spreading scores across [0, 1]
    pub rescale: f64,
    /// Scores strictly above this are labeled High
    pub high_threshold: f64,
    /// Scores strictly above this (and not High) are labeled Medium
    pub medium_threshold: f64,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            negative_weight: 0.7,
            volatility_weight: 0.3,
            rescale: 2.0,
            high_threshold: 0.6,
            medium_threshold: 0.3,
        }
    }
}

/// Thresholds that trip human-readable contributing factors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorThresholds {
    /// Mean sleep duration (hours) below which low sleep is reported
    pub low_sleep_hours: f64,
    /// Mean activity level below which reduced activity is reported
    pub low_activity_level: f64,
    /// Mean routine-change count below which monotony is reported
    pub low_routine_change: f64,
}

impl Default for FactorThresholds {
    fn default() -> Self {
        Self {
            low_sleep_hours: 6.0,
            low_activity_level: 0.3,
            low_routine_change: 1.0,
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Frames synthesized per questionnaire snapshot
    pub snapshot_frames: usize,
    /// Days per behavioral window
    pub window_days: usize,
    /// RNG seed; `None` draws from entropy (production serving only;
    /// tests must always pin a seed)
    pub seed: Option<u64>,
    /// Risk scoring policy
    pub risk: RiskPolicy,
    /// Contributing-factor thresholds
    pub factors: FactorThresholds,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            snapshot_frames: DEFAULT_SNAPSHOT_FRAMES,
            window_days: DEFAULT_WINDOW_DAYS,
            seed: None,
            risk: RiskPolicy::default(),
            factors: FactorThresholds::default(),
        }
    }
}

impl EngineConfig {
    /// Configuration with a pinned seed for reproducible runs
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_risk_policy_matches_calibration() {
        let policy = RiskPolicy::default();
        assert_eq!(policy.negative_weight, 0.7);
        assert_eq!(policy.volatility_weight, 0.3);
        assert_eq!(policy.rescale, 2.0);
        assert_eq!(policy.high_threshold, 0.6);
        assert_eq!(policy.medium_threshold, 0.3);
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = EngineConfig::seeded(7);
        let json = serde_json::to_string(&config).unwrap();
        let loaded: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.seed, Some(7));
        assert_eq!(loaded.snapshot_frames, DEFAULT_SNAPSHOT_FRAMES);
        assert_eq!(loaded.window_days, DEFAULT_WINDOW_DAYS);
    }
}
