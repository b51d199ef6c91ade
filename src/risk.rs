//! Heuristic risk scoring
//!
//! A deterministic, weights-free scorer over an affect sequence: negative
//! band dominance and cross-time volatility, combined with the calibrated
//! policy constants in [`RiskPolicy`]. Runs independently of the learned
//! pattern classifier; the two are always reported side by side and never
//! reconciled.
//!
//! Contributing factors come from behavioral feature heuristics, not from
//! the emotion vectors; when no feature rows are available the scorer
//! reports the single stable-pattern factor.

use crate::config::{FactorThresholds, RiskPolicy};
use crate::features::logs::BehavioralFeatureRow;
use crate::taxonomy::{EMOTION_DIM, NEGATIVE_BAND_START};
use crate::vector::AffectSequence;
use serde::{Deserialize, Serialize};

/// Factor strings are part of the external contract; do not reword
pub const FACTOR_LOW_SLEEP: &str = "Low sleep duration detected.";
pub const FACTOR_LOW_ACTIVITY: &str = "Reduced physical activity levels.";
pub const FACTOR_MONOTONY: &str = "Social isolation / monotony detected.";
pub const FACTOR_STABLE: &str = "Behavioral patterns appear stable.";

/// Discrete risk band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLabel {
    Low,
    Medium,
    High,
}

impl RiskLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLabel::Low => "Low",
            RiskLabel::Medium => "Medium",
            RiskLabel::High => "High",
        }
    }
}

/// Scored risk with human-readable contributing factors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Bounded risk score in [0, 1]
    pub risk_score: f64,
    pub risk_label: RiskLabel,
    /// Factor strings in fixed check order
    pub contributing_factors: Vec<String>,
}

/// Deterministic heuristic risk scorer
#[derive(Debug, Clone, Default)]
pub struct RiskScorer {
    policy: RiskPolicy,
    factors: FactorThresholds,
}

impl RiskScorer {
    pub fn new(policy: RiskPolicy, factors: FactorThresholds) -> Self {
        Self { policy, factors }
    }

    /// Score an affect sequence with no behavioral context
    pub fn score(&self, sequence: &AffectSequence) -> RiskAssessment {
        self.score_with_features(sequence, &[])
    }

    /// Score an affect sequence, explaining it from behavioral feature rows
    pub fn score_with_features(
        &self,
        sequence: &AffectSequence,
        rows: &[BehavioralFeatureRow],
    ) -> RiskAssessment {
        let volatility = volatility(sequence);
        let negative = negative_dominance(sequence);
        let raw = negative * self.policy.negative_weight + volatility * self.policy.volatility_weight;
        let risk_score = (raw * self.policy.rescale).clamp(0.0, 1.0);

        RiskAssessment {
            risk_score,
            risk_label: self.label_for(risk_score),
            contributing_factors: self.explain(rows),
        }
    }

    /// Map a bounded score to its risk band
    pub fn label_for(&self, score: f64) -> RiskLabel {
        if score > self.policy.high_threshold {
            RiskLabel::High
        } else if score > self.policy.medium_threshold {
            RiskLabel::Medium
        } else {
            RiskLabel::Low
        }
    }

    /// Contributing factors from behavioral features, in fixed check order.
    ///
    /// An empty row set yields the stable factor: with no behavioral
    /// evidence there is nothing to attribute the score to.
    pub fn explain(&self, rows: &[BehavioralFeatureRow]) -> Vec<String> {
        if rows.is_empty() {
            return vec![FACTOR_STABLE.to_string()];
        }
        let n = rows.len() as f64;
        let mean_sleep: f64 = rows.iter().map(|r| r.sleep_duration).sum::<f64>() / n;
        let mean_activity: f64 = rows.iter().map(|r| r.activity_level).sum::<f64>() / n;
        let mean_routine: f64 = rows.iter().map(|r| r.routine_change).sum::<f64>() / n;

        let mut factors = Vec::new();
        if mean_sleep < self.factors.low_sleep_hours {
            factors.push(FACTOR_LOW_SLEEP.to_string());
        }
        if mean_activity < self.factors.low_activity_level {
            factors.push(FACTOR_LOW_ACTIVITY.to_string());
        }
        if mean_routine < self.factors.low_routine_change {
            factors.push(FACTOR_MONOTONY.to_string());
        }
        if factors.is_empty() {
            factors.push(FACTOR_STABLE.to_string());
        }
        factors
    }
}

/// Mean over taxonomy dimensions of the population standard deviation of
/// that dimension over time
fn volatility(sequence: &AffectSequence) -> f64 {
    let frames = sequence.frames();
    if frames.is_empty() {
        return 0.0;
    }
    let t = frames.len() as f64;
    let mut total = 0.0;
    for dim in 0..EMOTION_DIM {
        let mean: f64 = frames.iter().map(|f| f.components()[dim]).sum::<f64>() / t;
        let var: f64 = frames
            .iter()
            .map(|f| (f.components()[dim] - mean).powi(2))
            .sum::<f64>()
            / t;
        total += var.sqrt();
    }
    total / EMOTION_DIM as f64
}

/// Mean mass over time and negative-band dimensions
fn negative_dominance(sequence: &AffectSequence) -> f64 {
    let frames = sequence.frames();
    if frames.is_empty() {
        return 0.0;
    }
    let band_width = (EMOTION_DIM - NEGATIVE_BAND_START) as f64;
    let total: f64 = frames.iter().map(|f| f.negative_mass()).sum();
    total / (frames.len() as f64 * band_width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::{IDX_CONTENTMENT, IDX_SADNESS};
    use crate::vector::EmotionVector;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn vector_at(index: usize) -> EmotionVector {
        let mut raw = [0.0; EMOTION_DIM];
        raw[index] = 1.0;
        EmotionVector::from_unnormalized(raw)
    }

    fn row(sleep: f64, activity: f64, routine: f64) -> BehavioralFeatureRow {
        BehavioralFeatureRow {
            user_id: "u1".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            sleep_duration: sleep,
            sleep_midpoint: 3.0,
            activity_level: activity,
            activity_variance: 0.2,
            routine_change: routine,
            stress_label: None,
        }
    }

    #[test]
    fn test_score_is_bounded() {
        let scorer = RiskScorer::default();
        let sequences = [
            AffectSequence::new(vec![vector_at(IDX_SADNESS); 30]),
            AffectSequence::new(vec![vector_at(IDX_CONTENTMENT); 30]),
            AffectSequence::new(
                (0..30)
                    .map(|i| vector_at(if i % 2 == 0 { 12 } else { 13 }))
                    .collect(),
            ),
            AffectSequence::new(vec![]),
        ];
        for seq in &sequences {
            let assessment = scorer.score(seq);
            assert!(assessment.risk_score >= 0.0 && assessment.risk_score <= 1.0);
        }
    }

    #[test]
    fn test_label_thresholds() {
        let scorer = RiskScorer::default();
        assert_eq!(scorer.label_for(0.65), RiskLabel::High);
        assert_eq!(scorer.label_for(0.45), RiskLabel::Medium);
        assert_eq!(scorer.label_for(0.1), RiskLabel::Low);
        // Boundary values fall to the lower band
        assert_eq!(scorer.label_for(0.6), RiskLabel::Medium);
        assert_eq!(scorer.label_for(0.3), RiskLabel::Low);
    }

    #[test]
    fn test_constant_sequence_has_zero_volatility() {
        let scorer = RiskScorer::default();
        // All mass on contentment: no negative dominance, no volatility
        let calm = scorer.score(&AffectSequence::new(vec![vector_at(IDX_CONTENTMENT); 30]));
        assert_eq!(calm.risk_score, 0.0);
        assert_eq!(calm.risk_label, RiskLabel::Low);
    }

    #[test]
    fn test_negative_dominance_raises_score() {
        let scorer = RiskScorer::default();
        let calm = scorer.score(&AffectSequence::new(vec![vector_at(4); 30]));
        let sad = scorer.score(&AffectSequence::new(vec![vector_at(IDX_SADNESS); 30]));
        assert!(sad.risk_score > calm.risk_score);
        // Full constant mass on one negative category: (0.25 * 0.7) * 2
        assert!((sad.risk_score - 0.35).abs() < 1e-9);
    }

    #[test]
    fn test_volatility_raises_score() {
        let scorer = RiskScorer::default();
        let steady = scorer.score(&AffectSequence::new(vec![vector_at(12); 30]));
        let swinging = scorer.score(&AffectSequence::new(
            (0..30)
                .map(|i| vector_at(if i % 2 == 0 { 12 } else { 13 }))
                .collect(),
        ));
        assert!(swinging.risk_score > steady.risk_score);
    }

    #[test]
    fn test_factor_order_is_fixed() {
        let scorer = RiskScorer::default();
        // Everything below threshold: all three factors, in check order
        let factors = scorer.explain(&[row(4.0, 0.1, 0.0)]);
        assert_eq!(
            factors,
            vec![
                FACTOR_LOW_SLEEP.to_string(),
                FACTOR_LOW_ACTIVITY.to_string(),
                FACTOR_MONOTONY.to_string(),
            ]
        );
    }

    #[test]
    fn test_healthy_features_report_stable() {
        let scorer = RiskScorer::default();
        let factors = scorer.explain(&[row(7.5, 0.8, 4.0)]);
        assert_eq!(factors, vec![FACTOR_STABLE.to_string()]);
    }

    #[test]
    fn test_no_features_report_stable() {
        let scorer = RiskScorer::default();
        assert_eq!(scorer.explain(&[]), vec![FACTOR_STABLE.to_string()]);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let scorer = RiskScorer::default();
        let seq = AffectSequence::new(
            (0..30)
                .map(|i| vector_at(if i % 3 == 0 { IDX_SADNESS } else { IDX_CONTENTMENT }))
                .collect(),
        );
        let a = scorer.score(&seq);
        let b = scorer.score(&seq);
        assert_eq!(a.risk_score.to_bits(), b.risk_score.to_bits());
        assert_eq!(a.contributing_factors, b.contributing_factors);
    }
}
