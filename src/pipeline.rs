//! Serving orchestration
//!
//! [`AffectProcessor`] wires the stages together for the two serving paths:
//!
//! - questionnaire answers → vector mapper → sequence synthesizer →
//!   pattern classifier + heuristic risk scorer;
//! - behavioral feature rows → trailing-window risk predictor + the
//!   behavioral-width pattern classifier.
//!
//! Both paths produce an [`AffectInsight`]. The learned pattern and the
//! risk score are always reported side by side; the processor never
//! reconciles or prefers one over the other.

use crate::classifier::{ModelState, PatternClassifier};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::features::logs::BehavioralFeatureRow;
use crate::mapper::VectorMapper;
use crate::predictor::{normalized_rows, trailing_window, RiskPredictor};
use crate::risk::{RiskLabel, RiskScorer};
use crate::synth::{PersistenceSynthesizer, SequenceSource};
use crate::vector::AffectSequence;
use crate::{ENGINE_VERSION, PRODUCER_NAME};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// One point of the per-frame band-mass summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelinePoint {
    pub time_index: usize,
    pub positive_mass: f64,
    pub negative_mass: f64,
}

/// The full analysis payload for one request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffectInsight {
    /// Winning pattern class name
    pub pattern: String,
    /// Softmax probability of the winning class
    pub pattern_confidence: f64,
    pub risk_score: f64,
    pub risk_label: RiskLabel,
    pub contributing_factors: Vec<String>,
    /// Band-mass summary per frame; empty on the behavioral path, which
    /// carries no emotion vectors
    pub emotion_timeline: Vec<TimelinePoint>,
    /// `UntrainedFallback` when any model on the path served fresh weights
    pub model_state: ModelState,
    pub producer: String,
    pub engine_version: String,
    pub instance_id: Uuid,
    pub generated_at: DateTime<Utc>,
}

/// Artifact locations for the three learned models; any may be absent
#[derive(Debug, Clone, Default)]
pub struct ArtifactPaths {
    pub emotion_classifier: Option<PathBuf>,
    pub behavior_classifier: Option<PathBuf>,
    pub risk_predictor: Option<PathBuf>,
}

/// Stateful serving processor
pub struct AffectProcessor {
    config: EngineConfig,
    mapper: VectorMapper,
    synthesizer: PersistenceSynthesizer,
    emotion_classifier: PatternClassifier,
    behavior_classifier: PatternClassifier,
    predictor: RiskPredictor,
    scorer: RiskScorer,
    instance_id: Uuid,
}

impl AffectProcessor {
    /// Build a processor. With `config.seed` set, every stochastic stage is
    /// reproducible; each stage gets its own derived stream.
    pub fn new(config: EngineConfig, artifacts: &ArtifactPaths) -> Self {
        let (mapper, synthesizer) = match config.seed {
            Some(seed) => (
                VectorMapper::seeded(seed),
                PersistenceSynthesizer::seeded(seed.wrapping_add(1)),
            ),
            None => (
                VectorMapper::from_entropy(),
                PersistenceSynthesizer::from_entropy(),
            ),
        };
        Self {
            mapper,
            synthesizer,
            emotion_classifier: PatternClassifier::emotion_path(
                artifacts.emotion_classifier.as_deref(),
            ),
            behavior_classifier: PatternClassifier::behavioral_path(
                artifacts.behavior_classifier.as_deref(),
            ),
            predictor: RiskPredictor::new(artifacts.risk_predictor.as_deref(), &config),
            scorer: RiskScorer::new(config.risk.clone(), config.factors.clone()),
            instance_id: Uuid::new_v4(),
            config,
        }
    }

    /// Analyze a questionnaire snapshot.
    ///
    /// Empty answers are valid: the no-signal vector propagates as an
    /// all-zero sequence instead of being inflated into noise, so both the
    /// classifier and the scorer see the absence of signal.
    pub fn analyze_answers(&mut self, answers: &[u8]) -> Result<AffectInsight, EngineError> {
        let base = self.mapper.map_answers(answers)?;
        let sequence = if base.is_no_signal() {
            AffectSequence::new(vec![base; self.config.snapshot_frames])
        } else {
            self.synthesizer.frames(&base, self.config.snapshot_frames)
        };

        let pattern = self.emotion_classifier.classify(&sequence)?;
        let assessment = self.scorer.score(&sequence);
        let emotion_timeline = sequence
            .frames()
            .iter()
            .enumerate()
            .map(|(time_index, frame)| TimelinePoint {
                time_index,
                positive_mass: frame.positive_mass(),
                negative_mass: frame.negative_mass(),
            })
            .collect();

        Ok(self.insight(
            pattern.pattern,
            pattern.confidence,
            assessment.risk_score,
            assessment.risk_label,
            assessment.contributing_factors,
            emotion_timeline,
            self.emotion_classifier.state(),
        ))
    }

    /// Analyze a user's recent behavioral feature rows.
    ///
    /// Risk comes from the learned predictor over the trailing window; the
    /// pattern comes from the behavioral-width classifier over the same
    /// normalized window. No emotion vectors exist on this path, so the
    /// timeline is empty.
    pub fn analyze_behavior(
        &mut self,
        rows: &[BehavioralFeatureRow],
    ) -> Result<AffectInsight, EngineError> {
        let assessment = self.predictor.predict(rows)?;
        let window = trailing_window(rows, self.config.window_days);
        let pattern = self.behavior_classifier.classify_rows(&normalized_rows(&window))?;

        let model_state = if self.predictor.state() == ModelState::Loaded
            && self.behavior_classifier.state() == ModelState::Loaded
        {
            ModelState::Loaded
        } else {
            ModelState::UntrainedFallback
        };

        Ok(self.insight(
            pattern.pattern,
            pattern.confidence,
            assessment.risk_score,
            assessment.risk_label,
            assessment.contributing_factors,
            Vec::new(),
            model_state,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn insight(
        &self,
        pattern: String,
        pattern_confidence: f64,
        risk_score: f64,
        risk_label: RiskLabel,
        contributing_factors: Vec<String>,
        emotion_timeline: Vec<TimelinePoint>,
        model_state: ModelState,
    ) -> AffectInsight {
        AffectInsight {
            pattern,
            pattern_confidence,
            risk_score,
            risk_label,
            contributing_factors,
            emotion_timeline,
            model_state,
            producer: PRODUCER_NAME.to_string(),
            engine_version: ENGINE_VERSION.to_string(),
            instance_id: self.instance_id,
            generated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::PATTERN_NAMES;
    use crate::config::DEFAULT_SNAPSHOT_FRAMES;
    use crate::risk::FACTOR_STABLE;
    use chrono::NaiveDate;

    fn seeded_processor() -> AffectProcessor {
        AffectProcessor::new(EngineConfig::seeded(42), &ArtifactPaths::default())
    }

    fn healthy_week() -> Vec<BehavioralFeatureRow> {
        (1..=7)
            .map(|d| BehavioralFeatureRow {
                user_id: "u1".to_string(),
                date: NaiveDate::from_ymd_opt(2024, 5, d).unwrap(),
                sleep_duration: 7.5,
                sleep_midpoint: 3.5,
                activity_level: 0.8,
                activity_variance: 0.2,
                routine_change: 4.0,
                stress_label: None,
            })
            .collect()
    }

    #[test]
    fn test_moderate_answers_end_to_end() {
        let mut processor = seeded_processor();
        let insight = processor.analyze_answers(&[1, 2, 0, 1, 3, 2, 1, 0, 1, 2]).unwrap();

        assert_eq!(insight.emotion_timeline.len(), DEFAULT_SNAPSHOT_FRAMES);
        for point in &insight.emotion_timeline {
            assert!(point.positive_mass >= 0.0 && point.positive_mass <= 1.0);
            assert!(point.negative_mass >= 0.0 && point.negative_mass <= 1.0);
        }
        assert!(insight.risk_score >= 0.0 && insight.risk_score <= 1.0);
        // Aggregate score 13/30 stays under the negative branch threshold
        assert_ne!(insight.risk_label, RiskLabel::High);
        assert!(PATTERN_NAMES.contains(&insight.pattern.as_str()));
        assert_eq!(insight.model_state, ModelState::UntrainedFallback);
        assert_eq!(insight.producer, PRODUCER_NAME);
    }

    #[test]
    fn test_empty_answers_propagate_no_signal() {
        let mut processor = seeded_processor();
        let insight = processor.analyze_answers(&[]).unwrap();

        assert_eq!(insight.emotion_timeline.len(), DEFAULT_SNAPSHOT_FRAMES);
        for point in &insight.emotion_timeline {
            assert_eq!(point.positive_mass, 0.0);
            assert_eq!(point.negative_mass, 0.0);
        }
        assert_eq!(insight.risk_score, 0.0);
        assert_eq!(insight.risk_label, RiskLabel::Low);
    }

    #[test]
    fn test_invalid_answers_are_rejected() {
        let mut processor = seeded_processor();
        let result = processor.analyze_answers(&[1, 2, 4]);
        assert!(matches!(result, Err(EngineError::InvalidInput(_))));
    }

    #[test]
    fn test_behavior_path_has_empty_timeline() {
        let mut processor = seeded_processor();
        let insight = processor.analyze_behavior(&healthy_week()).unwrap();

        assert!(insight.emotion_timeline.is_empty());
        assert!(insight.risk_score >= 0.0 && insight.risk_score <= 1.0);
        assert_eq!(
            insight.contributing_factors,
            vec![FACTOR_STABLE.to_string()]
        );
        assert!(PATTERN_NAMES.contains(&insight.pattern.as_str()));
        assert_eq!(insight.model_state, ModelState::UntrainedFallback);
    }

    #[test]
    fn test_behavior_path_rejects_empty_rows() {
        let mut processor = seeded_processor();
        assert!(matches!(
            processor.analyze_behavior(&[]),
            Err(EngineError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let answers = [2, 1, 3, 0, 2, 2];
        let a = seeded_processor().analyze_answers(&answers).unwrap();
        let b = seeded_processor().analyze_answers(&answers).unwrap();

        assert_eq!(a.risk_score.to_bits(), b.risk_score.to_bits());
        assert_eq!(a.pattern, b.pattern);
        assert_eq!(
            a.emotion_timeline.len(),
            b.emotion_timeline.len()
        );
        for (pa, pb) in a.emotion_timeline.iter().zip(&b.emotion_timeline) {
            assert_eq!(pa.negative_mass.to_bits(), pb.negative_mass.to_bits());
        }
    }

    #[test]
    fn test_insight_serializes() {
        let mut processor = seeded_processor();
        let insight = processor.analyze_answers(&[1, 1, 1]).unwrap();
        let json = serde_json::to_string(&insight).unwrap();
        assert!(json.contains("\"risk_label\""));
        assert!(json.contains("\"emotion_timeline\""));
    }
}
