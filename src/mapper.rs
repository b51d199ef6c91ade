//! Vector mapping
//!
//! Maps one raw signal record onto the emotion-state simplex. Two input
//! shapes are supported:
//!
//! - an ordered list of ordinal questionnaire answers (each 0..=3), mapped
//!   through a two-branch concentration policy, and
//! - a raw sensor frame, currently served by a CPU surrogate that emits a
//!   uniform draw on the simplex until an on-device emotion model lands.
//!
//! Both paths add small Gaussian perturbation for variability; construct the
//! mapper with [`VectorMapper::seeded`] wherever reproducibility matters.

use crate::config::{MAPPER_NOISE_SIGMA, MAX_ANSWER_VALUE, NEGATIVE_SCORE_THRESHOLD};
use crate::error::EngineError;
use crate::taxonomy::{
    EMOTION_DIM, IDX_ANXIETY, IDX_CONTENTMENT, IDX_DISGUST, IDX_HAPPINESS, IDX_SADNESS,
};
use crate::vector::EmotionVector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Exp1, StandardNormal};

/// Maps raw signal records to emotion-state vectors
#[derive(Debug)]
pub struct VectorMapper {
    rng: StdRng,
}

impl VectorMapper {
    /// Mapper with a pinned seed (reproducible output)
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Mapper seeded from OS entropy. Production serving only; tests must
    /// use [`VectorMapper::seeded`].
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Map ordinal questionnaire answers to an emotion-state vector.
    ///
    /// An empty answer list is treated as "no signal" and yields the zero
    /// vector rather than an error. Answers above the ordinal ceiling are
    /// structurally invalid and rejected.
    pub fn map_answers(&mut self, answers: &[u8]) -> Result<EmotionVector, EngineError> {
        if answers.is_empty() {
            return Ok(EmotionVector::no_signal());
        }
        if let Some(bad) = answers.iter().find(|&&a| a > MAX_ANSWER_VALUE) {
            return Err(EngineError::InvalidInput(format!(
                "answer {} exceeds ordinal ceiling {}",
                bad, MAX_ANSWER_VALUE
            )));
        }

        let score = aggregate_score(answers);

        let mut raw = [0.0; EMOTION_DIM];
        if score > NEGATIVE_SCORE_THRESHOLD {
            // High aggregate score: concentrate on anxiety, sadness, disgust
            raw[IDX_ANXIETY] = 0.4;
            raw[IDX_SADNESS] = 0.4;
            raw[IDX_DISGUST] = 0.2;
        } else {
            // Low aggregate score: concentrate on contentment, happiness
            raw[IDX_CONTENTMENT] = 0.5;
            raw[IDX_HAPPINESS] = 0.5;
        }

        for c in raw.iter_mut() {
            let noise: f64 = self.rng.sample(StandardNormal);
            *c += noise * MAPPER_NOISE_SIGMA;
        }

        Ok(EmotionVector::from_unnormalized(raw))
    }

    /// Map a raw sensor frame to an emotion-state vector.
    ///
    /// Surrogate implementation: a symmetric Dirichlet(1) draw (normalized
    /// unit-exponential samples), uniform on the simplex. The frame content
    /// is accepted for interface stability but not yet consumed.
    pub fn map_frame(&mut self, frame: &[f64]) -> Result<EmotionVector, EngineError> {
        if frame.is_empty() {
            return Err(EngineError::InvalidInput(
                "sensor frame must not be empty".to_string(),
            ));
        }
        let mut raw = [0.0; EMOTION_DIM];
        for c in raw.iter_mut() {
            let e: f64 = self.rng.sample(Exp1);
            *c = e;
        }
        Ok(EmotionVector::from_unnormalized(raw))
    }
}

/// Aggregate normalized answer score in [0, 1]
pub fn aggregate_score(answers: &[u8]) -> f64 {
    if answers.is_empty() {
        return 0.0;
    }
    let sum: f64 = answers.iter().map(|&a| a as f64).sum();
    let max_sum = answers.len() as f64 * MAX_ANSWER_VALUE as f64;
    (sum / max_sum).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::{IDX_ANXIETY, IDX_CONTENTMENT, IDX_DISGUST, IDX_HAPPINESS, IDX_SADNESS};

    #[test]
    fn test_aggregate_score() {
        assert_eq!(aggregate_score(&[]), 0.0);
        assert_eq!(aggregate_score(&[0, 0, 0]), 0.0);
        assert_eq!(aggregate_score(&[3, 3, 3]), 1.0);
        let s = aggregate_score(&[1, 2, 0, 1, 3, 2, 1, 0, 1, 2]);
        assert!((s - 13.0 / 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_mapped_vector_satisfies_simplex() {
        let mut mapper = VectorMapper::seeded(42);
        let v = mapper.map_answers(&[1, 2, 0, 1, 3, 2, 1, 0, 1, 2]).unwrap();
        assert!(v.is_simplex());
    }

    #[test]
    fn test_empty_answers_yield_no_signal() {
        let mut mapper = VectorMapper::seeded(42);
        let v = mapper.map_answers(&[]).unwrap();
        assert!(v.is_no_signal());
    }

    #[test]
    fn test_out_of_range_answer_is_rejected() {
        let mut mapper = VectorMapper::seeded(42);
        let result = mapper.map_answers(&[1, 4, 2]);
        assert!(matches!(result, Err(EngineError::InvalidInput(_))));
    }

    #[test]
    fn test_score_threshold_flips_target_band() {
        // Low aggregate score: contentment/happiness dominate
        let mut mapper = VectorMapper::seeded(7);
        let low = mapper.map_answers(&[0; 10]).unwrap();
        let low_positive = low.components()[IDX_CONTENTMENT] + low.components()[IDX_HAPPINESS];
        let low_negative = low.components()[IDX_ANXIETY]
            + low.components()[IDX_SADNESS]
            + low.components()[IDX_DISGUST];
        assert!(low_positive > low_negative);

        // High aggregate score: anxiety/sadness/disgust dominate
        let high = mapper.map_answers(&[3; 10]).unwrap();
        let high_positive = high.components()[IDX_CONTENTMENT] + high.components()[IDX_HAPPINESS];
        let high_negative = high.components()[IDX_ANXIETY]
            + high.components()[IDX_SADNESS]
            + high.components()[IDX_DISGUST];
        assert!(high_negative > high_positive);
    }

    #[test]
    fn test_fixed_seed_is_bit_identical() {
        let answers = [1, 2, 0, 1, 3, 2, 1, 0, 1, 2];
        let mut a = VectorMapper::seeded(99);
        let mut b = VectorMapper::seeded(99);
        let va = a.map_answers(&answers).unwrap();
        let vb = b.map_answers(&answers).unwrap();
        assert_eq!(va.components(), vb.components());
    }

    #[test]
    fn test_sensor_frame_surrogate() {
        let mut mapper = VectorMapper::seeded(5);
        let v = mapper.map_frame(&[0.1, 0.2, 0.3]).unwrap();
        assert!(v.is_simplex());

        let err = mapper.map_frame(&[]);
        assert!(matches!(err, Err(EngineError::InvalidInput(_))));
    }
}
