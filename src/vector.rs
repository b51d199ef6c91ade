//! Emotion-state vectors and affect sequences
//!
//! An [`EmotionVector`] is a point on the 15-dimensional probability simplex
//! over the fixed taxonomy in [`crate::taxonomy`]. Vectors are immutable once
//! constructed; the only constructors either renormalize or short-circuit to
//! the degenerate zero ("no signal") vector, so a division by zero can never
//! occur.

use crate::taxonomy::{EMOTION_DIM, NEGATIVE_BAND_START, POSITIVE_BAND_END};
use serde::{Deserialize, Serialize};

/// Tolerance for the simplex-sum invariant
pub const SIMPLEX_EPSILON: f64 = 1e-5;

/// A 15-dimensional probability distribution over the emotion taxonomy.
///
/// Invariant: components are non-negative and sum to 1 within
/// [`SIMPLEX_EPSILON`], except for the explicit zero vector returned when no
/// signal was present in the input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionVector {
    components: [f64; EMOTION_DIM],
}

impl EmotionVector {
    /// The degenerate "no signal" vector. All components zero; callers can
    /// detect it with [`EmotionVector::is_no_signal`].
    pub fn no_signal() -> Self {
        Self {
            components: [0.0; EMOTION_DIM],
        }
    }

    /// Build a vector from unnormalized, possibly negative raw values.
    ///
    /// Negative components are clipped to zero, then the vector is
    /// renormalized to the simplex. An all-zero (or all-negative) input
    /// short-circuits to the zero vector instead of dividing by zero.
    pub fn from_unnormalized(raw: [f64; EMOTION_DIM]) -> Self {
        let mut components = raw;
        for c in components.iter_mut() {
            if *c < 0.0 {
                *c = 0.0;
            }
        }
        let sum: f64 = components.iter().sum();
        if sum <= SIMPLEX_EPSILON {
            return Self::no_signal();
        }
        for c in components.iter_mut() {
            *c /= sum;
        }
        Self { components }
    }

    /// True when this is the degenerate zero vector
    pub fn is_no_signal(&self) -> bool {
        self.components.iter().all(|&c| c == 0.0)
    }

    /// Component slice, index-aligned with the taxonomy
    pub fn components(&self) -> &[f64; EMOTION_DIM] {
        &self.components
    }

    /// Total mass in the positive band (indices 0..6)
    pub fn positive_mass(&self) -> f64 {
        self.components[..POSITIVE_BAND_END].iter().sum()
    }

    /// Total mass in the negative band (indices 11..15)
    pub fn negative_mass(&self) -> f64 {
        self.components[NEGATIVE_BAND_START..].iter().sum()
    }

    /// Check the simplex invariant
    pub fn is_simplex(&self) -> bool {
        let sum: f64 = self.components.iter().sum();
        (sum - 1.0).abs() <= SIMPLEX_EPSILON && self.components.iter().all(|&c| c >= 0.0)
    }
}

/// A fixed-length, time-ordered sequence of emotion-state vectors.
///
/// Immutable after construction; consumed by the pattern classifier and the
/// risk scorer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffectSequence {
    frames: Vec<EmotionVector>,
}

impl AffectSequence {
    /// Wrap an ordered list of frames
    pub fn new(frames: Vec<EmotionVector>) -> Self {
        Self { frames }
    }

    /// Number of frames
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// True when the sequence holds no frames
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frames in time order
    pub fn frames(&self) -> &[EmotionVector] {
        &self.frames
    }

    /// Sequence as rows of raw components, for model input
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.frames
            .iter()
            .map(|f| f.components().to_vec())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_unnormalized_satisfies_simplex() {
        let mut raw = [0.0; EMOTION_DIM];
        raw[2] = 0.4;
        raw[14] = 0.4;
        raw[9] = 0.2;
        let v = EmotionVector::from_unnormalized(raw);
        assert!(v.is_simplex());
    }

    #[test]
    fn test_negative_components_are_clipped() {
        let mut raw = [0.0; EMOTION_DIM];
        raw[0] = -0.5;
        raw[1] = 1.0;
        let v = EmotionVector::from_unnormalized(raw);
        assert!(v.is_simplex());
        assert_eq!(v.components()[0], 0.0);
        assert!((v.components()[1] - 1.0).abs() < SIMPLEX_EPSILON);
    }

    #[test]
    fn test_zero_input_short_circuits() {
        let v = EmotionVector::from_unnormalized([0.0; EMOTION_DIM]);
        assert!(v.is_no_signal());
        assert!(!v.is_simplex());
    }

    #[test]
    fn test_all_negative_input_short_circuits() {
        let v = EmotionVector::from_unnormalized([-1.0; EMOTION_DIM]);
        assert!(v.is_no_signal());
    }

    #[test]
    fn test_band_masses() {
        let mut raw = [0.0; EMOTION_DIM];
        raw[0] = 0.25;
        raw[5] = 0.25;
        raw[11] = 0.3;
        raw[14] = 0.2;
        let v = EmotionVector::from_unnormalized(raw);
        assert!((v.positive_mass() - 0.5).abs() < 1e-9);
        assert!((v.negative_mass() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_sequence_to_rows() {
        let mut raw = [0.0; EMOTION_DIM];
        raw[7] = 1.0;
        let seq = AffectSequence::new(vec![EmotionVector::from_unnormalized(raw); 3]);
        let rows = seq.to_rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].len(), EMOTION_DIM);
        assert!((rows[0][7] - 1.0).abs() < 1e-9);
    }
}
