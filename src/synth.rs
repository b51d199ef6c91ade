//! Sequence synthesis
//!
//! The downstream classifier and scorer consume fixed-length temporal
//! sequences, but a one-time questionnaire yields a single snapshot vector.
//! [`PersistenceSynthesizer`] bridges the gap by modeling the snapshot as a
//! persisting mood with small independent fluctuations per frame.
//!
//! This is a deliberate approximation, not a generative model of real affect
//! dynamics: frames are correlated only through the shared base vector. The
//! [`SequenceSource`] trait keeps the strategy swappable so a genuine
//! streaming sensor feed can replace the synthesizer without touching the
//! classifier or scorer.

use crate::config::SYNTH_NOISE_SIGMA;
use crate::taxonomy::EMOTION_DIM;
use crate::vector::{AffectSequence, EmotionVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Strategy for producing a temporal affect sequence from a base vector
pub trait SequenceSource {
    /// Produce `length` frames derived from `base`. Every frame must
    /// independently satisfy the simplex invariant (or be the explicit zero
    /// vector when the base carried no signal).
    fn frames(&mut self, base: &EmotionVector, length: usize) -> AffectSequence;
}

/// Synthesizes persistence-with-fluctuation sequences from a snapshot vector
#[derive(Debug)]
pub struct PersistenceSynthesizer {
    rng: StdRng,
}

impl PersistenceSynthesizer {
    /// Synthesizer with a pinned seed (reproducible output)
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Synthesizer seeded from OS entropy. Production serving only.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl SequenceSource for PersistenceSynthesizer {
    fn frames(&mut self, base: &EmotionVector, length: usize) -> AffectSequence {
        let mut frames = Vec::with_capacity(length);
        for _ in 0..length {
            let mut raw = [0.0; EMOTION_DIM];
            for (c, &b) in raw.iter_mut().zip(base.components().iter()) {
                let noise: f64 = self.rng.sample(StandardNormal);
                *c = b + noise * SYNTH_NOISE_SIGMA;
            }
            // from_unnormalized clips and renormalizes each frame
            frames.push(EmotionVector::from_unnormalized(raw));
        }
        AffectSequence::new(frames)
    }
}

/// Passthrough source for genuinely measured per-day vectors.
///
/// Replays the measured frames in order, repeating the final frame if the
/// requested length exceeds what was measured. The base vector is ignored.
#[derive(Debug)]
pub struct MeasuredSource {
    measured: Vec<EmotionVector>,
}

impl MeasuredSource {
    /// Wrap measured frames in time order
    pub fn new(measured: Vec<EmotionVector>) -> Self {
        Self { measured }
    }
}

impl SequenceSource for MeasuredSource {
    fn frames(&mut self, _base: &EmotionVector, length: usize) -> AffectSequence {
        let mut frames = Vec::with_capacity(length);
        for i in 0..length {
            match self.measured.get(i).or_else(|| self.measured.last()) {
                Some(v) => frames.push(v.clone()),
                None => frames.push(EmotionVector::no_signal()),
            }
        }
        AffectSequence::new(frames)
    }
}
