//! Affective pattern classification
//!
//! Serving-side wrapper around a trained [`SequenceModel`]: loads the
//! persisted artifact once at construction, answers classification requests
//! through a read lock, and swaps weights only through the explicit
//! [`PatternClassifier::reload`] write path.
//!
//! A missing or corrupt artifact never aborts serving. The classifier falls
//! back to fresh seeded weights and reports [`ModelState::UntrainedFallback`]
//! in every response so downstream consumers can tell a trained prediction
//! from a placeholder.

use crate::error::EngineError;
use crate::features::logs::FEATURE_DIM;
use crate::model::linalg::argmax;
use crate::model::{LstmModel, ModelArtifact, ModelDims, SequenceModel};
use crate::taxonomy::EMOTION_DIM;
use crate::vector::AffectSequence;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{PoisonError, RwLock};
use tracing::{info, warn};

/// Number of affective pattern classes
pub const PATTERN_CLASS_COUNT: usize = 4;

/// Pattern class names, index-aligned with the model's output head
pub const PATTERN_NAMES: [&str; PATTERN_CLASS_COUNT] =
    ["Stable", "Volatile", "Depressive", "Anxious"];

/// Seed for fallback weights so every replica degrades identically
const FALLBACK_SEED: u64 = 0;

/// Provenance of the weights currently serving
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelState {
    /// Weights came from a persisted training artifact
    Loaded,
    /// No usable artifact; serving fresh seeded weights
    UntrainedFallback,
}

/// One classification outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternClassification {
    /// Class index into [`PATTERN_NAMES`]
    pub class_index: usize,
    pub pattern: String,
    /// Softmax probability of the winning class
    pub confidence: f64,
}

struct Inner {
    model: Box<dyn SequenceModel>,
    state: ModelState,
}

/// Read-mostly pattern classifier with an explicit reload path
pub struct PatternClassifier {
    dims: ModelDims,
    inner: RwLock<Inner>,
}

impl PatternClassifier {
    /// Classifier over 15-dimensional emotion sequences
    pub fn emotion_path(artifact: Option<&Path>) -> Self {
        Self::new(
            ModelDims {
                input_dim: EMOTION_DIM,
                hidden_dim: 64,
                output_dim: PATTERN_CLASS_COUNT,
                num_layers: 2,
            },
            artifact,
        )
    }

    /// Classifier over 5-dimensional behavioral feature windows
    pub fn behavioral_path(artifact: Option<&Path>) -> Self {
        Self::new(
            ModelDims {
                input_dim: FEATURE_DIM,
                hidden_dim: 32,
                output_dim: PATTERN_CLASS_COUNT,
                num_layers: 2,
            },
            artifact,
        )
    }

    /// Build a classifier, preferring the artifact at `path` and falling
    /// back to seeded untrained weights when it is absent or unusable
    pub fn new(dims: ModelDims, artifact: Option<&Path>) -> Self {
        let inner = match artifact {
            Some(path) => match load_checked(path, dims) {
                Ok(model) => {
                    info!(path = %path.display(), "pattern classifier artifact loaded");
                    Inner {
                        model,
                        state: ModelState::Loaded,
                    }
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "pattern classifier artifact unusable; serving untrained fallback"
                    );
                    fallback(dims)
                }
            },
            None => {
                warn!("no pattern classifier artifact configured; serving untrained fallback");
                fallback(dims)
            }
        };
        Self {
            dims,
            inner: RwLock::new(inner),
        }
    }

    /// Classify an affect sequence
    pub fn classify(&self, sequence: &AffectSequence) -> Result<PatternClassification, EngineError> {
        self.classify_rows(&sequence.to_rows())
    }

    /// Classify raw feature rows (behavioral path).
    ///
    /// Argmax over the softmax output; ties break toward the lowest class
    /// index.
    pub fn classify_rows(&self, rows: &[Vec<f64>]) -> Result<PatternClassification, EngineError> {
        if rows.is_empty() {
            return Err(EngineError::InsufficientData(
                "cannot classify an empty sequence".to_string(),
            ));
        }
        for row in rows {
            if row.len() != self.dims.input_dim {
                return Err(EngineError::ShapeMismatch(format!(
                    "expected {}-dimensional frames, got {}",
                    self.dims.input_dim,
                    row.len()
                )));
            }
        }

        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let probs = inner.model.forward(rows);
        let class_index = argmax(&probs);
        Ok(PatternClassification {
            class_index,
            pattern: PATTERN_NAMES[class_index].to_string(),
            confidence: probs[class_index],
        })
    }

    /// Provenance of the weights currently serving
    pub fn state(&self) -> ModelState {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .state
    }

    /// Replace the serving weights with a freshly loaded artifact.
    ///
    /// The only write path: on failure the previous weights keep serving.
    pub fn reload(&self, path: &Path) -> Result<(), EngineError> {
        let model = load_checked(path, self.dims)?;
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.model = model;
        inner.state = ModelState::Loaded;
        info!(path = %path.display(), "pattern classifier reloaded");
        Ok(())
    }
}

fn fallback(dims: ModelDims) -> Inner {
    Inner {
        model: Box::new(LstmModel::new(dims, FALLBACK_SEED)),
        state: ModelState::UntrainedFallback,
    }
}

/// Load an artifact and verify it fits this classifier's interface.
///
/// Hidden size and depth may differ from the defaults (training
/// hyperparameters are free to change), but input and output widths must
/// match what serving feeds and expects.
fn load_checked(path: &Path, dims: ModelDims) -> Result<Box<dyn SequenceModel>, EngineError> {
    let artifact = ModelArtifact::load(path)?;
    if artifact.dims.input_dim != dims.input_dim || artifact.dims.output_dim != dims.output_dim {
        return Err(EngineError::ArtifactSchema(format!(
            "artifact is {}-in/{}-out but classifier expects {}-in/{}-out",
            artifact.dims.input_dim, artifact.dims.output_dim, dims.input_dim, dims.output_dim
        )));
    }
    artifact.into_model()
}
