//! Learned behavioral risk prediction
//!
//! Serving-time counterpart of the training pipeline: a binary sequence
//! model over the most recent days of behavioral features. The sigmoid
//! output is used directly as the risk score and labeled with the same
//! policy thresholds as the heuristic scorer, so the two risk surfaces read
//! the same downstream.
//!
//! The serving window is normalized with its own column statistics. The
//! training-time table statistics are not persisted in the artifact, and
//! window-local z-scoring keeps a single user's recent drift visible.

use crate::classifier::ModelState;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::features::dataset::ColumnStats;
use crate::features::logs::{BehavioralFeatureRow, FEATURE_DIM};
use crate::model::{LstmModel, ModelArtifact, ModelDims, SequenceModel};
use crate::risk::{RiskAssessment, RiskScorer};
use std::path::Path;
use std::sync::{PoisonError, RwLock};
use tracing::{info, warn};

/// Seed for fallback weights so every replica degrades identically
const FALLBACK_SEED: u64 = 0;

struct Inner {
    model: Box<dyn SequenceModel>,
    state: ModelState,
}

/// Serving wrapper for the trained binary stress model
pub struct RiskPredictor {
    dims: ModelDims,
    window_days: usize,
    scorer: RiskScorer,
    inner: RwLock<Inner>,
}

impl RiskPredictor {
    /// Build a predictor, preferring the artifact at `path` and falling
    /// back to seeded untrained weights when it is absent or unusable
    pub fn new(artifact: Option<&Path>, config: &EngineConfig) -> Self {
        let dims = ModelDims {
            input_dim: FEATURE_DIM,
            hidden_dim: 32,
            output_dim: 1,
            num_layers: 2,
        };
        let inner = match artifact {
            Some(path) => match load_checked(path, dims) {
                Ok(model) => {
                    info!(path = %path.display(), "risk predictor artifact loaded");
                    Inner {
                        model,
                        state: ModelState::Loaded,
                    }
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "risk predictor artifact unusable; serving untrained fallback"
                    );
                    fallback(dims)
                }
            },
            None => {
                warn!("no risk predictor artifact configured; serving untrained fallback");
                fallback(dims)
            }
        };
        Self {
            dims,
            window_days: config.window_days,
            scorer: RiskScorer::new(config.risk.clone(), config.factors.clone()),
            inner: RwLock::new(inner),
        }
    }

    /// Score the most recent behavioral window for one user.
    ///
    /// Rows are sorted by date and only the trailing `window_days` are fed
    /// to the model; the contributing factors are explained from those same
    /// raw rows.
    pub fn predict(&self, rows: &[BehavioralFeatureRow]) -> Result<RiskAssessment, EngineError> {
        if rows.is_empty() {
            return Err(EngineError::InsufficientData(
                "no behavioral feature rows to score".to_string(),
            ));
        }
        let window = trailing_window(rows, self.window_days);
        let model_rows = normalized_rows(&window);

        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let probs = inner.model.forward(&model_rows);
        let risk_score = probs[0];

        Ok(RiskAssessment {
            risk_score,
            risk_label: self.scorer.label_for(risk_score),
            contributing_factors: self.scorer.explain(&window),
        })
    }

    /// Provenance of the weights currently serving
    pub fn state(&self) -> ModelState {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .state
    }

    /// Replace the serving weights with a freshly loaded artifact
    pub fn reload(&self, path: &Path) -> Result<(), EngineError> {
        let model = load_checked(path, self.dims)?;
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.model = model;
        inner.state = ModelState::Loaded;
        info!(path = %path.display(), "risk predictor reloaded");
        Ok(())
    }
}

/// The trailing `days` rows in date order
pub(crate) fn trailing_window(rows: &[BehavioralFeatureRow], days: usize) -> Vec<BehavioralFeatureRow> {
    let mut window = rows.to_vec();
    window.sort_by_key(|r| r.date);
    if window.len() > days {
        window.drain(..window.len() - days);
    }
    window
}

/// Window-local z-scored model input
pub(crate) fn normalized_rows(window: &[BehavioralFeatureRow]) -> Vec<Vec<f64>> {
    let stats = ColumnStats::from_rows(window);
    window.iter().map(|r| stats.normalize(r).to_vec()).collect()
}

fn fallback(dims: ModelDims) -> Inner {
    Inner {
        model: Box::new(LstmModel::new(dims, FALLBACK_SEED)),
        state: ModelState::UntrainedFallback,
    }
}

fn load_checked(path: &Path, dims: ModelDims) -> Result<Box<dyn SequenceModel>, EngineError> {
    let artifact = ModelArtifact::load(path)?;
    if artifact.dims.input_dim != dims.input_dim || artifact.dims.output_dim != dims.output_dim {
        return Err(EngineError::ArtifactSchema(format!(
            "artifact is {}-in/{}-out but predictor expects {}-in/{}-out",
            artifact.dims.input_dim, artifact.dims.output_dim, dims.input_dim, dims.output_dim
        )));
    }
    artifact.into_model()
}
