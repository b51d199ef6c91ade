//! Sequence models
//!
//! Two interchangeable architectures sit behind [`SequenceModel`]: a stacked
//! recurrent network ([`lstm::LstmModel`]) and a single-head attention
//! encoder ([`transformer::TransformerModel`]). Both map a fixed-length
//! sequence of feature vectors to a categorical distribution (softmax) or a
//! single sigmoid probability, and both expose their parameters by name so
//! artifacts detect schema drift at load time instead of producing silently
//! wrong shapes.

pub mod linalg;
pub mod lstm;
pub mod transformer;

use crate::error::EngineError;
use linalg::{sigmoid, softmax_inplace, Matrix};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use uuid::Uuid;

pub use lstm::LstmModel;
pub use transformer::TransformerModel;

/// Artifact schema version; bump on any parameter-name or layout change
pub const ARTIFACT_SCHEMA_VERSION: u32 = 1;

/// Sequence model architecture tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    Lstm,
    Transformer,
}

impl Architecture {
    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::Lstm => "lstm",
            Architecture::Transformer => "transformer",
        }
    }
}

impl std::str::FromStr for Architecture {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lstm" => Ok(Architecture::Lstm),
            "transformer" => Ok(Architecture::Transformer),
            other => Err(EngineError::InvalidInput(format!(
                "unknown architecture '{}'",
                other
            ))),
        }
    }
}

/// Model dimensionality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDims {
    pub input_dim: usize,
    pub hidden_dim: usize,
    pub output_dim: usize,
    pub num_layers: usize,
}

/// Supervised target for one training sample
#[derive(Debug, Clone, Copy)]
pub enum Target {
    /// Binary label in {0.0, 1.0}; requires `output_dim == 1`
    Binary(f64),
    /// Class index; requires `output_dim > 1`
    Class(usize),
}

/// Named parameter gradients, keyed identically to the model's parameters
pub type Gradients = BTreeMap<String, Matrix>;

/// A trainable sequence classifier.
///
/// `Send + Sync` so a loaded model can sit behind the serving layer's
/// read-write lock.
pub trait SequenceModel: Send + Sync {
    fn architecture(&self) -> Architecture;
    fn dims(&self) -> ModelDims;

    /// Forward pass: probabilities (sigmoid for one output, softmax
    /// otherwise). Rows must each have `input_dim` entries.
    fn forward(&self, rows: &[Vec<f64>]) -> Vec<f64>;

    /// Cross-entropy loss for one sample plus gradients for every parameter
    fn loss_and_gradients(&self, rows: &[Vec<f64>], target: &Target) -> (f64, Gradients);

    /// Parameters by stable name
    fn parameters(&self) -> BTreeMap<String, &Matrix>;

    /// Mutable parameters by stable name (optimizer write path)
    fn parameters_mut(&mut self) -> BTreeMap<String, &mut Matrix>;
}

/// Turn logits into output probabilities in place
pub(crate) fn activate_logits(logits: &mut [f64]) {
    if logits.len() == 1 {
        logits[0] = sigmoid(logits[0]);
    } else {
        softmax_inplace(logits);
    }
}

/// Cross-entropy loss and the gradient with respect to the logits.
///
/// For the sigmoid head, `d_logit = p - y`; for softmax, `p - onehot`.
/// Probabilities are clamped away from 0/1 before the log so saturated
/// outputs never produce infinite loss.
pub(crate) fn loss_and_dlogits(probs: &[f64], target: &Target) -> (f64, Vec<f64>) {
    const CLAMP: f64 = 1e-12;
    match *target {
        Target::Binary(y) => {
            debug_assert_eq!(probs.len(), 1);
            let p = probs[0].clamp(CLAMP, 1.0 - CLAMP);
            let loss = -(y * p.ln() + (1.0 - y) * (1.0 - p).ln());
            (loss, vec![probs[0] - y])
        }
        Target::Class(class) => {
            debug_assert!(class < probs.len());
            let p = probs[class].clamp(CLAMP, 1.0 - CLAMP);
            let loss = -p.ln();
            let mut d = probs.to_vec();
            d[class] -= 1.0;
            (loss, d)
        }
    }
}

/// Persisted model: architecture tag, dimensionality and a parameter-by-name
/// map. The JSON layout is the stable serving/training interchange format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub schema_version: u32,
    pub artifact_id: Uuid,
    pub architecture: Architecture,
    pub dims: ModelDims,
    pub params: BTreeMap<String, Matrix>,
}

impl ModelArtifact {
    /// Snapshot a model's parameters into an artifact
    pub fn from_model(model: &dyn SequenceModel) -> Self {
        Self {
            schema_version: ARTIFACT_SCHEMA_VERSION,
            artifact_id: Uuid::new_v4(),
            architecture: model.architecture(),
            dims: model.dims(),
            params: model
                .parameters()
                .into_iter()
                .map(|(name, m)| (name, m.clone()))
                .collect(),
        }
    }

    /// Reconstruct a model from the artifact, validating every parameter
    /// name and shape
    pub fn into_model(&self) -> Result<Box<dyn SequenceModel>, EngineError> {
        if self.schema_version != ARTIFACT_SCHEMA_VERSION {
            return Err(EngineError::ArtifactSchema(format!(
                "artifact schema v{} but engine expects v{}",
                self.schema_version, ARTIFACT_SCHEMA_VERSION
            )));
        }
        // Seed is irrelevant here: every weight is overwritten on install
        let mut model: Box<dyn SequenceModel> = match self.architecture {
            Architecture::Lstm => Box::new(LstmModel::new(self.dims, 0)),
            Architecture::Transformer => Box::new(TransformerModel::new(self.dims, 0)),
        };
        install_params(model.as_mut(), self)?;
        Ok(model)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write the artifact atomically: temp file in the target directory,
    /// then rename. An aborted run never leaves a partial artifact behind.
    pub fn save(&self, path: &Path) -> Result<(), EngineError> {
        let json = self.to_json()?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Read an artifact from disk
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

/// Copy artifact parameters into a freshly constructed model.
///
/// The artifact must carry exactly the parameter names the model expects,
/// each with the expected shape; any drift is an error.
fn install_params(model: &mut dyn SequenceModel, artifact: &ModelArtifact) -> Result<(), EngineError> {
    {
        let expected = model.parameters();
        for name in artifact.params.keys() {
            if !expected.contains_key(name) {
                return Err(EngineError::ArtifactSchema(format!(
                    "unexpected parameter '{}' in artifact",
                    name
                )));
            }
        }
        for (name, param) in &expected {
            let stored = artifact.params.get(name).ok_or_else(|| {
                EngineError::ArtifactSchema(format!("artifact is missing parameter '{}'", name))
            })?;
            if stored.rows != param.rows || stored.cols != param.cols {
                return Err(EngineError::ArtifactSchema(format!(
                    "parameter '{}' has shape {}x{} but model expects {}x{}",
                    name, stored.rows, stored.cols, param.rows, param.cols
                )));
            }
        }
    }
    for (name, param) in model.parameters_mut() {
        // Present and shape-checked above
        if let Some(stored) = artifact.params.get(&name) {
            param.data.copy_from_slice(&stored.data);
        }
    }
    Ok(())
}
