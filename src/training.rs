//! Offline training pipeline
//!
//! Consumes labeled windows, trains a sequence model with Adam, evaluates on
//! a held-out split and persists the result as a model artifact. Everything
//! is deterministic given the configured seed: the split, the per-epoch
//! shuffle, the weight initialization.
//!
//! Parameter updates are strictly sequential per batch; there is no
//! concurrent write path to the parameter set.

use crate::error::EngineError;
use crate::features::dataset::LabeledWindow;
use crate::model::linalg::{argmax, Matrix};
use crate::model::{
    Architecture, Gradients, LstmModel, ModelArtifact, ModelDims, SequenceModel, Target,
    TransformerModel,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Training hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub architecture: Architecture,
    pub hidden_dim: usize,
    pub num_layers: usize,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Fraction of windows used for training (remainder is held out)
    pub train_fraction: f64,
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            architecture: Architecture::Lstm,
            hidden_dim: 32,
            num_layers: 2,
            epochs: 10,
            batch_size: 32,
            learning_rate: 1e-3,
            train_fraction: 0.8,
            seed: 42,
        }
    }
}

/// Outcome of one training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Mean training loss per epoch
    pub epoch_losses: Vec<f64>,
    /// Held-out accuracy; `None` when the split left no evaluation windows
    pub eval_accuracy: Option<f64>,
    pub total_windows: usize,
    pub train_windows: usize,
    pub eval_windows: usize,
}

/// Adam optimizer with per-parameter first/second moment estimates
struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    step_count: u64,
    moments: BTreeMap<String, (Vec<f64>, Vec<f64>)>,
}

impl Adam {
    fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            step_count: 0,
            moments: BTreeMap::new(),
        }
    }

    fn step(&mut self, model: &mut dyn SequenceModel, grads: &Gradients) {
        self.step_count += 1;
        let bias1 = 1.0 - self.beta1.powi(self.step_count as i32);
        let bias2 = 1.0 - self.beta2.powi(self.step_count as i32);

        for (name, param) in model.parameters_mut() {
            let grad = match grads.get(&name) {
                Some(g) => g,
                None => continue,
            };
            let (m, v) = self
                .moments
                .entry(name)
                .or_insert_with(|| (vec![0.0; param.data.len()], vec![0.0; param.data.len()]));
            for ((p, &g), (mi, vi)) in param
                .data
                .iter_mut()
                .zip(&grad.data)
                .zip(m.iter_mut().zip(v.iter_mut()))
            {
                *mi = self.beta1 * *mi + (1.0 - self.beta1) * g;
                *vi = self.beta2 * *vi + (1.0 - self.beta2) * g * g;
                let m_hat = *mi / bias1;
                let v_hat = *vi / bias2;
                *p -= self.learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
            }
        }
    }
}

/// Trains and evaluates sequence models over labeled windows
pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    /// Run the full pipeline: split, train, evaluate.
    ///
    /// Fails with [`EngineError::InsufficientData`] when no windows are
    /// available; training never proceeds with empty batches.
    pub fn train(
        &self,
        windows: &[LabeledWindow],
    ) -> Result<(Box<dyn SequenceModel>, TrainingReport), EngineError> {
        if windows.is_empty() {
            return Err(EngineError::InsufficientData(
                "no labeled windows to train on".to_string(),
            ));
        }
        let input_dim = windows[0].rows[0].len();
        let dims = ModelDims {
            input_dim,
            hidden_dim: self.config.hidden_dim,
            output_dim: 1,
            num_layers: self.config.num_layers,
        };

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut indices: Vec<usize> = (0..windows.len()).collect();
        indices.shuffle(&mut rng);
        let train_count = ((windows.len() as f64 * self.config.train_fraction) as usize)
            .clamp(1, windows.len());
        let (train_idx, eval_idx) = indices.split_at(train_count);

        let mut model: Box<dyn SequenceModel> = match self.config.architecture {
            Architecture::Lstm => Box::new(LstmModel::new(dims, self.config.seed)),
            Architecture::Transformer => Box::new(TransformerModel::new(dims, self.config.seed)),
        };
        let mut optimizer = Adam::new(self.config.learning_rate);

        info!(
            architecture = self.config.architecture.as_str(),
            total = windows.len(),
            train = train_idx.len(),
            eval = eval_idx.len(),
            epochs = self.config.epochs,
            "starting training"
        );

        let mut epoch_losses = Vec::with_capacity(self.config.epochs);
        let mut order: Vec<usize> = train_idx.to_vec();
        for epoch in 0..self.config.epochs {
            order.shuffle(&mut rng);
            let mut total_loss = 0.0;

            for batch in order.chunks(self.config.batch_size) {
                let mut batch_grads: Option<Gradients> = None;
                for &idx in batch {
                    let window = &windows[idx];
                    let (loss, grads) = model
                        .loss_and_gradients(&window.to_rows(), &Target::Binary(window.label));
                    total_loss += loss;
                    batch_grads = Some(match batch_grads {
                        None => grads,
                        Some(mut acc) => {
                            for (name, grad) in grads {
                                if let Some(a) = acc.get_mut(&name) {
                                    a.add_scaled(&grad, 1.0);
                                }
                            }
                            acc
                        }
                    });
                }
                if let Some(mut grads) = batch_grads {
                    let scale = 1.0 / batch.len() as f64;
                    for grad in grads.values_mut() {
                        scale_matrix(grad, scale);
                    }
                    optimizer.step(model.as_mut(), &grads);
                }
            }

            let epoch_loss = total_loss / train_idx.len() as f64;
            info!(epoch = epoch + 1, loss = epoch_loss, "epoch complete");
            epoch_losses.push(epoch_loss);
        }

        let eval_accuracy = if eval_idx.is_empty() {
            None
        } else {
            Some(evaluate(model.as_ref(), windows, eval_idx))
        };
        if let Some(acc) = eval_accuracy {
            info!(accuracy = acc, "evaluation complete");
        }

        let report = TrainingReport {
            epoch_losses,
            eval_accuracy,
            total_windows: windows.len(),
            train_windows: train_idx.len(),
            eval_windows: eval_idx.len(),
        };
        Ok((model, report))
    }

    /// Train and persist the artifact atomically
    pub fn train_and_save(
        &self,
        windows: &[LabeledWindow],
        path: &Path,
    ) -> Result<TrainingReport, EngineError> {
        let (model, report) = self.train(windows)?;
        let artifact = ModelArtifact::from_model(model.as_ref());
        artifact.save(path)?;
        info!(path = %path.display(), artifact_id = %artifact.artifact_id, "artifact saved");
        Ok(report)
    }
}

/// Classification accuracy over the given window indices.
///
/// Binary outputs threshold the sigmoid at 0.5; wider heads use argmax.
pub fn evaluate(model: &dyn SequenceModel, windows: &[LabeledWindow], indices: &[usize]) -> f64 {
    let mut correct = 0usize;
    for &idx in indices {
        let window = &windows[idx];
        let probs = model.forward(&window.to_rows());
        let predicted = if probs.len() == 1 {
            if probs[0] > 0.5 {
                1.0
            } else {
                0.0
            }
        } else {
            argmax(&probs) as f64
        };
        if (predicted - window.label).abs() < f64::EPSILON {
            correct += 1;
        }
    }
    correct as f64 / indices.len() as f64
}

fn scale_matrix(m: &mut Matrix, scale: f64) {
    for v in m.data.iter_mut() {
        *v *= scale;
    }
}
