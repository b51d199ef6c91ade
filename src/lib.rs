//! Affect Engine - affective pattern classification and risk scoring
//!
//! Turns heterogeneous behavioral and self-report signals into a discrete
//! affective-pattern classification and a bounded, explainable risk score.
//!
//! Serving pipeline: raw signal → emotion-state vector → affect sequence →
//! pattern classification + heuristic risk scoring.
//! Offline pipeline: raw logs → feature table → labeled windows → trained
//! sequence model → persisted artifact.
//!
//! ## Modules
//!
//! - **mapper / synth**: questionnaire answers and sensor frames to
//!   emotion-state vectors and affect sequences
//! - **features**: raw log aggregation into daily behavioral features and
//!   labeled training windows
//! - **model / training**: interchangeable LSTM / attention sequence models
//!   and the offline training pipeline
//! - **classifier / predictor / risk**: serving-side classification, learned
//!   risk prediction and the deterministic heuristic scorer
//! - **pipeline**: the [`AffectProcessor`] orchestrating both serving paths

pub mod classifier;
pub mod config;
pub mod error;
pub mod features;
pub mod mapper;
pub mod model;
pub mod pipeline;
pub mod predictor;
pub mod risk;
pub mod synth;
pub mod taxonomy;
pub mod training;
pub mod vector;

pub use classifier::{ModelState, PatternClassification, PatternClassifier};
pub use config::{EngineConfig, FactorThresholds, RiskPolicy};
pub use error::EngineError;
pub use mapper::VectorMapper;
pub use pipeline::{AffectInsight, AffectProcessor, ArtifactPaths, TimelinePoint};
pub use predictor::RiskPredictor;
pub use risk::{RiskAssessment, RiskLabel, RiskScorer};
pub use synth::{MeasuredSource, PersistenceSynthesizer, SequenceSource};
pub use training::{Trainer, TrainingConfig, TrainingReport};
pub use vector::{AffectSequence, EmotionVector};

/// Engine version embedded in every insight payload
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for insight payloads
pub const PRODUCER_NAME: &str = "affect-engine";
