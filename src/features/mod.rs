//! Behavioral feature pipeline
//!
//! - [`logs`]: raw multi-modal log records (sleep, activity, location,
//!   survey) as they arrive from collectors.
//! - [`aggregate`]: per-user per-day feature rows joined onto the labeled
//!   survey table.
//! - [`dataset`]: column normalization and sliding-window construction for
//!   training.

pub mod aggregate;
pub mod dataset;
pub mod logs;

pub use aggregate::{FeatureAggregator, RawLogs};
pub use dataset::{LabeledWindow, WindowBuilder};
pub use logs::{
    ActivitySample, BehavioralFeatureRow, LocationPing, SleepLog, SurveyLabel, FEATURE_DIM,
    FEATURE_NAMES,
};
