//! Window construction
//!
//! Turns the raw feature table into normalized, labeled sliding windows for
//! training. Normalization is column-wise z-scoring with population
//! statistics and an epsilon-stabilized denominator, computed over the whole
//! table; the raw rows themselves are never mutated.

use crate::config::{NORM_EPSILON, STRESS_BINARY_THRESHOLD};
use crate::error::EngineError;
use crate::features::logs::{BehavioralFeatureRow, FEATURE_DIM};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One training sample: `seq_len` consecutive normalized feature rows for a
/// single user, labeled by the final day's binarized stress level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledWindow {
    pub user_id: String,
    /// Normalized feature rows, one per day, oldest first
    pub rows: Vec<[f64; FEATURE_DIM]>,
    /// 1.0 when the final day's stress label >= the binarization threshold
    pub label: f64,
}

impl LabeledWindow {
    /// Rows as model input
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.rows.iter().map(|r| r.to_vec()).collect()
    }
}

/// Column statistics used for z-normalization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnStats {
    pub mean: [f64; FEATURE_DIM],
    /// Population standard deviation per column
    pub std: [f64; FEATURE_DIM],
}

impl ColumnStats {
    /// Compute population statistics over the feature table
    pub fn from_rows(rows: &[BehavioralFeatureRow]) -> Self {
        let n = rows.len().max(1) as f64;
        let mut mean = [0.0; FEATURE_DIM];
        for row in rows {
            for (m, v) in mean.iter_mut().zip(row.features()) {
                *m += v;
            }
        }
        for m in mean.iter_mut() {
            *m /= n;
        }

        let mut std = [0.0; FEATURE_DIM];
        for row in rows {
            for (s, (v, m)) in std.iter_mut().zip(row.features().into_iter().zip(mean)) {
                *s += (v - m).powi(2);
            }
        }
        for s in std.iter_mut() {
            *s = (*s / n).sqrt();
        }

        Self { mean, std }
    }

    /// Normalize one row with an epsilon-stabilized denominator
    pub fn normalize(&self, row: &BehavioralFeatureRow) -> [f64; FEATURE_DIM] {
        let mut out = [0.0; FEATURE_DIM];
        for (i, v) in row.features().into_iter().enumerate() {
            out[i] = (v - self.mean[i]) / (self.std[i] + NORM_EPSILON);
        }
        out
    }
}

/// Builds labeled sliding windows from a feature table
pub struct WindowBuilder {
    seq_len: usize,
}

impl WindowBuilder {
    /// Builder for windows of `seq_len` consecutive days
    pub fn new(seq_len: usize) -> Self {
        Self { seq_len }
    }

    /// Construct overlapping windows, advancing one day at a time.
    ///
    /// A user contributes windows only when they have at least `seq_len`
    /// rows; a user with exactly `seq_len` rows contributes exactly one.
    /// Windows whose final day lacks a stress label are skipped. Returns an
    /// error when no user has enough rows: training must abort with a clear
    /// diagnostic instead of proceeding with empty batches.
    pub fn build(&self, rows: &[BehavioralFeatureRow]) -> Result<Vec<LabeledWindow>, EngineError> {
        let stats = ColumnStats::from_rows(rows);

        let mut per_user: BTreeMap<&str, Vec<&BehavioralFeatureRow>> = BTreeMap::new();
        for row in rows {
            per_user.entry(row.user_id.as_str()).or_default().push(row);
        }

        let mut windows = Vec::new();
        for (user_id, mut user_rows) in per_user {
            user_rows.sort_by_key(|r| r.date);
            if user_rows.len() < self.seq_len {
                continue;
            }
            for start in 0..=(user_rows.len() - self.seq_len) {
                let slice = &user_rows[start..start + self.seq_len];
                let label = match slice[self.seq_len - 1].stress_label {
                    Some(level) => {
                        if level >= STRESS_BINARY_THRESHOLD {
                            1.0
                        } else {
                            0.0
                        }
                    }
                    None => continue,
                };
                windows.push(LabeledWindow {
                    user_id: user_id.to_string(),
                    rows: slice.iter().map(|r| stats.normalize(r)).collect(),
                    label,
                });
            }
        }

        if windows.is_empty() {
            return Err(EngineError::InsufficientData(format!(
                "no user has {} consecutive labeled feature rows",
                self.seq_len
            )));
        }

        Ok(windows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn row(user: &str, day: u32, stress: u8) -> BehavioralFeatureRow {
        BehavioralFeatureRow {
            user_id: user.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            sleep_duration: 6.0 + day as f64 * 0.1,
            sleep_midpoint: 3.0,
            activity_level: 20.0,
            activity_variance: 0.5,
            routine_change: 3.0,
            stress_label: Some(stress),
        }
    }

    #[test]
    fn test_exactly_seq_len_rows_yield_one_window() {
        let rows: Vec<_> = (1..=7).map(|d| row("u1", d, 2)).collect();
        let windows = WindowBuilder::new(7).build(&rows).unwrap();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].rows.len(), 7);
    }

    #[test]
    fn test_one_row_short_yields_none() {
        let rows: Vec<_> = (1..=6).map(|d| row("u1", d, 2)).collect();
        let result = WindowBuilder::new(7).build(&rows);
        assert!(matches!(result, Err(EngineError::InsufficientData(_))));
    }

    #[test]
    fn test_overlapping_windows_advance_by_one_day() {
        let rows: Vec<_> = (1..=10).map(|d| row("u1", d, 2)).collect();
        let windows = WindowBuilder::new(7).build(&rows).unwrap();
        assert_eq!(windows.len(), 4);
    }

    #[test]
    fn test_label_binarization_threshold() {
        let mut rows: Vec<_> = (1..=7).map(|d| row("u1", d, 1)).collect();
        rows[6].stress_label = Some(3);
        let windows = WindowBuilder::new(7).build(&rows).unwrap();
        assert_eq!(windows[0].label, 1.0);

        rows[6].stress_label = Some(2);
        let windows = WindowBuilder::new(7).build(&rows).unwrap();
        assert_eq!(windows[0].label, 0.0);
    }

    #[test]
    fn test_windows_never_mix_users() {
        let mut rows: Vec<_> = (1..=4).map(|d| row("u1", d, 2)).collect();
        rows.extend((1..=4).map(|d| row("u2", d, 4)));
        // 8 rows total but neither user alone reaches 7
        let result = WindowBuilder::new(7).build(&rows);
        assert!(matches!(result, Err(EngineError::InsufficientData(_))));

        let windows = WindowBuilder::new(4).build(&rows).unwrap();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].user_id, "u1");
        assert_eq!(windows[1].user_id, "u2");
        assert_eq!(windows[0].label, 0.0);
        assert_eq!(windows[1].label, 1.0);
    }

    #[test]
    fn test_normalization_centers_columns() {
        let rows: Vec<_> = (1..=9).map(|d| row("u1", d, 2)).collect();
        let stats = ColumnStats::from_rows(&rows);
        let centered: f64 = rows.iter().map(|r| stats.normalize(r)[0]).sum();
        assert!(centered.abs() < 1e-6);

        // Constant column: epsilon keeps the denominator finite
        let z = stats.normalize(&rows[0]);
        assert!(z[1].is_finite());
        assert!(z[1].abs() < 1e-6);
    }
}
