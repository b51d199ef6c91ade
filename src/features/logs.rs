//! Raw behavioral log records and the per-day feature row
//!
//! These are the tabular boundary types read by the feature aggregator. All
//! records are keyed by `(user_id, date)` either directly or through their
//! timestamp.

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Width of a behavioral feature row
pub const FEATURE_DIM: usize = 5;

/// Feature names, index-aligned with [`BehavioralFeatureRow::features`]
pub const FEATURE_NAMES: [&str; FEATURE_DIM] = [
    "sleep_duration",
    "sleep_midpoint",
    "activity_level",
    "activity_variance",
    "routine_change",
];

/// One sleep episode for a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SleepLog {
    pub user_id: String,
    /// Calendar day the episode is attributed to
    pub date: NaiveDate,
    /// Estimated sleep onset
    pub start_time: DateTime<Utc>,
    /// Episode duration in hours
    pub duration_hours: f64,
}

impl SleepLog {
    /// Sleep midpoint expressed as fractional hour of day (0-24).
    ///
    /// Captures circadian rhythm better than onset alone.
    pub fn midpoint_hour(&self) -> f64 {
        // Half the duration in seconds past the onset
        let mid = self.start_time + chrono::Duration::seconds((self.duration_hours * 1800.0) as i64);
        let time = mid.time();
        f64::from(time.hour()) + f64::from(time.minute()) / 60.0
    }
}

/// One activity-inference sample for a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivitySample {
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    /// Activity inference value (0 = stationary, higher = more active)
    pub activity_inference: f64,
}

/// One location ping for a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationPing {
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    /// Opaque cluster identifier for the visited place
    pub location_id: u32,
}

/// One labeled self-report for a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyLabel {
    pub user_id: String,
    pub date: NaiveDate,
    /// Ordinal stress level, 1-5
    pub stress_level: u8,
}

/// Per-(user, day) numeric feature row with an optional ground-truth label.
///
/// Values are raw aggregates; normalization happens in window construction,
/// not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehavioralFeatureRow {
    pub user_id: String,
    pub date: NaiveDate,
    /// Total sleep duration (hours)
    pub sleep_duration: f64,
    /// Sleep midpoint as hour of day (first episode of the day)
    pub sleep_midpoint: f64,
    /// Sum of activity-inference samples
    pub activity_level: f64,
    /// Sample standard deviation of activity inference (0 when < 2 samples)
    pub activity_variance: f64,
    /// Count of distinct locations visited
    pub routine_change: f64,
    /// Ordinal stress label (1-5) when a survey response exists for the day
    pub stress_label: Option<u8>,
}

impl BehavioralFeatureRow {
    /// Features as an ordered vector, aligned with [`FEATURE_NAMES`]
    pub fn features(&self) -> [f64; FEATURE_DIM] {
        [
            self.sleep_duration,
            self.sleep_midpoint,
            self.activity_level,
            self.activity_variance,
            self.routine_change,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_sleep_midpoint_hour() {
        // 8 hours starting 23:00 -> midpoint 03:00
        let log = SleepLog {
            user_id: "u1".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            start_time: Utc.with_ymd_and_hms(2024, 1, 14, 23, 0, 0).unwrap(),
            duration_hours: 8.0,
        };
        assert!((log.midpoint_hour() - 3.0).abs() < 1e-9);

        // 1 hour starting 13:30 -> midpoint 14:00
        let nap = SleepLog {
            user_id: "u1".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            start_time: Utc.with_ymd_and_hms(2024, 1, 15, 13, 30, 0).unwrap(),
            duration_hours: 1.0,
        };
        assert!((nap.midpoint_hour() - 14.0).abs() < 1e-9);
    }

    #[test]
    fn test_feature_order_matches_names() {
        let row = BehavioralFeatureRow {
            user_id: "u1".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            sleep_duration: 7.5,
            sleep_midpoint: 3.2,
            activity_level: 40.0,
            activity_variance: 0.8,
            routine_change: 4.0,
            stress_label: Some(2),
        };
        let f = row.features();
        assert_eq!(f.len(), FEATURE_NAMES.len());
        assert_eq!(f[0], 7.5);
        assert_eq!(f[4], 4.0);
    }
}
