//! Feature aggregation
//!
//! Collapses raw multi-modal logs into one numeric feature row per
//! (user, day) and joins them onto the labeled survey table. The survey
//! table is the anchor: every labeled day yields exactly one row, and
//! missing modality data defaults to 0 instead of dropping the row.

use crate::features::logs::{
    ActivitySample, BehavioralFeatureRow, LocationPing, SleepLog, SurveyLabel,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Raw log tables read from the collectors
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawLogs {
    pub sleep: Vec<SleepLog>,
    pub activity: Vec<ActivitySample>,
    pub location: Vec<LocationPing>,
    pub survey: Vec<SurveyLabel>,
}

/// Per-day sleep aggregate
#[derive(Debug, Clone, Copy)]
struct SleepDaily {
    total_hours: f64,
    /// Midpoint of the first episode of the day (treated as main sleep)
    midpoint_hour: f64,
}

/// Per-day activity aggregate
#[derive(Debug, Clone)]
struct ActivityDaily {
    samples: Vec<f64>,
}

impl ActivityDaily {
    fn level(&self) -> f64 {
        self.samples.iter().sum()
    }

    /// Sample standard deviation; 0 when fewer than two samples
    fn variance_proxy(&self) -> f64 {
        let n = self.samples.len();
        if n < 2 {
            return 0.0;
        }
        let mean = self.level() / n as f64;
        let var: f64 = self
            .samples
            .iter()
            .map(|x| (x - mean).powi(2))
            .sum::<f64>()
            / (n - 1) as f64;
        var.sqrt()
    }
}

type DayKey = (String, NaiveDate);

/// Aggregates raw logs into behavioral feature rows
pub struct FeatureAggregator;

impl FeatureAggregator {
    /// Aggregate raw logs into one feature row per labeled (user, day).
    ///
    /// Output is sorted by (user, date). Rows are anchored on the survey
    /// table; users or days absent from a modality get zeros for that
    /// modality's features.
    pub fn aggregate(logs: &RawLogs) -> Vec<BehavioralFeatureRow> {
        let sleep_daily = Self::aggregate_sleep(&logs.sleep);
        let activity_daily = Self::aggregate_activity(&logs.activity);
        let routine_daily = Self::aggregate_routine(&logs.location);

        // Left-join onto the label table; BTreeMap keeps (user, date) order
        let mut rows: BTreeMap<DayKey, BehavioralFeatureRow> = BTreeMap::new();
        for label in &logs.survey {
            let key = (label.user_id.clone(), label.date);
            let sleep = sleep_daily.get(&key);
            let activity = activity_daily.get(&key);
            let routine = routine_daily.get(&key).copied().unwrap_or(0);

            rows.insert(
                key,
                BehavioralFeatureRow {
                    user_id: label.user_id.clone(),
                    date: label.date,
                    sleep_duration: sleep.map(|s| s.total_hours).unwrap_or(0.0),
                    sleep_midpoint: sleep.map(|s| s.midpoint_hour).unwrap_or(0.0),
                    activity_level: activity.map(|a| a.level()).unwrap_or(0.0),
                    activity_variance: activity.map(|a| a.variance_proxy()).unwrap_or(0.0),
                    routine_change: routine as f64,
                    stress_label: Some(label.stress_level),
                },
            );
        }

        rows.into_values().collect()
    }

    fn aggregate_sleep(logs: &[SleepLog]) -> BTreeMap<DayKey, SleepDaily> {
        let mut daily: BTreeMap<DayKey, SleepDaily> = BTreeMap::new();
        for log in logs {
            let key = (log.user_id.clone(), log.date);
            match daily.get_mut(&key) {
                Some(entry) => {
                    // Naps add to the total; the midpoint keeps the first
                    // episode (main sleep simplification)
                    entry.total_hours += log.duration_hours;
                }
                None => {
                    daily.insert(
                        key,
                        SleepDaily {
                            total_hours: log.duration_hours,
                            midpoint_hour: log.midpoint_hour(),
                        },
                    );
                }
            }
        }
        daily
    }

    fn aggregate_activity(samples: &[ActivitySample]) -> BTreeMap<DayKey, ActivityDaily> {
        let mut daily: BTreeMap<DayKey, ActivityDaily> = BTreeMap::new();
        for sample in samples {
            let key = (sample.user_id.clone(), sample.timestamp.date_naive());
            daily
                .entry(key)
                .or_insert_with(|| ActivityDaily { samples: Vec::new() })
                .samples
                .push(sample.activity_inference);
        }
        daily
    }

    fn aggregate_routine(pings: &[LocationPing]) -> BTreeMap<DayKey, usize> {
        let mut visited: BTreeMap<DayKey, HashSet<u32>> = BTreeMap::new();
        for ping in pings {
            let key = (ping.user_id.clone(), ping.timestamp.date_naive());
            visited.entry(key).or_default().insert(ping.location_id);
        }
        visited.into_iter().map(|(k, v)| (k, v.len())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn sample_logs() -> RawLogs {
        RawLogs {
            sleep: vec![
                SleepLog {
                    user_id: "u1".to_string(),
                    date: day(15),
                    start_time: Utc.with_ymd_and_hms(2024, 1, 14, 23, 0, 0).unwrap(),
                    duration_hours: 7.0,
                },
                // Afternoon nap on the same day: duration sums, midpoint
                // stays with the first episode
                SleepLog {
                    user_id: "u1".to_string(),
                    date: day(15),
                    start_time: Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap(),
                    duration_hours: 1.0,
                },
            ],
            activity: vec![
                ActivitySample {
                    user_id: "u1".to_string(),
                    timestamp: Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap(),
                    activity_inference: 1.0,
                },
                ActivitySample {
                    user_id: "u1".to_string(),
                    timestamp: Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap(),
                    activity_inference: 2.0,
                },
                ActivitySample {
                    user_id: "u1".to_string(),
                    timestamp: Utc.with_ymd_and_hms(2024, 1, 15, 11, 0, 0).unwrap(),
                    activity_inference: 3.0,
                },
            ],
            location: vec![
                LocationPing {
                    user_id: "u1".to_string(),
                    timestamp: Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap(),
                    location_id: 10,
                },
                LocationPing {
                    user_id: "u1".to_string(),
                    timestamp: Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap(),
                    location_id: 20,
                },
                LocationPing {
                    user_id: "u1".to_string(),
                    timestamp: Utc.with_ymd_and_hms(2024, 1, 15, 18, 0, 0).unwrap(),
                    location_id: 10,
                },
            ],
            survey: vec![
                SurveyLabel {
                    user_id: "u1".to_string(),
                    date: day(15),
                    stress_level: 4,
                },
                SurveyLabel {
                    user_id: "u2".to_string(),
                    date: day(15),
                    stress_level: 2,
                },
            ],
        }
    }

    #[test]
    fn test_sleep_duration_sums_and_midpoint_is_first() {
        let rows = FeatureAggregator::aggregate(&sample_logs());
        let u1 = rows.iter().find(|r| r.user_id == "u1").unwrap();
        assert!((u1.sleep_duration - 8.0).abs() < 1e-9);
        // First episode: 23:00 + 3.5h = 02:30
        assert!((u1.sleep_midpoint - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_activity_level_and_variance() {
        let rows = FeatureAggregator::aggregate(&sample_logs());
        let u1 = rows.iter().find(|r| r.user_id == "u1").unwrap();
        assert!((u1.activity_level - 6.0).abs() < 1e-9);
        // Sample std of [1, 2, 3] is 1
        assert!((u1.activity_variance - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_routine_change_counts_distinct_locations() {
        let rows = FeatureAggregator::aggregate(&sample_logs());
        let u1 = rows.iter().find(|r| r.user_id == "u1").unwrap();
        assert_eq!(u1.routine_change, 2.0);
    }

    #[test]
    fn test_join_keeps_label_only_users() {
        // u2 has a survey response but no sleep/activity/location logs:
        // the row survives with every modality defaulted to 0
        let rows = FeatureAggregator::aggregate(&sample_logs());
        let u2 = rows.iter().find(|r| r.user_id == "u2").unwrap();
        assert_eq!(u2.sleep_duration, 0.0);
        assert_eq!(u2.sleep_midpoint, 0.0);
        assert_eq!(u2.activity_level, 0.0);
        assert_eq!(u2.activity_variance, 0.0);
        assert_eq!(u2.routine_change, 0.0);
        assert_eq!(u2.stress_label, Some(2));
    }

    #[test]
    fn test_unlabeled_days_do_not_produce_rows() {
        let mut logs = sample_logs();
        logs.survey.clear();
        let rows = FeatureAggregator::aggregate(&logs);
        assert!(rows.is_empty());
    }

    #[test]
    fn test_single_activity_sample_has_zero_variance() {
        let mut logs = sample_logs();
        logs.activity.truncate(1);
        let rows = FeatureAggregator::aggregate(&logs);
        let u1 = rows.iter().find(|r| r.user_id == "u1").unwrap();
        assert_eq!(u1.activity_variance, 0.0);
    }

    #[test]
    fn test_output_is_sorted_by_user_and_date() {
        let mut logs = sample_logs();
        logs.survey.push(SurveyLabel {
            user_id: "u1".to_string(),
            date: day(14),
            stress_level: 1,
        });
        let rows = FeatureAggregator::aggregate(&logs);
        let keys: Vec<_> = rows.iter().map(|r| (r.user_id.clone(), r.date)).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }
}
