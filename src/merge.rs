//! Testing data merger: (fips, date) index over the secondary dataset and
//! the field merge onto primary daily records.

use std::collections::HashMap;

use chrono::NaiveDate;
use log::warn;

use crate::loader::TestingObservation;
use crate::types::{DailyRecord, Region, TestingRecord};

/// Exact-key index over the testing dataset.
#[derive(Debug, Default)]
pub struct TestingIndex {
    map: HashMap<(String, NaiveDate), TestingRecord>,
    /// Duplicate (fips, date) keys seen while building. A data-integrity
    /// violation in the source, reported but not fatal; the last-seen row
    /// wins since the dataset corrects in place.
    pub duplicates: usize,
}

impl TestingIndex {
    pub fn build(observations: &[TestingObservation]) -> Self {
        let mut index = Self::default();
        for obs in observations {
            let key = (obs.fips.clone(), obs.date);
            if index.map.contains_key(&key) {
                warn!(
                    "duplicate testing row for region {} on {}; keeping last",
                    obs.fips, obs.date
                );
                index.duplicates += 1;
            }
            index.map.insert(key, obs.record.clone());
        }
        index
    }

    pub fn get(&self, fips: &str, date: NaiveDate) -> Option<&TestingRecord> {
        self.map.get(&(fips.to_string(), date))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }
}

/// Copy a testing record's fields onto a daily record and recompute the
/// ratio fields. Increments come straight from the secondary dataset (it
/// already reports day-over-day deltas); they are never recomputed here.
pub fn apply_testing(record: &mut DailyRecord, testing: &TestingRecord) {
    record.positive = testing.positive;
    record.negative = testing.negative;
    record.pending = testing.pending;
    record.tests = testing.tests;
    record.new_positive = testing.new_positive;
    record.new_negative = testing.new_negative;
    record.new_tests = testing.new_tests;
    record.positive_pct = ratio(testing.positive, testing.tests);
    record.new_positive_pct = ratio(testing.new_positive, testing.new_tests);
}

/// `numerator / denominator`, undefined when the denominator is missing or
/// zero.
pub fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d != 0.0 => Some(n / d),
        _ => None,
    }
}

/// Merge matching testing rows into a region's series. Records with no
/// matching (fips, date) key keep their testing fields unset.
pub fn merge_testing(region: &mut Region, index: &TestingIndex) {
    for record in &mut region.series {
        if let Some(testing) = index.get(&region.fips, record.date) {
            apply_testing(record, testing);
        }
    }
}
