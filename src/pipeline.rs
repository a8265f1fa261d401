//! Pipeline orchestration: normalized observations in, immutable `Dataset`
//! out.
//!
//! The whole build is a pure function of its inputs. Re-running it over the
//! same observations yields an equal `Dataset`, and a re-fetch replaces the
//! previous dataset wholesale rather than mutating it.

use std::collections::BTreeMap;

use log::{info, warn};

use crate::derive::{finalize_region, national_region};
use crate::loader::{CaseObservation, TestingObservation};
use crate::merge::{merge_testing, TestingIndex};
use crate::types::{DailyRecord, Dataset, Region};

/// Assemble the dataset: group case observations into per-region series,
/// merge testing rows, derive deltas and per-capita variants, and build the
/// synthetic national region.
pub fn build_dataset(
    cases: Vec<CaseObservation>,
    testing: &[TestingObservation],
    populations: &BTreeMap<String, u64>,
) -> Dataset {
    // Group by canonical id, preserving input order within each region.
    let mut grouped: BTreeMap<String, Vec<CaseObservation>> = BTreeMap::new();
    for obs in cases {
        grouped.entry(obs.fips.clone()).or_default().push(obs);
    }

    let mut regions: BTreeMap<String, Region> = BTreeMap::new();
    for (fips, mut observations) in grouped {
        // Input is chronologically non-decreasing per region; the stable
        // sort keeps last-seen order for equal dates.
        observations.sort_by_key(|o| o.date);
        let label = observations[0].label.clone();
        let mut series: Vec<DailyRecord> = Vec::with_capacity(observations.len());
        for obs in observations {
            match series.last_mut() {
                Some(last) if last.date == obs.date => {
                    warn!(
                        "duplicate case row for region {} on {}; keeping last",
                        fips, obs.date
                    );
                    *last = DailyRecord::new(obs.date, obs.cases, obs.deaths);
                }
                _ => series.push(DailyRecord::new(obs.date, obs.cases, obs.deaths)),
            }
        }
        let population = populations.get(&fips).copied();
        regions.insert(
            fips.clone(),
            Region {
                fips,
                label,
                population,
                series,
            },
        );
    }

    let index = TestingIndex::build(testing);
    info!(
        "indexed {} testing keys ({} duplicates)",
        index.len(),
        index.duplicates
    );
    for region in regions.values_mut() {
        merge_testing(region, &index);
        finalize_region(region);
    }

    let national = national_region(&regions, testing);

    let first = regions
        .values()
        .filter_map(|r| r.series.first().map(|rec| rec.date))
        .min();
    let last = regions
        .values()
        .filter_map(|r| r.series.last().map(|rec| rec.date))
        .max();

    Dataset {
        regions,
        national,
        date_range: first.zip(last),
    }
}
