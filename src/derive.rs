//! Derived fields: day-over-day deltas, per-capita variants, and the
//! synthetic national aggregate.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::loader::TestingObservation;
use crate::merge;
use crate::types::{DailyRecord, Field, Region, TestingRecord};

pub const NATIONAL_FIPS: &str = "US";
pub const NATIONAL_LABEL: &str = "national";

/// Compute `newCases`/`newDeaths` from consecutive cumulative values.
///
/// The first record has no predecessor and keeps its own cumulative value as
/// its increment (implicit baseline of zero). That reproduces the source
/// dataset's "first reported day equals its own new-case count" convention
/// and must not be reinterpreted as zero.
pub fn compute_deltas(series: &mut [DailyRecord]) {
    let mut prev: Option<(f64, f64)> = None;
    for record in series.iter_mut() {
        let (prev_cases, prev_deaths) = prev.unwrap_or((0.0, 0.0));
        record.new_cases = record.cases - prev_cases;
        record.new_deaths = record.deaths - prev_deaths;
        prev = Some((record.cases, record.deaths));
    }
}

/// Derive the per-100k variant of every set numeric field.
///
/// With no known positive population, nothing is set: absence is
/// semantically distinct from "rate is zero" and renders as an explicit
/// "no population data" state.
pub fn apply_per_capita(record: &mut DailyRecord, population: Option<u64>) {
    record.per100k.clear();
    let Some(population) = population.filter(|p| *p > 0) else {
        return;
    };
    let divisor = population as f64 / 100_000.0;
    for field in Field::ALL {
        if !field.has_per_capita() {
            continue;
        }
        if let Some(value) = record.get(field) {
            record.per100k.insert(field, value / divisor);
        }
    }
}

/// Run a region's series through the delta calculator and the per-capita
/// normalizer. Testing fields must already be merged.
pub fn finalize_region(region: &mut Region) {
    compute_deltas(&mut region.series);
    let population = region.population;
    for record in &mut region.series {
        apply_per_capita(record, population);
    }
}

/// Build the synthetic national region.
///
/// Two independent aggregation passes, kept separate on purpose: the case
/// pass sums over regions present in the case dataset on each date, while
/// the testing pass sums over raw testing rows present on each date. Their
/// region coverage can diverge per date; unifying them would silently alter
/// historical totals. Neither pass zero-fills regions that have not started
/// reporting.
pub fn national_region(
    regions: &BTreeMap<String, Region>,
    testing: &[TestingObservation],
) -> Region {
    // Case pass: sum cases/deaths over regions reporting each date.
    let mut by_date: BTreeMap<NaiveDate, (f64, f64)> = BTreeMap::new();
    for region in regions.values() {
        for record in &region.series {
            let entry = by_date.entry(record.date).or_insert((0.0, 0.0));
            entry.0 += record.cases;
            entry.1 += record.deaths;
        }
    }
    let mut series: Vec<DailyRecord> = by_date
        .into_iter()
        .map(|(date, (cases, deaths))| DailyRecord::new(date, cases, deaths))
        .collect();

    // Testing pass: sum every testing field over rows present each date.
    let mut testing_by_date: BTreeMap<NaiveDate, TestingRecord> = BTreeMap::new();
    for obs in testing {
        let entry = testing_by_date.entry(obs.date).or_default();
        add_opt(&mut entry.positive, obs.record.positive);
        add_opt(&mut entry.negative, obs.record.negative);
        add_opt(&mut entry.pending, obs.record.pending);
        add_opt(&mut entry.tests, obs.record.tests);
        add_opt(&mut entry.new_positive, obs.record.new_positive);
        add_opt(&mut entry.new_negative, obs.record.new_negative);
        add_opt(&mut entry.new_tests, obs.record.new_tests);
    }
    for record in &mut series {
        if let Some(summed) = testing_by_date.get(&record.date) {
            merge::apply_testing(record, summed);
        }
    }

    // National population: sum of all known regional populations.
    let known: u64 = regions.values().filter_map(|r| r.population).sum();
    let population = (known > 0).then_some(known);

    let mut national = Region {
        fips: NATIONAL_FIPS.to_string(),
        label: NATIONAL_LABEL.to_string(),
        population,
        series,
    };
    finalize_region(&mut national);
    national
}

/// Accumulate an optional value: `None` contributes nothing, and a sum only
/// exists once at least one value was seen.
fn add_opt(acc: &mut Option<f64>, value: Option<f64>) {
    if let Some(v) = value {
        *acc = Some(acc.unwrap_or(0.0) + v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 3, day).unwrap()
    }

    fn series(cumulative: &[(u32, f64)]) -> Vec<DailyRecord> {
        cumulative
            .iter()
            .map(|(day, cases)| DailyRecord::new(d(*day), *cases, 0.0))
            .collect()
    }

    #[test]
    fn deltas_match_cumulative_differences() {
        // cases [10, 15, 15, 20] => newCases [10, 5, 0, 5]
        let mut s = series(&[(1, 10.0), (2, 15.0), (3, 15.0), (4, 20.0)]);
        compute_deltas(&mut s);
        let deltas: Vec<f64> = s.iter().map(|r| r.new_cases).collect();
        assert_eq!(deltas, vec![10.0, 5.0, 0.0, 5.0]);
    }

    #[test]
    fn first_record_keeps_its_own_cumulative_as_delta() {
        let mut s = series(&[(1, 7.0)]);
        s[0].deaths = 3.0;
        compute_deltas(&mut s);
        assert_eq!(s[0].new_cases, 7.0);
        assert_eq!(s[0].new_deaths, 3.0);
    }

    #[test]
    fn per_capita_divides_by_population_per_100k() {
        let mut record = DailyRecord::new(d(1), 50.0, 0.0);
        record.new_cases = 50.0;
        record.tests = Some(400.0);
        apply_per_capita(&mut record, Some(200_000));
        // population / 100k = 2
        assert_eq!(record.per_capita(Field::Cases), Some(25.0));
        assert_eq!(record.per_capita(Field::NewCases), Some(25.0));
        assert_eq!(record.per_capita(Field::Tests), Some(200.0));
        // Unset fields get no per-capita variant.
        assert_eq!(record.per_capita(Field::Positive), None);
    }

    #[test]
    fn unknown_population_sets_no_per_capita_fields() {
        let mut record = DailyRecord::new(d(1), 50.0, 0.0);
        apply_per_capita(&mut record, None);
        assert!(record.per100k.is_empty());
        apply_per_capita(&mut record, Some(0));
        assert!(record.per100k.is_empty());
    }

    fn region(fips: &str, population: Option<u64>, s: Vec<DailyRecord>) -> Region {
        Region {
            fips: fips.to_string(),
            label: fips.to_string(),
            population,
            series: s,
        }
    }

    #[test]
    fn national_sums_only_regions_reporting_each_date() {
        let mut regions = BTreeMap::new();
        // Region A reports days 1-3, region B starts on day 2.
        regions.insert(
            "A".to_string(),
            region("A", Some(100_000), series(&[(1, 10.0), (2, 15.0), (3, 20.0)])),
        );
        regions.insert(
            "B".to_string(),
            region("B", Some(300_000), series(&[(2, 5.0), (3, 5.0)])),
        );
        let national = national_region(&regions, &[]);

        let cases: Vec<(NaiveDate, f64)> =
            national.series.iter().map(|r| (r.date, r.cases)).collect();
        // Day 1 has only A; no zero-fill for B.
        assert_eq!(cases, vec![(d(1), 10.0), (d(2), 20.0), (d(3), 25.0)]);
        assert_eq!(national.population, Some(400_000));
        assert_eq!(national.fips, NATIONAL_FIPS);
        // Deltas run over the synthetic series like any other region.
        assert_eq!(national.series[0].new_cases, 10.0);
        assert_eq!(national.series[1].new_cases, 10.0);
        assert_eq!(national.series[2].new_cases, 5.0);
    }

    #[test]
    fn national_testing_pass_is_independent_of_case_coverage() {
        let mut regions = BTreeMap::new();
        regions.insert(
            "A".to_string(),
            region("A", None, series(&[(1, 10.0), (2, 15.0)])),
        );
        // Testing rows exist for two regions on day 2, including one ("C")
        // absent from the case dataset. Its counts still aggregate.
        let testing = vec![
            TestingObservation {
                fips: "A".to_string(),
                date: d(2),
                record: TestingRecord {
                    positive: Some(10.0),
                    tests: Some(40.0),
                    new_tests: Some(40.0),
                    ..TestingRecord::default()
                },
            },
            TestingObservation {
                fips: "C".to_string(),
                date: d(2),
                record: TestingRecord {
                    positive: Some(5.0),
                    tests: Some(10.0),
                    new_tests: Some(10.0),
                    ..TestingRecord::default()
                },
            },
        ];
        let national = national_region(&regions, &testing);
        let day2 = &national.series[1];
        assert_eq!(day2.positive, Some(15.0));
        assert_eq!(day2.tests, Some(50.0));
        assert_eq!(day2.new_tests, Some(50.0));
        assert_eq!(day2.positive_pct, Some(0.3));
        // Day 1 had no testing rows at all.
        assert_eq!(national.series[0].tests, None);
        // No known populations: per-capita stays absent.
        assert_eq!(national.population, None);
        assert!(national.series[1].per100k.is_empty());
    }
}
