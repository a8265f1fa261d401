//! Raw dataset ingestion: the record normalizer and population resolver.
//!
//! Three loaders, one per source dataset. Each is forgiving at the row
//! level (malformed rows are skipped and counted in a [`LoadReport`]) and
//! strict at the dataset level (a file with zero usable rows is an error).

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use chrono::NaiveDate;
use csv::ReaderBuilder;
use log::warn;
use serde::Deserialize;

use crate::error::IngestError;
use crate::geo::GeoTables;
use crate::types::TestingRecord;
use crate::util::{parse_compact_date, parse_date_safe, parse_f64_safe, parse_u64_safe};

/// Primary case dataset row as it appears on disk.
#[derive(Debug, Deserialize)]
pub struct RawCaseRow {
    pub date: Option<String>,
    pub county: Option<String>,
    pub state: Option<String>,
    pub fips: Option<String>,
    pub cases: Option<String>,
    pub deaths: Option<String>,
}

/// Population dataset row as it appears on disk.
#[derive(Debug, Deserialize)]
pub struct RawPopulationRow {
    pub fips: Option<String>,
    pub population: Option<String>,
}

/// Testing dataset row as it appears on the wire: compact `YYYYMMDD` date
/// numeral, nullable numeric fields.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTestingRow {
    pub date: u32,
    pub fips: Option<String>,
    pub positive: Option<f64>,
    pub negative: Option<f64>,
    pub pending: Option<f64>,
    #[serde(rename = "totalTestResults")]
    pub total: Option<f64>,
    #[serde(rename = "positiveIncrease")]
    pub positive_increase: Option<f64>,
    #[serde(rename = "negativeIncrease")]
    pub negative_increase: Option<f64>,
    #[serde(rename = "totalTestResultsIncrease")]
    pub total_increase: Option<f64>,
}

/// A normalized case row: canonical id, typed date, numeric counts.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseObservation {
    pub fips: String,
    pub label: String,
    pub date: NaiveDate,
    pub cases: f64,
    pub deaths: f64,
}

/// A normalized testing row, ready for (fips, date) indexing.
#[derive(Debug, Clone, PartialEq)]
pub struct TestingObservation {
    pub fips: String,
    pub date: NaiveDate,
    pub record: TestingRecord,
}

/// Per-dataset ingestion diagnostics, printed by the CLI after each load.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub total_rows: usize,
    pub kept_rows: usize,
    pub malformed_rows: usize,
    /// Rows whose region id came from the label exception table.
    pub label_resolved: usize,
}

/// Load and normalize the primary case dataset.
///
/// Rows without a FIPS code but with a known county label resolve through
/// the label exception table; rows with neither are malformed. All ids are
/// canonicalized through the remap table, so the five NYC borough codes land
/// on one region.
pub fn load_cases(
    path: &str,
    tables: &GeoTables,
) -> Result<(Vec<CaseObservation>, LoadReport), IngestError> {
    let file = File::open(path).map_err(|source| IngestError::Io {
        path: path.into(),
        source,
    })?;
    read_cases(BufReader::new(file), Path::new(path), tables)
}

fn read_cases<R: Read>(
    reader: R,
    path: &Path,
    tables: &GeoTables,
) -> Result<(Vec<CaseObservation>, LoadReport), IngestError> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    let mut report = LoadReport::default();
    let mut out: Vec<CaseObservation> = Vec::new();

    for result in rdr.deserialize::<RawCaseRow>() {
        report.total_rows += 1;
        let row = match result {
            Ok(r) => r,
            Err(_) => {
                report.malformed_rows += 1;
                continue;
            }
        };

        let Some(date) = parse_date_safe(row.date.as_deref()) else {
            report.malformed_rows += 1;
            continue;
        };

        let county = row.county.as_deref().map(str::trim).unwrap_or("");
        let raw_fips = row.fips.as_deref().map(str::trim).unwrap_or("");
        let fips = if !raw_fips.is_empty() {
            raw_fips.to_string()
        } else if let Some(resolved) = tables.resolve_label(county) {
            report.label_resolved += 1;
            resolved.to_string()
        } else {
            report.malformed_rows += 1;
            continue;
        };
        let fips = tables.canonical_fips(&fips);

        let (Some(cases), Some(deaths)) = (
            parse_f64_safe(row.cases.as_deref()),
            parse_f64_safe(row.deaths.as_deref()),
        ) else {
            report.malformed_rows += 1;
            continue;
        };

        let label = if !county.is_empty() {
            county.to_string()
        } else {
            row.state.unwrap_or_else(|| "Unknown".to_string()).trim().to_string()
        };

        out.push(CaseObservation {
            fips,
            label,
            date,
            cases,
            deaths,
        });
    }

    report.kept_rows = out.len();
    if out.is_empty() {
        return Err(IngestError::NoUsableRows {
            path: path.into(),
            malformed: report.malformed_rows,
        });
    }
    Ok((out, report))
}

/// Load the population dataset into a canonical `fips -> population` map.
///
/// Alias ids are redirected to their canonical id before insertion, and the
/// override table is applied last so a known-bad source value never wins.
/// Regions absent from the result simply have no population data; callers
/// must not treat that as zero.
pub fn load_population(
    path: &str,
    tables: &GeoTables,
) -> Result<(BTreeMap<String, u64>, LoadReport), IngestError> {
    let file = File::open(path).map_err(|source| IngestError::Io {
        path: path.into(),
        source,
    })?;
    read_population(BufReader::new(file), Path::new(path), tables)
}

fn read_population<R: Read>(
    reader: R,
    path: &Path,
    tables: &GeoTables,
) -> Result<(BTreeMap<String, u64>, LoadReport), IngestError> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    let mut report = LoadReport::default();
    let mut map: BTreeMap<String, u64> = BTreeMap::new();

    for result in rdr.deserialize::<RawPopulationRow>() {
        report.total_rows += 1;
        let row = match result {
            Ok(r) => r,
            Err(_) => {
                report.malformed_rows += 1;
                continue;
            }
        };
        let fips = row.fips.as_deref().map(str::trim).unwrap_or("");
        let Some(population) = parse_u64_safe(row.population.as_deref()) else {
            report.malformed_rows += 1;
            continue;
        };
        if fips.is_empty() {
            report.malformed_rows += 1;
            continue;
        }
        report.kept_rows += 1;
        map.insert(tables.canonical_fips(fips), population);
    }

    // Overrides always win over the source file.
    for (fips, population) in &tables.population_overrides {
        map.insert(fips.clone(), *population);
    }

    if report.kept_rows == 0 {
        return Err(IngestError::NoUsableRows {
            path: path.into(),
            malformed: report.malformed_rows,
        });
    }
    Ok((map, report))
}

/// Load the testing dataset (a JSON array) and normalize its compact dates.
pub fn load_testing(
    path: &str,
    tables: &GeoTables,
) -> Result<(Vec<TestingObservation>, LoadReport), IngestError> {
    let file = File::open(path).map_err(|source| IngestError::Io {
        path: path.into(),
        source,
    })?;
    read_testing(BufReader::new(file), Path::new(path), tables)
}

fn read_testing<R: Read>(
    reader: R,
    path: &Path,
    tables: &GeoTables,
) -> Result<(Vec<TestingObservation>, LoadReport), IngestError> {
    let rows: Vec<RawTestingRow> =
        serde_json::from_reader(reader).map_err(|source| IngestError::Json {
            path: path.into(),
            source,
        })?;

    let mut report = LoadReport::default();
    let mut out: Vec<TestingObservation> = Vec::new();
    for row in rows {
        report.total_rows += 1;
        let fips = row.fips.as_deref().map(str::trim).unwrap_or("");
        if fips.is_empty() {
            report.malformed_rows += 1;
            continue;
        }
        let Some(date) = parse_compact_date(row.date) else {
            warn!("testing row for {} has unparseable date {}", fips, row.date);
            report.malformed_rows += 1;
            continue;
        };
        out.push(TestingObservation {
            fips: tables.canonical_fips(fips),
            date,
            record: TestingRecord {
                positive: row.positive,
                negative: row.negative,
                pending: row.pending,
                tests: row.total,
                new_positive: row.positive_increase,
                new_negative: row.negative_increase,
                new_tests: row.total_increase,
            },
        });
    }

    report.kept_rows = out.len();
    if out.is_empty() {
        return Err(IngestError::NoUsableRows {
            path: path.into(),
            malformed: report.malformed_rows,
        });
    }
    Ok((out, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::default_tables;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn cases_resolve_missing_fips_through_label_table() {
        let csv = "date,county,state,fips,cases,deaths\n\
                   2020-03-15,New York City,New York,,100,3\n\
                   2020-03-15,Los Angeles,California,06037,50,1\n";
        let (obs, report) =
            read_cases(csv.as_bytes(), Path::new("cases.csv"), &default_tables()).unwrap();
        assert_eq!(report.total_rows, 2);
        assert_eq!(report.kept_rows, 2);
        assert_eq!(report.label_resolved, 1);
        assert_eq!(obs[0].fips, "36061");
        assert_eq!(obs[1].fips, "06037");
        assert_eq!(obs[0].date, d(2020, 3, 15));
    }

    #[test]
    fn cases_skip_unparseable_dates_and_unknown_labels() {
        let csv = "date,county,state,fips,cases,deaths\n\
                   not-a-date,Cook,Illinois,17031,10,0\n\
                   2020-03-15,Nowhere,Nowhere,,10,0\n\
                   2020-03-15,Cook,Illinois,17031,10,0\n";
        let (obs, report) =
            read_cases(csv.as_bytes(), Path::new("cases.csv"), &default_tables()).unwrap();
        assert_eq!(report.malformed_rows, 2);
        assert_eq!(obs.len(), 1);
    }

    #[test]
    fn cases_fail_when_every_row_is_malformed() {
        let csv = "date,county,state,fips,cases,deaths\n\
                   bad,Cook,Illinois,17031,10,0\n";
        let err = read_cases(csv.as_bytes(), Path::new("cases.csv"), &default_tables())
            .unwrap_err();
        assert!(matches!(err, IngestError::NoUsableRows { malformed: 1, .. }));
    }

    #[test]
    fn borough_codes_collapse_to_one_region() {
        let csv = "date,county,state,fips,cases,deaths\n\
                   2020-03-15,Kings,New York,36047,20,0\n";
        let (obs, _) =
            read_cases(csv.as_bytes(), Path::new("cases.csv"), &default_tables()).unwrap();
        assert_eq!(obs[0].fips, "36061");
    }

    #[test]
    fn population_override_beats_source_value() {
        let csv = "fips,population\n36061,1628706\n06037,10039107\n";
        let (map, report) =
            read_population(csv.as_bytes(), Path::new("pop.csv"), &default_tables()).unwrap();
        assert_eq!(report.kept_rows, 2);
        // Manhattan's source value is replaced by the combined-borough override.
        assert_eq!(map.get("36061"), Some(&8_336_817));
        assert_eq!(map.get("06037"), Some(&10_039_107));
        // No entry means no population data, not zero.
        assert_eq!(map.get("48201"), None);
    }

    #[test]
    fn population_alias_redirects_before_lookup() {
        let tables = GeoTables {
            fips_remap: std::collections::HashMap::from([(
                "X2".to_string(),
                "X1".to_string(),
            )]),
            ..GeoTables::default()
        };
        let csv = "fips,population\nX2,1000\n";
        let (map, _) = read_population(csv.as_bytes(), Path::new("pop.csv"), &tables).unwrap();
        assert_eq!(map.get("X1"), Some(&1000));
        assert_eq!(map.get("X2"), None);
    }

    #[test]
    fn testing_rows_normalize_compact_dates() {
        let json = r#"[
            {"date": 20200315, "fips": "06", "positive": 100.0,
             "totalTestResults": 400.0, "positiveIncrease": 100.0,
             "totalTestResultsIncrease": 400.0},
            {"date": 20200231, "fips": "06", "positive": 1.0}
        ]"#;
        let (obs, report) =
            read_testing(json.as_bytes(), Path::new("testing.json"), &default_tables()).unwrap();
        assert_eq!(report.total_rows, 2);
        assert_eq!(report.malformed_rows, 1);
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].date, d(2020, 3, 15));
        assert_eq!(obs[0].record.tests, Some(400.0));
        assert_eq!(obs[0].record.new_positive, Some(100.0));
        assert_eq!(obs[0].record.pending, None);
    }
}
