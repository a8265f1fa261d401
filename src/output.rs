//! File writers and console previews for the collaborator-facing outputs.

use std::path::Path;

use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use crate::error::IngestError;
use crate::types::{DailyRecord, Field, MapSummary, ViewOptions, WindowedRecord};
use crate::util::{format_int, format_number};

pub fn write_csv<T: Serialize>(path: &str, rows: &[T]) -> Result<(), IngestError> {
    let mut wtr = csv::Writer::from_path(path).map_err(|source| IngestError::Csv {
        path: path.into(),
        source,
    })?;
    for r in rows {
        wtr.serialize(r).map_err(|source| IngestError::Csv {
            path: path.into(),
            source,
        })?;
    }
    wtr.flush().map_err(|source| IngestError::Io {
        path: path.into(),
        source,
    })?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &str, value: &T) -> Result<(), IngestError> {
    let s = serde_json::to_string_pretty(value).map_err(|source| IngestError::Json {
        path: path.into(),
        source,
    })?;
    std::fs::write(Path::new(path), s).map_err(|source| IngestError::Io {
        path: path.into(),
        source,
    })?;
    Ok(())
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

/// Map-summary export row: formatted strings for the CSV/console preview.
/// Missing values render as `n/a` so "no population data" never reads as a
/// zero rate.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct MapSummaryDisplay {
    #[serde(rename = "Fips")]
    #[tabled(rename = "Fips")]
    pub fips: String,
    #[serde(rename = "Label")]
    #[tabled(rename = "Label")]
    pub label: String,
    #[serde(rename = "Population")]
    #[tabled(rename = "Population")]
    pub population: String,
    #[serde(rename = "Days")]
    #[tabled(rename = "Days")]
    pub days: usize,
    #[serde(rename = "AvgNewCases")]
    #[tabled(rename = "AvgNewCases")]
    pub avg_new_cases: String,
    #[serde(rename = "AvgNewCasesPer100k")]
    #[tabled(rename = "AvgNewCasesPer100k")]
    pub avg_new_cases_per_100k: String,
    #[serde(rename = "Tests")]
    #[tabled(rename = "Tests")]
    pub tests: String,
    #[serde(rename = "PositivePct")]
    #[tabled(rename = "PositivePct")]
    pub positive_pct: String,
}

impl MapSummaryDisplay {
    pub fn from_summary(summary: &MapSummary) -> Self {
        Self {
            fips: summary.fips.clone(),
            label: summary.label.clone(),
            population: summary
                .population
                .map(format_int)
                .unwrap_or_else(|| "n/a".to_string()),
            days: summary.days,
            avg_new_cases: fmt_value(summary, Field::NewCases.name()),
            avg_new_cases_per_100k: fmt_value(summary, &Field::NewCases.per_capita_name()),
            tests: fmt_value(summary, Field::Tests.name()),
            positive_pct: summary
                .values
                .get(Field::PositivePct.name())
                .map(|pct| format!("{}%", format_number(pct * 100.0, 2)))
                .unwrap_or_else(|| "n/a".to_string()),
        }
    }
}

fn fmt_value(summary: &MapSummary, key: &str) -> String {
    summary
        .values
        .get(key)
        .map(|v| format_number(*v, 2))
        .unwrap_or_else(|| "n/a".to_string())
}

/// One chart bar/point: the selected field's value for a windowed record,
/// aligned by the window's positional index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub fips: String,
    pub i: usize,
    pub date: chrono::NaiveDate,
    /// `None` when the field (or its per-capita variant) is unset for this
    /// record; serialized as an empty cell, not a zero.
    pub value: Option<f64>,
}

/// Flatten a region's windowed slice into chart points for one field,
/// honoring the per-capita view toggle.
pub fn chart_points(
    fips: &str,
    records: &[WindowedRecord],
    field: Field,
    options: &ViewOptions,
) -> Vec<ChartPoint> {
    records
        .iter()
        .map(|w| ChartPoint {
            fips: fips.to_string(),
            i: w.i,
            date: w.record.date,
            value: if options.per_capita {
                w.record.per_capita(field)
            } else {
                w.record.get(field)
            },
        })
        .collect()
}

/// National-series export row for the full daily history.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct NationalSeriesRow {
    #[serde(rename = "Date")]
    #[tabled(rename = "Date")]
    pub date: String,
    #[serde(rename = "Cases")]
    #[tabled(rename = "Cases")]
    pub cases: String,
    #[serde(rename = "NewCases")]
    #[tabled(rename = "NewCases")]
    pub new_cases: String,
    #[serde(rename = "Deaths")]
    #[tabled(rename = "Deaths")]
    pub deaths: String,
    #[serde(rename = "NewDeaths")]
    #[tabled(rename = "NewDeaths")]
    pub new_deaths: String,
    #[serde(rename = "Tests")]
    #[tabled(rename = "Tests")]
    pub tests: String,
    #[serde(rename = "PositivePct")]
    #[tabled(rename = "PositivePct")]
    pub positive_pct: String,
}

impl NationalSeriesRow {
    pub fn from_record(record: &DailyRecord) -> Self {
        let opt = |v: Option<f64>| {
            v.map(|v| format_number(v, 0))
                .unwrap_or_else(|| "n/a".to_string())
        };
        Self {
            date: record.date.to_string(),
            cases: format_number(record.cases, 0),
            new_cases: format_number(record.new_cases, 0),
            deaths: format_number(record.deaths, 0),
            new_deaths: format_number(record.new_deaths, 0),
            tests: opt(record.tests),
            positive_pct: record
                .positive_pct
                .map(|pct| format!("{}%", format_number(pct * 100.0, 2)))
                .unwrap_or_else(|| "n/a".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 3, day).unwrap()
    }

    #[test]
    fn chart_points_follow_the_per_capita_toggle() {
        let mut record = DailyRecord::new(d(15), 500.0, 10.0);
        record.per100k.insert(Field::Cases, 250.0);
        let windowed = vec![WindowedRecord { i: 3, record }];

        let raw = chart_points("06", &windowed, Field::Cases, &ViewOptions::default());
        assert_eq!(raw[0].value, Some(500.0));
        assert_eq!(raw[0].i, 3);

        let options = ViewOptions {
            per_capita: true,
            ..ViewOptions::default()
        };
        let per_capita = chart_points("06", &windowed, Field::Cases, &options);
        assert_eq!(per_capita[0].value, Some(250.0));

        // No per-capita variant for an unmerged testing field: empty, not 0.
        let missing = chart_points("06", &windowed, Field::Tests, &options);
        assert_eq!(missing[0].value, None);
    }

    #[test]
    fn display_row_renders_missing_population_as_na() {
        let summary = MapSummary {
            fips: "48201".to_string(),
            label: "Harris".to_string(),
            population: None,
            no_population: true,
            days: 7,
            values: BTreeMap::from([("newCases".to_string(), 12.5)]),
        };
        let row = MapSummaryDisplay::from_summary(&summary);
        assert_eq!(row.population, "n/a");
        assert_eq!(row.avg_new_cases, "12.50");
        assert_eq!(row.avg_new_cases_per_100k, "n/a");
        assert_eq!(row.positive_pct, "n/a");
    }
}
