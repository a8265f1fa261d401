//! Core data model: tracked fields, daily records, regions, and the
//! window/extent/summary output types.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

/// Every numeric field tracked on a daily record.
///
/// `cases`/`deaths` come from the primary dataset; the testing fields are
/// merged in from the secondary dataset and may be absent for any given
/// region/date. The `New*` variants are day-over-day increments and the
/// `*Pct` variants are derived ratios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Cases,
    Deaths,
    Positive,
    Negative,
    Pending,
    Tests,
    NewCases,
    NewDeaths,
    NewPositive,
    NewNegative,
    NewTests,
    PositivePct,
    NewPositivePct,
}

/// How a field collapses over a window in the map summary.
///
/// Cumulative and testing counts total meaningfully, so they sum. The
/// incremental fields already express a daily rate, so they average; summing
/// them would double-count against the cumulative sums. Ratios are never
/// aggregated directly, they are recomputed from the aggregated
/// numerator/denominator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Sum,
    Mean,
    Ratio,
}

impl Field {
    pub const ALL: [Field; 13] = [
        Field::Cases,
        Field::Deaths,
        Field::Positive,
        Field::Negative,
        Field::Pending,
        Field::Tests,
        Field::NewCases,
        Field::NewDeaths,
        Field::NewPositive,
        Field::NewNegative,
        Field::NewTests,
        Field::PositivePct,
        Field::NewPositivePct,
    ];

    /// Wire name used in keyed outputs (extent table, map summary values).
    pub fn name(self) -> &'static str {
        match self {
            Field::Cases => "cases",
            Field::Deaths => "deaths",
            Field::Positive => "positive",
            Field::Negative => "negative",
            Field::Pending => "pending",
            Field::Tests => "tests",
            Field::NewCases => "newCases",
            Field::NewDeaths => "newDeaths",
            Field::NewPositive => "newPositive",
            Field::NewNegative => "newNegative",
            Field::NewTests => "newTests",
            Field::PositivePct => "positivePct",
            Field::NewPositivePct => "newPositivePct",
        }
    }

    /// Wire name of the per-capita variant, e.g. `casesPer100k`.
    pub fn per_capita_name(self) -> String {
        format!("{}Per100k", self.name())
    }

    pub fn aggregation(self) -> Aggregation {
        match self {
            Field::Cases
            | Field::Deaths
            | Field::Positive
            | Field::Negative
            | Field::Pending
            | Field::Tests => Aggregation::Sum,
            Field::NewCases
            | Field::NewDeaths
            | Field::NewPositive
            | Field::NewNegative
            | Field::NewTests => Aggregation::Mean,
            Field::PositivePct | Field::NewPositivePct => Aggregation::Ratio,
        }
    }

    /// Ratios are already population-independent, so they carry no
    /// per-capita variant.
    pub fn has_per_capita(self) -> bool {
        self.aggregation() != Aggregation::Ratio
    }
}

/// One region's state for one calendar day.
///
/// Invariants (established by the pipeline, relied on everywhere else):
/// - within a region's series, `date` is strictly increasing and unique;
/// - `new_cases`/`new_deaths` equal the difference from the previous
///   record's cumulative fields, with the first record equal to its own
///   cumulative value (implicit zero baseline);
/// - `per100k` is empty when the region's population is unknown. Absence
///   means "no population data", never "rate is zero".
#[derive(Debug, Clone, PartialEq)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub cases: f64,
    pub deaths: f64,
    pub new_cases: f64,
    pub new_deaths: f64,
    pub positive: Option<f64>,
    pub negative: Option<f64>,
    pub pending: Option<f64>,
    pub tests: Option<f64>,
    pub new_positive: Option<f64>,
    pub new_negative: Option<f64>,
    pub new_tests: Option<f64>,
    pub positive_pct: Option<f64>,
    pub new_positive_pct: Option<f64>,
    /// Per-capita variants, keyed by base field. Populated only once the
    /// region's population is known.
    pub per100k: BTreeMap<Field, f64>,
}

impl DailyRecord {
    pub fn new(date: NaiveDate, cases: f64, deaths: f64) -> Self {
        Self {
            date,
            cases,
            deaths,
            new_cases: 0.0,
            new_deaths: 0.0,
            positive: None,
            negative: None,
            pending: None,
            tests: None,
            new_positive: None,
            new_negative: None,
            new_tests: None,
            positive_pct: None,
            new_positive_pct: None,
            per100k: BTreeMap::new(),
        }
    }

    /// Uniform accessor over every tracked field. Fields sourced from the
    /// testing dataset are `None` until merged.
    pub fn get(&self, field: Field) -> Option<f64> {
        match field {
            Field::Cases => Some(self.cases),
            Field::Deaths => Some(self.deaths),
            Field::NewCases => Some(self.new_cases),
            Field::NewDeaths => Some(self.new_deaths),
            Field::Positive => self.positive,
            Field::Negative => self.negative,
            Field::Pending => self.pending,
            Field::Tests => self.tests,
            Field::NewPositive => self.new_positive,
            Field::NewNegative => self.new_negative,
            Field::NewTests => self.new_tests,
            Field::PositivePct => self.positive_pct,
            Field::NewPositivePct => self.new_positive_pct,
        }
    }

    pub fn per_capita(&self, field: Field) -> Option<f64> {
        self.per100k.get(&field).copied()
    }
}

/// A geographic reporting unit and its chronological daily series.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    /// Canonical FIPS code (aliases already remapped).
    pub fips: String,
    /// Display label (county or state name).
    pub label: String,
    /// Resolved population; `None` when no dataset or override covers this
    /// region. Downstream consumers must treat `None` as "no population
    /// data", not as zero.
    pub population: Option<u64>,
    pub series: Vec<DailyRecord>,
}

impl Region {
    pub fn no_population(&self) -> bool {
        self.population.is_none()
    }
}

/// Testing-dataset payload for one (region, date) key. Join source only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestingRecord {
    pub positive: Option<f64>,
    pub negative: Option<f64>,
    pub pending: Option<f64>,
    pub tests: Option<f64>,
    pub new_positive: Option<f64>,
    pub new_negative: Option<f64>,
    pub new_tests: Option<f64>,
}

/// The fully built, immutable dataset: one `Region` per canonical FIPS plus
/// the synthetic national aggregate. Replaced wholesale on re-ingestion,
/// never mutated in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub regions: BTreeMap<String, Region>,
    pub national: Region,
    /// First and last calendar day with any data, `None` for an empty batch.
    pub date_range: Option<(NaiveDate, NaiveDate)>,
}

/// How many trailing days a render pass wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowLength {
    /// Trailing run of n calendar days ending at the latest date with data.
    Days(u32),
    /// Every day since the dataset's first recorded date.
    All,
}

/// Explicit view configuration threaded into every per-render computation.
/// Nothing in the engine reads ambient state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewOptions {
    /// Chart/map the per-capita variant of the selected field.
    pub per_capita: bool,
    /// Log-scale y axis; affects the usable scale domain floor.
    pub log_scale: bool,
    /// Share one extent table across all charts instead of scaling each
    /// region independently.
    pub shared_scale: bool,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            per_capita: false,
            log_scale: false,
            shared_scale: true,
        }
    }
}

impl ViewOptions {
    /// Lower bound usable for a chart scale domain. A log scale cannot
    /// include zero or negative values, so the floor is clamped to 1.
    pub fn domain_floor(&self, min: f64) -> f64 {
        if self.log_scale {
            min.max(1.0)
        } else {
            min
        }
    }
}

/// Observed [min, max] of one field inside a window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Extent {
    pub min: f64,
    pub max: f64,
}

impl Extent {
    pub fn of(value: f64) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    pub fn observe(&mut self, value: f64) {
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }
}

/// Running per-field extents across every record fed to `observe`. Keys are
/// wire names (including `*Per100k` variants); a field nobody reported never
/// appears, which is the "null bounds" state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtentTable {
    pub fields: BTreeMap<String, Extent>,
    /// Extent of `date` itself across matched records.
    pub dates: Option<(NaiveDate, NaiveDate)>,
}

impl ExtentTable {
    pub fn observe(&mut self, record: &DailyRecord) {
        for field in Field::ALL {
            if let Some(v) = record.get(field) {
                self.track(field.name().to_string(), v);
            }
            if let Some(v) = record.per_capita(field) {
                self.track(field.per_capita_name(), v);
            }
        }
        self.dates = match self.dates {
            None => Some((record.date, record.date)),
            Some((lo, hi)) => Some((lo.min(record.date), hi.max(record.date))),
        };
    }

    fn track(&mut self, key: String, value: f64) {
        self.fields
            .entry(key)
            .and_modify(|e| e.observe(value))
            .or_insert_with(|| Extent::of(value));
    }

    pub fn get(&self, name: &str) -> Option<Extent> {
        self.fields.get(name).copied()
    }
}

/// A daily record matched inside a window, tagged with the positional index
/// of its date in the requested date list (bars across charts with gaps
/// align on `i`, not on array position).
#[derive(Debug, Clone, PartialEq)]
pub struct WindowedRecord {
    pub i: usize,
    pub record: DailyRecord,
}

/// One aggregated row per region per window, for choropleth fill and
/// tooltips. `values` is keyed by wire name and carries the summed/averaged
/// fields, recomputed ratios, and per-capita variants derived from the
/// aggregated values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapSummary {
    pub fips: String,
    pub label: String,
    pub population: Option<u64>,
    /// Explicit degraded-state flag: per-capita values are absent because no
    /// population could be resolved, not because the rate is zero.
    pub no_population: bool,
    /// Number of window dates this region actually reported.
    pub days: usize,
    pub values: BTreeMap<String, f64>,
}
