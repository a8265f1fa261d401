//! Window construction, the window filter, and the extent tracker.
//!
//! A window is an ordered list of calendar dates a render pass wants shown.
//! Filtering and extent tracking are pure, total functions over already
//! normalized series: identical inputs always produce identical outputs, so
//! callers may memoize on input identity.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::types::{Dataset, DailyRecord, ExtentTable, ViewOptions, WindowLength, WindowedRecord};

/// Build the window's target dates: a trailing calendar run ending at the
/// latest date with data. Returns an empty list for an empty dataset.
pub fn window_dates(dataset: &Dataset, length: WindowLength) -> Vec<NaiveDate> {
    let Some((first, last)) = dataset.date_range else {
        return Vec::new();
    };
    let start = match length {
        WindowLength::All => first,
        WindowLength::Days(n) => {
            let back = chrono::Days::new(u64::from(n.saturating_sub(1)));
            last.checked_sub_days(back).unwrap_or(first).max(first)
        }
    };
    let mut dates = Vec::new();
    let mut day = start;
    while day <= last {
        dates.push(day);
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    dates
}

/// Select the records falling exactly on the target dates.
///
/// Both the series and the target list are chronologically ordered, so a
/// single parallel walk suffices. A target date with no matching record is
/// omitted, never interpolated or zero-filled. Each emitted record carries
/// the positional index of its date in the target list.
pub fn window_slice(series: &[DailyRecord], dates: &[NaiveDate]) -> Vec<WindowedRecord> {
    let mut out = Vec::new();
    let mut cursor = 0usize;
    for (i, target) in dates.iter().enumerate() {
        while cursor < series.len() && series[cursor].date < *target {
            cursor += 1;
        }
        if cursor < series.len() && series[cursor].date == *target {
            out.push(WindowedRecord {
                i,
                record: series[cursor].clone(),
            });
            cursor += 1;
        }
    }
    out
}

/// Extents for one render pass: either a single table shared by every chart
/// or one table per region, per `ViewOptions::shared_scale`.
#[derive(Debug, Clone, PartialEq)]
pub enum Extents {
    Shared(ExtentTable),
    PerRegion(BTreeMap<String, ExtentTable>),
}

/// Windowed slices for every region plus the extent table(s) for the pass.
///
/// The slice walk and the extent scan happen together: every matched record
/// is observed as it is emitted. Regions with no matched records get no
/// entry in the slice map (the "no data" state).
pub fn window_regions(
    dataset: &Dataset,
    dates: &[NaiveDate],
    options: &ViewOptions,
) -> (BTreeMap<String, Vec<WindowedRecord>>, Extents) {
    let mut slices: BTreeMap<String, Vec<WindowedRecord>> = BTreeMap::new();
    let mut shared = ExtentTable::default();
    let mut per_region: BTreeMap<String, ExtentTable> = BTreeMap::new();

    for region in dataset.regions.values() {
        let slice = window_slice(&region.series, dates);
        if slice.is_empty() {
            continue;
        }
        if options.shared_scale {
            for windowed in &slice {
                shared.observe(&windowed.record);
            }
        } else {
            let table = per_region.entry(region.fips.clone()).or_default();
            for windowed in &slice {
                table.observe(&windowed.record);
            }
        }
        slices.insert(region.fips.clone(), slice);
    }

    let extents = if options.shared_scale {
        Extents::Shared(shared)
    } else {
        Extents::PerRegion(per_region)
    };
    (slices, extents)
}
