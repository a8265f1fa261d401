//! Geographic exception tables.
//!
//! Three tables cover the known mismatches between the datasets' geography
//! and canonical FIPS codes:
//! - labels with no official code (e.g. "New York City" spans five
//!   counties and carries no FIPS in the case dataset);
//! - alias codes that collapse to one canonical code (the five NYC borough
//!   counties);
//! - population overrides correcting source-file anomalies for those
//!   collapsed geographies.
//!
//! The tables are injectable so the engine can be tested against synthetic
//! geographies; `GeoTables::default()` carries the production values.

use std::collections::HashMap;

use once_cell::sync::Lazy;

#[derive(Debug, Clone, Default)]
pub struct GeoTables {
    /// County label -> canonical FIPS, for rows with no id of their own.
    pub label_to_fips: HashMap<String, String>,
    /// Alias FIPS -> canonical FIPS.
    pub fips_remap: HashMap<String, String>,
    /// Canonical FIPS -> corrected population. Always wins over the source
    /// population file.
    pub population_overrides: HashMap<String, u64>,
}

impl GeoTables {
    /// Redirect an alias id to its canonical id. Ids outside the table pass
    /// through unchanged.
    pub fn canonical_fips(&self, fips: &str) -> String {
        self.fips_remap
            .get(fips)
            .cloned()
            .unwrap_or_else(|| fips.to_string())
    }

    /// Resolve a county label with no id through the exception table.
    pub fn resolve_label(&self, label: &str) -> Option<&str> {
        self.label_to_fips.get(label).map(String::as_str)
    }
}

static DEFAULT_TABLES: Lazy<GeoTables> = Lazy::new(|| {
    let label_to_fips = HashMap::from([
        // Reported as one unit with no FIPS of its own.
        ("New York City".to_string(), "36061".to_string()),
        // Spans four counties; pinned to Jackson County's code.
        ("Kansas City".to_string(), "29095".to_string()),
    ]);
    let fips_remap = HashMap::from([
        // The five boroughs collapse onto Manhattan's code.
        ("36005".to_string(), "36061".to_string()),
        ("36047".to_string(), "36061".to_string()),
        ("36081".to_string(), "36061".to_string()),
        ("36085".to_string(), "36061".to_string()),
    ]);
    let population_overrides = HashMap::from([
        // All five boroughs combined.
        ("36061".to_string(), 8_336_817_u64),
        ("29095".to_string(), 495_327_u64),
    ]);
    GeoTables {
        label_to_fips,
        fips_remap,
        population_overrides,
    }
});

/// The production exception tables.
pub fn default_tables() -> GeoTables {
    DEFAULT_TABLES.clone()
}
