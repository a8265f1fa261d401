// Entry point and high-level CLI flow.
//
// The binary wires the engine together for a one-shot batch run:
// - load and normalize the three raw datasets, printing diagnostics,
// - build the immutable per-region dataset (merge, deltas, per-capita,
//   national aggregate),
// - emit map summaries for the 7/14/30-day windows, the shared extent
//   table, a national chart slice, and the full national series.
mod derive;
mod error;
mod geo;
mod loader;
mod merge;
mod output;
mod pipeline;
mod summary;
mod types;
mod util;
mod window;

use error::IngestError;
use loader::LoadReport;
use types::{Field, ViewOptions, WindowLength};

fn print_load_report(name: &str, report: &LoadReport) {
    println!(
        "Processing {}... ({} rows read, {} kept)",
        name,
        util::format_int(report.total_rows as i64),
        util::format_int(report.kept_rows as i64)
    );
    if report.malformed_rows > 0 {
        println!(
            "Note: {} rows skipped due to parse/validation errors.",
            util::format_int(report.malformed_rows as i64)
        );
    }
    if report.label_resolved > 0 {
        println!(
            "Info: Resolved region ids for {} rows via the label table.",
            util::format_int(report.label_resolved as i64)
        );
    }
}

fn run(cases_path: &str, testing_path: &str, population_path: &str) -> Result<(), IngestError> {
    let tables = geo::default_tables();

    let (cases, case_report) = loader::load_cases(cases_path, &tables)?;
    print_load_report(cases_path, &case_report);
    let (testing, testing_report) = loader::load_testing(testing_path, &tables)?;
    print_load_report(testing_path, &testing_report);
    let (populations, population_report) = loader::load_population(population_path, &tables)?;
    print_load_report(population_path, &population_report);
    println!();

    let dataset = pipeline::build_dataset(cases, &testing, &populations);
    println!(
        "Built {} regions plus the national aggregate.\n",
        util::format_int(dataset.regions.len() as i64)
    );

    let options = ViewOptions::default();

    for days in [7u32, 14, 30] {
        let dates = window::window_dates(&dataset, WindowLength::Days(days));
        let summaries = summary::map_summary(&dataset, &dates);
        let rows: Vec<output::MapSummaryDisplay> = summaries
            .values()
            .map(output::MapSummaryDisplay::from_summary)
            .collect();
        let file = format!("map_summary_{}d.csv", days);
        output::write_csv(&file, &rows)?;
        println!("Map Summary ({}-day window)", days);
        output::preview_table_rows(&rows, 2);
        println!("(Full table exported to {})\n", file);
    }

    let dates = window::window_dates(&dataset, WindowLength::Days(14));
    let (slices, extents) = window::window_regions(&dataset, &dates, &options);
    println!(
        "{} regions have data in the 14-day window.",
        util::format_int(slices.len() as i64)
    );
    if let window::Extents::Shared(table) = &extents {
        output::write_json("extents_14d.json", table)?;
        if let Some(extent) = table.get(Field::NewCases.name()) {
            println!(
                "Shared newCases scale domain: [{}, {}]",
                util::format_number(options.domain_floor(extent.min), 0),
                util::format_number(extent.max, 0)
            );
        }
        println!("(Shared extent table exported to extents_14d.json)\n");
    }

    let all_dates = window::window_dates(&dataset, WindowLength::All);
    let national_slice = window::window_slice(&dataset.national.series, &all_dates);
    let points = output::chart_points(
        &dataset.national.fips,
        &national_slice,
        Field::NewCases,
        &options,
    );
    output::write_csv("chart_national_new_cases.csv", &points)?;
    println!("(National newCases chart slice exported to chart_national_new_cases.csv)");

    let national_rows: Vec<output::NationalSeriesRow> = dataset
        .national
        .series
        .iter()
        .map(output::NationalSeriesRow::from_record)
        .collect();
    output::write_csv("national_series.csv", &national_rows)?;
    println!("National Series");
    output::preview_table_rows(&national_rows, 3);
    println!("(Full series exported to national_series.csv)");

    Ok(())
}

fn main() {
    pretty_env_logger::init();

    let mut args = std::env::args().skip(1);
    let cases_path = args.next().unwrap_or_else(|| "us-counties.csv".to_string());
    let testing_path = args
        .next()
        .unwrap_or_else(|| "testing-daily.json".to_string());
    let population_path = args.next().unwrap_or_else(|| "population.csv".to_string());

    if let Err(e) = run(&cases_path, &testing_path, &population_path) {
        eprintln!("Failed: {}", e);
        std::process::exit(1);
    }
}
