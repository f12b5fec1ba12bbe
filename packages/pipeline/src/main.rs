#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the ward energy pipeline.

use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use ward_energy_cli_utils::{IndicatifProgress, init_logger};
use ward_energy_pipeline::{RunOptions, RunProgress, run};

#[derive(Parser)]
#[command(
    name = "ward_energy",
    about = "Builds a ward-level building energy and emissions dataset"
)]
struct Cli {
    /// Root of the data tree (`raw/`, `wards/`, `output/`, `report/`)
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
    /// Reuse files already under the data directory instead of downloading
    #[arg(long)]
    skip_fetch: bool,
    /// CSV of earlier geocoding results to reuse and extend
    #[arg(long)]
    geocode_cache: Option<PathBuf>,
    /// Geocode at most this many addresses (for testing)
    #[arg(long)]
    limit_addresses: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = init_logger();
    let cli = Cli::parse();

    let options = RunOptions {
        data_dir: cli.data_dir,
        skip_fetch: cli.skip_fetch,
        geocode_cache: cli.geocode_cache,
        limit_addresses: cli.limit_addresses,
    };
    let progress = RunProgress {
        fetch: IndicatifProgress::steps_bar(&multi, "Downloading workbooks"),
        geocode: IndicatifProgress::batch_bar(&multi, "Geocoding addresses"),
    };

    let start = Instant::now();
    let counts = run(&options, chrono::Local::now().date_naive(), &progress).await?;

    log::info!(
        "Done in {:.1}s: {} raw records, {}/{} addresses resolved, {} in a ward, {} clean",
        start.elapsed().as_secs_f64(),
        counts.raw_records,
        counts.resolved_addresses,
        counts.unique_addresses,
        counts.records_in_ward,
        counts.clean_records,
    );

    Ok(())
}
