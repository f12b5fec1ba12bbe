#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Toronto ward energy and emissions pipeline.
//!
//! One sequential run: fetch the ward boundaries and the yearly energy
//! workbooks, normalize the sheets, geocode each distinct address once,
//! join buildings to wards, convert to canonical units, drop incomplete
//! records, and write the tables and report under the data directory.

pub mod clean;
pub mod enrich;
pub mod geocode;
pub mod output;
pub mod report;
pub mod units;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use ward_energy_geocoder::cache::GeocodeCache;
use ward_energy_geocoder::nominatim::NominatimClient;
use ward_energy_geocoder::service_registry::nominatim_service;
use ward_energy_geocoder::{GeocodeError, GeocodeProvider};
use ward_energy_records_models::RawRecord;
use ward_energy_source::fetch::{
    DownloadedWards, DownloadedWorkbook, fetch_energy_workbooks, fetch_ward_boundaries,
};
use ward_energy_source::progress::{ProgressCallback, null_progress};
use ward_energy_source::{FetchOptions, SourceError, normalize, registry, sheet};
use ward_energy_spatial::{SpatialError, WardIndex, load_wards};

use crate::geocode::{GeocodeOptions, resolve_addresses, unique_addresses};
use crate::report::StageCounts;

/// Errors that abort a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Fetching or normalizing the source data failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The geocoder could not be set up or its cache could not be used.
    #[error(transparent)]
    Geocode(#[from] GeocodeError),

    /// Ward boundaries could not be loaded.
    #[error(transparent)]
    Spatial(#[from] SpatialError),

    /// I/O error (output files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV writing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The embedded registry has no dataset with this role.
    #[error("No {role} dataset in the source registry")]
    MissingDataset {
        /// Which dataset was looked up.
        role: &'static str,
    },

    /// Too many addresses in a row failed; the service is treated as down.
    #[error("Geocoding service unavailable after {failures} consecutive failures: {last_error}")]
    GeocoderUnavailable {
        /// Consecutive failed addresses.
        failures: u32,
        /// The last error seen.
        last_error: String,
    },
}

/// Directory layout under the data root.
#[derive(Debug, Clone)]
pub struct DataLayout {
    pub root: PathBuf,
}

impl DataLayout {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Downloaded workbooks and archives.
    #[must_use]
    pub fn raw(&self) -> PathBuf {
        self.root.join("raw")
    }

    /// Unpacked ward boundary files.
    #[must_use]
    pub fn wards(&self) -> PathBuf {
        self.root.join("wards")
    }

    /// Persisted tables.
    #[must_use]
    pub fn output(&self) -> PathBuf {
        self.root.join("output")
    }

    /// Aggregates and Markdown summary.
    #[must_use]
    pub fn report(&self) -> PathBuf {
        self.root.join("report")
    }
}

/// Options for a full run, as set on the command line.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub data_dir: PathBuf,
    /// Reuse previously downloaded files instead of fetching.
    pub skip_fetch: bool,
    /// CSV file of earlier geocoding results to reuse and extend.
    pub geocode_cache: Option<PathBuf>,
    /// Look up at most this many addresses.
    pub limit_addresses: Option<usize>,
}

/// Progress sinks for the slow stages.
#[derive(Clone)]
pub struct RunProgress {
    pub fetch: Arc<dyn ProgressCallback>,
    pub geocode: Arc<dyn ProgressCallback>,
}

impl Default for RunProgress {
    fn default() -> Self {
        Self {
            fetch: null_progress(),
            geocode: null_progress(),
        }
    }
}

/// Local files a run processes.
#[derive(Debug, Clone)]
pub struct PipelineInputs {
    pub workbooks: Vec<DownloadedWorkbook>,
    pub wards: DownloadedWards,
}

/// Downloads (or, offline, locates) the ward boundaries and workbooks.
///
/// # Errors
///
/// Returns [`PipelineError`] if a dataset is missing from the registry or
/// a fetch fails.
pub async fn fetch_inputs(
    client: &reqwest::Client,
    layout: &DataLayout,
    skip_fetch: bool,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<PipelineInputs, PipelineError> {
    let options = FetchOptions {
        raw_dir: layout.raw(),
        wards_dir: layout.wards(),
        skip_fetch,
    };

    let ward_dataset =
        registry::ward_dataset().ok_or(PipelineError::MissingDataset { role: "ward boundary" })?;
    let energy_dataset =
        registry::energy_dataset().ok_or(PipelineError::MissingDataset { role: "energy" })?;

    let wards = fetch_ward_boundaries(client, &ward_dataset, &options).await?;
    let workbooks = fetch_energy_workbooks(client, &energy_dataset, &options, progress).await?;

    Ok(PipelineInputs { workbooks, wards })
}

/// Reads and normalizes every workbook, concatenated in registry order.
///
/// # Errors
///
/// Returns [`PipelineError`] if a workbook cannot be read or a sheet does
/// not match its format.
pub fn load_records(workbooks: &[DownloadedWorkbook]) -> Result<Vec<RawRecord>, PipelineError> {
    let mut records = Vec::new();
    for workbook in workbooks {
        let sheets = sheet::read_sheets(&workbook.path)?;
        let normalized = normalize::normalize_workbook(&sheets, &workbook.resource)?;
        log::info!(
            "{}: {} records",
            workbook.path.display(),
            normalized.len()
        );
        records.extend(normalized);
    }
    log::info!("Normalized {} records in total", records.len());
    Ok(records)
}

/// Runs every stage after fetching and writes all outputs.
///
/// Ward boundaries are loaded first so a CRS mismatch aborts before any
/// geocoding time is spent.
///
/// # Errors
///
/// Returns [`PipelineError`] on any fatal condition: bad ward file, sheet
/// schema mismatch, geocoder unavailable, or unwritable output.
pub async fn process(
    inputs: &PipelineInputs,
    provider: &dyn GeocodeProvider,
    geocode_options: &GeocodeOptions,
    cache: Option<&mut GeocodeCache>,
    layout: &DataLayout,
    run_date: NaiveDate,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<StageCounts, PipelineError> {
    let wards = load_wards(&inputs.wards.geometry_path, &inputs.wards.name_field)?;
    let ward_index = WardIndex::new(&wards);

    let records = load_records(&inputs.workbooks)?;
    let addresses = unique_addresses(&records);
    let (_, memo) = resolve_addresses(provider, &addresses, geocode_options, cache, progress).await?;

    let raw_records = records.len();
    let enriched = enrich::enrich(records, &memo, &ward_index);
    let records_in_ward = enriched.iter().filter(|r| r.ward.is_some()).count();

    let output_dir = layout.output();
    output::write_wards(&output_dir, &wards)?;
    output::write_geocoded(&output_dir, &enriched)?;

    let reconciled: Vec<_> = enriched.into_iter().map(units::reconcile).collect();
    output::write_units(&output_dir, &reconciled)?;

    let cleaned = clean::clean(&reconciled);
    output::write_clean(&output_dir, &cleaned)?;

    let counts = StageCounts {
        raw_records,
        unique_addresses: addresses.len(),
        resolved_addresses: memo.resolved(),
        records_in_ward,
        clean_records: cleaned.len(),
    };

    let summary = report::summarize(&cleaned);
    report::write_report(&layout.report(), &summary, &counts, run_date)?;

    Ok(counts)
}

/// Full run against the live open-data portal and Nominatim.
///
/// # Errors
///
/// Returns [`PipelineError`] on any fatal condition.
pub async fn run(
    options: &RunOptions,
    run_date: NaiveDate,
    progress: &RunProgress,
) -> Result<StageCounts, PipelineError> {
    let layout = DataLayout::new(&options.data_dir);
    let service = nominatim_service();

    let client = reqwest::Client::builder()
        .user_agent(&service.policy.user_agent)
        .build()
        .map_err(SourceError::from)?;

    let inputs = fetch_inputs(&client, &layout, options.skip_fetch, &progress.fetch).await?;

    let provider = NominatimClient::from_service(&service)?;
    let geocode_options = GeocodeOptions::from_policy(&service.policy, options.limit_addresses);

    let mut cache = options
        .geocode_cache
        .as_deref()
        .map(GeocodeCache::load)
        .transpose()?;

    let result = process(
        &inputs,
        &provider,
        &geocode_options,
        cache.as_mut(),
        &layout,
        run_date,
        &progress.geocode,
    )
    .await;

    if let Some(cache) = &cache {
        save_cache(cache, result.is_err())?;
    }

    result
}

/// Persists the geocode cache after a run. When the run itself failed, a
/// save error is only logged so the run's own error is the one reported.
fn save_cache(cache: &GeocodeCache, run_failed: bool) -> Result<(), PipelineError> {
    match cache.save() {
        Ok(()) => Ok(()),
        Err(e) if run_failed => {
            log::error!("Failed to save geocode cache after a failed run: {e}");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use ward_energy_geocoder::GeocodeMatch;
    use ward_energy_records_models::{CleanRecord, SourceFormat};
    use ward_energy_source::source_def::{SheetYear, WorkbookResource};

    use super::*;

    /// Resolves only the Yonge Street address and counts every call.
    struct FakeProvider {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl GeocodeProvider for FakeProvider {
        fn id(&self) -> &str {
            "fake"
        }

        async fn geocode(&self, query: &str) -> Result<Option<GeocodeMatch>, GeocodeError> {
            self.calls.lock().unwrap().push(query.to_string());
            Ok((query == "789 Yonge St, Toronto").then_some(GeocodeMatch {
                latitude: 43.65,
                longitude: -79.38,
                matched_address: None,
            }))
        }
    }

    const WARDS_GEOJSON: &str = r#"{
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": { "AREA_NAME": "Ward A", "AREA_S_CD": "01" },
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[-79.40, 43.60], [-79.30, 43.60], [-79.30, 43.70], [-79.40, 43.70], [-79.40, 43.60]]]
            }
        }]
    }"#;

    fn building(name: &str, address: &str) -> RawRecord {
        RawRecord {
            operation_name: name.to_string(),
            operation_type: "Library".to_string(),
            address: address.to_string(),
            city: "Toronto".to_string(),
            postal_code: "M4W2G8".to_string(),
            floor_area: "50".to_string(),
            floor_area_unit: "Square meters".to_string(),
            avg_hours_per_week: "60".to_string(),
            annual_flow: "0".to_string(),
            electricity: "10".to_string(),
            electricity_unit: "kWh".to_string(),
            ghg_emissions: "20".to_string(),
            ..RawRecord::for_year(2015)
        }
    }

    /// Writes records as a CSV sheet in the given format, preamble and
    /// header included.
    fn write_sheet(path: &Path, format: SourceFormat, records: &[RawRecord]) {
        let schema = format.schema();
        let width = schema.required_width();
        let mut writer = csv::Writer::from_path(path).unwrap();
        for _ in 0..schema.first_data_row() {
            writer.write_record(vec![""; width]).unwrap();
        }
        for record in records {
            let mut row = vec![String::new(); width];
            for &(index, field) in schema.columns {
                row[index] = record.get(field).to_string();
            }
            writer.write_record(&row).unwrap();
        }
        writer.flush().unwrap();
    }

    fn read_clean(path: &Path) -> Vec<CleanRecord> {
        csv::Reader::from_path(path)
            .unwrap()
            .deserialize()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn end_to_end_scenario() {
        let root = std::env::temp_dir().join("ward_energy_pipeline_e2e");
        let _ = std::fs::remove_dir_all(&root);
        let layout = DataLayout::new(&root);
        std::fs::create_dir_all(layout.raw()).unwrap();
        std::fs::create_dir_all(layout.wards()).unwrap();

        let wards_path = layout.wards().join("wards.geojson");
        std::fs::write(&wards_path, WARDS_GEOJSON).unwrap();

        let sheet_path = layout.raw().join("energy_2015.csv");
        write_sheet(
            &sheet_path,
            SourceFormat::Bps2015To2018,
            &[
                building("Main Library", "789 Yonge St"),
                building("Parks Yard", "Various Locations"),
                building("Main Library Annex", "789 Yonge St"),
            ],
        );

        let inputs = PipelineInputs {
            workbooks: vec![DownloadedWorkbook {
                resource: WorkbookResource {
                    resource: "Annual Energy Consumption 2015".to_string(),
                    file_name: "energy_2015.csv".to_string(),
                    format: SourceFormat::Bps2015To2018,
                    sheets: vec![SheetYear {
                        sheet: None,
                        year: 2015,
                    }],
                },
                path: sheet_path,
            }],
            wards: DownloadedWards {
                geometry_path: wards_path,
                name_field: "AREA_NAME".to_string(),
            },
        };

        let provider = FakeProvider {
            calls: Mutex::new(Vec::new()),
        };
        let options = GeocodeOptions {
            rate_limit: Duration::from_secs(1),
            max_retries: 1,
            rate_limited_backoff: Duration::from_secs(60),
            max_consecutive_failures: 5,
            limit: None,
        };
        let run_date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        let counts = process(
            &inputs,
            &provider,
            &options,
            None,
            &layout,
            run_date,
            &null_progress(),
        )
        .await
        .unwrap();

        assert_eq!(provider.calls.lock().unwrap().len(), 2);
        assert_eq!(counts.raw_records, 3);
        assert_eq!(counts.unique_addresses, 2);
        assert_eq!(counts.resolved_addresses, 1);
        assert_eq!(counts.clean_records, 2);

        let clean = read_clean(&layout.output().join(output::CLEAN_FILE));
        assert_eq!(clean.len(), 2);
        let library = &clean[0];
        assert_eq!(library.operation_name, "Main Library");
        assert_eq!(library.ward, "Ward A");
        assert!((library.floor_area_sf - 538.2).abs() < 0.01);
        assert!((library.electricity_wh - 10_000.0).abs() < 1e-9);
        assert!((library.ghg_emissions_kg - 20.0).abs() < 1e-9);
        assert_eq!(library.year, 2015);
        assert!(clean.iter().all(|r| r.operation_name != "Parks Yard"));

        for file in [
            output::GEOCODED_FILE,
            output::UNITS_FILE,
            output::WARDS_FILE,
        ] {
            assert!(layout.output().join(file).is_file(), "missing {file}");
        }
        let summary =
            std::fs::read_to_string(layout.report().join(report::SUMMARY_FILE)).unwrap();
        assert!(summary.contains("Ward A"));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn projected_ward_file_aborts_before_geocoding() {
        let root = std::env::temp_dir().join("ward_energy_pipeline_crs");
        let _ = std::fs::remove_dir_all(&root);
        let layout = DataLayout::new(&root);
        std::fs::create_dir_all(layout.wards()).unwrap();

        let wards_path = layout.wards().join("wards.geojson");
        std::fs::write(
            &wards_path,
            r#"{
                "type": "FeatureCollection",
                "crs": { "type": "name", "properties": { "name": "urn:ogc:def:crs:EPSG::2952" } },
                "features": []
            }"#,
        )
        .unwrap();

        let inputs = PipelineInputs {
            workbooks: Vec::new(),
            wards: DownloadedWards {
                geometry_path: wards_path,
                name_field: "AREA_NAME".to_string(),
            },
        };
        let provider = FakeProvider {
            calls: Mutex::new(Vec::new()),
        };
        let options = GeocodeOptions {
            rate_limit: Duration::ZERO,
            max_retries: 0,
            rate_limited_backoff: Duration::ZERO,
            max_consecutive_failures: 1,
            limit: None,
        };

        let err = process(
            &inputs,
            &provider,
            &options,
            None,
            &layout,
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            &null_progress(),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Spatial(SpatialError::Crs { .. })
        ));
        assert!(provider.calls.lock().unwrap().is_empty());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn cache_save_error_does_not_mask_run_error() {
        let dir = std::env::temp_dir().join("ward_energy_pipeline_cache_dir");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        // A directory can be "loaded" as an empty cache but never saved.
        let cache = GeocodeCache::load(&dir).unwrap();
        assert!(save_cache(&cache, true).is_ok());
        assert!(save_cache(&cache, false).is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn layout_nests_under_root() {
        let layout = DataLayout::new("data");
        assert_eq!(layout.raw(), Path::new("data/raw"));
        assert_eq!(layout.wards(), Path::new("data/wards"));
        assert_eq!(layout.output(), Path::new("data/output"));
        assert_eq!(layout.report(), Path::new("data/report"));
    }
}
