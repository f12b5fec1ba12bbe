//! Per-year and per-ward aggregates of the clean dataset.
//!
//! Produces two CSV tables and a short Markdown summary. Charts are left
//! to whatever reads the tables.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;
use ward_energy_records_models::CleanRecord;

use crate::PipelineError;
use crate::output::write_rows;

pub const WARD_YEAR_FILE: &str = "ward_year_summary.csv";
pub const YEAR_FILE: &str = "year_summary.csv";
pub const SUMMARY_FILE: &str = "summary.md";

const SUMMARY_COLUMNS: &[&str] = &[
    "total_ghg_kg",
    "mean_ghg_kg",
    "total_electricity_wh",
    "mean_electricity_wh",
    "total_gas_m3",
    "mean_gas_m3",
    "total_floor_area_sf",
    "mean_floor_area_sf",
    "ghg_intensity_kg_per_sf",
];

/// How many wards the Markdown summary lists per year.
const TOP_WARDS: usize = 5;

/// Running sums over a group of records.
#[derive(Debug, Clone, Copy, Default)]
struct Totals {
    records: usize,
    ghg_kg: f64,
    electricity_wh: f64,
    gas_m3: f64,
    floor_area_sf: f64,
}

impl Totals {
    fn add(&mut self, record: &CleanRecord) {
        self.records += 1;
        self.ghg_kg += record.ghg_emissions_kg;
        self.electricity_wh += record.electricity_wh;
        self.gas_m3 += record.gas_m3;
        self.floor_area_sf += record.floor_area_sf;
    }

    #[allow(clippy::cast_precision_loss)]
    fn mean(&self, total: f64) -> f64 {
        if self.records == 0 {
            0.0
        } else {
            total / self.records as f64
        }
    }

    /// Kilograms of GHG per square foot; `None` when no floor area was
    /// reported.
    fn intensity(&self) -> Option<f64> {
        (self.floor_area_sf > 0.0).then(|| self.ghg_kg / self.floor_area_sf)
    }
}

/// Aggregates for one ward in one reporting year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WardYearSummary {
    pub year: u16,
    pub ward: String,
    pub records: usize,
    pub total_ghg_kg: f64,
    pub mean_ghg_kg: f64,
    pub total_electricity_wh: f64,
    pub mean_electricity_wh: f64,
    pub total_gas_m3: f64,
    pub mean_gas_m3: f64,
    pub total_floor_area_sf: f64,
    pub mean_floor_area_sf: f64,
    pub ghg_intensity_kg_per_sf: Option<f64>,
}

/// Aggregates for one reporting year across all wards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearSummary {
    pub year: u16,
    pub records: usize,
    pub wards: usize,
    pub total_ghg_kg: f64,
    pub mean_ghg_kg: f64,
    pub total_electricity_wh: f64,
    pub mean_electricity_wh: f64,
    pub total_gas_m3: f64,
    pub mean_gas_m3: f64,
    pub total_floor_area_sf: f64,
    pub mean_floor_area_sf: f64,
    pub ghg_intensity_kg_per_sf: Option<f64>,
}

/// Record counts at each pipeline stage, for the Markdown summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageCounts {
    pub raw_records: usize,
    pub unique_addresses: usize,
    pub resolved_addresses: usize,
    pub records_in_ward: usize,
    pub clean_records: usize,
}

/// Both aggregate tables, sorted by year then ward.
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub ward_years: Vec<WardYearSummary>,
    pub years: Vec<YearSummary>,
}

/// Groups clean records by `(year, ward)` and by year.
#[must_use]
pub fn summarize(records: &[CleanRecord]) -> Report {
    let mut by_ward_year: BTreeMap<(u16, &str), Totals> = BTreeMap::new();
    let mut by_year: BTreeMap<u16, Totals> = BTreeMap::new();

    for record in records {
        by_ward_year
            .entry((record.year, record.ward.as_str()))
            .or_default()
            .add(record);
        by_year.entry(record.year).or_default().add(record);
    }

    let ward_years = by_ward_year
        .iter()
        .map(|(&(year, ward), t)| WardYearSummary {
            year,
            ward: ward.to_string(),
            records: t.records,
            total_ghg_kg: t.ghg_kg,
            mean_ghg_kg: t.mean(t.ghg_kg),
            total_electricity_wh: t.electricity_wh,
            mean_electricity_wh: t.mean(t.electricity_wh),
            total_gas_m3: t.gas_m3,
            mean_gas_m3: t.mean(t.gas_m3),
            total_floor_area_sf: t.floor_area_sf,
            mean_floor_area_sf: t.mean(t.floor_area_sf),
            ghg_intensity_kg_per_sf: t.intensity(),
        })
        .collect();

    let years = by_year
        .iter()
        .map(|(&year, t)| YearSummary {
            year,
            records: t.records,
            wards: by_ward_year.keys().filter(|(y, _)| *y == year).count(),
            total_ghg_kg: t.ghg_kg,
            mean_ghg_kg: t.mean(t.ghg_kg),
            total_electricity_wh: t.electricity_wh,
            mean_electricity_wh: t.mean(t.electricity_wh),
            total_gas_m3: t.gas_m3,
            mean_gas_m3: t.mean(t.gas_m3),
            total_floor_area_sf: t.floor_area_sf,
            mean_floor_area_sf: t.mean(t.floor_area_sf),
            ghg_intensity_kg_per_sf: t.intensity(),
        })
        .collect();

    Report { ward_years, years }
}

/// Renders the Markdown summary.
#[must_use]
pub fn render_markdown(report: &Report, counts: &StageCounts, run_date: NaiveDate) -> String {
    let mut md = String::new();

    let _ = writeln!(md, "# Ward energy and emissions summary\n");
    let _ = writeln!(md, "Run date: {run_date}\n");

    let _ = writeln!(md, "## Records\n");
    let _ = writeln!(md, "| Stage | Count |");
    let _ = writeln!(md, "|---|---:|");
    let _ = writeln!(md, "| Raw records | {} |", counts.raw_records);
    let _ = writeln!(md, "| Unique addresses | {} |", counts.unique_addresses);
    let _ = writeln!(md, "| Resolved addresses | {} |", counts.resolved_addresses);
    let _ = writeln!(md, "| Records inside a ward | {} |", counts.records_in_ward);
    let _ = writeln!(md, "| Clean records | {} |", counts.clean_records);

    let _ = writeln!(md, "\n## By year\n");
    let _ = writeln!(
        md,
        "| Year | Records | Wards | Total GHG (kg) | Total electricity (kWh) | Total gas (m³) | GHG intensity (kg/sq ft) |"
    );
    let _ = writeln!(md, "|---|---:|---:|---:|---:|---:|---:|");
    for year in &report.years {
        let _ = writeln!(
            md,
            "| {} | {} | {} | {:.1} | {:.1} | {:.1} | {} |",
            year.year,
            year.records,
            year.wards,
            year.total_ghg_kg,
            year.total_electricity_wh / 1000.0,
            year.total_gas_m3,
            year.ghg_intensity_kg_per_sf
                .map_or_else(|| "n/a".to_string(), |v| format!("{v:.4}")),
        );
    }

    let _ = writeln!(md, "\n## Top emitting wards\n");
    for year in &report.years {
        let mut wards: Vec<&WardYearSummary> = report
            .ward_years
            .iter()
            .filter(|w| w.year == year.year)
            .collect();
        wards.sort_by(|a, b| {
            b.total_ghg_kg
                .total_cmp(&a.total_ghg_kg)
                .then_with(|| a.ward.cmp(&b.ward))
        });

        let _ = writeln!(md, "### {}\n", year.year);
        for (rank, ward) in wards.iter().take(TOP_WARDS).enumerate() {
            let _ = writeln!(
                md,
                "{}. {}: {:.1} kg across {} buildings",
                rank + 1,
                ward.ward,
                ward.total_ghg_kg,
                ward.records
            );
        }
        let _ = writeln!(md);
    }

    md
}

/// Writes both tables and the Markdown summary into `dir`.
///
/// # Errors
///
/// Returns [`PipelineError`] if a file cannot be written.
pub fn write_report(
    dir: &Path,
    report: &Report,
    counts: &StageCounts,
    run_date: NaiveDate,
) -> Result<(), PipelineError> {
    let ward_year_header: Vec<&str> = ["year", "ward", "records"]
        .into_iter()
        .chain(SUMMARY_COLUMNS.iter().copied())
        .collect();
    let year_header: Vec<&str> = ["year", "records", "wards"]
        .into_iter()
        .chain(SUMMARY_COLUMNS.iter().copied())
        .collect();

    write_rows(&dir.join(WARD_YEAR_FILE), &ward_year_header, &report.ward_years)?;
    write_rows(&dir.join(YEAR_FILE), &year_header, &report.years)?;

    let summary = dir.join(SUMMARY_FILE);
    std::fs::write(&summary, render_markdown(report, counts, run_date))?;
    log::info!("Wrote {}", summary.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean(ward: &str, year: u16, ghg: f64, area: f64) -> CleanRecord {
        CleanRecord {
            operation_name: format!("{ward} building"),
            ward: ward.to_string(),
            avg_hours_per_week: 40.0,
            floor_area_sf: area,
            annual_flow: 0.0,
            electricity_wh: 1000.0,
            gas_m3: 2.0,
            ghg_emissions_kg: ghg,
            latitude: 43.65,
            longitude: -79.38,
            year,
        }
    }

    fn sample() -> Vec<CleanRecord> {
        vec![
            clean("Ward A", 2015, 20.0, 100.0),
            clean("Ward A", 2015, 40.0, 300.0),
            clean("Ward B", 2015, 100.0, 0.0),
            clean("Ward A", 2016, 10.0, 50.0),
        ]
    }

    #[test]
    fn groups_by_year_and_ward() {
        let report = summarize(&sample());
        assert_eq!(report.ward_years.len(), 3);
        assert_eq!(report.years.len(), 2);

        let a_2015 = &report.ward_years[0];
        assert_eq!((a_2015.year, a_2015.ward.as_str()), (2015, "Ward A"));
        assert_eq!(a_2015.records, 2);
        assert!((a_2015.total_ghg_kg - 60.0).abs() < 1e-9);
        assert!((a_2015.mean_ghg_kg - 30.0).abs() < 1e-9);
        assert!((a_2015.ghg_intensity_kg_per_sf.unwrap() - 0.15).abs() < 1e-9);

        let year_2015 = &report.years[0];
        assert_eq!(year_2015.records, 3);
        assert_eq!(year_2015.wards, 2);
        assert!((year_2015.total_electricity_wh - 3000.0).abs() < 1e-9);
    }

    #[test]
    fn zero_floor_area_has_no_intensity() {
        let report = summarize(&sample());
        let b_2015 = report
            .ward_years
            .iter()
            .find(|w| w.ward == "Ward B")
            .unwrap();
        assert_eq!(b_2015.ghg_intensity_kg_per_sf, None);
    }

    #[test]
    fn markdown_ranks_wards_by_emissions() {
        let report = summarize(&sample());
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let md = render_markdown(&report, &StageCounts::default(), date);

        assert!(md.contains("Run date: 2024-03-01"));
        let section = md.split("### 2015").nth(1).unwrap();
        let b = section.find("Ward B").unwrap();
        let a = section.find("Ward A").unwrap();
        assert!(b < a);
    }

    #[test]
    fn empty_input_gives_empty_tables() {
        let report = summarize(&[]);
        assert!(report.ward_years.is_empty());
        assert!(report.years.is_empty());
    }

    #[test]
    fn writes_all_report_files() {
        let dir = std::env::temp_dir().join("ward_energy_report_test");
        let _ = std::fs::remove_dir_all(&dir);

        let report = summarize(&sample());
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        write_report(&dir, &report, &StageCounts::default(), date).unwrap();

        for file in [WARD_YEAR_FILE, YEAR_FILE, SUMMARY_FILE] {
            assert!(dir.join(file).is_file(), "missing {file}");
        }
        let years = std::fs::read_to_string(dir.join(YEAR_FILE)).unwrap();
        let mut lines = years.lines();
        assert_eq!(
            lines.next().unwrap(),
            "year,records,wards,total_ghg_kg,mean_ghg_kg,total_electricity_wh,\
             mean_electricity_wh,total_gas_m3,mean_gas_m3,total_floor_area_sf,\
             mean_floor_area_sf,ghg_intensity_kg_per_sf"
        );
        assert!(lines.next().unwrap().starts_with("2015,3,2,160"));

        let ward_years = std::fs::read_to_string(dir.join(WARD_YEAR_FILE)).unwrap();
        assert!(ward_years.starts_with("year,ward,records,total_ghg_kg,"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn empty_report_tables_keep_their_headers() {
        let dir = std::env::temp_dir().join("ward_energy_report_empty_test");
        let _ = std::fs::remove_dir_all(&dir);

        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        write_report(&dir, &summarize(&[]), &StageCounts::default(), date).unwrap();

        let ward_years = std::fs::read_to_string(dir.join(WARD_YEAR_FILE)).unwrap();
        assert_eq!(ward_years.lines().count(), 1);
        assert!(ward_years.starts_with("year,ward,records,"));
        let years = std::fs::read_to_string(dir.join(YEAR_FILE)).unwrap();
        assert_eq!(years.lines().count(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
