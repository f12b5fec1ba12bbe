//! CSV persistence of the intermediate and final tables.

use std::collections::BTreeSet;
use std::path::Path;

use serde::Serialize;
use ward_energy_records_models::{CleanRecord, EnrichedRecord, ReconciledRecord};
use ward_energy_spatial::WardPolygon;

use crate::PipelineError;

pub const GEOCODED_FILE: &str = "buildings_geocoded.csv";
pub const UNITS_FILE: &str = "buildings_units.csv";
pub const CLEAN_FILE: &str = "buildings_clean.csv";
pub const WARDS_FILE: &str = "wards.csv";

const GEOCODED_HEADER: &[&str] = &[
    "operation_name",
    "operation_type",
    "address",
    "city",
    "postal_code",
    "floor_area",
    "floor_area_unit",
    "avg_hours_per_week",
    "annual_flow",
    "electricity",
    "electricity_unit",
    "natural_gas",
    "natural_gas_unit",
    "ghg_emissions",
    "year",
    "latitude",
    "longitude",
    "ward",
];

const UNITS_HEADER: &[&str] = &[
    "operation_name",
    "operation_type",
    "address",
    "postal_code",
    "ward",
    "year",
    "floor_area_sf",
    "avg_hours_per_week",
    "annual_flow",
    "electricity_wh",
    "gas_m3",
    "ghg_emissions_kg",
    "latitude",
    "longitude",
];

const CLEAN_HEADER: &[&str] = &[
    "operation_name",
    "ward",
    "avg_hours_per_week",
    "floor_area_sf",
    "annual_flow",
    "electricity_wh",
    "gas_m3",
    "ghg_emissions_kg",
    "latitude",
    "longitude",
    "year",
];

#[derive(Serialize)]
struct GeocodedRow<'a> {
    operation_name: &'a str,
    operation_type: &'a str,
    address: &'a str,
    city: &'a str,
    postal_code: &'a str,
    floor_area: &'a str,
    floor_area_unit: &'a str,
    avg_hours_per_week: &'a str,
    annual_flow: &'a str,
    electricity: &'a str,
    electricity_unit: &'a str,
    natural_gas: &'a str,
    natural_gas_unit: &'a str,
    ghg_emissions: &'a str,
    year: u16,
    latitude: Option<f64>,
    longitude: Option<f64>,
    ward: Option<&'a str>,
}

impl<'a> From<&'a EnrichedRecord> for GeocodedRow<'a> {
    fn from(record: &'a EnrichedRecord) -> Self {
        let raw = &record.raw;
        Self {
            operation_name: &raw.operation_name,
            operation_type: &raw.operation_type,
            address: &raw.address,
            city: &raw.city,
            postal_code: &record.postal_code,
            floor_area: &raw.floor_area,
            floor_area_unit: &raw.floor_area_unit,
            avg_hours_per_week: &raw.avg_hours_per_week,
            annual_flow: &raw.annual_flow,
            electricity: &raw.electricity,
            electricity_unit: &raw.electricity_unit,
            natural_gas: &raw.natural_gas,
            natural_gas_unit: &raw.natural_gas_unit,
            ghg_emissions: &raw.ghg_emissions,
            year: raw.year,
            latitude: record.coordinates.map(|c| c.latitude),
            longitude: record.coordinates.map(|c| c.longitude),
            ward: record.ward.as_deref(),
        }
    }
}

#[derive(Serialize)]
struct UnitsRow<'a> {
    operation_name: &'a str,
    operation_type: &'a str,
    address: &'a str,
    postal_code: &'a str,
    ward: Option<&'a str>,
    year: u16,
    floor_area_sf: Option<f64>,
    avg_hours_per_week: Option<f64>,
    annual_flow: Option<f64>,
    electricity_wh: Option<f64>,
    gas_m3: Option<f64>,
    ghg_emissions_kg: Option<f64>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

impl<'a> From<&'a ReconciledRecord> for UnitsRow<'a> {
    fn from(record: &'a ReconciledRecord) -> Self {
        let enriched = &record.enriched;
        let q = &record.quantities;
        Self {
            operation_name: &enriched.raw.operation_name,
            operation_type: &enriched.raw.operation_type,
            address: &enriched.raw.address,
            postal_code: &enriched.postal_code,
            ward: enriched.ward.as_deref(),
            year: enriched.raw.year,
            floor_area_sf: q.floor_area_sf,
            avg_hours_per_week: q.avg_hours_per_week,
            annual_flow: q.annual_flow,
            electricity_wh: q.electricity_wh,
            gas_m3: q.gas_m3,
            ghg_emissions_kg: q.ghg_emissions_kg,
            latitude: enriched.coordinates.map(|c| c.latitude),
            longitude: enriched.coordinates.map(|c| c.longitude),
        }
    }
}

/// Serializes `rows` under `header`. Absent values are blank cells.
///
/// The header is written even when there are no rows; `header` must list
/// the row type's fields in declaration order.
///
/// # Errors
///
/// Returns [`PipelineError`] if the file cannot be written.
pub fn write_rows<T: Serialize>(
    path: &Path,
    header: &[&str],
    rows: impl IntoIterator<Item = T>,
) -> Result<usize, PipelineError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(header)?;
    let mut count = 0;
    for row in rows {
        writer.serialize(row)?;
        count += 1;
    }
    writer.flush()?;

    log::info!("Wrote {count} rows to {}", path.display());
    Ok(count)
}

/// Writes raw records with their geocoding results.
///
/// # Errors
///
/// Returns [`PipelineError`] if the file cannot be written.
pub fn write_geocoded(dir: &Path, records: &[EnrichedRecord]) -> Result<usize, PipelineError> {
    write_rows(
        &dir.join(GEOCODED_FILE),
        GEOCODED_HEADER,
        records.iter().map(GeocodedRow::from),
    )
}

/// Writes records in canonical units.
///
/// # Errors
///
/// Returns [`PipelineError`] if the file cannot be written.
pub fn write_units(dir: &Path, records: &[ReconciledRecord]) -> Result<usize, PipelineError> {
    write_rows(
        &dir.join(UNITS_FILE),
        UNITS_HEADER,
        records.iter().map(UnitsRow::from),
    )
}

/// Writes the final clean dataset.
///
/// # Errors
///
/// Returns [`PipelineError`] if the file cannot be written.
pub fn write_clean(dir: &Path, records: &[CleanRecord]) -> Result<usize, PipelineError> {
    write_rows(&dir.join(CLEAN_FILE), CLEAN_HEADER, records)
}

/// Writes the ward attribute table: `index`, `name`, then every attribute
/// column seen on any ward, sorted by name.
///
/// # Errors
///
/// Returns [`PipelineError`] if the file cannot be written.
pub fn write_wards(dir: &Path, wards: &[WardPolygon]) -> Result<usize, PipelineError> {
    let path = dir.join(WARDS_FILE);
    std::fs::create_dir_all(dir)?;

    let columns: BTreeSet<&str> = wards
        .iter()
        .flat_map(|w| w.attributes.keys().map(String::as_str))
        .filter(|key| !matches!(*key, "index" | "name"))
        .collect();

    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(["index", "name"].into_iter().chain(columns.iter().copied()))?;

    for ward in wards {
        let index = ward.index.to_string();
        let mut row = vec![index.as_str(), ward.name.as_str()];
        row.extend(
            columns
                .iter()
                .map(|column| ward.attributes.get(*column).map_or("", String::as_str)),
        );
        writer.write_record(&row)?;
    }
    writer.flush()?;

    log::info!("Wrote {} wards to {}", wards.len(), path.display());
    Ok(wards.len())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use ward_energy_records_models::{Coordinates, Quantities, RawRecord};
    use ward_energy_spatial::geo::MultiPolygon;

    use super::*;

    fn temp_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(name);
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn geocoded_rows_leave_absent_values_blank() {
        let dir = temp_dir("ward_energy_output_geocoded_test");
        let records = vec![
            EnrichedRecord {
                raw: RawRecord {
                    operation_name: "Main Library".to_string(),
                    address: "789 Yonge St".to_string(),
                    ..RawRecord::for_year(2015)
                },
                postal_code: "M4W 2G8".to_string(),
                coordinates: Some(Coordinates {
                    latitude: 43.65,
                    longitude: -79.38,
                }),
                ward: Some("Ward A".to_string()),
            },
            EnrichedRecord {
                raw: RawRecord {
                    operation_name: "Parks".to_string(),
                    address: "Various Locations".to_string(),
                    ..RawRecord::for_year(2015)
                },
                postal_code: String::new(),
                coordinates: None,
                ward: None,
            },
        ];

        assert_eq!(write_geocoded(&dir, &records).unwrap(), 2);

        let text = std::fs::read_to_string(dir.join(GEOCODED_FILE)).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("operation_name,operation_type,address"));
        assert!(header.ends_with("year,latitude,longitude,ward"));
        assert!(lines.next().unwrap().ends_with("2015,43.65,-79.38,Ward A"));
        assert!(lines.next().unwrap().ends_with("2015,,,"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    /// The header serde derives for `row`.
    fn derived_header<T: Serialize>(row: T) -> String {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.serialize(row).unwrap();
        let bytes = writer.into_inner().unwrap();
        String::from_utf8(bytes).unwrap().lines().next().unwrap().to_string()
    }

    fn sample_enriched() -> EnrichedRecord {
        EnrichedRecord {
            raw: RawRecord::for_year(2015),
            postal_code: String::new(),
            coordinates: None,
            ward: None,
        }
    }

    #[test]
    fn headers_match_row_fields() {
        let enriched = sample_enriched();
        assert_eq!(
            derived_header(GeocodedRow::from(&enriched)),
            GEOCODED_HEADER.join(",")
        );

        let reconciled = ReconciledRecord {
            enriched,
            quantities: Quantities::default(),
        };
        assert_eq!(
            derived_header(UnitsRow::from(&reconciled)),
            UNITS_HEADER.join(",")
        );

        let clean = CleanRecord {
            operation_name: "Main Library".to_string(),
            ward: "Ward A".to_string(),
            avg_hours_per_week: 60.0,
            floor_area_sf: 538.2,
            annual_flow: 0.0,
            electricity_wh: 10_000.0,
            gas_m3: 0.0,
            ghg_emissions_kg: 20.0,
            latitude: 43.65,
            longitude: -79.38,
            year: 2015,
        };
        assert_eq!(derived_header(&clean), CLEAN_HEADER.join(","));
    }

    #[test]
    fn empty_clean_set_still_has_header() {
        let dir = temp_dir("ward_energy_output_empty_test");

        assert_eq!(write_clean(&dir, &[]).unwrap(), 0);

        let text = std::fs::read_to_string(dir.join(CLEAN_FILE)).unwrap();
        assert_eq!(text.trim_end(), CLEAN_HEADER.join(","));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn ward_table_has_union_of_attribute_columns() {
        let dir = temp_dir("ward_energy_output_wards_test");
        let wards = vec![
            WardPolygon {
                index: 0,
                name: "Ward A".to_string(),
                attributes: BTreeMap::from([
                    ("AREA_NAME".to_string(), "Ward A".to_string()),
                    ("AREA_S_CD".to_string(), "01".to_string()),
                ]),
                polygon: MultiPolygon::new(vec![]),
            },
            WardPolygon {
                index: 1,
                name: "Ward B".to_string(),
                attributes: BTreeMap::from([("AREA_NAME".to_string(), "Ward B".to_string())]),
                polygon: MultiPolygon::new(vec![]),
            },
        ];

        write_wards(&dir, &wards).unwrap();

        let text = std::fs::read_to_string(dir.join(WARDS_FILE)).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "index,name,AREA_NAME,AREA_S_CD");
        assert_eq!(lines[1], "0,Ward A,Ward A,01");
        assert_eq!(lines[2], "1,Ward B,Ward B,");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
