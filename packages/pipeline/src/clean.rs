//! Final filter: keep only records with every reported field present.
//!
//! Nothing is imputed. Blank strings count as absent.

use ward_energy_records_models::{CleanRecord, ReconciledRecord};

/// Selects the reported fields of a record, or `None` if any is absent.
#[must_use]
pub fn clean_record(record: &ReconciledRecord) -> Option<CleanRecord> {
    let q = &record.quantities;
    let enriched = &record.enriched;
    let coordinates = enriched.coordinates?;

    Some(CleanRecord {
        operation_name: non_blank(&enriched.raw.operation_name)?,
        ward: non_blank(enriched.ward.as_deref()?)?,
        avg_hours_per_week: q.avg_hours_per_week?,
        floor_area_sf: q.floor_area_sf?,
        annual_flow: q.annual_flow?,
        electricity_wh: q.electricity_wh?,
        gas_m3: q.gas_m3?,
        ghg_emissions_kg: q.ghg_emissions_kg?,
        latitude: coordinates.latitude,
        longitude: coordinates.longitude,
        year: enriched.raw.year,
    })
}

/// Drops every record with an absent field.
#[must_use]
pub fn clean(records: &[ReconciledRecord]) -> Vec<CleanRecord> {
    let cleaned: Vec<CleanRecord> = records.iter().filter_map(clean_record).collect();
    log::info!(
        "Cleaning kept {} of {} records ({} dropped)",
        cleaned.len(),
        records.len(),
        records.len() - cleaned.len()
    );
    cleaned
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
