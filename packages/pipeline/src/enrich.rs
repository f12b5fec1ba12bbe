//! Joins raw records to their coordinates and ward.

use ward_energy_geocoder::address::{build_query, normalize_postal_code};
use ward_energy_records_models::{EnrichedRecord, RawRecord};
use ward_energy_spatial::WardIndex;

use crate::geocode::GeocodeMemo;

/// Looks up each record's coordinates in the memo and its ward in the
/// index. Records without coordinates get no ward.
#[must_use]
pub fn enrich(records: Vec<RawRecord>, memo: &GeocodeMemo, wards: &WardIndex) -> Vec<EnrichedRecord> {
    let enriched: Vec<EnrichedRecord> = records
        .into_iter()
        .map(|raw| {
            let coordinates = if raw.address.trim().is_empty() {
                None
            } else {
                memo.coordinates(&build_query(&raw.address, &raw.city))
            };
            let ward = coordinates
                .and_then(|c| wards.lookup(c))
                .map(str::to_string);

            EnrichedRecord {
                postal_code: normalize_postal_code(&raw.postal_code),
                raw,
                coordinates,
                ward,
            }
        })
        .collect();

    let located = enriched.iter().filter(|r| r.coordinates.is_some()).count();
    let in_ward = enriched.iter().filter(|r| r.ward.is_some()).count();
    log::info!(
        "Joined {} records: {located} with coordinates, {in_ward} inside a ward",
        enriched.len()
    );

    enriched
}
