#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Record types for the ward energy pipeline.
//!
//! Each pipeline stage consumes one of these types and produces the next:
//! [`RawRecord`] (as published) → [`EnrichedRecord`] (geocoded and joined
//! to a ward) → [`ReconciledRecord`] (canonical units) → [`CleanRecord`]
//! (every required field present). Nothing is mutated after creation.

pub mod format;

use serde::{Deserialize, Serialize};

pub use format::{CanonicalField, FormatSchema, SourceFormat};

/// Country appended to every canonical address.
pub const COUNTRY: &str = "Canada";

/// One row of a yearly energy/emissions sheet, as published.
///
/// All cells are kept as trimmed strings. An empty string means the cell
/// was blank. Numeric interpretation happens in the unit reconciler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub operation_name: String,
    pub operation_type: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub floor_area: String,
    pub floor_area_unit: String,
    pub avg_hours_per_week: String,
    pub annual_flow: String,
    pub electricity: String,
    pub electricity_unit: String,
    pub natural_gas: String,
    pub natural_gas_unit: String,
    pub ghg_emissions: String,
    /// Reporting year, supplied by the caller rather than read from a cell.
    pub year: u16,
}

impl RawRecord {
    /// Creates an empty record for the given reporting year.
    #[must_use]
    pub fn for_year(year: u16) -> Self {
        Self {
            year,
            ..Self::default()
        }
    }

    /// Stores `value` in the slot for `field`.
    pub fn set(&mut self, field: CanonicalField, value: String) {
        let slot = match field {
            CanonicalField::OperationName => &mut self.operation_name,
            CanonicalField::OperationType => &mut self.operation_type,
            CanonicalField::Address => &mut self.address,
            CanonicalField::City => &mut self.city,
            CanonicalField::PostalCode => &mut self.postal_code,
            CanonicalField::FloorArea => &mut self.floor_area,
            CanonicalField::FloorAreaUnit => &mut self.floor_area_unit,
            CanonicalField::AvgHoursPerWeek => &mut self.avg_hours_per_week,
            CanonicalField::AnnualFlow => &mut self.annual_flow,
            CanonicalField::Electricity => &mut self.electricity,
            CanonicalField::ElectricityUnit => &mut self.electricity_unit,
            CanonicalField::NaturalGas => &mut self.natural_gas,
            CanonicalField::NaturalGasUnit => &mut self.natural_gas_unit,
            CanonicalField::GhgEmissions => &mut self.ghg_emissions,
        };
        *slot = value;
    }

    /// Returns the value stored for `field`.
    #[must_use]
    pub fn get(&self, field: CanonicalField) -> &str {
        match field {
            CanonicalField::OperationName => &self.operation_name,
            CanonicalField::OperationType => &self.operation_type,
            CanonicalField::Address => &self.address,
            CanonicalField::City => &self.city,
            CanonicalField::PostalCode => &self.postal_code,
            CanonicalField::FloorArea => &self.floor_area,
            CanonicalField::FloorAreaUnit => &self.floor_area_unit,
            CanonicalField::AvgHoursPerWeek => &self.avg_hours_per_week,
            CanonicalField::AnnualFlow => &self.annual_flow,
            CanonicalField::Electricity => &self.electricity,
            CanonicalField::ElectricityUnit => &self.electricity_unit,
            CanonicalField::NaturalGas => &self.natural_gas,
            CanonicalField::NaturalGasUnit => &self.natural_gas_unit,
            CanonicalField::GhgEmissions => &self.ghg_emissions,
        }
    }
}

/// A WGS 84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// A deduplicated postal address and the query string used to geocode it.
///
/// There is exactly one of these per distinct `(address, city)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalAddress {
    pub address: String,
    pub city: String,
    /// Normalized to `AAA BBB` where possible.
    pub postal_code: String,
    pub country: String,
    /// `"<address>, <city>"`, whitespace collapsed. Also the memoization key.
    pub query: String,
}

/// A [`CanonicalAddress`] after a geocoding attempt.
///
/// `coordinates` is `None` when the geocoder could not resolve the query,
/// which is distinct from a genuine `(0, 0)` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodedAddress {
    pub address: CanonicalAddress,
    pub coordinates: Option<Coordinates>,
}

/// A [`RawRecord`] joined with its coordinates and owning ward.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRecord {
    pub raw: RawRecord,
    /// Postal code normalized the same way as the canonical address.
    pub postal_code: String,
    pub coordinates: Option<Coordinates>,
    pub ward: Option<String>,
}

/// Measured quantities in canonical units. `None` means absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Quantities {
    pub floor_area_sf: Option<f64>,
    pub avg_hours_per_week: Option<f64>,
    pub annual_flow: Option<f64>,
    pub electricity_wh: Option<f64>,
    pub gas_m3: Option<f64>,
    pub ghg_emissions_kg: Option<f64>,
}

/// An [`EnrichedRecord`] with its quantities converted to canonical units.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledRecord {
    pub enriched: EnrichedRecord,
    pub quantities: Quantities,
}

/// The terminal, persisted record: every field is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanRecord {
    pub operation_name: String,
    pub ward: String,
    pub avg_hours_per_week: f64,
    pub floor_area_sf: f64,
    pub annual_flow: f64,
    pub electricity_wh: f64,
    pub gas_m3: f64,
    pub ghg_emissions_kg: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub year: u16,
}
