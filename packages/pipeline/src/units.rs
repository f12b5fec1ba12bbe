//! Unit reconciliation: raw quantity/unit cells to canonical units.
//!
//! Canonical units are square feet, watt-hours, cubic meters and
//! kilograms. The published unit strings are matched exactly (after
//! trimming).

use ward_energy_records_models::{EnrichedRecord, Quantities, RawRecord, ReconciledRecord};

/// Square feet per square meter.
pub const SQ_FT_PER_SQ_M: f64 = 10.7639;

pub const UNIT_SQUARE_FEET: &str = "Square feet";
pub const UNIT_SQUARE_METERS: &str = "Square meters";
pub const UNIT_KWH: &str = "kWh";
pub const UNIT_CUBIC_METER: &str = "Cubic Meter";

/// Parses a numeric cell. Whitespace and thousands separators are
/// ignored; blank, non-numeric and non-finite values are `None`.
#[must_use]
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Floor area in square feet. Unknown units are `None`.
#[must_use]
pub fn floor_area_sf(raw: &RawRecord) -> Option<f64> {
    match raw.floor_area_unit.trim() {
        UNIT_SQUARE_FEET => parse_number(&raw.floor_area),
        UNIT_SQUARE_METERS => parse_number(&raw.floor_area).map(|v| v * SQ_FT_PER_SQ_M),
        _ => None,
    }
}

/// Electricity in watt-hours.
///
/// Any unit other than `kWh` yields `0`, so a missing unit reads as zero
/// consumption. Downstream tables depend on that.
#[must_use]
pub fn electricity_wh(raw: &RawRecord) -> Option<f64> {
    if raw.electricity_unit.trim() == UNIT_KWH {
        parse_number(&raw.electricity).map(|v| v * 1000.0)
    } else {
        Some(0.0)
    }
}

/// Natural gas in cubic meters.
///
/// Keyed on the floor-area unit cell, not the gas unit cell: the gas
/// quantity counts only when that cell reads `Cubic Meter`, otherwise the
/// result is `0` in the same way as [`electricity_wh`].
#[must_use]
pub fn gas_m3(raw: &RawRecord) -> Option<f64> {
    if raw.floor_area_unit.trim() == UNIT_CUBIC_METER {
        parse_number(&raw.natural_gas)
    } else {
        Some(0.0)
    }
}

/// Converts every measured quantity of a raw record.
#[must_use]
pub fn reconcile_quantities(raw: &RawRecord) -> Quantities {
    Quantities {
        floor_area_sf: floor_area_sf(raw),
        avg_hours_per_week: parse_number(&raw.avg_hours_per_week),
        annual_flow: parse_number(&raw.annual_flow),
        electricity_wh: electricity_wh(raw),
        gas_m3: gas_m3(raw),
        ghg_emissions_kg: parse_number(&raw.ghg_emissions),
    }
}

/// Attaches canonical quantities to an enriched record.
#[must_use]
pub fn reconcile(enriched: EnrichedRecord) -> ReconciledRecord {
    let quantities = reconcile_quantities(&enriched.raw);
    ReconciledRecord {
        enriched,
        quantities,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(floor_area: &str, floor_unit: &str) -> RawRecord {
        RawRecord {
            floor_area: floor_area.to_string(),
            floor_area_unit: floor_unit.to_string(),
            ..RawRecord::for_year(2015)
        }
    }

    #[test]
    fn parses_numbers_leniently() {
        assert_eq!(parse_number(" 1,234.5 "), Some(1234.5));
        assert_eq!(parse_number("42"), Some(42.0));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("n/a"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("inf"), None);
    }

    #[test]
    fn converts_square_meters() {
        let area = floor_area_sf(&raw("100", "Square meters")).unwrap();
        assert!((area - 1076.39).abs() < 0.01);
    }

    #[test]
    fn keeps_square_feet() {
        assert_eq!(floor_area_sf(&raw("100", "Square feet")), Some(100.0));
    }

    #[test]
    fn unknown_area_unit_is_absent() {
        assert_eq!(floor_area_sf(&raw("100", "Acres")), None);
        assert_eq!(floor_area_sf(&raw("100", "")), None);
        assert_eq!(floor_area_sf(&raw("abc", "Square feet")), None);
    }

    #[test]
    fn electricity_without_kwh_is_zero() {
        let mut record = raw("", "");
        record.electricity = "10".to_string();
        record.electricity_unit = "kWh".to_string();
        assert_eq!(electricity_wh(&record), Some(10_000.0));

        record.electricity_unit = "GJ".to_string();
        assert_eq!(electricity_wh(&record), Some(0.0));

        record.electricity_unit = String::new();
        assert_eq!(electricity_wh(&record), Some(0.0));

        record.electricity = "-".to_string();
        record.electricity_unit = "kWh".to_string();
        assert_eq!(electricity_wh(&record), None);
    }

    #[test]
    fn gas_follows_floor_area_unit_cell() {
        let mut record = raw("500", "Cubic Meter");
        record.natural_gas = "250".to_string();
        record.natural_gas_unit = "Square feet".to_string();
        assert_eq!(gas_m3(&record), Some(250.0));

        record.floor_area_unit = "Square feet".to_string();
        record.natural_gas_unit = "Cubic Meter".to_string();
        assert_eq!(gas_m3(&record), Some(0.0));
    }

    #[test]
    fn reconciles_every_quantity() {
        let mut record = raw("50", "Square meters");
        record.avg_hours_per_week = "60".to_string();
        record.annual_flow = String::new();
        record.electricity = "10".to_string();
        record.electricity_unit = "kWh".to_string();
        record.ghg_emissions = "20".to_string();

        let q = reconcile_quantities(&record);
        assert!((q.floor_area_sf.unwrap() - 538.195).abs() < 0.01);
        assert_eq!(q.avg_hours_per_week, Some(60.0));
        assert_eq!(q.annual_flow, None);
        assert_eq!(q.electricity_wh, Some(10_000.0));
        assert_eq!(q.gas_m3, Some(0.0));
        assert_eq!(q.ghg_emissions_kg, Some(20.0));
    }
}
