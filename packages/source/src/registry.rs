//! Dataset registry: loads all dataset definitions from embedded TOML.
//!
//! Each `.toml` file in `packages/source/sources/` is baked into the binary
//! at compile time via [`include_str!`].

use crate::source_def::{DatasetDefinition, DatasetKind, parse_dataset_toml};

/// TOML configs embedded at compile time.
const SOURCE_TOMLS: &[(&str, &str)] = &[
    ("toronto_wards", include_str!("../sources/toronto_wards.toml")),
    (
        "toronto_energy",
        include_str!("../sources/toronto_energy.toml"),
    ),
];

#[cfg(test)]
const EXPECTED_SOURCE_COUNT: usize = 2;

/// Returns all configured dataset definitions.
///
/// # Panics
///
/// Panics if any TOML config is malformed (the configs are embedded, so
/// this is caught by the tests below).
#[must_use]
pub fn all_datasets() -> Vec<DatasetDefinition> {
    SOURCE_TOMLS
        .iter()
        .map(|(name, toml)| {
            parse_dataset_toml(toml).unwrap_or_else(|e| panic!("Failed to parse {name}.toml: {e}"))
        })
        .collect()
}

/// Returns the first ward boundary dataset.
#[must_use]
pub fn ward_dataset() -> Option<DatasetDefinition> {
    all_datasets()
        .into_iter()
        .find(|d| matches!(d.kind, DatasetKind::WardBoundaries { .. }))
}

/// Returns the first energy workbook dataset.
#[must_use]
pub fn energy_dataset() -> Option<DatasetDefinition> {
    all_datasets()
        .into_iter()
        .find(|d| matches!(d.kind, DatasetKind::EnergyWorkbooks { .. }))
}
