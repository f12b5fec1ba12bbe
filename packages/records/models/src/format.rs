//! Per-format schema descriptors for the published energy sheets.
//!
//! The yearly sheets have inconsistent header text, so columns are selected
//! by position. Each [`SourceFormat`] carries a fixed preamble length and an
//! ordered list of `(source column index, canonical field)` pairs.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A canonical field of [`crate::RawRecord`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CanonicalField {
    OperationName,
    OperationType,
    Address,
    City,
    PostalCode,
    FloorArea,
    FloorAreaUnit,
    AvgHoursPerWeek,
    AnnualFlow,
    Electricity,
    ElectricityUnit,
    NaturalGas,
    NaturalGasUnit,
    GhgEmissions,
}

impl CanonicalField {
    pub const ALL: &[Self] = &[
        Self::OperationName,
        Self::OperationType,
        Self::Address,
        Self::City,
        Self::PostalCode,
        Self::FloorArea,
        Self::FloorAreaUnit,
        Self::AvgHoursPerWeek,
        Self::AnnualFlow,
        Self::Electricity,
        Self::ElectricityUnit,
        Self::NaturalGas,
        Self::NaturalGasUnit,
        Self::GhgEmissions,
    ];
}

/// Layout family of a published sheet.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum SourceFormat {
    /// 2011 to 2014 workbook: one sheet per year, two-line title block.
    #[serde(rename = "bps_2011_2014")]
    #[strum(serialize = "bps_2011_2014")]
    Bps2011To2014,
    /// 2015 to 2018 workbooks: a leading sector column, one-line title.
    #[serde(rename = "bps_2015_2018")]
    #[strum(serialize = "bps_2015_2018")]
    Bps2015To2018,
}

/// Column layout of a [`SourceFormat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatSchema {
    /// Rows before the header row. The header row itself is also skipped.
    pub preamble_rows: usize,
    pub columns: &'static [(usize, CanonicalField)],
}

impl FormatSchema {
    /// Index of the first data row.
    #[must_use]
    pub const fn first_data_row(&self) -> usize {
        self.preamble_rows + 1
    }

    /// Minimum number of columns a sheet must have for this layout.
    #[must_use]
    pub fn required_width(&self) -> usize {
        self.columns.iter().map(|(idx, _)| idx + 1).max().unwrap_or(0)
    }
}

const BPS_2011_2014: FormatSchema = FormatSchema {
    preamble_rows: 9,
    columns: &[
        (0, CanonicalField::OperationName),
        (1, CanonicalField::OperationType),
        (2, CanonicalField::Address),
        (3, CanonicalField::City),
        (4, CanonicalField::PostalCode),
        (5, CanonicalField::FloorArea),
        (6, CanonicalField::FloorAreaUnit),
        (7, CanonicalField::AvgHoursPerWeek),
        (8, CanonicalField::AnnualFlow),
        (9, CanonicalField::Electricity),
        (10, CanonicalField::ElectricityUnit),
        (11, CanonicalField::NaturalGas),
        (12, CanonicalField::NaturalGasUnit),
        (27, CanonicalField::GhgEmissions),
    ],
};

const BPS_2015_2018: FormatSchema = FormatSchema {
    preamble_rows: 8,
    columns: &[
        (1, CanonicalField::OperationName),
        (2, CanonicalField::OperationType),
        (3, CanonicalField::Address),
        (4, CanonicalField::City),
        (5, CanonicalField::PostalCode),
        (6, CanonicalField::FloorArea),
        (7, CanonicalField::FloorAreaUnit),
        (8, CanonicalField::AvgHoursPerWeek),
        (9, CanonicalField::AnnualFlow),
        (10, CanonicalField::Electricity),
        (11, CanonicalField::ElectricityUnit),
        (12, CanonicalField::NaturalGas),
        (13, CanonicalField::NaturalGasUnit),
        (29, CanonicalField::GhgEmissions),
    ],
};

impl SourceFormat {
    #[must_use]
    pub const fn schema(self) -> &'static FormatSchema {
        match self {
            Self::Bps2011To2014 => &BPS_2011_2014,
            Self::Bps2015To2018 => &BPS_2015_2018,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::str::FromStr as _;

    use super::*;

    #[test]
    fn every_schema_maps_every_field_once() {
        for format in [SourceFormat::Bps2011To2014, SourceFormat::Bps2015To2018] {
            let schema = format.schema();
            let fields: BTreeSet<_> = schema.columns.iter().map(|(_, f)| *f).collect();
            assert_eq!(fields.len(), CanonicalField::ALL.len(), "{format}");
            assert_eq!(schema.columns.len(), CanonicalField::ALL.len(), "{format}");

            let indexes: BTreeSet<_> = schema.columns.iter().map(|(i, _)| *i).collect();
            assert_eq!(indexes.len(), schema.columns.len(), "{format} reuses a column");
        }
    }

    #[test]
    fn older_format_has_extra_preamble_row() {
        assert_eq!(SourceFormat::Bps2011To2014.schema().first_data_row(), 10);
        assert_eq!(SourceFormat::Bps2015To2018.schema().first_data_row(), 9);
    }

    #[test]
    fn required_width_covers_last_column() {
        assert_eq!(SourceFormat::Bps2011To2014.schema().required_width(), 28);
        assert_eq!(SourceFormat::Bps2015To2018.schema().required_width(), 30);
    }

    #[test]
    fn format_ids_parse() {
        assert_eq!(
            SourceFormat::from_str("bps_2015_2018").unwrap(),
            SourceFormat::Bps2015To2018
        );
        assert_eq!(SourceFormat::Bps2011To2014.to_string(), "bps_2011_2014");
    }
}
