//! Config-driven dataset definitions.
//!
//! A [`DatasetDefinition`] names a CKAN package and says which of its
//! resources to download and how to read them. Definitions live in TOML
//! files under `sources/` and are embedded by [`crate::registry`].

use serde::Deserialize;
use ward_energy_records_models::SourceFormat;

/// A dataset published through a CKAN portal.
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetDefinition {
    /// Unique identifier (e.g., `"toronto_wards"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Where the package lives.
    pub ckan: CkanLocation,
    /// What the package contains.
    pub kind: DatasetKind,
}

/// A CKAN portal and package identifier.
#[derive(Debug, Clone, Deserialize)]
pub struct CkanLocation {
    /// Portal root (e.g., `"https://ckan0.cf.opendata.inter.prod-toronto.ca"`).
    pub base_url: String,
    /// Package name or id passed to `package_show`.
    pub package_id: String,
}

/// Dataset contents, tagged by `type` in TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DatasetKind {
    /// A ward boundary archive (zipped shapefile) or `GeoJSON` file.
    WardBoundaries {
        /// Resource name to match in the package.
        resource: String,
        /// Local file name for the download.
        file_name: String,
        /// Attribute holding the ward name.
        name_field: String,
    },
    /// Yearly energy/emissions workbooks.
    EnergyWorkbooks {
        /// Resources to download, in concatenation order.
        resources: Vec<WorkbookResource>,
    },
}

/// One downloadable workbook and the sheets to read from it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkbookResource {
    /// Resource name to match in the package.
    pub resource: String,
    /// Local file name for the download. The extension picks the reader.
    pub file_name: String,
    /// Column layout shared by every sheet of this workbook.
    pub format: SourceFormat,
    /// Sheets to read, each tagged with its reporting year.
    pub sheets: Vec<SheetYear>,
}

/// A sheet and the reporting year it represents.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SheetYear {
    /// Sheet name. `None` selects the first sheet.
    #[serde(default)]
    pub sheet: Option<String>,
    pub year: u16,
}

/// Parses a dataset definition from TOML.
///
/// # Errors
///
/// Returns the TOML error message if the definition is malformed.
pub fn parse_dataset_toml(toml_str: &str) -> Result<DatasetDefinition, String> {
    toml::de::from_str(toml_str).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_workbook_definition() {
        let def = parse_dataset_toml(
            r#"
            id = "energy"
            name = "Energy"

            [ckan]
            base_url = "https://example.org"
            package_id = "energy"

            [kind]
            type = "energy_workbooks"

            [[kind.resources]]
            resource = "2011-2014"
            file_name = "energy.xlsx"
            format = "bps_2011_2014"
            sheets = [{ sheet = "2011", year = 2011 }, { year = 2012 }]
            "#,
        )
        .unwrap();

        let DatasetKind::EnergyWorkbooks { resources } = def.kind else {
            panic!("expected energy workbooks");
        };
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].format, SourceFormat::Bps2011To2014);
        assert_eq!(resources[0].sheets[0].sheet.as_deref(), Some("2011"));
        assert_eq!(resources[0].sheets[1].sheet, None);
        assert_eq!(resources[0].sheets[1].year, 2012);
    }

    #[test]
    fn rejects_unknown_format() {
        let result = parse_dataset_toml(
            r#"
            id = "energy"
            name = "Energy"

            [ckan]
            base_url = "https://example.org"
            package_id = "energy"

            [kind]
            type = "energy_workbooks"

            [[kind.resources]]
            resource = "x"
            file_name = "x.xlsx"
            format = "bps_1999"
            sheets = []
            "#,
        );
        assert!(result.is_err());
    }
}
