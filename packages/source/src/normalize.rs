//! Column normalizer: maps sheet grids onto [`RawRecord`]s.
//!
//! Every [`SourceFormat`] has a fixed preamble length and a positional
//! column list. Nothing is inferred from header text, which varies from
//! year to year.

use ward_energy_records_models::{RawRecord, SourceFormat};

use crate::SourceError;
use crate::sheet::Sheet;
use crate::source_def::WorkbookResource;

/// Normalizes one sheet into records tagged with `year`.
///
/// Rows before [`first_data_row`](ward_energy_records_models::FormatSchema::first_data_row)
/// are dropped, as are rows with no content at all. Short rows are padded
/// with blanks.
///
/// # Errors
///
/// Returns [`SourceError::Schema`] if the sheet is narrower than the
/// format's widest column index.
pub fn normalize_sheet(
    sheet: &Sheet,
    format: SourceFormat,
    year: u16,
) -> Result<Vec<RawRecord>, SourceError> {
    let schema = format.schema();
    let width = sheet.width();
    let required = schema.required_width();

    if width < required {
        return Err(SourceError::Schema {
            message: format!(
                "sheet '{}' has {width} columns but format {format} needs {required}",
                sheet.name
            ),
        });
    }

    let records: Vec<RawRecord> = sheet
        .rows
        .iter()
        .skip(schema.first_data_row())
        .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
        .map(|row| {
            let mut record = RawRecord::for_year(year);
            for &(index, field) in schema.columns {
                let value = row.get(index).map_or("", |cell| cell.trim());
                record.set(field, value.to_string());
            }
            record
        })
        .collect();

    log::debug!(
        "Normalized sheet '{}' ({format}, {year}): {} records",
        sheet.name,
        records.len()
    );

    Ok(records)
}

/// Normalizes the sheets a [`WorkbookResource`] lists, concatenated in
/// listing order.
///
/// # Errors
///
/// Returns [`SourceError::Schema`] if a listed sheet is missing from the
/// workbook or fails [`normalize_sheet`].
pub fn normalize_workbook(
    sheets: &[Sheet],
    resource: &WorkbookResource,
) -> Result<Vec<RawRecord>, SourceError> {
    let mut records = Vec::new();

    for wanted in &resource.sheets {
        let sheet = match &wanted.sheet {
            Some(name) => find_sheet(sheets, name),
            None => sheets.first(),
        }
        .ok_or_else(|| SourceError::Schema {
            message: format!(
                "workbook '{}' has no sheet {} (available: {})",
                resource.file_name,
                wanted.sheet.as_deref().unwrap_or("<first>"),
                sheets
                    .iter()
                    .map(|s| s.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        })?;

        records.extend(normalize_sheet(sheet, resource.format, wanted.year)?);
    }

    Ok(records)
}

/// Exact name match first, then case-insensitive and trimmed.
fn find_sheet<'a>(sheets: &'a [Sheet], name: &str) -> Option<&'a Sheet> {
    sheets.iter().find(|s| s.name == name).or_else(|| {
        let wanted = name.trim().to_lowercase();
        sheets.iter().find(|s| s.name.trim().to_lowercase() == wanted)
    })
}
