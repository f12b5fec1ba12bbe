//! Reads workbooks and CSV files into string grids.
//!
//! Column positions matter downstream, so a sheet whose used range does
//! not start at `A1` is padded back out to absolute row/column indexes.

use std::path::Path;

use calamine::{Data, Range, Reader as _, open_workbook_auto};

use crate::SourceError;

/// One sheet of a workbook as rows of trimmed cell strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    /// Number of columns in the widest row.
    #[must_use]
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// Reads every sheet of the file at `path`.
///
/// `.csv` files yield one sheet named after the file stem; `.xlsx`,
/// `.xlsm`, `.xlsb`, `.xls` and `.ods` are read with `calamine`.
///
/// # Errors
///
/// Returns [`SourceError`] if the extension is unsupported or the file
/// cannot be read.
pub fn read_sheets(path: &Path) -> Result<Vec<Sheet>, SourceError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("csv") => Ok(vec![read_csv(path)?]),
        Some("xlsx" | "xlsm" | "xlsb" | "xls" | "ods") => read_workbook(path),
        _ => Err(SourceError::Workbook {
            path: path.display().to_string(),
            message: "unsupported file extension".to_string(),
        }),
    }
}

fn read_workbook(path: &Path) -> Result<Vec<Sheet>, SourceError> {
    let workbook_error = |e: &dyn std::fmt::Display| SourceError::Workbook {
        path: path.display().to_string(),
        message: e.to_string(),
    };

    let mut workbook = open_workbook_auto(path).map_err(|e| workbook_error(&e))?;
    let names = workbook.sheet_names();

    let mut sheets = Vec::with_capacity(names.len());
    for name in names {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| workbook_error(&e))?;
        log::debug!(
            "Read sheet '{name}' from {}: {} rows",
            path.display(),
            range.height()
        );
        sheets.push(Sheet {
            name,
            rows: range_to_rows(&range),
        });
    }

    Ok(sheets)
}

fn read_csv(path: &Path) -> Result<Sheet, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(|c| c.trim().to_string()).collect());
    }

    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();

    Ok(Sheet { name, rows })
}

/// Converts a cell range to rows anchored at `A1`.
fn range_to_rows(range: &Range<Data>) -> Vec<Vec<String>> {
    let Some((start_row, start_col)) = range.start() else {
        return Vec::new();
    };

    let mut rows = vec![Vec::new(); start_row as usize];
    for row in range.rows() {
        let mut cells = vec![String::new(); start_col as usize];
        cells.extend(row.iter().map(cell_to_string));
        rows.push(cells);
    }
    rows
}

/// Renders a cell the way it reads in the spreadsheet.
///
/// Integral floats drop their fractional part (`1200.0` → `"1200"`).
/// Error cells (`#N/A`, `#DIV/0!`) are blank.
#[must_use]
pub fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => format_float(*f),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string().trim().to_string(),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        (value as i64).to_string()
    } else {
        value.to_string()
    }
}
