//! ESRI shapefile ward loader (`.shp` geometry + `.dbf` attributes).

use std::collections::BTreeMap;
use std::path::Path;

use geo::MultiPolygon;
use shapefile::Shape;
use shapefile::dbase::{FieldValue, Record};

use crate::{SpatialError, WardPolygon, crs};

/// Reads every polygon feature of a shapefile.
///
/// # Errors
///
/// Returns [`SpatialError`] if the CRS is not WGS 84, the files cannot be
/// read, a shape is not a polygon, or a record lacks `name_field`.
pub fn load(path: &Path, name_field: &str) -> Result<Vec<WardPolygon>, SpatialError> {
    crs::check_shapefile_crs(path)?;

    let mut reader = shapefile::Reader::from_path(path)?;
    let mut wards = Vec::new();

    for (index, item) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) = item?;
        let polygon = shape_to_multipolygon(index, shape)?;
        let attributes = record_to_attributes(record);
        let name = attributes
            .get(name_field)
            .cloned()
            .ok_or_else(|| SpatialError::MissingAttribute {
                index,
                field: name_field.to_string(),
            })?;

        wards.push(WardPolygon {
            index,
            name,
            attributes,
            polygon,
        });
    }

    Ok(wards)
}

fn shape_to_multipolygon(index: usize, shape: Shape) -> Result<MultiPolygon<f64>, SpatialError> {
    match shape {
        Shape::Polygon(polygon) => Ok(MultiPolygon::from(polygon)),
        Shape::NullShape => {
            log::warn!("Ward {index} has no geometry; it will never match");
            Ok(MultiPolygon::new(vec![]))
        }
        other => Err(SpatialError::Geometry {
            index,
            message: format!("{:?}", other.shapetype()),
        }),
    }
}

/// Flattens a `.dbf` record into string attributes. Blank values are
/// empty strings.
fn record_to_attributes(record: Record) -> BTreeMap<String, String> {
    std::collections::HashMap::<String, FieldValue>::from(record)
        .into_iter()
        .map(|(name, value)| (name, field_to_string(value)))
        .collect()
}

fn field_to_string(value: FieldValue) -> String {
    match value {
        FieldValue::Character(text) => text.map(|s| s.trim().to_string()).unwrap_or_default(),
        FieldValue::Numeric(number) => number.map(format_number).unwrap_or_default(),
        FieldValue::Float(number) => number.map(|n| format_number(f64::from(n))).unwrap_or_default(),
        FieldValue::Integer(number) => number.to_string(),
        FieldValue::Double(number) => format_number(number),
        FieldValue::Logical(flag) => flag.map(|b| b.to_string()).unwrap_or_default(),
        other => format!("{other:?}"),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        (value as i64).to_string()
    } else {
        value.to_string()
    }
}
