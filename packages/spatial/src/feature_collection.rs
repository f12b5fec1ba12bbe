//! `GeoJSON` `FeatureCollection` ward loader.

use std::collections::BTreeMap;
use std::path::Path;

use geo::MultiPolygon;
use geojson::GeoJson;

use crate::{SpatialError, WardPolygon, crs};

/// Reads every feature of a `GeoJSON` `FeatureCollection` file.
///
/// # Errors
///
/// Returns [`SpatialError`] if the file is not a `FeatureCollection`, a
/// legacy `crs` member names a system other than WGS 84, a feature is not
/// a polygon, or a feature lacks `name_field`.
pub fn load(path: &Path, name_field: &str) -> Result<Vec<WardPolygon>, SpatialError> {
    let text = std::fs::read_to_string(path)?;
    parse(&text, name_field).map_err(|e| match e {
        SpatialError::GeoJson { message, .. } => SpatialError::GeoJson {
            path: path.display().to_string(),
            message,
        },
        SpatialError::Crs { message, .. } => SpatialError::Crs {
            path: path.display().to_string(),
            message,
        },
        other => other,
    })
}

/// Parses a `FeatureCollection` document. Error paths are left blank for
/// the caller to fill in.
fn parse(text: &str, name_field: &str) -> Result<Vec<WardPolygon>, SpatialError> {
    let geojson_error = |message: String| SpatialError::GeoJson {
        path: String::new(),
        message,
    };

    let geojson: GeoJson = text.parse().map_err(|e: geojson::Error| geojson_error(e.to_string()))?;
    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(geojson_error("document is not a FeatureCollection".to_string()));
    };

    if let Some(name) = collection
        .foreign_members
        .as_ref()
        .and_then(|members| members.get("crs"))
        .and_then(|crs| crs.pointer("/properties/name"))
        .and_then(serde_json::Value::as_str)
    {
        crs::check_crs_name(name).map_err(|message| SpatialError::Crs {
            path: String::new(),
            message,
        })?;
    }

    let mut wards = Vec::with_capacity(collection.features.len());
    for (index, feature) in collection.features.into_iter().enumerate() {
        let attributes: BTreeMap<String, String> = feature
            .properties
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| (key, value_to_string(&value)))
            .collect();

        let name = attributes
            .get(name_field)
            .cloned()
            .ok_or_else(|| SpatialError::MissingAttribute {
                index,
                field: name_field.to_string(),
            })?;

        let polygon = match feature.geometry {
            Some(geometry) => geometry_to_multipolygon(index, geometry)?,
            None => {
                log::warn!("Ward {index} ({name}) has no geometry; it will never match");
                MultiPolygon::new(vec![])
            }
        };

        wards.push(WardPolygon {
            index,
            name,
            attributes,
            polygon,
        });
    }

    Ok(wards)
}

fn geometry_to_multipolygon(
    index: usize,
    geometry: geojson::Geometry,
) -> Result<MultiPolygon<f64>, SpatialError> {
    let geo_geom: geo::Geometry<f64> =
        geometry
            .try_into()
            .map_err(|e: geojson::Error| SpatialError::Geometry {
                index,
                message: e.to_string(),
            })?;

    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Ok(mp),
        geo::Geometry::Polygon(p) => Ok(MultiPolygon(vec![p])),
        other => Err(SpatialError::Geometry {
            index,
            message: format!("{other:?}").chars().take(40).collect(),
        }),
    }
}

fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection(crs: Option<&str>) -> String {
        let crs_member = crs.map_or_else(String::new, |name| {
            format!(r#""crs": {{ "type": "name", "properties": {{ "name": "{name}" }} }},"#)
        });
        format!(
            r#"{{
                "type": "FeatureCollection",
                {crs_member}
                "features": [
                    {{
                        "type": "Feature",
                        "properties": {{ "AREA_NAME": "Ward A", "AREA_ID": 1, "NOTE": null }},
                        "geometry": {{
                            "type": "Polygon",
                            "coordinates": [[[-79.4, 43.6], [-79.3, 43.6], [-79.3, 43.7], [-79.4, 43.7], [-79.4, 43.6]]]
                        }}
                    }},
                    {{
                        "type": "Feature",
                        "properties": {{ "AREA_NAME": "Ward B" }},
                        "geometry": null
                    }}
                ]
            }}"#
        )
    }

    #[test]
    fn loads_features_in_order() {
        let wards = parse(&collection(None), "AREA_NAME").unwrap();
        assert_eq!(wards.len(), 2);
        assert_eq!(wards[0].index, 0);
        assert_eq!(wards[0].name, "Ward A");
        assert_eq!(wards[0].attributes["AREA_ID"], "1");
        assert_eq!(wards[0].attributes["NOTE"], "");
        assert_eq!(wards[0].polygon.0.len(), 1);
        assert!(wards[1].polygon.0.is_empty());
    }

    #[test]
    fn accepts_crs84_member() {
        assert!(parse(&collection(Some("urn:ogc:def:crs:OGC:1.3:CRS84")), "AREA_NAME").is_ok());
    }

    #[test]
    fn rejects_projected_crs_member() {
        let err = parse(&collection(Some("urn:ogc:def:crs:EPSG::2019")), "AREA_NAME").unwrap_err();
        assert!(matches!(err, SpatialError::Crs { .. }));
    }

    #[test]
    fn missing_name_field_is_fatal() {
        let err = parse(&collection(None), "WARD_NAME").unwrap_err();
        assert!(matches!(
            err,
            SpatialError::MissingAttribute { index: 0, .. }
        ));
    }

    #[test]
    fn load_reads_file() {
        let tmp = std::env::temp_dir().join("ward_energy_geojson_test");
        let _ = std::fs::remove_dir_all(&tmp);
        std::fs::create_dir_all(&tmp).unwrap();
        let path = tmp.join("wards.geojson");
        std::fs::write(&path, collection(None)).unwrap();

        let wards = crate::load_wards(&path, "AREA_NAME").unwrap();
        assert_eq!(wards.len(), 2);

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
