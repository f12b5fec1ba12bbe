//! Coordinate reference system checks.
//!
//! Ward lookups compare raw longitude/latitude from the geocoder against
//! polygon vertices, so boundaries must be in geographic WGS 84. Anything
//! else is rejected before the index is built.

use std::path::Path;

use crate::SpatialError;

/// Datum names that denote WGS 84 in ESRI and OGC WKT.
const WGS84_DATUMS: &[&str] = &[
    "WGS_1984",
    "WGS 1984",
    "WGS_84",
    "WGS 84",
    "WGS84",
    "WORLD GEODETIC SYSTEM 1984",
];

/// Checks the `.prj` file next to a shapefile.
///
/// A missing `.prj` is assumed to be WGS 84 and logged.
///
/// # Errors
///
/// Returns [`SpatialError::Crs`] if the projection file describes a
/// projected system or a datum other than WGS 84.
pub fn check_shapefile_crs(shp_path: &Path) -> Result<(), SpatialError> {
    let prj = ["prj", "PRJ"]
        .iter()
        .map(|ext| shp_path.with_extension(ext))
        .find(|p| p.is_file());

    let Some(prj) = prj else {
        log::warn!(
            "No .prj next to {}, assuming WGS 84 longitude/latitude",
            shp_path.display()
        );
        return Ok(());
    };

    let wkt = std::fs::read_to_string(&prj)?;
    check_wkt(&wkt).map_err(|message| SpatialError::Crs {
        path: prj.display().to_string(),
        message,
    })
}

/// Accepts WKT for a geographic CRS on the WGS 84 datum.
///
/// # Errors
///
/// Returns a description of the mismatch otherwise.
pub fn check_wkt(wkt: &str) -> Result<(), String> {
    let upper = wkt.trim().to_ascii_uppercase();

    if upper.starts_with("PROJCS") || upper.starts_with("PROJCRS") {
        return Err(format!("projected coordinate system: {}", wkt_name(wkt)));
    }
    if !(upper.starts_with("GEOGCS") || upper.starts_with("GEOGCRS")) {
        return Err(format!("unrecognized projection definition: {}", wkt_name(wkt)));
    }
    let Some(datum) = datum_name(&upper) else {
        return Err(format!("no datum in projection definition: {}", wkt_name(wkt)));
    };
    if !WGS84_DATUMS.iter().any(|name| datum.contains(name)) {
        return Err(format!("datum is not WGS 84: {}", wkt_name(wkt)));
    }
    Ok(())
}

/// The quoted name of the `DATUM[...]` clause. Only the name counts: a
/// `TOWGS84[...]` transform inside the clause says nothing about the datum.
fn datum_name(upper_wkt: &str) -> Option<&str> {
    let start = upper_wkt.find("DATUM[")? + "DATUM[".len();
    let rest = upper_wkt[start..].trim_start().strip_prefix('"')?;
    rest.split('"').next()
}

/// Checks a `GeoJSON` CRS name (the legacy `crs.properties.name` member).
///
/// # Errors
///
/// Returns a description of the mismatch if the name is not WGS 84.
pub fn check_crs_name(name: &str) -> Result<(), String> {
    let upper = name.to_ascii_uppercase();
    let accepted = upper.ends_with("CRS84") || upper.ends_with("EPSG::4326") || upper == "EPSG:4326";
    if accepted {
        Ok(())
    } else {
        Err(format!("GeoJSON crs is {name}, expected WGS 84 (EPSG:4326)"))
    }
}

/// The quoted name after the first keyword, for messages.
fn wkt_name(wkt: &str) -> &str {
    wkt.split('"').nth(1).unwrap_or_else(|| wkt.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ESRI_WGS84: &str = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;

    const MTM_ZONE_10: &str = r#"PROJCS["NAD_1927_MTM_10",GEOGCS["GCS_North_American_1927",DATUM["D_North_American_1927",SPHEROID["Clarke_1866",6378206.4,294.9786982]]],PROJECTION["Transverse_Mercator"]]"#;

    const NAD83: &str = r#"GEOGCS["GCS_North_American_1983",DATUM["D_North_American_1983",SPHEROID["GRS_1980",6378137.0,298.257222101]]]"#;

    #[test]
    fn accepts_geographic_wgs84() {
        assert!(check_wkt(ESRI_WGS84).is_ok());
    }

    #[test]
    fn rejects_projected_system() {
        let err = check_wkt(MTM_ZONE_10).unwrap_err();
        assert!(err.contains("NAD_1927_MTM_10"));
    }

    #[test]
    fn rejects_other_datum() {
        assert!(check_wkt(NAD83).unwrap_err().contains("not WGS 84"));
    }

    #[test]
    fn towgs84_transform_is_not_a_wgs84_datum() {
        let nad83 = r#"GEOGCS["NAD83",DATUM["North_American_Datum_1983",SPHEROID["GRS 1980",6378137,298.257222101,AUTHORITY["EPSG","7019"]],TOWGS84[0,0,0,0,0,0,0],AUTHORITY["EPSG","6269"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AUTHORITY["EPSG","4269"]]"#;
        assert!(check_wkt(nad83).unwrap_err().contains("not WGS 84"));
    }

    #[test]
    fn accepts_ogc_wgs84_datum_name() {
        let ogc = r#"GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563]],PRIMEM["Greenwich",0],UNIT["degree",0.0174532925199433]]"#;
        assert!(check_wkt(ogc).is_ok());
    }

    #[test]
    fn missing_datum_is_rejected() {
        assert!(check_wkt(r#"GEOGCS["Unknown"]"#).is_err());
    }

    #[test]
    fn geojson_crs_names() {
        assert!(check_crs_name("urn:ogc:def:crs:OGC:1.3:CRS84").is_ok());
        assert!(check_crs_name("urn:ogc:def:crs:EPSG::4326").is_ok());
        assert!(check_crs_name("EPSG:4326").is_ok());
        assert!(check_crs_name("urn:ogc:def:crs:EPSG::2952").is_err());
    }

    #[test]
    fn missing_prj_is_assumed_wgs84() {
        let tmp = std::env::temp_dir().join("ward_energy_crs_missing_prj");
        let _ = std::fs::remove_dir_all(&tmp);
        std::fs::create_dir_all(&tmp).unwrap();
        assert!(check_shapefile_crs(&tmp.join("wards.shp")).is_ok());

        std::fs::write(tmp.join("wards.prj"), MTM_ZONE_10).unwrap();
        let err = check_shapefile_crs(&tmp.join("wards.shp")).unwrap_err();
        assert!(matches!(err, SpatialError::Crs { .. }));

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
