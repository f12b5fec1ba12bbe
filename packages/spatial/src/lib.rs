#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! In-memory spatial index for ward attribution.
//!
//! Loads ward polygons from a shapefile or `GeoJSON` file, builds an
//! R-tree over their bounding boxes, and answers point-in-polygon lookups.
//! Points on a shared ward edge match every ward touching it; the ward
//! that appears first in the source file wins.

pub mod crs;
pub mod feature_collection;
pub mod shp;

pub use geo;

use std::collections::BTreeMap;
use std::path::Path;

use geo::{Intersects, MultiPolygon};
use rstar::{AABB, RTree, RTreeObject};
use ward_energy_records_models::Coordinates;

/// Errors from loading ward boundaries.
#[derive(Debug, thiserror::Error)]
pub enum SpatialError {
    /// I/O error (file read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The shapefile or its attribute table could not be read.
    #[error("Shapefile error: {0}")]
    Shapefile(#[from] shapefile::Error),

    /// The `GeoJSON` document could not be parsed.
    #[error("GeoJSON error in {path}: {message}")]
    GeoJson {
        /// File path.
        path: String,
        /// Parser error message.
        message: String,
    },

    /// The boundaries are not in geographic WGS 84 coordinates.
    #[error("CRS mismatch in {path}: {message}")]
    Crs {
        /// File path.
        path: String,
        /// What was found instead.
        message: String,
    },

    /// A feature has geometry that is not a polygon.
    #[error("Ward {index}: unsupported geometry ({message})")]
    Geometry {
        /// Enumeration index of the feature.
        index: usize,
        /// Description of the geometry found.
        message: String,
    },

    /// The configured name attribute is missing from a feature.
    #[error("Ward {index} has no '{field}' attribute")]
    MissingAttribute {
        /// Enumeration index of the feature.
        index: usize,
        /// Attribute name looked up.
        field: String,
    },

    /// The file extension is neither `.shp` nor `.geojson`/`.json`.
    #[error("Unsupported boundary file: {path}")]
    UnsupportedFormat {
        /// File path.
        path: String,
    },
}

/// One ward boundary and its attribute row.
#[derive(Debug, Clone)]
pub struct WardPolygon {
    /// Position of the feature in the source file, starting at 0.
    pub index: usize,
    /// Value of the configured name attribute.
    pub name: String,
    /// Every attribute of the feature, rendered as strings.
    pub attributes: BTreeMap<String, String>,
    pub polygon: MultiPolygon<f64>,
}

/// Loads wards from `path`, choosing the reader by extension.
///
/// # Errors
///
/// Returns [`SpatialError`] if the file cannot be read, is not in WGS 84,
/// or a feature lacks the `name_field` attribute.
pub fn load_wards(path: &Path, name_field: &str) -> Result<Vec<WardPolygon>, SpatialError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    let wards = match extension.as_deref() {
        Some("shp") => shp::load(path, name_field)?,
        Some("geojson" | "json") => feature_collection::load(path, name_field)?,
        _ => {
            return Err(SpatialError::UnsupportedFormat {
                path: path.display().to_string(),
            });
        }
    };

    log::info!("Loaded {} wards from {}", wards.len(), path.display());
    Ok(wards)
}

/// A ward polygon stored in the R-tree with its enumeration index.
struct WardEntry {
    index: usize,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for WardEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Pre-built spatial index over ward polygons.
pub struct WardIndex {
    tree: RTree<WardEntry>,
    names: BTreeMap<usize, String>,
}

impl WardIndex {
    #[must_use]
    pub fn new(wards: &[WardPolygon]) -> Self {
        let entries = wards
            .iter()
            .map(|ward| WardEntry {
                index: ward.index,
                envelope: compute_envelope(&ward.polygon),
                polygon: ward.polygon.clone(),
            })
            .collect();

        Self {
            tree: RTree::bulk_load(entries),
            names: wards.iter().map(|w| (w.index, w.name.clone())).collect(),
        }
    }

    /// Number of wards in the index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Look up the ward containing a point, boundary included.
    ///
    /// Wards tile the city, so interior points hit at most one ward. A
    /// point on a shared edge or vertex hits several; the lowest index
    /// wins so repeated runs agree.
    #[must_use]
    pub fn lookup(&self, coordinates: Coordinates) -> Option<&str> {
        let (lng, lat) = (coordinates.longitude, coordinates.latitude);
        let point = geo::Point::new(lng, lat);
        let query_env = AABB::from_point([lng, lat]);

        self.tree
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| entry.polygon.intersects(&point))
            .map(|entry| entry.index)
            .min()
            .and_then(|index| self.names.get(&index))
            .map(String::as_str)
    }
}

/// Compute the bounding box envelope for a [`MultiPolygon`].
fn compute_envelope(mp: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    use geo::BoundingRect;

    mp.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}
