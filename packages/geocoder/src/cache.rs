//! Optional on-disk geocode cache.
//!
//! A CSV file with one row per query string. Unresolved queries are stored
//! with blank coordinates so they are not asked again either.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use ward_energy_records_models::Coordinates;

use crate::GeocodeError;

#[derive(Debug, Serialize, Deserialize)]
struct CacheRow {
    query: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

/// Geocoding outcomes keyed by query string, backed by a CSV file.
#[derive(Debug, Clone)]
pub struct GeocodeCache {
    path: PathBuf,
    entries: BTreeMap<String, Option<Coordinates>>,
}

impl GeocodeCache {
    /// Loads the cache at `path`. A missing file is an empty cache.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the file exists but cannot be read or
    /// parsed.
    pub fn load(path: &Path) -> Result<Self, GeocodeError> {
        let mut entries = BTreeMap::new();

        if path.is_file() {
            let mut reader = csv::Reader::from_path(path)?;
            for row in reader.deserialize::<CacheRow>() {
                let row = row?;
                let coordinates = match (row.latitude, row.longitude) {
                    (Some(latitude), Some(longitude)) => Some(Coordinates {
                        latitude,
                        longitude,
                    }),
                    _ => None,
                };
                entries.insert(row.query, coordinates);
            }
            log::info!(
                "Loaded {} geocode cache entries from {}",
                entries.len(),
                path.display()
            );
        }

        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    /// Looks up a query. The outer `None` means "never asked"; the inner
    /// `None` means "asked, unresolved".
    #[must_use]
    pub fn get(&self, query: &str) -> Option<Option<Coordinates>> {
        self.entries.get(query).copied()
    }

    pub fn insert(&mut self, query: String, coordinates: Option<Coordinates>) {
        self.entries.insert(query, coordinates);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rewrites the cache file with every entry, sorted by query.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the file cannot be written.
    pub fn save(&self) -> Result<(), GeocodeError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let mut writer = csv::Writer::from_path(&self.path)?;
        for (query, coordinates) in &self.entries {
            writer.serialize(CacheRow {
                query: query.clone(),
                latitude: coordinates.map(|c| c.latitude),
                longitude: coordinates.map(|c| c.longitude),
            })?;
        }
        writer.flush()?;

        log::info!(
            "Wrote {} geocode cache entries to {}",
            self.entries.len(),
            self.path.display()
        );
        Ok(())
    }
}
