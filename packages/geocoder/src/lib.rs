#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geocoding for building addresses.
//!
//! Addresses are first canonicalized ([`address`]): one query string per
//! distinct `(address, city)` pair and postal codes normalized to
//! `AAA BBB`. Queries are resolved through a [`GeocodeProvider`]; the only
//! real provider is [`nominatim::NominatimClient`], configured from the
//! embedded TOML in `services/` (see [`service_registry`]).
//!
//! Nominatim's public instance allows one request per second, so callers
//! pace requests through a [`throttle::Throttle`]. Results can optionally
//! be persisted between runs with [`cache::GeocodeCache`].

pub mod address;
pub mod cache;
pub mod nominatim;
pub mod service_registry;
pub mod throttle;

use async_trait::async_trait;
use thiserror::Error;
use ward_energy_records_models::Coordinates;

/// A geocoding result with coordinates and metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeMatch {
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// The matched/canonical address returned by the geocoder.
    pub matched_address: Option<String>,
}

impl GeocodeMatch {
    #[must_use]
    pub const fn coordinates(&self) -> Coordinates {
        Coordinates {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// Errors from geocoding operations.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status other than 429.
    #[error("HTTP status {status}")]
    Status {
        /// Response status code.
        status: u16,
    },

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimited,

    /// I/O error reading or writing the geocode cache.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The geocode cache file is malformed.
    #[error("Cache error: {0}")]
    Cache(#[from] csv::Error),
}

/// Resolves a free-form query to a single best match.
///
/// `Ok(None)` means the service answered but found nothing; that is a
/// normal outcome, not an error.
#[async_trait]
pub trait GeocodeProvider: Send + Sync {
    /// Short identifier used in logs (e.g., `"nominatim"`).
    fn id(&self) -> &str;

    /// Geocodes one query string.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the request fails or the response cannot
    /// be parsed.
    async fn geocode(&self, query: &str) -> Result<Option<GeocodeMatch>, GeocodeError>;
}
