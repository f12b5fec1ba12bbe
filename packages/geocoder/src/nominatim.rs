//! Nominatim / OpenStreetMap geocoder client.
//!
//! Nominatim has strict rate limits: **1 request per second** maximum on
//! the public instance. The client itself does not pace requests; callers
//! go through [`crate::throttle::Throttle`].
//!
//! See <https://nominatim.org/release-docs/develop/api/Search/>

use async_trait::async_trait;

use crate::service_registry::{GeocodingService, ProviderConfig};
use crate::{GeocodeError, GeocodeMatch, GeocodeProvider};

/// A [`GeocodeProvider`] backed by a Nominatim `search` endpoint.
#[derive(Debug, Clone)]
pub struct NominatimClient {
    client: reqwest::Client,
    base_url: String,
    country_codes: String,
}

impl NominatimClient {
    /// Creates a client for the given service configuration, sending the
    /// configured `User-Agent`.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the HTTP client cannot be built.
    pub fn from_service(service: &GeocodingService) -> Result<Self, GeocodeError> {
        let ProviderConfig::Nominatim {
            base_url,
            country_codes,
        } = &service.provider;

        let client = reqwest::Client::builder()
            .user_agent(&service.policy.user_agent)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.clone(),
            country_codes: country_codes.clone(),
        })
    }
}

#[async_trait]
impl GeocodeProvider for NominatimClient {
    fn id(&self) -> &str {
        "nominatim"
    }

    async fn geocode(&self, query: &str) -> Result<Option<GeocodeMatch>, GeocodeError> {
        geocode_freeform(&self.client, &self.base_url, &self.country_codes, query).await
    }
}

/// Geocodes a free-form query (e.g., `"100 Queen St W, Toronto"`).
///
/// The caller is responsible for rate limiting (see `rate_limit_ms` in the
/// service TOML configuration).
///
/// # Errors
///
/// Returns [`GeocodeError`] if the HTTP request or response parsing fails.
pub async fn geocode_freeform(
    client: &reqwest::Client,
    base_url: &str,
    country_codes: &str,
    query: &str,
) -> Result<Option<GeocodeMatch>, GeocodeError> {
    let resp = client
        .get(base_url)
        .query(&[
            ("q", query),
            ("countrycodes", country_codes),
            ("format", "jsonv2"),
            ("limit", "1"),
        ])
        .send()
        .await?;

    let status = resp.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(GeocodeError::RateLimited);
    }
    if !status.is_success() {
        return Err(GeocodeError::Status {
            status: status.as_u16(),
        });
    }

    let body: serde_json::Value = resp.json().await?;
    parse_response(&body)
}

/// Parses Nominatim JSON response.
fn parse_response(body: &serde_json::Value) -> Result<Option<GeocodeMatch>, GeocodeError> {
    let results = body.as_array().ok_or_else(|| GeocodeError::Parse {
        message: "Nominatim response is not an array".to_string(),
    })?;

    let Some(first) = results.first() else {
        return Ok(None);
    };

    let lat = first["lat"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| GeocodeError::Parse {
            message: "Missing lat in Nominatim response".to_string(),
        })?;

    let lon = first["lon"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| GeocodeError::Parse {
            message: "Missing lon in Nominatim response".to_string(),
        })?;

    let display_name = first["display_name"].as_str().map(String::from);

    Ok(Some(GeocodeMatch {
        latitude: lat,
        longitude: lon,
        matched_address: display_name,
    }))
}
