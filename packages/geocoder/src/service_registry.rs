//! Compile-time registry of geocoding service configurations.
//!
//! Each geocoding provider is defined in a TOML file under `services/`.
//! The registry embeds these at compile time and exposes them via
//! [`all_services`] and [`nominatim_service`].

use std::time::Duration;

use serde::Deserialize;

/// A geocoding service configuration loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct GeocodingService {
    /// Unique identifier (e.g., `"nominatim"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Provider-specific configuration.
    pub provider: ProviderConfig,
    /// Pacing and retry policy for requests to this service.
    pub policy: RequestPolicy,
}

/// Provider-specific configuration, tagged by `type` in TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Nominatim / `OpenStreetMap` free-form search.
    Nominatim {
        /// API base URL (e.g., `"https://nominatim.openstreetmap.org/search"`).
        base_url: String,
        /// Comma-separated ISO country codes results are restricted to.
        country_codes: String,
    },
}

/// How requests to a service are paced and retried.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestPolicy {
    /// Minimum delay between the starts of consecutive requests.
    pub rate_limit_ms: u64,
    /// Retries per address after the first attempt errors.
    pub max_retries: u32,
    /// Extra wait after the service answers HTTP 429.
    pub rate_limited_backoff_secs: u64,
    /// Consecutive failed addresses after which the service is treated as
    /// unavailable.
    pub max_consecutive_failures: u32,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
}

impl RequestPolicy {
    #[must_use]
    pub const fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ms)
    }

    #[must_use]
    pub const fn rate_limited_backoff(&self) -> Duration {
        Duration::from_secs(self.rate_limited_backoff_secs)
    }
}

impl GeocodingService {
    /// Returns the provider's base URL regardless of variant.
    #[must_use]
    pub fn base_url(&self) -> &str {
        match &self.provider {
            ProviderConfig::Nominatim { base_url, .. } => base_url,
        }
    }
}

// ── Compile-time embedded TOML files ────────────────────────────────

const SERVICE_TOMLS: &[(&str, &str)] = &[("nominatim", include_str!("../services/nominatim.toml"))];

/// Returns all geocoding service configurations.
///
/// # Panics
///
/// Panics if any TOML config is malformed (this is a compile-time guarantee
/// since the configs are embedded).
#[must_use]
pub fn all_services() -> Vec<GeocodingService> {
    SERVICE_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            toml::de::from_str(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse geocoding service '{name}': {e}"))
        })
        .collect()
}

/// Returns the Nominatim service configuration.
///
/// # Panics
///
/// Panics if the embedded registry has no Nominatim entry.
#[must_use]
pub fn nominatim_service() -> GeocodingService {
    all_services()
        .into_iter()
        .find(|s| matches!(s.provider, ProviderConfig::Nominatim { .. }))
        .unwrap_or_else(|| panic!("No Nominatim service in the embedded registry"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn service_ids_are_unique() {
        let services = all_services();
        let mut seen = BTreeSet::new();
        for svc in &services {
            assert!(seen.insert(&svc.id), "Duplicate service ID: {}", svc.id);
        }
    }

    #[test]
    fn all_services_have_required_fields() {
        for svc in &all_services() {
            assert!(!svc.id.is_empty(), "Service has empty id");
            assert!(!svc.name.is_empty(), "Service {} has empty name", svc.id);
            assert!(
                !svc.base_url().is_empty(),
                "Service {} has empty base_url",
                svc.id
            );
            assert!(!svc.policy.user_agent.is_empty());
        }
    }

    #[test]
    fn nominatim_respects_public_rate_limit() {
        let svc = nominatim_service();
        assert!(svc.policy.rate_limit() >= Duration::from_secs(1));
        assert!(svc.policy.max_consecutive_failures > 0);
        let ProviderConfig::Nominatim { country_codes, .. } = &svc.provider;
        assert_eq!(country_codes, "ca");
    }
}
