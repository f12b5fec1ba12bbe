//! Address deduplication and throttled resolution.
//!
//! Every distinct `(address, city)` pair is looked up exactly once, one
//! request at a time, spaced by the service's rate limit. Results land in
//! a [`GeocodeMemo`] keyed by query string, which the join stage reads.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use ward_energy_geocoder::address::canonicalize;
use ward_energy_geocoder::cache::GeocodeCache;
use ward_energy_geocoder::service_registry::RequestPolicy;
use ward_energy_geocoder::throttle::Throttle;
use ward_energy_geocoder::{GeocodeError, GeocodeProvider};
use ward_energy_records_models::{CanonicalAddress, Coordinates, GeocodedAddress, RawRecord};
use ward_energy_source::progress::ProgressCallback;

use crate::PipelineError;

/// Pacing and failure limits for one resolution run.
#[derive(Debug, Clone)]
pub struct GeocodeOptions {
    /// Minimum spacing between request starts.
    pub rate_limit: Duration,
    /// Retries per address after the first attempt errors.
    pub max_retries: u32,
    /// Extra wait after an HTTP 429.
    pub rate_limited_backoff: Duration,
    /// Consecutive failed addresses that abort the run.
    pub max_consecutive_failures: u32,
    /// Only the first `n` addresses are looked up; the rest stay
    /// unresolved.
    pub limit: Option<usize>,
}

impl GeocodeOptions {
    #[must_use]
    pub const fn from_policy(policy: &RequestPolicy, limit: Option<usize>) -> Self {
        Self {
            rate_limit: policy.rate_limit(),
            max_retries: policy.max_retries,
            rate_limited_backoff: policy.rate_limited_backoff(),
            max_consecutive_failures: policy.max_consecutive_failures,
            limit,
        }
    }
}

/// Geocoding outcomes keyed by query string.
#[derive(Debug, Clone, Default)]
pub struct GeocodeMemo {
    results: BTreeMap<String, Option<Coordinates>>,
}

impl GeocodeMemo {
    /// Coordinates for a query. `None` both for unresolved queries and for
    /// queries that were never looked up.
    #[must_use]
    pub fn coordinates(&self, query: &str) -> Option<Coordinates> {
        self.results.get(query).copied().flatten()
    }

    pub fn insert(&mut self, query: String, coordinates: Option<Coordinates>) {
        self.results.insert(query, coordinates);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Number of queries that resolved to coordinates.
    #[must_use]
    pub fn resolved(&self) -> usize {
        self.results.values().filter(|c| c.is_some()).count()
    }
}

/// One canonical address per distinct `(address, city)` pair, in first-seen
/// order. The postal code comes from the first record seen for the pair.
/// Records with a blank address contribute nothing.
#[must_use]
pub fn unique_addresses(records: &[RawRecord]) -> Vec<CanonicalAddress> {
    let mut seen = BTreeSet::new();
    let mut addresses = Vec::new();

    for record in records {
        let Some(canonical) = canonicalize(&record.address, &record.city, &record.postal_code)
        else {
            continue;
        };
        if seen.insert((canonical.address.clone(), canonical.city.clone())) {
            addresses.push(canonical);
        }
    }

    addresses
}

/// Resolves every address through `provider`, consulting and updating the
/// optional `cache` first.
///
/// A query the service cannot match is unresolved, not an error. A query
/// whose attempts all error is also unresolved, but
/// `max_consecutive_failures` such queries in a row abort the run.
///
/// # Errors
///
/// Returns [`PipelineError::GeocoderUnavailable`] when the consecutive
/// failure limit is reached.
pub async fn resolve_addresses(
    provider: &dyn GeocodeProvider,
    addresses: &[CanonicalAddress],
    options: &GeocodeOptions,
    mut cache: Option<&mut GeocodeCache>,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<(Vec<GeocodedAddress>, GeocodeMemo), PipelineError> {
    let mut memo = GeocodeMemo::default();
    let mut geocoded = Vec::with_capacity(addresses.len());
    let mut throttle = Throttle::new(options.rate_limit);
    let mut consecutive_failures = 0u32;
    let mut lookups = 0usize;

    progress.set_total(addresses.len() as u64);
    log::info!(
        "Geocoding {} unique addresses via {}...",
        addresses.len(),
        provider.id()
    );

    for address in addresses {
        progress.set_message(address.query.clone());

        let coordinates = if let Some(hit) = memo.results.get(&address.query) {
            *hit
        } else if let Some(hit) = cache.as_deref().and_then(|c| c.get(&address.query)) {
            log::debug!("Cache hit for '{}'", address.query);
            hit
        } else if options.limit.is_some_and(|limit| lookups >= limit) {
            log::debug!("Address limit reached, leaving '{}' unresolved", address.query);
            None
        } else {
            lookups += 1;
            match lookup_with_retries(provider, &address.query, options, &mut throttle).await {
                Ok(coordinates) => {
                    consecutive_failures = 0;
                    if let Some(cache) = cache.as_deref_mut() {
                        cache.insert(address.query.clone(), coordinates);
                    }
                    coordinates
                }
                Err(e) => {
                    consecutive_failures += 1;
                    log::warn!(
                        "Giving up on '{}' ({consecutive_failures} consecutive failures): {e}",
                        address.query
                    );
                    if consecutive_failures >= options.max_consecutive_failures {
                        return Err(PipelineError::GeocoderUnavailable {
                            failures: consecutive_failures,
                            last_error: e.to_string(),
                        });
                    }
                    None
                }
            }
        };

        memo.insert(address.query.clone(), coordinates);
        geocoded.push(GeocodedAddress {
            address: address.clone(),
            coordinates,
        });
        progress.inc(1);
    }

    progress.finish(format!(
        "{} of {} addresses resolved",
        memo.resolved(),
        memo.len()
    ));
    log::info!(
        "Geocoding done: {} lookups, {} of {} addresses resolved",
        lookups,
        memo.resolved(),
        memo.len()
    );

    Ok((geocoded, memo))
}

/// One address: the first attempt plus up to `max_retries` retries, each
/// paced by the throttle.
async fn lookup_with_retries(
    provider: &dyn GeocodeProvider,
    query: &str,
    options: &GeocodeOptions,
    throttle: &mut Throttle,
) -> Result<Option<Coordinates>, GeocodeError> {
    let mut attempt = 0;
    loop {
        throttle.wait().await;

        match provider.geocode(query).await {
            Ok(Some(found)) => return Ok(Some(found.coordinates())),
            Ok(None) => {
                log::debug!("{}: no match for '{query}'", provider.id());
                return Ok(None);
            }
            Err(e) => {
                if matches!(e, GeocodeError::RateLimited) {
                    log::warn!(
                        "Rate limited by {}, waiting {}s...",
                        provider.id(),
                        options.rate_limited_backoff.as_secs()
                    );
                    throttle.back_off(options.rate_limited_backoff);
                }
                if attempt >= options.max_retries {
                    return Err(e);
                }
                attempt += 1;
                log::warn!(
                    "{} error for '{query}' (retry {attempt}/{}): {e}",
                    provider.id(),
                    options.max_retries
                );
            }
        }
    }
}
