//! Address canonicalization for the building records.
//!
//! The energy sheets repeat the same building in every reporting year, with
//! postal codes typed inconsistently (`"m4y0a9"`, `"M4Y 0A9"`,
//! `" M4Y  0A9"`). Geocoding works on one canonical query per distinct
//! `(address, city)` pair.

use std::sync::LazyLock;

use regex::Regex;
use ward_energy_records_models::{COUNTRY, CanonicalAddress};

/// Runs of whitespace, collapsed to a single space in query strings.
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// A Canadian postal code once whitespace is stripped: six alphanumerics.
static POSTAL_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9]{6}$").expect("valid regex"));

/// Normalizes a postal code to `AAA BBB`.
///
/// Case and internal spacing are ignored. Input that is not six
/// alphanumerics after removing whitespace is returned uppercased and
/// trimmed, unchanged otherwise. Normalizing twice is the same as once.
#[must_use]
pub fn normalize_postal_code(raw: &str) -> String {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();

    if POSTAL_CODE_RE.is_match(&compact) {
        format!("{} {}", &compact[..3], &compact[3..])
    } else {
        raw.trim().to_uppercase()
    }
}

/// Collapses every whitespace run to one space and trims the ends.
#[must_use]
pub fn collapse_whitespace(value: &str) -> String {
    WHITESPACE_RE.replace_all(value.trim(), " ").into_owned()
}

/// Builds the free-form geocoding query `"<address>, <city>"`.
///
/// An empty city yields just the address.
#[must_use]
pub fn build_query(address: &str, city: &str) -> String {
    let address = collapse_whitespace(address);
    let city = collapse_whitespace(city);
    if city.is_empty() {
        address
    } else {
        format!("{address}, {city}")
    }
}

/// Builds the canonical form of one record's address.
///
/// Returns `None` for a blank address, which is never geocoded.
#[must_use]
pub fn canonicalize(address: &str, city: &str, postal_code: &str) -> Option<CanonicalAddress> {
    let address = collapse_whitespace(address);
    if address.is_empty() {
        return None;
    }
    let city = collapse_whitespace(city);

    Some(CanonicalAddress {
        query: build_query(&address, &city),
        address,
        city,
        postal_code: normalize_postal_code(postal_code),
        country: COUNTRY.to_string(),
    })
}
