//! CKAN Action API client.
//!
//! Resolves a package to its resource list via `package_show` and picks
//! resources by name. Downloads themselves go through [`crate::retry`].

use crate::{SourceError, retry};

/// A downloadable resource of a CKAN package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CkanResource {
    pub id: String,
    pub name: String,
    /// Declared format (e.g., `"XLSX"`, `"SHP"`). May be empty.
    pub format: String,
    pub url: String,
}

/// Lists the resources of a CKAN package.
///
/// # Errors
///
/// Returns [`SourceError`] if the request fails after retries or the
/// response is not a successful `package_show` result.
pub async fn package_show(
    client: &reqwest::Client,
    base_url: &str,
    package_id: &str,
) -> Result<Vec<CkanResource>, SourceError> {
    let url = format!(
        "{}/api/3/action/package_show",
        base_url.trim_end_matches('/')
    );
    log::info!("Resolving CKAN package '{package_id}' at {url}");

    let body = retry::send_json(|| client.get(&url).query(&[("id", package_id)])).await?;
    parse_package(&body)
}

/// Parses a `package_show` response body.
fn parse_package(body: &serde_json::Value) -> Result<Vec<CkanResource>, SourceError> {
    if body.get("success").and_then(serde_json::Value::as_bool) != Some(true) {
        let message = body
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(serde_json::Value::as_str)
            .unwrap_or("package_show did not succeed");
        return Err(SourceError::Normalization {
            message: format!("CKAN error: {message}"),
        });
    }

    let resources = body
        .get("result")
        .and_then(|r| r.get("resources"))
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| SourceError::Normalization {
            message: "CKAN package has no resources array".to_string(),
        })?;

    Ok(resources
        .iter()
        .filter_map(|r| {
            let url = r.get("url").and_then(serde_json::Value::as_str)?;
            let field = |name: &str| {
                r.get(name)
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or_default()
                    .trim()
                    .to_string()
            };
            Some(CkanResource {
                id: field("id"),
                name: field("name"),
                format: field("format"),
                url: url.to_string(),
            })
        })
        .collect())
}

/// Finds the resource whose name matches `wanted`.
///
/// An exact (case-insensitive) name match wins; otherwise the first
/// resource whose name contains `wanted` is returned.
#[must_use]
pub fn find_resource<'a>(resources: &'a [CkanResource], wanted: &str) -> Option<&'a CkanResource> {
    let wanted = wanted.trim().to_lowercase();
    resources
        .iter()
        .find(|r| r.name.to_lowercase() == wanted)
        .or_else(|| {
            resources
                .iter()
                .find(|r| r.name.to_lowercase().contains(&wanted))
        })
}
