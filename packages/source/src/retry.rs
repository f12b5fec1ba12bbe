//! HTTP retry helpers for transient errors.
//!
//! Fetchers call [`send_json`] or [`send_bytes`] instead of
//! `reqwest::RequestBuilder::send()` directly, so every request gets
//! exponential backoff on timeouts, connection resets, server errors and
//! rate limiting.
//!
//! ```ignore
//! let body = retry::send_json(|| client.get(&url).query(&params)).await?;
//! let bytes = retry::send_bytes(|| client.get(&resource.url)).await?;
//! ```

use std::time::Duration;

use crate::SourceError;

/// Maximum number of retry attempts for transient HTTP errors.
///
/// With exponential backoff (2s, 4s, 8s, 16s, 32s) the total wait before
/// giving up is 62 seconds.
const MAX_RETRIES: u32 = 5;

/// Maximum number of full re-fetch attempts when the body cannot be read
/// or decoded.
const MAX_BODY_RETRIES: u32 = 3;

/// Maximum length of the response body preview included in error logs.
const BODY_PREVIEW_LEN: usize = 500;

/// Sends an HTTP request and parses the response body as JSON.
///
/// The `build_request` closure is called on each attempt, since request
/// builders are consumed by `.send()`.
///
/// # Errors
///
/// Returns [`SourceError`] if the request fails after all retries, the
/// server returns a non-retryable status, or the body is not valid JSON
/// after all body retries.
#[allow(clippy::future_not_send)]
pub async fn send_json<F>(build_request: F) -> Result<serde_json::Value, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    for body_attempt in 0..=MAX_BODY_RETRIES {
        let response = send_inner(&build_request, MAX_RETRIES).await?;
        let url = response.url().to_string();
        let status = response.status();

        let text = match response.text().await {
            Ok(text) => text,
            Err(e) if body_attempt < MAX_BODY_RETRIES => {
                log::warn!(
                    "Response body read failed (body retry {}/{MAX_BODY_RETRIES}) for {url}: {e}",
                    body_attempt + 1
                );
                tokio::time::sleep(body_backoff(body_attempt)).await;
                continue;
            }
            Err(e) => return Err(SourceError::Http(e)),
        };

        match serde_json::from_str(&text) {
            Ok(value) => return Ok(value),
            Err(json_err) => {
                let preview: String = text.chars().take(BODY_PREVIEW_LEN).collect();
                if body_attempt < MAX_BODY_RETRIES {
                    log::warn!(
                        "JSON parse failed (body retry {}/{MAX_BODY_RETRIES}), re-fetching...\n  \
                         url: {url}\n  \
                         status: {status}\n  \
                         received: {} bytes\n  \
                         parse error: {json_err}\n  \
                         body preview: {preview}",
                        body_attempt + 1,
                        text.len(),
                    );
                    tokio::time::sleep(body_backoff(body_attempt)).await;
                    continue;
                }
                return Err(SourceError::Normalization {
                    message: format!(
                        "JSON parse failed: {json_err} (status={status}, received {} bytes)",
                        text.len()
                    ),
                });
            }
        }
    }

    unreachable!("send_json body retry loop exited without returning")
}

/// Sends an HTTP request and returns the raw response body.
///
/// Used for binary downloads (workbooks, zip archives).
///
/// # Errors
///
/// Returns [`SourceError`] if the request fails after all retries or the
/// body cannot be read after all body retries.
#[allow(clippy::future_not_send)]
pub async fn send_bytes<F>(build_request: F) -> Result<Vec<u8>, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    for body_attempt in 0..=MAX_BODY_RETRIES {
        let response = send_inner(&build_request, MAX_RETRIES).await?;
        let url = response.url().to_string();

        match response.bytes().await {
            Ok(bytes) => return Ok(bytes.to_vec()),
            Err(e) if body_attempt < MAX_BODY_RETRIES => {
                log::warn!(
                    "Download body read failed (body retry {}/{MAX_BODY_RETRIES}) for {url}: {e}",
                    body_attempt + 1
                );
                tokio::time::sleep(body_backoff(body_attempt)).await;
            }
            Err(e) => return Err(SourceError::Http(e)),
        }
    }

    unreachable!("send_bytes body retry loop exited without returning")
}

const fn body_backoff(body_attempt: u32) -> Duration {
    Duration::from_secs(1u64 << (body_attempt + 1))
}

/// Core retry loop shared by [`send_json`] and [`send_bytes`].
///
/// Returns the first response with a 2xx or 3xx status.
#[allow(clippy::future_not_send)]
async fn send_inner<F>(
    build_request: &F,
    max_retries: u32,
) -> Result<reqwest::Response, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut last_error: Option<SourceError> = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1u64 << attempt);
            log::warn!("  retry {attempt}/{max_retries} in {delay:?}...");
            tokio::time::sleep(delay).await;
        }

        match build_request().send().await {
            Err(e) => {
                if is_transient(&e) && attempt < max_retries {
                    log::warn!("  transient error: {e}");
                    last_error = Some(SourceError::Http(e));
                    continue;
                }
                return Err(SourceError::Http(e));
            }
            Ok(response) => {
                let status = response.status();

                if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    if attempt < max_retries {
                        log::warn!("  HTTP {status}");
                        last_error = Some(SourceError::Normalization {
                            message: format!("HTTP {status}"),
                        });
                        continue;
                    }
                    return Err(SourceError::Normalization {
                        message: format!("HTTP {status} after {max_retries} retries"),
                    });
                }

                // 4xx other than 429 is permanent
                if status.is_client_error() {
                    return Err(SourceError::Normalization {
                        message: format!("HTTP {status} from {}", response.url()),
                    });
                }

                return Ok(response);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| SourceError::Normalization {
        message: "request failed after all retries".to_string(),
    }))
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_decode() || e.is_request()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_backoff_doubles() {
        assert_eq!(body_backoff(0), Duration::from_secs(2));
        assert_eq!(body_backoff(1), Duration::from_secs(4));
        assert_eq!(body_backoff(2), Duration::from_secs(8));
    }
}
