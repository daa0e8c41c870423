//! Shared HTTP plumbing for remote providers

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, Response};

use crate::error::{Error, Result};

/// Build a pooled client with a request timeout
pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(5)
        .build()
        .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Retry an operation with exponential backoff (1s, 2s, 4s, ...)
pub(crate) async fn retry_with_backoff<F, Fut, T>(max_retries: u32, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if attempt < max_retries => {
                let delay = Duration::from_secs(2u64.pow(attempt));
                tracing::warn!(
                    "Request failed (attempt {}/{}): {}, retrying in {:?}",
                    attempt + 1,
                    max_retries + 1,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Classify a transport error; client timeouts stay distinguishable
///
/// A timed-out request keeps its `reqwest::Error` so it classifies as
/// `DependencyTimeout`; anything else is wrapped with `context`.
pub(crate) fn transport_error<E>(err: reqwest::Error, context: &str, wrap: E) -> Error
where
    E: FnOnce(String) -> Error,
{
    if err.is_timeout() {
        tracing::warn!("{}: {}", context, err);
        Error::Http(err)
    } else {
        wrap(format!("{}: {}", context, err))
    }
}

/// Turn a non-success response into an error carrying status and body
pub(crate) async fn error_for_status<E>(response: Response, context: &str, wrap: E) -> Result<Response>
where
    E: FnOnce(String) -> Error,
{
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(wrap(format!("{}: HTTP {} - {}", context, status, body.trim())))
}
