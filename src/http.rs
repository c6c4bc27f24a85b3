//! JSON-over-HTTP calls with bounded retry, shared by the embedding and
//! language-model providers.
//!
//! Retry policy:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors and timeouts → retry
//! - Backoff: 1s, 2s, 4s, … capped at 32s

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use tracing::{info, warn};

const MAX_BACKOFF_SHIFT: u32 = 5;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_backoff: Duration::from_secs(1),
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff * (1u32 << (attempt.saturating_sub(1)).min(MAX_BACKOFF_SHIFT))
    }
}

/// Build a `reqwest` client with a whole-request timeout.
pub fn client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Send the request produced by `build` until it succeeds or the policy
/// gives up, and decode the successful body as JSON.
///
/// `build` is called once per attempt since a `RequestBuilder` is
/// consumed by `send`.
pub async fn send_json<F>(service: &str, policy: RetryPolicy, build: F) -> Result<serde_json::Value>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut last_err: Option<anyhow::Error> = None;

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let delay = policy.backoff(attempt);
            warn!(
                service,
                attempt,
                max_retries = policy.max_retries,
                backoff_ms = delay.as_millis() as u64,
                error = %last_err.as_ref().map(ToString::to_string).unwrap_or_default(),
                "request failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }

        match build().send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    let json: serde_json::Value = response
                        .json()
                        .await
                        .map_err(|e| anyhow!("{} returned malformed JSON: {}", service, e))?;
                    if attempt > 0 {
                        info!(service, attempts = attempt + 1, "request succeeded after retries");
                    }
                    return Ok(json);
                }

                let body_text = response.text().await.unwrap_or_default();
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(anyhow!("{} API error {}: {}", service, status, body_text));
                    continue;
                }

                bail!("{} API error {}: {}", service, status, body_text);
            }
            Err(e) => {
                last_err = Some(anyhow!("{} request failed: {}", service, e));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("{} request failed after retries", service)))
}
