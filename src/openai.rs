//! Shared HTTP plumbing for the OpenAI embeddings and chat endpoints.
//!
//! Retry strategy:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! The base URL defaults to `https://api.openai.com/v1` and can be pointed at
//! a compatible proxy with `OPENAI_BASE_URL`.

use anyhow::Result;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::ShowroomError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Connection settings for one OpenAI endpoint family.
#[derive(Clone)]
pub struct OpenAIClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    max_retries: u32,
}

impl OpenAIClient {
    /// Build a client from `OPENAI_API_KEY` / `OPENAI_BASE_URL`.
    pub fn from_env(timeout_secs: u64, max_retries: u32) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let base_url = std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_key,
            base_url,
            max_retries,
        })
    }

    /// POST `body` to `{base_url}{path}` and return the JSON response.
    ///
    /// Exhausted retries and non-retryable statuses surface as
    /// [`ShowroomError::Upstream`].
    pub async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let url = format!("{}{}", self.base_url, path);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                debug!(attempt, ?delay, url = %url, "retrying OpenAI request");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .http
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return response
                            .json()
                            .await
                            .map_err(|e| ShowroomError::Upstream(e.to_string()).into());
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        warn!(%status, attempt, "OpenAI request failed, will retry");
                        last_err = Some(format!("OpenAI API error {}: {}", status, body_text));
                        continue;
                    }

                    return Err(ShowroomError::Upstream(format!(
                        "OpenAI API error {}: {}",
                        status, body_text
                    ))
                    .into());
                }
                Err(e) => {
                    warn!(error = %e, attempt, "OpenAI request error, will retry");
                    last_err = Some(e.to_string());
                }
            }
        }

        Err(ShowroomError::Upstream(
            last_err.unwrap_or_else(|| "request failed after retries".to_string()),
        )
        .into())
    }
}
