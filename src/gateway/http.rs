use crate::gateway::error::{GatewayError, GatewayResult};
use crate::gateway::types::KakaoPayErrorBody;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::warn;

/// HTTP plumbing shared by gateway operations.
///
/// Carries the retry loop for transient failures (timeouts, 5xx, 429) with
/// exponential backoff. Callers that must not replay a request — approve has
/// an indeterminate remote side effect on timeout — use [`post_json_once`].
///
/// [`post_json_once`]: GatewayHttpClient::post_json_once
#[derive(Clone)]
pub struct GatewayHttpClient {
    client: Client,
    timeout: Duration,
    max_retries: u32,
}

impl GatewayHttpClient {
    pub fn new(timeout: Duration, max_retries: u32) -> GatewayResult<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            GatewayError::NetworkError {
                message: format!("failed to initialize HTTP client: {}", e),
            }
        })?;

        Ok(Self {
            client,
            timeout,
            max_retries,
        })
    }

    /// POST with retries on transient failures.
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        url: &str,
        secret_key: &str,
        body: &JsonValue,
    ) -> GatewayResult<T> {
        self.post_json_inner(url, secret_key, body, self.max_retries)
            .await
    }

    /// POST with exactly one attempt, transient failure or not.
    pub async fn post_json_once<T: DeserializeOwned>(
        &self,
        url: &str,
        secret_key: &str,
        body: &JsonValue,
    ) -> GatewayResult<T> {
        self.post_json_inner(url, secret_key, body, 0).await
    }

    async fn post_json_inner<T: DeserializeOwned>(
        &self,
        url: &str,
        secret_key: &str,
        body: &JsonValue,
        max_retries: u32,
    ) -> GatewayResult<T> {
        let mut last_error = None;
        for attempt in 0..=max_retries {
            let request = self
                .client
                .post(url)
                .timeout(self.timeout)
                .header("Authorization", format!("SECRET_KEY {}", secret_key))
                .header("Content-Type", "application/json")
                .json(body);

            let response = request.send().await.map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout {
                        timeout_secs: self.timeout.as_secs(),
                    }
                } else {
                    GatewayError::NetworkError {
                        message: format!("provider request failed: {}", e),
                    }
                }
            });

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    if status.is_success() {
                        return serde_json::from_str::<T>(&text).map_err(|e| {
                            GatewayError::InvalidResponse {
                                message: format!("invalid provider JSON response: {}", e),
                            }
                        });
                    }

                    if status.as_u16() == 429 {
                        if attempt < max_retries {
                            tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                            continue;
                        }
                        return Err(GatewayError::RateLimitError {
                            message: "provider rate limit exceeded".to_string(),
                            retry_after_seconds: None,
                        });
                    }

                    if status.is_server_error() {
                        if attempt < max_retries {
                            warn!(
                                status = %status,
                                attempt = attempt + 1,
                                "provider server error, retrying"
                            );
                            tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                            continue;
                        }
                        return Err(GatewayError::ProviderError {
                            message: format!("HTTP {}: {}", status, text),
                            retryable: true,
                        });
                    }

                    // 4xx: the provider refused the request. Surface its own
                    // error code when the body carries one.
                    let parsed: KakaoPayErrorBody =
                        serde_json::from_str(&text).unwrap_or(KakaoPayErrorBody {
                            error_code: None,
                            error_message: None,
                        });
                    return Err(GatewayError::Rejected {
                        code: parsed.error_code,
                        message: parsed
                            .error_message
                            .unwrap_or_else(|| format!("HTTP {}", status)),
                    });
                }
                Err(e) => {
                    if attempt < max_retries && e.is_retryable() {
                        warn!(attempt = attempt + 1, error = %e, "provider request failed, retrying");
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or(GatewayError::NetworkError {
            message: "provider request failed".to_string(),
        }))
    }
}
