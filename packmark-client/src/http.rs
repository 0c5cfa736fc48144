//! JSON transport with bounded retry
//!
//! Everything above this layer sees either a decoded JSON value, an
//! explicit "no data" (`Ok(None)` for 204/empty bodies), or a
//! [`ClientError`]. Transient failures — connect/read timeouts and the
//! retryable status set — are retried with capped exponential backoff
//! before surfacing.

use crate::error::{ClientError, ClientResult, is_retryable_status};
use crate::ClientConfig;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::time::Duration;

pub(crate) struct Transport {
    client: Client,
    config: ClientConfig,
}

impl Transport {
    pub(crate) fn new(config: ClientConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()?;
        Ok(Self { client, config })
    }

    /// Resolve a path against the base URL; absolute URLs (entity hrefs
    /// handed back by the upstream) pass through untouched
    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
        }
    }

    pub(crate) async fn request_json(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> ClientResult<Option<Value>> {
        let url = self.url(path);
        let mut delay = Duration::from_millis(self.config.base_retry_delay_ms);
        let mut attempt = 0u32;

        loop {
            let mut request = self
                .client
                .request(method.clone(), &url)
                .header(reqwest::header::AUTHORIZATION, self.config.auth_header())
                .header(reqwest::header::ACCEPT, "application/json;charset=utf-8");
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            // Either return a final outcome or fall through with the
            // transient error to be retried.
            let transient: ClientError = match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        if status == StatusCode::NO_CONTENT {
                            return Ok(None);
                        }
                        let text = response.text().await?;
                        if text.trim().is_empty() {
                            return Ok(None);
                        }
                        return serde_json::from_str(&text).map(Some).map_err(Into::into);
                    }

                    let text = response.text().await?;
                    let payload = serde_json::from_str(&text).unwrap_or(Value::String(text));
                    let err = ClientError::Api {
                        status: status.as_u16(),
                        payload,
                    };
                    if !is_retryable_status(status.as_u16()) {
                        return Err(err);
                    }
                    err
                }
                Err(e) if e.is_timeout() || e.is_connect() => ClientError::Http(e),
                Err(e) => return Err(e.into()),
            };

            attempt += 1;
            if attempt >= self.config.max_retries {
                return Err(transient);
            }
            tracing::warn!(
                attempt,
                max_retries = self.config.max_retries,
                delay_ms = delay.as_millis() as u64,
                "Upstream request failed, retrying: {transient}"
            );
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(Duration::from_millis(self.config.max_retry_delay_ms));
        }
    }

    pub(crate) async fn get(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ClientResult<Option<Value>> {
        self.request_json(Method::GET, path, query, None).await
    }

    pub(crate) async fn put(&self, path: &str, body: &Value) -> ClientResult<Option<Value>> {
        self.request_json(Method::PUT, path, &[], Some(body)).await
    }
}
