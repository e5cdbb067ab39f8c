use crate::env::Env;
use crate::error::{Error, Result};
use crate::provider::ModelProviderInfo;
use reqwest::{Client, StatusCode, header};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("provider-config/", env!("CARGO_PKG_VERSION"));
const MAX_BACKOFF_MS: u64 = 30_000;

#[derive(Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

/// HTTP client bound to one provider: its headers, credential, query
/// parameters and retry budget.
#[derive(Clone)]
pub struct ProviderClient {
    client: Client,
    provider: ModelProviderInfo,
    max_retries: u64,
    base_delay_ms: u64,
}

impl ProviderClient {
    pub fn new(provider: &ModelProviderInfo, env: &dyn Env) -> Result<Self> {
        let mut headers = provider.headers(env);
        if let Some(cred) = provider.credential(env)? {
            debug!(provider = %provider.name, source = %cred.source, "using bearer credential");
            let value = header::HeaderValue::from_str(&format!("Bearer {}", cred.value))
                .map_err(|e| Error::config(format!("credential is not a valid header value: {e}")))?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::http(e.to_string()))?;

        Ok(Self {
            client,
            provider: provider.clone(),
            max_retries: provider.request_max_retries(),
            base_delay_ms: 200,
        })
    }

    /// Override the first backoff delay; doubles on every retry.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// `GET {base_url}/models`, returning the model ids sorted.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = self.provider.endpoint_url("models")?;
        let body = self.request_with_retry(|| self.client.get(&url)).await?;
        let list: ModelList = serde_json::from_str(&body)
            .map_err(|e| Error::parse(format!("model list JSON: {e}")))?;
        let mut ids: Vec<String> = list.data.into_iter().map(|m| m.id).collect();
        ids.sort();
        Ok(ids)
    }

    async fn request_with_retry<F>(&self, build: F) -> Result<String>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut last_error = Error::http("no attempts made");
        let mut delay = self.base_delay_ms;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                debug!(attempt, delay_ms = delay, "retrying request");
                sleep(Duration::from_millis(delay)).await;
                delay = delay.saturating_mul(2).min(MAX_BACKOFF_MS);
            }

            match build().send().await {
                Ok(resp) if resp.status().is_server_error() => {
                    let status = resp.status();
                    warn!(attempt, status = status.as_u16(), "server error, will retry");
                    last_error = self.error_from_response(resp).await;
                }
                Ok(resp) => return self.handle_response(resp).await,
                Err(e) => {
                    last_error = Error::http(e.to_string());
                    if e.is_timeout() || e.is_connect() {
                        warn!(attempt, "transient failure, will retry");
                        continue;
                    }
                    return Err(last_error);
                }
            }
        }

        Err(last_error)
    }

    async fn handle_response(&self, resp: reqwest::Response) -> Result<String> {
        if resp.status().is_success() {
            return resp.text().await.map_err(|e| Error::http(e.to_string()));
        }
        Err(self.error_from_response(resp).await)
    }

    async fn error_from_response(&self, resp: reqwest::Response) -> Error {
        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Error::RateLimit {
                platform: self.provider.name.clone(),
                retry_after_secs: retry_after,
            };
        }
        let body = resp.text().await.unwrap_or_default();
        Error::api_with_status(self.provider.name.clone(), body, status.as_u16())
    }
}
