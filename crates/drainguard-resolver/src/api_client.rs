use crate::error::{ResolverError, Result};
use crate::traits::ControllerLookup;
use async_trait::async_trait;
use drainguard_core::{ControllerInfo, ControllerRef};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

/// Configuration for the API client
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// API server URL (e.g., "https://127.0.0.1:6443")
    pub base_url: String,
    /// Bearer token sent with every request
    pub bearer_token: Option<String>,
    /// Timeout applied to each lookup request
    pub request_timeout: Duration,
}

impl ApiClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            bearer_token: None,
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Lightweight HTTP client that confirms controllers against the API server
pub struct ApiClient {
    base_url: String,
    bearer_token: Option<String>,
    client: Client,
}

impl ApiClient {
    pub fn new(config: ApiClientConfig) -> Result<Self> {
        if config.base_url.is_empty() {
            return Err(ResolverError::invalid_config(
                "API server URL is empty",
                "Pass --api-url or set DRAINGUARD_API_URL",
            ));
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                ResolverError::invalid_config(
                    format!("Failed to build HTTP client: {}", e),
                    "Check the TLS configuration of this host",
                )
            })?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            bearer_token: config.bearer_token,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ControllerLookup for ApiClient {
    /// GET /{group path}/namespaces/{namespace}/{resource}/{name}
    async fn get_controller(&self, controller: &ControllerRef) -> Result<Option<ControllerInfo>> {
        let path = controller
            .api_path()
            .ok_or_else(|| ResolverError::unsupported_kind(controller.kind.as_str()))?;
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let mut request = self.client.get(&url);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await.map_err(|e| {
            ResolverError::lookup_failed(controller, format!("HTTP request failed: {}", e))
        })?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            debug!("{} not found", controller);
            return Ok(None);
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ResolverError::lookup_failed(
                controller,
                format!("GET failed with status {}: {}", status, body),
            ));
        }

        let body: serde_json::Value = resp.json().await.map_err(|e| {
            ResolverError::lookup_failed(controller, format!("Failed to parse response: {}", e))
        })?;

        let replicas = body["spec"]["replicas"]
            .as_i64()
            .and_then(|r| i32::try_from(r).ok());

        Ok(Some(ControllerInfo { replicas }))
    }
}
