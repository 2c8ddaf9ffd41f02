//! Remote transport seam: the authenticated HTTP session to the platform.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use palaver_core::ConnectorError;

use crate::config::SlackConfig;

/// One authenticated channel to the remote platform.
///
/// The production implementation is [`HttpTransport`]; tests substitute
/// in-memory stubs at this seam. Implementations do not retry or reconnect;
/// a failed call surfaces as [`ConnectorError::RemoteApi`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Invoke a named remote method and return its decoded payload.
    async fn call(
        &self,
        method: &str,
        params: &Map<String, Value>,
    ) -> Result<Value, ConnectorError>;
}

/// reqwest-backed transport POSTing JSON to `{base_url}/{method}` with a
/// bearer token. The request timeout comes from the config.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpTransport {
    pub fn new(config: &SlackConfig) -> Result<Self, ConnectorError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConnectorError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(
        &self,
        method: &str,
        params: &Map<String, Value>,
    ) -> Result<Value, ConnectorError> {
        let url = format!("{}/{}", self.base_url, method);
        debug!(%method, %url, "remote call");

        let remote_err = |cause: String| ConnectorError::RemoteApi {
            method: method.to_string(),
            params: Value::Object(params.clone()),
            cause,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(params)
            .send()
            .await
            .map_err(|e| remote_err(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(remote_err(format!("HTTP {}: {}", status, body)));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| remote_err(e.to_string()))?;

        // The platform envelopes every response in {"ok": bool, ...} and
        // reports application failures through the "error" field.
        if payload.get("ok").and_then(Value::as_bool) == Some(false) {
            let cause = payload
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error")
                .to_string();
            return Err(remote_err(cause));
        }

        Ok(payload)
    }
}
