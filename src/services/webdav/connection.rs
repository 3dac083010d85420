use reqwest::{Body, Client, Method, Response};
use tracing::{debug, warn};

use super::config::WebDavConfig;
use crate::errors::{RequestFailure, WebDavError};

/// Owns the transport for one configured server: a pooled HTTP client with
/// the per-request timeout baked in, plus the credentials armed on every
/// request.
pub struct WebDavConnection {
    client: Client,
    config: WebDavConfig,
}

impl WebDavConnection {
    pub fn new(config: WebDavConfig) -> Result<Self, WebDavError> {
        config.validate()?;
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| WebDavError::Connection(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &WebDavConfig {
        &self.config
    }

    pub fn url_for_path(&self, path: &str) -> String {
        self.config.url_for_path(path)
    }

    /// OPTIONS against the base URL. Every failure, transport or status,
    /// is reported as `false` rather than an error.
    pub async fn test_connection(&self) -> bool {
        let url = self.config.base_url();
        debug!("🔍 testing WebDAV connection to {}", url);

        let result = self
            .client
            .request(Method::OPTIONS, url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!("OPTIONS request to {} returned {}", url, response.status());
                false
            }
            Err(e) => {
                warn!("OPTIONS request to {} failed: {}", url, e);
                false
            }
        }
    }

    /// Sends one authenticated request. 2xx and 207 Multi-Status count as
    /// success; anything else becomes a `RequestFailure` for the caller to
    /// wrap in its operation error. No retries.
    pub async fn authenticated_request(
        &self,
        method: Method,
        url: &str,
        body: Option<Body>,
        headers: &[(&str, &str)],
    ) -> Result<Response, RequestFailure> {
        let mut request = self
            .client
            .request(method, url)
            .basic_auth(&self.config.username, Some(&self.config.password));

        if let Some(body) = body {
            request = request.body(body);
        }

        for (key, value) in headers {
            request = request.header(*key, *value);
        }

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() || status.as_u16() == 207 {
            Ok(response)
        } else {
            Err(RequestFailure::Status(status))
        }
    }
}
