use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::WebDavError;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// WebDAV server configuration: one server, one credential pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebDavConfig {
    pub server_url: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

impl WebDavConfig {
    pub fn new(server_url: &str, username: &str, password: &str) -> Self {
        Self {
            server_url: server_url.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), WebDavError> {
        if self.server_url.trim().is_empty() {
            return Err(WebDavError::Validation(
                "server URL cannot be empty".to_string(),
            ));
        }

        if self.username.trim().is_empty() {
            return Err(WebDavError::Validation(
                "username cannot be empty".to_string(),
            ));
        }

        if !self.server_url.starts_with("http://") && !self.server_url.starts_with("https://") {
            return Err(WebDavError::Validation(
                "server URL must start with http:// or https://".to_string(),
            ));
        }

        Ok(())
    }

    /// The server URL with any trailing slash stripped.
    pub fn base_url(&self) -> &str {
        self.server_url.trim_end_matches('/')
    }

    /// Builds the absolute request URL for a server-relative path.
    pub fn url_for_path(&self, path: &str) -> String {
        let clean_path = path.trim_start_matches('/');

        if clean_path.is_empty() {
            self.base_url().to_string()
        } else {
            format!("{}/{}", self.base_url(), clean_path)
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}
