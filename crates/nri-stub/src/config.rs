//! stub config

use std::time::Duration;

use crate::api::Registration;

/// Default mount point of the host routes.
pub const DEFAULT_BASE_PATH: &str = "/nri/v1";

/// Plugin stub config.
#[derive(Debug, Clone)]
pub struct StubConfig {
    /// host base url
    pub host_url: String,
    /// path the host routes are nested under
    pub base_path: String,
    /// plugin name
    pub plugin_name: String,
    /// plugin index, orders plugins on the host
    pub plugin_idx: String,
    /// HTTP request timeout
    pub request_timeout: Duration,
}

impl StubConfig {
    /// create new stub config with default parameters.
    pub fn new(host_url: impl Into<String>, plugin_name: impl Into<String>) -> Self {
        Self {
            host_url: host_url.into(),
            base_path: DEFAULT_BASE_PATH.to_string(),
            plugin_name: plugin_name.into(),
            plugin_idx: "10".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// set base path.
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// set plugin index.
    pub fn with_plugin_idx(mut self, plugin_idx: impl Into<String>) -> Self {
        self.plugin_idx = plugin_idx.into();
        self
    }

    /// set request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn registration(&self) -> Registration {
        Registration {
            plugin_name: self.plugin_name.clone(),
            plugin_idx: self.plugin_idx.clone(),
        }
    }

    pub fn plugin_id(&self) -> String {
        self.registration().plugin_id()
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!(
            "{}{}{}",
            self.host_url.trim_end_matches('/'),
            self.base_path,
            path
        )
    }
}
