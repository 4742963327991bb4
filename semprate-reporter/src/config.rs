//! Deserializable reporter settings.
//!
//! Every field has a default so a partial file (or none at all, with
//! everything supplied through the environment) still deserializes.

use std::time::Duration;

use serde::Deserialize;

use crate::request::DEFAULT_SEMP_VERSION;

/// Complete reporter configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReporterConfig {
    pub router: RouterConfig,
    pub polling: PollingConfig,
    pub targets: TargetsConfig,
}

/// Connection settings for the router being polled.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub url: String,
    pub vpn_name: String,
    pub username: String,
    pub password: String,
    /// Physical name of the router the session connects to.
    pub physical_name: String,
    pub semp_version: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            vpn_name: String::new(),
            username: String::new(),
            password: String::new(),
            physical_name: "solace".to_string(),
            semp_version: DEFAULT_SEMP_VERSION.to_string(),
        }
    }
}

impl std::fmt::Debug for RouterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterConfig")
            .field("url", &self.url)
            .field("vpn_name", &self.vpn_name)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("physical_name", &self.physical_name)
            .field("semp_version", &self.semp_version)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_ms: u64,
    pub request_timeout_ms: u64,
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            request_timeout_ms: 1000,
        }
    }
}

/// What to monitor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TargetsConfig {
    pub linked_routers: Vec<String>,
    pub bridges: Vec<String>,
    pub user_queries: Vec<String>,
    /// Explicit query mode, applied after the targets are added.
    pub mode: Option<String>,
    /// Report the text of the first element with this name for user queries.
    pub user_rate_tag: Option<String>,
}
