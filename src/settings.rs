//! Layered configuration loading.
//!
//! Settings come from a TOML file, then `SEMPRATE_*` environment variables,
//! then command-line overrides, each layer replacing the one before:
//!
//! ```toml
//! [router]
//! url = "http://192.168.1.10:8080"
//! vpn_name = "default"
//! username = "admin"
//! password = "admin"
//!
//! [polling]
//! interval_ms = 5000
//!
//! [targets]
//! linked_routers = ["router-b", "router-c"]
//! ```
//!
//! Nested keys use a double underscore in the environment, e.g.
//! `SEMPRATE_ROUTER__PASSWORD=secret`.

use std::path::Path;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use semprate_reporter::ReporterConfig;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "SEMPRATE";

/// The `SEMPRATE_*` environment source.
pub fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

/// Load the configuration file layered with the process environment.
pub fn load(path: &Path) -> Result<ReporterConfig> {
    load_with(path, environment())
}

/// Load the configuration file layered with the given environment source.
pub fn load_with(path: &Path, environment: Environment) -> Result<ReporterConfig> {
    let config = Config::builder()
        .add_source(File::from(path))
        .add_source(environment)
        .build()
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

    config
        .try_deserialize()
        .with_context(|| format!("Invalid configuration in {}", path.display()))
}

/// Apply command-line overrides on top of the loaded configuration.
pub fn apply_overrides(
    config: &mut ReporterConfig,
    interval_ms: Option<u64>,
    timeout_ms: Option<u64>,
) {
    if let Some(interval_ms) = interval_ms {
        config.polling.interval_ms = interval_ms;
    }
    if let Some(timeout_ms) = timeout_ms {
        config.polling.request_timeout_ms = timeout_ms;
    }
}
