//! SEMP request construction.
//!
//! Every request is a single `<rpc>` element carrying the SEMP version and a
//! mode-specific `show` body:
//!
//! ```text
//! <rpc semp-version='soltr/8_7VMR'> <show> <cspf> <neighbor> ... </neighbor> </cspf> </show> </rpc>
//! <rpc semp-version='soltr/8_7VMR'> <show> <bridge> ... </bridge></show> </rpc>
//! <rpc semp-version='soltr/8_7VMR'>{user fragment}</rpc>
//! ```

use std::fmt;

use quick_xml::escape::escape;
use semprate_types::MonitoredTarget;
use tracing::debug;

use crate::catalog::QueryCatalog;

/// Prefix every SEMP version string starts with.
pub const SEMP_VERSION_PREFIX: &str = "soltr/";

/// Version used when none is configured.
pub const DEFAULT_SEMP_VERSION: &str = "soltr/8_7VMR";

/// A normalized SEMP version string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SempVersion(String);

impl SempVersion {
    /// Normalize a version string, prepending [`SEMP_VERSION_PREFIX`] when missing.
    ///
    /// ```rust
    /// use semprate_reporter::SempVersion;
    ///
    /// assert_eq!(SempVersion::new("8_7VMR").as_str(), "soltr/8_7VMR");
    /// assert_eq!(SempVersion::new("soltr/9_0VMR").as_str(), "soltr/9_0VMR");
    /// ```
    pub fn new(version: &str) -> Self {
        if version.starts_with(SEMP_VERSION_PREFIX) {
            SempVersion(version.to_string())
        } else {
            let normalized = format!("{}{}", SEMP_VERSION_PREFIX, version);
            debug!("Normalizing SEMP version {:?} to {:?}", version, normalized);
            SempVersion(normalized)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SempVersion {
    fn default() -> Self {
        SempVersion(DEFAULT_SEMP_VERSION.to_string())
    }
}

impl fmt::Display for SempVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Router settings that end up in request payloads.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub version: SempVersion,
    pub vpn_name: String,
    pub physical_name: String,
}

/// One outbound query, built for a single target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub target: MonitoredTarget,
    /// Destination the request is sent to.
    pub topic: String,
    /// Complete `<rpc>` document.
    pub payload: String,
}

/// Request destination for SEMP show commands on the router with this physical name.
pub fn semp_topic(physical_name: &str) -> String {
    format!("#SEMP/{}/SHOW", physical_name)
}

/// Build one request per target of the catalog's active mode.
///
/// Deterministic for a given catalog and context; an empty target list for
/// the active mode yields an empty request list.
pub fn build(catalog: &QueryCatalog, ctx: &RequestContext) -> Vec<PendingRequest> {
    let topic = semp_topic(&ctx.physical_name);

    catalog
        .active_targets()
        .map(|target| {
            let payload = envelope(&ctx.version, &body(target, ctx));
            debug!("SEMP query for {}: {}", target, payload);
            PendingRequest {
                target: target.clone(),
                topic: topic.clone(),
                payload,
            }
        })
        .collect()
}

fn body(target: &MonitoredTarget, ctx: &RequestContext) -> String {
    match target {
        MonitoredTarget::LinkedRouter { physical_name } => format!(
            " <show> <cspf> <neighbor> <physical-router-name>{}</physical-router-name> \
             <stats></stats> </neighbor> </cspf> </show> ",
            escape(physical_name.as_str())
        ),
        MonitoredTarget::Bridge { name } => format!(
            " <show> <bridge> <bridge-name-pattern>{}</bridge-name-pattern>\
             <vpn-name-pattern>{}</vpn-name-pattern><stats/></bridge></show> ",
            escape(name.as_str()),
            escape(ctx.vpn_name.as_str())
        ),
        MonitoredTarget::UserQuery { fragment } => fragment.clone(),
    }
}

fn envelope(version: &SempVersion, body: &str) -> String {
    format!("<rpc semp-version='{}'>{}</rpc>", version, body)
}
