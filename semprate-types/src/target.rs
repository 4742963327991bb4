//! Objects whose message rate is queried.

use core::fmt;

use crate::QueryMode;

/// A single object on the router whose message rate is polled.
///
/// The variant decides both the SEMP query that is issued for it and the
/// way the response is interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "kebab-case"))]
pub enum MonitoredTarget {
    /// A linked-router (MNR / CSPF neighbor) link to another router.
    LinkedRouter {
        /// Physical name of the router at the other end of the link.
        physical_name: String,
    },

    /// A VPN bridge.
    Bridge {
        /// Bridge name, used as the bridge name pattern in the query.
        name: String,
    },

    /// A caller-supplied SEMP query body.
    UserQuery {
        /// The query XML without the surrounding `<rpc>` element.
        fragment: String,
    },
}

impl MonitoredTarget {
    /// Create a linked-router target.
    pub fn linked_router(physical_name: impl Into<String>) -> Self {
        MonitoredTarget::LinkedRouter {
            physical_name: physical_name.into(),
        }
    }

    /// Create a bridge target.
    pub fn bridge(name: impl Into<String>) -> Self {
        MonitoredTarget::Bridge { name: name.into() }
    }

    /// Create a user query target.
    pub fn user_query(fragment: impl Into<String>) -> Self {
        MonitoredTarget::UserQuery {
            fragment: fragment.into(),
        }
    }

    /// The query mode this kind of target belongs to.
    pub fn mode(&self) -> QueryMode {
        match self {
            MonitoredTarget::LinkedRouter { .. } => QueryMode::LinkedRouterRate,
            MonitoredTarget::Bridge { .. } => QueryMode::BridgeRate,
            MonitoredTarget::UserQuery { .. } => QueryMode::UserCallback,
        }
    }

    /// The string reported alongside each rate for this target.
    ///
    /// This is the router physical name, the bridge name, or the raw query
    /// fragment.
    pub fn identifier(&self) -> &str {
        match self {
            MonitoredTarget::LinkedRouter { physical_name } => physical_name,
            MonitoredTarget::Bridge { name } => name,
            MonitoredTarget::UserQuery { fragment } => fragment,
        }
    }
}

impl fmt::Display for MonitoredTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitoredTarget::LinkedRouter { physical_name } => {
                write!(f, "linked-router {}", physical_name)
            }
            MonitoredTarget::Bridge { name } => write!(f, "bridge {}", name),
            MonitoredTarget::UserQuery { fragment } => write!(f, "user query {}", fragment),
        }
    }
}
