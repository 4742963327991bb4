//! Query mode selection.

use core::fmt;
use core::str::FromStr;

/// Which statistic source the reporter queries.
///
/// Only the targets of the active mode are polled; the other target lists are
/// kept but ignored until the mode changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum QueryMode {
    /// Combined ingress and egress rate of linked-router (MNR) neighbors.
    #[default]
    LinkedRouterRate,

    /// Combined ingress and egress rate of VPN bridges.
    BridgeRate,

    /// Caller-supplied queries parsed by a caller-supplied delegate.
    UserCallback,
}

impl QueryMode {
    /// All modes, in their legacy numeric order.
    pub const ALL: [QueryMode; 3] = [
        QueryMode::LinkedRouterRate,
        QueryMode::BridgeRate,
        QueryMode::UserCallback,
    ];

    /// Stable, human readable name of the mode.
    pub const fn as_str(&self) -> &'static str {
        match self {
            QueryMode::LinkedRouterRate => "linked-router-rate",
            QueryMode::BridgeRate => "bridge-rate",
            QueryMode::UserCallback => "user-callback",
        }
    }

    /// Legacy numeric code (1 = MNR, 2 = bridge, 3 = callback).
    pub const fn code(&self) -> u8 {
        match self {
            QueryMode::LinkedRouterRate => 1,
            QueryMode::BridgeRate => 2,
            QueryMode::UserCallback => 3,
        }
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a value does not name a known [`QueryMode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownQueryMode(pub String);

impl fmt::Display for UnknownQueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "not a valid query type: {:?}", self.0)
    }
}

impl std::error::Error for UnknownQueryMode {}

impl TryFrom<u8> for QueryMode {
    type Error = UnknownQueryMode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        QueryMode::ALL
            .into_iter()
            .find(|mode| mode.code() == code)
            .ok_or_else(|| UnknownQueryMode(code.to_string()))
    }
}

impl FromStr for QueryMode {
    type Err = UnknownQueryMode;

    /// Accepts the mode names in any case, with `-` or `_` separators, the
    /// short aliases `mnr`, `linked-router`, `bridge`, `callback` and `user`,
    /// and the legacy numeric codes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");

        if let Ok(code) = normalized.parse::<u8>() {
            return QueryMode::try_from(code).map_err(|_| UnknownQueryMode(s.to_string()));
        }

        match normalized.as_str() {
            "linked-router-rate" | "linked-router" | "mnr" => Ok(QueryMode::LinkedRouterRate),
            "bridge-rate" | "bridge" => Ok(QueryMode::BridgeRate),
            "user-callback" | "callback" | "user" => Ok(QueryMode::UserCallback),
            _ => Err(UnknownQueryMode(s.to_string())),
        }
    }
}
