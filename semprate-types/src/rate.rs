//! Rate values delivered to the result callback.

use core::fmt;

/// A rate produced by one query.
///
/// Built-in modes always produce [`Rate::Messages`]; a user rate delegate may
/// return either variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Rate {
    /// Messages per second (ingress + egress for the built-in modes).
    Messages(u64),

    /// Whatever a user rate delegate chose to report.
    Custom(String),
}

impl Rate {
    /// The numeric rate, if this is a message rate.
    pub fn messages(&self) -> Option<u64> {
        match self {
            Rate::Messages(n) => Some(*n),
            Rate::Custom(_) => None,
        }
    }
}

impl Default for Rate {
    fn default() -> Self {
        Rate::Messages(0)
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rate::Messages(n) => write!(f, "{}", n),
            Rate::Custom(s) => f.write_str(s),
        }
    }
}

impl From<u64> for Rate {
    fn from(n: u64) -> Self {
        Rate::Messages(n)
    }
}

impl From<u32> for Rate {
    fn from(n: u32) -> Self {
        Rate::Messages(u64::from(n))
    }
}

impl From<String> for Rate {
    fn from(s: String) -> Self {
        Rate::Custom(s)
    }
}

impl From<&str> for Rate {
    fn from(s: &str) -> Self {
        Rate::Custom(s.to_string())
    }
}
