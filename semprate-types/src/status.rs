//! Connection state and the last-failure snapshot.

use core::fmt;

/// State of the session with the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum ConnectionState {
    /// No session, or the session was lost.
    #[default]
    Disconnected,

    /// A session was created and is waiting for the router.
    Connecting,

    /// The session is up; polling may run.
    Connected,
}

impl ConnectionState {
    /// Check if requests can be sent in this state.
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        f.write_str(s)
    }
}

/// Category of a recorded failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum ErrorKind {
    /// Missing or invalid connection parameters, detected before any transport call.
    Configuration,
    /// The transport could not create or establish the session.
    Connect,
    /// A single request failed to send or timed out.
    Request,
    /// A response arrived but no rate could be extracted from it.
    Parse,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Connect => "connect",
            ErrorKind::Request => "request",
            ErrorKind::Parse => "parse",
        };
        f.write_str(s)
    }
}

/// Snapshot of the most recent failure.
///
/// Only the latest failure is kept; each new one replaces the previous.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LastError {
    /// What kind of failure this was.
    pub kind: ErrorKind,
    /// Human readable description.
    pub message: String,
    /// Extended information: the underlying error text or the offending payload.
    pub detail: String,
}

impl LastError {
    /// Create a new error snapshot.
    pub fn new(kind: ErrorKind, message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for LastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.detail.is_empty() {
            write!(f, "{} error: {}", self.kind, self.message)
        } else {
            write!(f, "{} error: {} ({})", self.kind, self.message, self.detail)
        }
    }
}
