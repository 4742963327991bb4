//! Error types for the rate reporter.

use std::sync::Arc;

use parking_lot::Mutex;
use semprate_types::{ErrorKind, LastError};
use thiserror::Error;

/// Boxed error returned by user rate delegates.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by a transport session.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No response arrived within the request timeout.
    #[error("Request timed out")]
    Timeout,

    /// The request could not be handed to the transport.
    #[error("Failed to send request: {0}")]
    Send(String),

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The session was disconnected or disposed.
    #[error("Session has been disposed")]
    Disposed,

    /// The client factory/runtime could not be initialised.
    #[error("Failed to initialise transport runtime: {0}")]
    Init(String),
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connection(err.to_string())
        } else {
            TransportError::Http(err.to_string())
        }
    }
}

/// A response arrived but no rate could be extracted from it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The payload is not well-formed XML.
    #[error("Response is not well-formed XML: {0}")]
    Malformed(String),

    /// An expected statistic element is absent.
    #[error("Response has no <{0}> element; is the object configured on the router?")]
    MissingTag(String),

    /// A statistic element holds something other than a number.
    #[error("<{tag}> value {value:?} is not numeric")]
    NotNumeric { tag: String, value: String },

    /// Ingress plus egress does not fit in a `u64`.
    #[error("Rate {ingress} + {egress} overflows")]
    Overflow { ingress: u64, egress: u64 },

    /// The router rejected the request.
    #[error("Router returned execute-result code {code:?}: {reason}")]
    Failed { code: String, reason: String },

    /// The user rate delegate returned an error.
    #[error("Rate delegate failed: {0}")]
    Delegate(String),
}

/// Missing or invalid connection parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// No URL configured.
    #[error("No URL specified; call set_url(...)")]
    MissingUrl,

    /// The URL does not start with a supported protocol.
    #[error("Invalid protocol in {0:?}; use one of ws://, wss://, http://, https://")]
    InvalidProtocol(String),

    /// No client username configured.
    #[error("No username specified; call set_username(...)")]
    MissingUsername,

    /// No password configured.
    #[error("No password specified; call set_password(...). If the VPN has no authentication configured, use any non-empty value")]
    MissingPassword,

    /// No Message VPN configured.
    #[error("No VPN specified; call set_vpn_name(...)")]
    MissingVpn,

    /// The polling interval is zero.
    #[error("Request interval must be greater than zero; call set_request_interval(...)")]
    InvalidInterval,

    /// User callback mode was selected without a rate delegate.
    #[error("User callback mode selected but no rate delegate registered; call set_user_rate_delegate(...)")]
    MissingRateDelegate,
}

/// Errors surfaced by the [`RateReporter`](crate::RateReporter).
#[derive(Debug, Error)]
pub enum ReporterError {
    /// Connection parameters failed validation; no transport call was made.
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    /// The transport could not create or connect the session.
    #[error("Failed to connect: {0}")]
    Connect(#[source] TransportError),

    /// A single request failed.
    #[error("Request for {target} failed: {source}")]
    Request {
        target: String,
        #[source]
        source: TransportError,
    },

    /// A response could not be parsed.
    #[error("Failed to parse response for {target}: {source}")]
    Parse {
        target: String,
        #[source]
        source: ParseError,
    },

    /// An operation needed a session that does not exist.
    #[error("Not connected; call connect() first")]
    NotConnected,
}

impl ReporterError {
    /// The category this error is recorded under.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReporterError::Configuration(_) => ErrorKind::Configuration,
            ReporterError::Connect(_) | ReporterError::NotConnected => ErrorKind::Connect,
            ReporterError::Request { .. } => ErrorKind::Request,
            ReporterError::Parse { .. } => ErrorKind::Parse,
        }
    }
}

/// Shared slot holding the most recent failure.
///
/// Written by the polling task and by `connect`, read on demand by the caller.
#[derive(Debug, Clone, Default)]
pub(crate) struct ErrorSlot(Arc<Mutex<Option<LastError>>>);

impl ErrorSlot {
    /// Replace the snapshot with `err`.
    pub fn record(&self, err: &ReporterError, detail: impl Into<String>) {
        self.set(LastError::new(err.kind(), err.to_string(), detail));
    }

    pub fn set(&self, error: LastError) {
        *self.0.lock() = Some(error);
    }

    pub fn get(&self) -> Option<LastError> {
        self.0.lock().clone()
    }
}
