//! Transport capability traits.
//!
//! The reporter never manages sockets itself. A [`SessionFactory`] creates
//! [`Session`]s, and each session reports its lifecycle through
//! [`SessionEvent`]s on the channel it was created with.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::TransportError;

/// Lifecycle notifications emitted by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session is established and requests can be sent.
    Up,
    /// The connection attempt failed.
    ConnectFailed(String),
    /// The session was lost or closed.
    Disconnected,
    /// A subscription was rejected.
    SubscriptionError(String),
    /// A subscription was accepted.
    SubscriptionOk,
    /// A message arrived that is not a reply to any request.
    Message(String),
}

/// Sending half of a session's event channel.
pub type SessionEventSender = mpsc::UnboundedSender<SessionEvent>;

/// Parameters used to create a session.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionProperties {
    pub url: String,
    pub vpn_name: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for SessionProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionProperties")
            .field("url", &self.url)
            .field("vpn_name", &self.vpn_name)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A live request/reply session with the router.
#[async_trait]
pub trait Session: Send + Sync + fmt::Debug {
    /// Start connecting. Completion is reported as [`SessionEvent::Up`] or
    /// [`SessionEvent::ConnectFailed`]; an `Err` means the attempt could not
    /// even be started.
    fn connect(&self) -> Result<(), TransportError>;

    /// Close the session. Reported as [`SessionEvent::Disconnected`].
    fn disconnect(&self);

    /// Release the session's resources. No requests may be sent afterwards.
    fn dispose(&self);

    /// Send a request to `topic` and wait up to `timeout` for its reply.
    async fn send_request(
        &self,
        topic: &str,
        payload: &str,
        timeout: Duration,
    ) -> Result<String, TransportError>;
}

/// Creates sessions; stands for the transport's client library runtime.
pub trait SessionFactory: Send + Sync + fmt::Debug {
    /// One-time initialisation of the runtime.
    fn init(&self) -> Result<(), TransportError> {
        Ok(())
    }

    /// Release the runtime.
    fn teardown(&self) {}

    /// Create a session that reports its lifecycle on `events`.
    fn create_session(
        &self,
        properties: &SessionProperties,
        events: SessionEventSender,
    ) -> Result<Arc<dyn Session>, TransportError>;
}

/// Who is responsible for initialising and tearing down the factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuntimeOwnership {
    /// The reporter calls `init` before its first session and `teardown` in `finish`.
    #[default]
    Internal,
    /// The caller manages the factory; the reporter never calls `init` or `teardown`.
    External,
}

/// A session factory together with its ownership.
#[derive(Debug, Clone)]
pub struct TransportRuntime {
    factory: Arc<dyn SessionFactory>,
    ownership: RuntimeOwnership,
    initialized: bool,
}

impl TransportRuntime {
    /// A factory the reporter initialises and tears down itself.
    pub fn internal(factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            factory,
            ownership: RuntimeOwnership::Internal,
            initialized: false,
        }
    }

    /// A factory the caller has already initialised.
    pub fn external(factory: Arc<dyn SessionFactory>) -> Self {
        warn!(
            "Using an externally managed session factory; make sure it is initialised \
             before connecting"
        );
        Self {
            factory,
            ownership: RuntimeOwnership::External,
            initialized: true,
        }
    }

    pub fn ownership(&self) -> RuntimeOwnership {
        self.ownership
    }

    pub fn factory(&self) -> &Arc<dyn SessionFactory> {
        &self.factory
    }

    /// Initialise an internally owned factory once.
    pub(crate) fn ensure_initialized(&mut self) -> Result<(), TransportError> {
        if !self.initialized {
            self.factory.init()?;
            self.initialized = true;
        }
        Ok(())
    }

    /// Tear down an internally owned, initialised factory.
    pub(crate) fn teardown(&mut self) {
        if self.ownership == RuntimeOwnership::Internal && self.initialized {
            self.factory.teardown();
            self.initialized = false;
        }
    }
}
