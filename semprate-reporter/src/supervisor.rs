//! Connection state tracking and pre-connect validation.

use std::time::Duration;

use semprate_types::{ConnectionState, ErrorKind, LastError, QueryMode};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ErrorSlot};
use crate::transport::{SessionEvent, SessionProperties};

/// URL prefixes a session can be created for.
pub const SUPPORTED_PROTOCOLS: [&str; 4] = ["ws://", "wss://", "http://", "https://"];

/// Check connection parameters before any transport call is made.
pub fn validate(
    properties: &SessionProperties,
    mode: QueryMode,
    has_rate_delegate: bool,
) -> Result<(), ConfigError> {
    if properties.url.is_empty() {
        return Err(ConfigError::MissingUrl);
    }
    if !SUPPORTED_PROTOCOLS
        .iter()
        .any(|prefix| properties.url.starts_with(prefix))
    {
        return Err(ConfigError::InvalidProtocol(properties.url.clone()));
    }
    if properties.username.is_empty() {
        return Err(ConfigError::MissingUsername);
    }
    if properties.password.is_empty() {
        return Err(ConfigError::MissingPassword);
    }
    if properties.vpn_name.is_empty() {
        return Err(ConfigError::MissingVpn);
    }
    if mode == QueryMode::UserCallback && !has_rate_delegate {
        return Err(ConfigError::MissingRateDelegate);
    }
    Ok(())
}

/// Check the polling interval; the timer cannot run with a zero period.
pub fn validate_interval(interval: Duration) -> Result<(), ConfigError> {
    if interval.is_zero() {
        return Err(ConfigError::InvalidInterval);
    }
    Ok(())
}

/// What the polling engine should do after a session event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transition {
    /// Entered `Connected`: build requests if needed and arm the timer.
    Connected,
    /// Entered `Disconnected`: disarm the timer.
    Disconnected,
    Unchanged,
}

/// Tracks the session state from transport events.
#[derive(Debug)]
pub(crate) struct ConnectionSupervisor {
    state: ConnectionState,
    state_tx: watch::Sender<ConnectionState>,
    errors: ErrorSlot,
    reported_unsolicited: bool,
}

impl ConnectionSupervisor {
    pub fn new(errors: ErrorSlot) -> (Self, watch::Receiver<ConnectionState>) {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let supervisor = Self {
            state: ConnectionState::Disconnected,
            state_tx,
            errors,
            reported_unsolicited: false,
        };
        (supervisor, state_rx)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// A session was created and asked to connect.
    pub fn begin_connect(&mut self) {
        self.set_state(ConnectionState::Connecting);
    }

    /// Explicit teardown, or a connect attempt that could not be started.
    pub fn close(&mut self) -> Transition {
        self.set_state(ConnectionState::Disconnected)
    }

    pub fn handle(&mut self, event: SessionEvent) -> Transition {
        match event {
            SessionEvent::Up => {
                info!("Connected; ready to start polling statistics");
                self.set_state(ConnectionState::Connected)
            }
            SessionEvent::ConnectFailed(info) => {
                warn!(
                    "Connection to the message router failed: {} - check parameter values and connectivity",
                    info
                );
                self.errors.set(LastError::new(
                    ErrorKind::Connect,
                    "Failed to connect session. Check your address, username, password, VPN etc.",
                    info,
                ));
                self.set_state(ConnectionState::Disconnected)
            }
            SessionEvent::Disconnected => {
                debug!("Disconnected");
                self.set_state(ConnectionState::Disconnected)
            }
            SessionEvent::SubscriptionError(info) => {
                debug!("Unexpected subscription error: {}", info);
                Transition::Unchanged
            }
            SessionEvent::SubscriptionOk => Transition::Unchanged,
            SessionEvent::Message(_) => {
                if !self.reported_unsolicited {
                    debug!("Received messages without subscribing to anything");
                    self.reported_unsolicited = true;
                }
                Transition::Unchanged
            }
        }
    }

    fn set_state(&mut self, next: ConnectionState) -> Transition {
        if self.state == next {
            return Transition::Unchanged;
        }
        debug!("Connection state {} -> {}", self.state, next);
        self.state = next;
        self.state_tx.send_replace(next);

        match next {
            ConnectionState::Connected => Transition::Connected,
            ConnectionState::Disconnected => Transition::Disconnected,
            ConnectionState::Connecting => Transition::Unchanged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props() -> SessionProperties {
        SessionProperties {
            url: "ws://broker:80".to_string(),
            vpn_name: "default".to_string(),
            username: "monitor".to_string(),
            password: "secret".to_string(),
        }
    }

    #[test]
    fn valid_properties_pass() {
        assert_eq!(validate(&props(), QueryMode::LinkedRouterRate, false), Ok(()));
        for url in ["wss://b", "http://b:8080", "https://b"] {
            let p = SessionProperties {
                url: url.to_string(),
                ..props()
            };
            assert_eq!(validate(&p, QueryMode::BridgeRate, false), Ok(()));
        }
    }

    #[test]
    fn rejects_unknown_protocol() {
        let p = SessionProperties {
            url: "tcp://broker:55555".to_string(),
            ..props()
        };
        assert_eq!(
            validate(&p, QueryMode::LinkedRouterRate, false),
            Err(ConfigError::InvalidProtocol("tcp://broker:55555".to_string()))
        );
    }

    #[test]
    fn rejects_missing_fields() {
        let cases = [
            (SessionProperties { url: String::new(), ..props() }, ConfigError::MissingUrl),
            (SessionProperties { username: String::new(), ..props() }, ConfigError::MissingUsername),
            (SessionProperties { password: String::new(), ..props() }, ConfigError::MissingPassword),
            (SessionProperties { vpn_name: String::new(), ..props() }, ConfigError::MissingVpn),
        ];
        for (p, expected) in cases {
            assert_eq!(validate(&p, QueryMode::LinkedRouterRate, false), Err(expected));
        }
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert_eq!(
            validate_interval(Duration::ZERO),
            Err(ConfigError::InvalidInterval)
        );
        assert_eq!(validate_interval(Duration::from_millis(1)), Ok(()));
    }

    #[test]
    fn user_mode_requires_delegate() {
        assert_eq!(
            validate(&props(), QueryMode::UserCallback, false),
            Err(ConfigError::MissingRateDelegate)
        );
        assert_eq!(validate(&props(), QueryMode::UserCallback, true), Ok(()));
    }

    #[test]
    fn state_follows_events() {
        let (mut supervisor, rx) = ConnectionSupervisor::new(ErrorSlot::default());
        assert_eq!(supervisor.state(), ConnectionState::Disconnected);

        supervisor.begin_connect();
        assert_eq!(*rx.borrow(), ConnectionState::Connecting);

        assert_eq!(supervisor.handle(SessionEvent::Up), Transition::Connected);
        assert_eq!(supervisor.handle(SessionEvent::Up), Transition::Unchanged);
        assert_eq!(*rx.borrow(), ConnectionState::Connected);

        assert_eq!(
            supervisor.handle(SessionEvent::Disconnected),
            Transition::Disconnected
        );
        assert_eq!(*rx.borrow(), ConnectionState::Disconnected);
    }

    #[test]
    fn connect_failure_records_error() {
        let errors = ErrorSlot::default();
        let (mut supervisor, _rx) = ConnectionSupervisor::new(errors.clone());
        supervisor.begin_connect();

        let transition = supervisor.handle(SessionEvent::ConnectFailed("401 Unauthorized".into()));
        assert_eq!(transition, Transition::Disconnected);

        let last = errors.get().unwrap();
        assert_eq!(last.kind, ErrorKind::Connect);
        assert_eq!(last.detail, "401 Unauthorized");
    }

    #[test]
    fn disconnect_keeps_last_error() {
        let errors = ErrorSlot::default();
        let (mut supervisor, _rx) = ConnectionSupervisor::new(errors.clone());
        supervisor.handle(SessionEvent::ConnectFailed("refused".into()));
        supervisor.handle(SessionEvent::Up);
        supervisor.handle(SessionEvent::Disconnected);
        assert_eq!(errors.get().unwrap().detail, "refused");
    }

    #[test]
    fn other_events_do_not_change_state() {
        let (mut supervisor, _rx) = ConnectionSupervisor::new(ErrorSlot::default());
        supervisor.handle(SessionEvent::Up);
        for event in [
            SessionEvent::SubscriptionOk,
            SessionEvent::SubscriptionError("denied".into()),
            SessionEvent::Message("<x/>".into()),
            SessionEvent::Message("<y/>".into()),
        ] {
            assert_eq!(supervisor.handle(event), Transition::Unchanged);
        }
        assert_eq!(supervisor.state(), ConnectionState::Connected);
    }
}
