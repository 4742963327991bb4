//! The caller-facing reporter handle.

use std::sync::Arc;
use std::time::Duration;

use semprate_types::{ConnectionState, LastError, MonitoredTarget, QueryMode, Rate};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::catalog::QueryCatalog;
use crate::config::ReporterConfig;
use crate::engine::{Command, PollingEngine, ResultCallback};
use crate::error::{BoxError, ErrorSlot, ReporterError, TransportError};
use crate::parser::{self, RateDelegate};
use crate::request::{RequestContext, SempVersion};
use crate::supervisor::{self, ConnectionSupervisor};
use crate::transport::{SessionProperties, TransportRuntime};

/// Connection and polling settings.
#[derive(Debug, Clone)]
struct Settings {
    properties: SessionProperties,
    physical_name: String,
    interval: Duration,
    timeout: Duration,
    semp_version: SempVersion,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            properties: SessionProperties {
                url: String::new(),
                vpn_name: String::new(),
                username: String::new(),
                password: String::new(),
            },
            physical_name: "solace".to_string(),
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(1),
            semp_version: SempVersion::default(),
        }
    }
}

/// Polls a router for linked-router, bridge or user-defined rates.
///
/// Configure the reporter, register a result callback and call
/// [`connect`](Self::connect). Once the session is up a request is sent for
/// every target of the active mode each interval, and every extracted rate
/// is handed to the callback. Failures never interrupt polling; the most
/// recent one is available from [`last_error`](Self::last_error).
///
/// Settings, targets and callbacks are captured by `connect`; changing them
/// afterwards affects the next session only.
pub struct RateReporter {
    runtime: TransportRuntime,
    settings: Settings,
    catalog: QueryCatalog,
    on_result: Option<ResultCallback>,
    delegate: Option<RateDelegate>,
    errors: ErrorSlot,
    state: watch::Receiver<ConnectionState>,
    commands: Option<mpsc::UnboundedSender<Command>>,
}

impl RateReporter {
    pub fn new(runtime: TransportRuntime) -> Self {
        let (_, state) = watch::channel(ConnectionState::Disconnected);
        Self {
            runtime,
            settings: Settings::default(),
            catalog: QueryCatalog::new(),
            on_result: None,
            delegate: None,
            errors: ErrorSlot::default(),
            state,
            commands: None,
        }
    }

    /// Build a reporter from loaded configuration.
    ///
    /// Targets are added linked routers first, then bridges, then user
    /// queries; an explicit `targets.mode` is applied last.
    pub fn from_config(config: &ReporterConfig, runtime: TransportRuntime) -> Self {
        let mut reporter = Self::new(runtime);

        let router = &config.router;
        reporter.set_url(&router.url);
        reporter.set_vpn_name(&router.vpn_name);
        reporter.set_username(&router.username);
        reporter.set_password(&router.password);
        reporter.set_physical_name(&router.physical_name);
        reporter.set_semp_version(&router.semp_version);
        reporter.set_request_interval(config.polling.interval());
        reporter.set_request_timeout(config.polling.request_timeout());

        let targets = &config.targets;
        for name in &targets.linked_routers {
            reporter.add_linked_router(name);
        }
        for name in &targets.bridges {
            reporter.add_bridge(name);
        }
        for fragment in &targets.user_queries {
            reporter.add_user_query(fragment);
        }
        if let Some(mode) = &targets.mode {
            reporter.set_query_type(mode);
        }
        if let Some(tag) = &targets.user_rate_tag {
            let tag = tag.clone();
            reporter.set_user_rate_delegate(move |raw: &str| parser::first_element_text(raw, &tag));
        }

        reporter
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.settings.properties.url = url.into();
    }

    pub fn url(&self) -> &str {
        &self.settings.properties.url
    }

    pub fn set_vpn_name(&mut self, vpn_name: impl Into<String>) {
        self.settings.properties.vpn_name = vpn_name.into();
    }

    pub fn vpn_name(&self) -> &str {
        &self.settings.properties.vpn_name
    }

    pub fn set_username(&mut self, username: impl Into<String>) {
        self.settings.properties.username = username.into();
    }

    pub fn username(&self) -> &str {
        &self.settings.properties.username
    }

    pub fn set_password(&mut self, password: impl Into<String>) {
        self.settings.properties.password = password.into();
    }

    pub fn password(&self) -> &str {
        &self.settings.properties.password
    }

    /// Physical name of the router being connected to, used in the request topic.
    pub fn set_physical_name(&mut self, physical_name: impl Into<String>) {
        self.settings.physical_name = physical_name.into();
    }

    pub fn physical_name(&self) -> &str {
        &self.settings.physical_name
    }

    /// Time between polling rounds.
    pub fn set_request_interval(&mut self, interval: Duration) {
        self.settings.interval = interval;
    }

    pub fn request_interval(&self) -> Duration {
        self.settings.interval
    }

    /// How long each request waits for its reply.
    pub fn set_request_timeout(&mut self, timeout: Duration) {
        self.settings.timeout = timeout;
    }

    pub fn request_timeout(&self) -> Duration {
        self.settings.timeout
    }

    /// Set the SEMP version; `soltr/` is prepended when missing.
    pub fn set_semp_version(&mut self, version: &str) {
        self.settings.semp_version = SempVersion::new(version);
    }

    pub fn semp_version(&self) -> &SempVersion {
        &self.settings.semp_version
    }

    /// Add a router linked by MNR and switch to linked-router mode.
    pub fn add_linked_router(&mut self, physical_name: impl Into<String>) -> QueryMode {
        self.catalog.add_linked_router(physical_name)
    }

    /// Add a VPN bridge and switch to bridge mode.
    pub fn add_bridge(&mut self, name: impl Into<String>) -> QueryMode {
        self.catalog.add_bridge(name)
    }

    /// Add a SEMP query body and switch to user callback mode.
    pub fn add_user_query(&mut self, fragment: impl Into<String>) -> QueryMode {
        self.catalog.add_user_query(fragment)
    }

    pub fn set_mode(&mut self, mode: QueryMode) {
        self.catalog.set_mode(mode);
    }

    /// Select the mode from a name or legacy numeric code.
    ///
    /// Unrecognised input leaves the mode unchanged and returns `None`.
    pub fn set_query_type(&mut self, value: &str) -> Option<QueryMode> {
        match value.parse::<QueryMode>() {
            Ok(mode) => {
                self.catalog.set_mode(mode);
                Some(mode)
            }
            Err(e) => {
                warn!("{}; keeping {} mode", e, self.catalog.mode());
                None
            }
        }
    }

    pub fn mode(&self) -> QueryMode {
        self.catalog.mode()
    }

    pub fn catalog(&self) -> &QueryCatalog {
        &self.catalog
    }

    pub fn linked_router_names(&self) -> Vec<String> {
        self.catalog.identifiers(QueryMode::LinkedRouterRate)
    }

    pub fn bridge_names(&self) -> Vec<String> {
        self.catalog.identifiers(QueryMode::BridgeRate)
    }

    pub fn user_queries(&self) -> Vec<String> {
        self.catalog.identifiers(QueryMode::UserCallback)
    }

    /// Register the function receiving each `(target, rate)` result.
    pub fn set_result_callback<F>(&mut self, callback: F)
    where
        F: Fn(&MonitoredTarget, Rate) + Send + Sync + 'static,
    {
        self.on_result = Some(Arc::new(callback));
    }

    /// Register the parser for user query replies. Required in user callback mode.
    pub fn set_user_rate_delegate<F, R, E>(&mut self, delegate: F)
    where
        F: Fn(&str) -> Result<R, E> + Send + Sync + 'static,
        R: Into<Rate>,
        E: Into<BoxError>,
    {
        self.delegate = Some(RateDelegate::new(delegate));
    }

    /// Validate the settings, create a session and start connecting.
    ///
    /// Must be called from within a tokio runtime. Returns once the connect
    /// attempt has started; the outcome shows up in
    /// [`connection_state`](Self::connection_state) and, on failure,
    /// [`last_error`](Self::last_error). Calling it with a session already
    /// open does nothing.
    pub fn connect(&mut self) -> Result<(), ReporterError> {
        if self.commands.is_some() {
            debug!("Session already exists, ignoring connect");
            return Ok(());
        }

        let properties = self.settings.properties.clone();
        info!(
            "Connecting to {} as {}@{}",
            properties.url, properties.username, properties.vpn_name
        );

        supervisor::validate(&properties, self.catalog.mode(), self.delegate.is_some())
            .and_then(|()| supervisor::validate_interval(self.settings.interval))
            .map_err(|e| self.fail(e.into(), ""))?;

        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| self.fail(ReporterError::Connect(TransportError::Init(e.to_string())), ""))?;

        self.runtime
            .ensure_initialized()
            .map_err(|e| self.fail(ReporterError::Connect(e), ""))?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (mut supervisor, state) = ConnectionSupervisor::new(self.errors.clone());

        let session = self
            .runtime
            .factory()
            .create_session(&properties, events_tx)
            .map_err(|e| self.fail(ReporterError::Connect(e), "Failed to create session"))?;

        supervisor.begin_connect();
        if let Err(e) = session.connect() {
            supervisor.close();
            session.dispose();
            return Err(self.fail(ReporterError::Connect(e), "Failed to connect session"));
        }

        let context = RequestContext {
            version: self.settings.semp_version.clone(),
            vpn_name: properties.vpn_name,
            physical_name: self.settings.physical_name.clone(),
        };
        let engine = PollingEngine::new(
            session,
            supervisor,
            self.catalog.clone(),
            context,
            self.settings.interval,
            self.settings.timeout,
            self.on_result.clone(),
            self.delegate.clone(),
            self.errors.clone(),
        );

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        handle.spawn(engine.run(events_rx, commands_rx));
        self.commands = Some(commands_tx);
        self.state = state;
        Ok(())
    }

    /// Send one round of requests now, outside the timer.
    pub fn request(&self) -> Result<(), ReporterError> {
        self.send(Command::Request).inspect_err(|e| warn!("{}", e))
    }

    /// Stop polling. The session stays open and replies already in flight
    /// are still delivered.
    pub fn stop(&self) {
        if self.send(Command::Stop).is_err() {
            debug!("Not connected, nothing to stop");
        }
    }

    /// Stop polling, disconnect and dispose the session, and tear down the
    /// transport runtime if the reporter owns it.
    pub async fn finish(&mut self) {
        if let Some(commands) = self.commands.take() {
            let (done_tx, done_rx) = oneshot::channel();
            if commands.send(Command::Finish(done_tx)).is_ok() {
                let _ = done_rx.await;
            }
        }
        self.runtime.teardown();
    }

    /// The most recent failure, if any.
    pub fn last_error(&self) -> Option<LastError> {
        self.errors.get()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Wait until the session reaches `target`.
    ///
    /// Fails with [`ReporterError::NotConnected`] if the session ends in
    /// another state.
    pub async fn wait_for_state(&self, target: ConnectionState) -> Result<(), ReporterError> {
        let mut state = self.state.clone();
        state
            .wait_for(|s| *s == target)
            .await
            .map(|_| ())
            .map_err(|_| ReporterError::NotConnected)
    }

    fn send(&self, command: Command) -> Result<(), ReporterError> {
        self.commands
            .as_ref()
            .ok_or(ReporterError::NotConnected)?
            .send(command)
            .map_err(|_| ReporterError::NotConnected)
    }

    fn fail(&self, err: ReporterError, detail: &str) -> ReporterError {
        warn!("{}", err);
        self.errors.record(&err, detail);
        err
    }
}

impl std::fmt::Debug for RateReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateReporter")
            .field("settings", &self.settings)
            .field("catalog", &self.catalog)
            .field("state", &self.connection_state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PollingConfig, RouterConfig, TargetsConfig};
    use crate::transport::{Session, SessionEventSender, SessionFactory};

    #[derive(Debug)]
    struct NoSessions;

    impl SessionFactory for NoSessions {
        fn create_session(
            &self,
            _properties: &SessionProperties,
            _events: SessionEventSender,
        ) -> Result<Arc<dyn Session>, TransportError> {
            Err(TransportError::Connection("unreachable".into()))
        }
    }

    fn reporter() -> RateReporter {
        RateReporter::new(TransportRuntime::internal(Arc::new(NoSessions)))
    }

    #[test]
    fn defaults() {
        let r = reporter();
        assert_eq!(r.physical_name(), "solace");
        assert_eq!(r.semp_version().as_str(), "soltr/8_7VMR");
        assert_eq!(r.mode(), QueryMode::LinkedRouterRate);
        assert_eq!(r.connection_state(), ConnectionState::Disconnected);
        assert!(r.last_error().is_none());
    }

    #[test]
    fn adding_targets_selects_mode() {
        let mut r = reporter();
        assert_eq!(r.add_bridge("b1"), QueryMode::BridgeRate);
        assert_eq!(r.add_linked_router("r1"), QueryMode::LinkedRouterRate);
        assert_eq!(r.mode(), QueryMode::LinkedRouterRate);
        assert_eq!(r.bridge_names(), vec!["b1"]);
        assert_eq!(r.linked_router_names(), vec!["r1"]);
        assert!(r.user_queries().is_empty());
    }

    #[test]
    fn set_query_type_accepts_names_and_codes() {
        let mut r = reporter();
        assert_eq!(r.set_query_type("bridge"), Some(QueryMode::BridgeRate));
        assert_eq!(r.set_query_type("3"), Some(QueryMode::UserCallback));
        assert_eq!(r.mode(), QueryMode::UserCallback);
    }

    #[test]
    fn set_query_type_rejects_unknown_values() {
        let mut r = reporter();
        r.set_mode(QueryMode::BridgeRate);
        assert_eq!(r.set_query_type("queue-depth"), None);
        assert_eq!(r.set_query_type("7"), None);
        assert_eq!(r.mode(), QueryMode::BridgeRate);
        assert!(r.last_error().is_none());
    }

    #[test]
    fn request_without_session_fails() {
        let r = reporter();
        assert!(matches!(r.request(), Err(ReporterError::NotConnected)));
        // stop is a no-op
        r.stop();
    }

    #[test]
    fn semp_version_is_normalized() {
        let mut r = reporter();
        r.set_semp_version("9_1VMR");
        assert_eq!(r.semp_version().as_str(), "soltr/9_1VMR");
    }

    #[test]
    fn from_config_applies_every_section() {
        let config = ReporterConfig {
            router: RouterConfig {
                url: "ws://r:80".into(),
                vpn_name: "default".into(),
                username: "admin".into(),
                password: "admin".into(),
                physical_name: "router-a".into(),
                semp_version: "8_7VMR".into(),
            },
            polling: PollingConfig {
                interval_ms: 500,
                request_timeout_ms: 200,
            },
            targets: TargetsConfig {
                linked_routers: vec!["r2".into()],
                bridges: vec!["b1".into()],
                user_queries: vec![],
                mode: Some("mnr".into()),
                user_rate_tag: None,
            },
        };

        let r = RateReporter::from_config(&config, TransportRuntime::internal(Arc::new(NoSessions)));
        assert_eq!(r.url(), "ws://r:80");
        assert_eq!(r.physical_name(), "router-a");
        assert_eq!(r.semp_version().as_str(), "soltr/8_7VMR");
        assert_eq!(r.request_interval(), Duration::from_millis(500));
        assert_eq!(r.request_timeout(), Duration::from_millis(200));
        // Bridges were added last, the explicit mode wins
        assert_eq!(r.mode(), QueryMode::LinkedRouterRate);
        assert!(r.delegate.is_none());
    }

    #[test]
    fn from_config_builds_tag_delegate() {
        let mut config = ReporterConfig::default();
        config.targets.user_queries = vec!["<show><message-spool/></show>".into()];
        config.targets.user_rate_tag = Some("current-persist-usage".into());

        let r = RateReporter::from_config(&config, TransportRuntime::internal(Arc::new(NoSessions)));
        assert_eq!(r.mode(), QueryMode::UserCallback);

        let delegate = r.delegate.as_ref().unwrap();
        let rate = delegate
            .call("<rpc-reply><current-persist-usage>12.5</current-persist-usage></rpc-reply>")
            .unwrap();
        assert_eq!(rate, Rate::Custom("12.5".into()));
    }

    #[tokio::test]
    async fn connect_with_missing_url_is_a_configuration_error() {
        let mut r = reporter();
        let err = r.connect().unwrap_err();
        assert!(matches!(err, ReporterError::Configuration(_)));

        let last = r.last_error().unwrap();
        assert_eq!(last.kind, semprate_types::ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn create_session_failure_is_recorded() {
        let mut r = reporter();
        r.set_url("http://r");
        r.set_vpn_name("default");
        r.set_username("admin");
        r.set_password("admin");

        assert!(matches!(r.connect(), Err(ReporterError::Connect(_))));
        let last = r.last_error().unwrap();
        assert_eq!(last.detail, "Failed to create session");
        assert!(matches!(r.request(), Err(ReporterError::NotConnected)));
    }
}
