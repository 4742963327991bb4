//! SEMP v1 over the router's HTTP management interface.
//!
//! Requests are POSTed to `{url}/SEMP` with basic authentication. The
//! session has no persistent connection: `connect` sends a `show router-name`
//! probe and reports `Up` when the router executes it.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use semprate_reporter::http::HttpSessionFactory;
//! use semprate_reporter::{RateReporter, TransportRuntime};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runtime = TransportRuntime::internal(Arc::new(HttpSessionFactory::new()));
//!     let mut reporter = RateReporter::new(runtime);
//!     reporter.set_url("http://localhost:8080");
//!     reporter.set_vpn_name("default");
//!     reporter.set_username("admin");
//!     reporter.set_password("admin");
//!     reporter.add_bridge("east-west");
//!     reporter.set_result_callback(|target, rate| println!("{}: {}", target.identifier(), rate));
//!     reporter.connect()?;
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(10)).await;
//!     reporter.finish().await;
//!     Ok(())
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::error::TransportError;
use crate::parser;
use crate::transport::{Session, SessionEvent, SessionEventSender, SessionFactory, SessionProperties};

/// Query sent by `connect` to check the endpoint and credentials.
const PROBE_QUERY: &str = "<rpc><show><router-name/></show></rpc>";

/// Creates [`HttpSession`]s.
#[derive(Debug, Clone)]
pub struct HttpSessionFactory {
    connect_timeout: Duration,
    probe_timeout: Duration,
}

impl HttpSessionFactory {
    pub fn new() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(10),
        }
    }

    /// Set the TCP connect timeout (default: 5 seconds).
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set how long `connect` waits for the probe reply (default: 10 seconds).
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }
}

impl Default for HttpSessionFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionFactory for HttpSessionFactory {
    fn create_session(
        &self,
        properties: &SessionProperties,
        events: SessionEventSender,
    ) -> Result<Arc<dyn Session>, TransportError> {
        let client = Client::builder()
            .connect_timeout(self.connect_timeout)
            .build()?;

        Ok(Arc::new(HttpSession {
            inner: Arc::new(Inner {
                client,
                endpoint: semp_endpoint(&properties.url)?,
                username: properties.username.clone(),
                password: properties.password.clone(),
                events,
                closed: AtomicBool::new(false),
            }),
            probe_timeout: self.probe_timeout,
        }))
    }
}

/// A SEMP-over-HTTP session.
#[derive(Debug)]
pub struct HttpSession {
    inner: Arc<Inner>,
    probe_timeout: Duration,
}

#[derive(Debug)]
struct Inner {
    client: Client,
    endpoint: String,
    username: String,
    password: String,
    events: SessionEventSender,
    closed: AtomicBool,
}

impl Inner {
    async fn post(&self, payload: &str, timeout: Duration) -> Result<String, TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.username, Some(&self.password))
            .header(CONTENT_TYPE, "application/xml")
            .timeout(timeout)
            .body(payload.to_string())
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(TransportError::Auth("Invalid credentials".to_string()));
        }

        if !response.status().is_success() {
            return Err(TransportError::Http(format!(
                "SEMP endpoint returned status {}",
                response.status()
            )));
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl Session for HttpSession {
    fn connect(&self) -> Result<(), TransportError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        self.inner.closed.store(false, Ordering::SeqCst);

        let inner = Arc::clone(&self.inner);
        let timeout = self.probe_timeout;
        runtime.spawn(async move {
            let event = match inner.post(PROBE_QUERY, timeout).await {
                Ok(body) => match parser::check_execute_result(&body) {
                    Ok(()) => SessionEvent::Up,
                    Err(e) => SessionEvent::ConnectFailed(e.to_string()),
                },
                Err(e) => SessionEvent::ConnectFailed(e.to_string()),
            };
            let _ = inner.events.send(event);
        });
        Ok(())
    }

    fn disconnect(&self) {
        if !self.inner.closed.swap(true, Ordering::SeqCst) {
            let _ = self.inner.events.send(SessionEvent::Disconnected);
        }
    }

    fn dispose(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }

    async fn send_request(
        &self,
        topic: &str,
        payload: &str,
        timeout: Duration,
    ) -> Result<String, TransportError> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Disposed);
        }
        debug!("POST {} ({})", self.inner.endpoint, topic);
        self.inner.post(payload, timeout).await
    }
}

/// SEMP endpoint for a router URL. Web-messaging schemes map to their HTTP
/// counterparts.
fn semp_endpoint(url: &str) -> Result<String, TransportError> {
    let base = if let Some(rest) = url.strip_prefix("ws://") {
        format!("http://{}", rest)
    } else if let Some(rest) = url.strip_prefix("wss://") {
        format!("https://{}", rest)
    } else if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        return Err(TransportError::Connection(format!(
            "Unsupported URL for SEMP over HTTP: {}",
            url
        )));
    };

    let base = base.trim_end_matches('/');
    if base.ends_with("/SEMP") {
        Ok(base.to_string())
    } else {
        Ok(format!("{}/SEMP", base))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    fn props(url: &str) -> SessionProperties {
        SessionProperties {
            url: url.to_string(),
            vpn_name: "default".to_string(),
            username: "admin".to_string(),
            password: "admin".to_string(),
        }
    }

    /// Serve a single HTTP request with the given status and body.
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];

            // Read headers, then as much body as Content-Length announces
            let header_end = loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                if let Some(pos) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };
            let headers = String::from_utf8_lossy(&request[..header_end]).to_lowercase();
            let content_length = headers
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            while request.len() < header_end + content_length {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: text/xml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });

        format!("http://{}", addr)
    }

    #[test]
    fn endpoint_mapping() {
        assert_eq!(semp_endpoint("http://r:8080").unwrap(), "http://r:8080/SEMP");
        assert_eq!(semp_endpoint("https://r/").unwrap(), "https://r/SEMP");
        assert_eq!(semp_endpoint("ws://r:80").unwrap(), "http://r:80/SEMP");
        assert_eq!(semp_endpoint("wss://r:443").unwrap(), "https://r:443/SEMP");
        assert_eq!(semp_endpoint("http://r/SEMP").unwrap(), "http://r/SEMP");
        assert!(semp_endpoint("tcp://r").is_err());
    }

    #[tokio::test]
    async fn requests_fail_after_disconnect() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = HttpSessionFactory::new()
            .create_session(&props("http://127.0.0.1:9"), tx)
            .unwrap();

        session.disconnect();
        assert_eq!(rx.recv().await, Some(SessionEvent::Disconnected));

        // A second disconnect is not reported again
        session.disconnect();
        assert!(rx.try_recv().is_err());

        let result = session
            .send_request("#SEMP/solace/SHOW", "<rpc/>", Duration::from_secs(1))
            .await;
        assert!(matches!(result, Err(TransportError::Disposed)));
    }

    #[tokio::test]
    async fn probe_reports_up() {
        let url = serve_once("200 OK", "<rpc-reply><execute-result code='ok'/></rpc-reply>").await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = HttpSessionFactory::new().create_session(&props(&url), tx).unwrap();

        session.connect().unwrap();
        assert_eq!(rx.recv().await, Some(SessionEvent::Up));
    }

    #[tokio::test]
    async fn probe_reports_bad_credentials() {
        let url = serve_once("401 Unauthorized", "").await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = HttpSessionFactory::new().create_session(&props(&url), tx).unwrap();

        session.connect().unwrap();
        match rx.recv().await {
            Some(SessionEvent::ConnectFailed(info)) => assert!(info.contains("Authentication")),
            other => panic!("expected ConnectFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn probe_reports_rejected_query() {
        let url = serve_once(
            "200 OK",
            r#"<rpc-reply><execute-result code="fail" reason="Permission denied"/></rpc-reply>"#,
        )
        .await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = HttpSessionFactory::new().create_session(&props(&url), tx).unwrap();

        session.connect().unwrap();
        match rx.recv().await {
            Some(SessionEvent::ConnectFailed(info)) => {
                assert!(info.contains("fail"));
                assert!(info.contains("Permission denied"));
            }
            other => panic!("expected ConnectFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_request_returns_body() {
        let url = serve_once("200 OK", "<rpc-reply>ok</rpc-reply>").await;
        let (tx, _rx) = mpsc::unbounded_channel();
        let session = HttpSessionFactory::new().create_session(&props(&url), tx).unwrap();

        let body = session
            .send_request("#SEMP/solace/SHOW", "<rpc/>", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(body, "<rpc-reply>ok</rpc-reply>");
    }
}
