//! # semprate-reporter
//!
//! Polls a Solace message router over SEMP and reports message rates for
//! linked routers (MNR), VPN bridges or caller-defined queries.
//!
//! The reporter does not open sockets itself. It drives a
//! [`Session`](transport::Session) created by a
//! [`SessionFactory`](transport::SessionFactory), so any request/reply
//! transport can carry the SEMP queries. The `http` feature provides one
//! that talks to the router's HTTP management interface.
//!
//! ## How it works
//!
//! 1. Targets are added to a [`QueryCatalog`]; the kind of the last target
//!    added selects the query mode.
//! 2. [`RateReporter::connect`] validates the settings, creates a session and
//!    starts a single polling task.
//! 3. When the session comes up the request list is built once and a timer
//!    sends every request each interval, each in its own task.
//! 4. Replies are parsed and each rate is passed to the result callback.
//!    Failures are kept in a last-error slot and never stop polling.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use semprate_reporter::{RateReporter, ReporterError, SessionFactory, TransportRuntime};
//!
//! async fn monitor(factory: Arc<dyn SessionFactory>) -> Result<(), ReporterError> {
//!     let mut reporter = RateReporter::new(TransportRuntime::internal(factory));
//!     reporter.set_url("http://192.168.1.10:8080");
//!     reporter.set_vpn_name("default");
//!     reporter.set_username("admin");
//!     reporter.set_password("admin");
//!     reporter.set_request_interval(Duration::from_secs(5));
//!     reporter.add_linked_router("router-b");
//!     reporter.add_linked_router("router-c");
//!     reporter.set_result_callback(|target, rate| {
//!         println!("{} {} msg/s", target.identifier(), rate);
//!     });
//!
//!     reporter.connect()?;
//!     tokio::time::sleep(Duration::from_secs(60)).await;
//!
//!     if let Some(err) = reporter.last_error() {
//!         eprintln!("last error: {}", err);
//!     }
//!     reporter.finish().await;
//!     Ok(())
//! }
//! ```
//!
//! With the `http` feature, pass `Arc::new(http::HttpSessionFactory::new())`
//! as the factory.

pub mod catalog;
pub mod config;
mod engine;
pub mod error;
pub mod parser;
mod reporter;
pub mod request;
pub mod supervisor;
pub mod transport;
mod xml;

#[cfg(feature = "http")]
pub mod http;

pub use catalog::QueryCatalog;
pub use config::ReporterConfig;
pub use engine::ResultCallback;
pub use error::{BoxError, ConfigError, ParseError, ReporterError, TransportError};
pub use parser::RateDelegate;
pub use reporter::RateReporter;
pub use request::{PendingRequest, SempVersion};
pub use transport::{
    RuntimeOwnership, Session, SessionEvent, SessionEventSender, SessionFactory,
    SessionProperties, TransportRuntime,
};

// Re-export types for convenience
pub use semprate_types::{
    ConnectionState, ErrorKind, LastError, MonitoredTarget, QueryMode, Rate, UnknownQueryMode,
};
