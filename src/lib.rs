//! # semprate
//!
//! Command-line monitor for Solace message router rates.
//!
//! The binary loads a [`ReporterConfig`](semprate_reporter::ReporterConfig),
//! starts a [`RateReporter`](semprate_reporter::RateReporter) over SEMP/HTTP
//! and prints every reported rate until interrupted.
//!
//! ## Usage
//!
//! ```bash
//! # Linked-router rates every 5 seconds, as text
//! semprate --config semprate.toml --interval-ms 5000
//!
//! # Bridge rates as JSON lines for one minute
//! semprate --config bridges.toml --format json --duration 60
//! ```
//!
//! ## As a library
//!
//! ```
//! use semprate::output::{render, OutputFormat};
//! use semprate_types::{MonitoredTarget, Rate};
//!
//! let line = render(
//!     &MonitoredTarget::bridge("east-west"),
//!     &Rate::Messages(42),
//!     OutputFormat::Text,
//!     0,
//! )
//! .unwrap();
//! assert_eq!(line, "east-west\t42");
//! ```
//!
//! Loading configuration needs no runtime, but connecting does:
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use semprate_reporter::http::HttpSessionFactory;
//! use semprate_reporter::{RateReporter, TransportRuntime};
//!
//! # tokio_test::block_on(async {
//! let config = semprate::settings::load(Path::new("semprate.toml")).unwrap();
//! let runtime = TransportRuntime::internal(Arc::new(HttpSessionFactory::new()));
//! let mut reporter = RateReporter::from_config(&config, runtime);
//! reporter.connect().unwrap();
//! reporter.finish().await;
//! # });
//! ```

pub mod output;
pub mod settings;

pub use output::OutputFormat;
