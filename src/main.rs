use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use semprate::output::{self, OutputFormat};
use semprate::settings;
use semprate_reporter::http::HttpSessionFactory;
use semprate_reporter::{RateReporter, TransportRuntime};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// How often the last error is checked and logged.
const ERROR_CHECK_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "semprate")]
#[command(about = "Report Solace linked-router, bridge and custom SEMP rates")]
struct Args {
    /// Path to the configuration file (TOML)
    #[arg(short, long, default_value = "semprate.toml")]
    config: PathBuf,

    /// Output format for reported rates
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Stop after this many seconds (default: run until Ctrl-C)
    #[arg(short, long)]
    duration: Option<u64>,

    /// Polling interval in milliseconds (overrides the config file)
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Per-request timeout in milliseconds (overrides the config file)
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout carries only results
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = settings::load(&args.config)?;
    settings::apply_overrides(&mut config, args.interval_ms, args.timeout_ms);
    debug!("Loaded configuration: {:?}", config);

    let runtime = TransportRuntime::internal(Arc::new(HttpSessionFactory::new()));
    let mut reporter = RateReporter::from_config(&config, runtime);
    if reporter.catalog().active_targets().next().is_none() {
        warn!("No {} targets configured; nothing will be reported", reporter.mode());
    }

    let format = args.format;
    reporter.set_result_callback(move |target, rate| {
        match output::render(target, &rate, format, output::now_ms()) {
            Ok(line) => println!("{}", line),
            Err(e) => error!("Failed to render rate for {}: {}", target, e),
        }
    });

    reporter.connect()?;

    let deadline = async {
        match args.duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let mut error_check = tokio::time::interval(ERROR_CHECK_INTERVAL);
    let mut reported = None;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
            _ = &mut deadline => {
                info!("Duration elapsed, shutting down");
                break;
            }
            _ = error_check.tick() => {
                let current = reporter.last_error();
                if current.is_some() && current != reported {
                    if let Some(err) = &current {
                        warn!("{} error: {}", err.kind, err.message);
                        debug!("Error detail: {}", err.detail);
                    }
                    reported = current;
                }
            }
        }
    }

    reporter.finish().await;
    Ok(())
}
