//! Forecast service.
//!
//! A small HTTP service with one demonstration route, exporting traces,
//! metrics and logs over OTLP.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client Request   ┌──────────────────────────────────────────────┐
//!   ─────────────────┼─▶ http::server (middleware stack)            │
//!                    │      ├─▶ sources::http ──▶ trace pipeline ───┼──┐
//!                    │      │              └───▶ metric pipeline ──┼──┤  OTLP
//!   Client Response  │      ▼                                       │  ├──────▶ Collector
//!   ◀────────────────┼── http::forecast                             │  │
//!                    │   tracing events ──▶ sources::logs ──▶ log   │  │
//!                    │                                   pipeline ─┼──┘
//!                    │   process / runtime gauges ──▶ metric        │
//!                    └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use forecast_service::config::validation::validate_config;
use forecast_service::config::{apply_env_overrides, load_config, Environment, ServiceConfig};
use forecast_service::lifecycle::{boot, signals, Shutdown};
use forecast_service::observability::{logging, Instrumentation, Telemetry};
use forecast_service::HostService;

#[derive(Parser)]
#[command(name = "forecast-service")]
#[command(about = "Weather forecast demo service with OTLP telemetry", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, env = "FORECAST_CONFIG")]
    config: Option<PathBuf>,

    /// Host environment (production or development).
    #[arg(short, long)]
    environment: Option<Environment>,

    /// Listener address, e.g. 0.0.0.0:8080.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };
    apply_env_overrides(&mut config)?;
    if let Some(environment) = cli.environment {
        config.environment = environment;
    }
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    validate_config(&config).map_err(forecast_service::config::ConfigError::Validation)?;

    let instrumentation = Instrumentation::new();

    // The bridges need the providers, so boot logs to the console only.
    // Misconfiguration stops here, before the listener is bound.
    let boot_logs = logging::subscriber(&config, &Telemetry::disabled());
    let telemetry = tracing::subscriber::with_default(boot_logs, || {
        tracing::info!(
            version = env!("CARGO_PKG_VERSION"),
            environment = %config.environment,
            "forecast-service starting"
        );
        boot(&config, &instrumentation).inspect_err(|e| {
            tracing::error!(error = %e, "Startup failed");
        })
    })?;
    logging::init_logging(&config, &telemetry)?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        signals::wait_for_termination().await;
        shutdown.trigger();
    });

    let server = HostService::new(config, telemetry, &instrumentation);
    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
