//! faultline command line.
//!
//! Drives circuit breakers built from a TOML config, either against a
//! simulated flaky operation or against a real HTTP endpoint.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use clap::{Parser, Subcommand};
use rand::Rng;
use serde::Serialize;

use faultline::config::{self, AppConfig, BreakerConfig};
use faultline::http::HttpTransport;
use faultline::observability::{self, BreakerMetrics, TransitionCounts};
use faultline::resilience::{BreakerRegistry, CircuitBreaker, Error, State};

#[derive(Parser)]
#[command(name = "faultline")]
#[command(about = "Circuit breaker playground", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Breaker to use from the configuration.
    #[arg(short, long, default_value = "default")]
    breaker: String,

    /// Overrides the configured log level.
    #[arg(long)]
    log_level: Option<String>,

    /// Serve Prometheus metrics on this address.
    #[arg(long)]
    metrics_address: Option<SocketAddr>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive a breaker with a randomly failing operation
    Simulate {
        /// Number of calls to make
        #[arg(long, default_value_t = 200)]
        calls: u32,

        /// Probability in [0, 1] that an executed call fails
        #[arg(long, default_value_t = 0.5)]
        failure_rate: f64,

        /// Simulated latency of each executed call, in milliseconds
        #[arg(long, default_value_t = 5)]
        latency_ms: u64,

        /// Pause between calls, in milliseconds
        #[arg(long, default_value_t = 20)]
        pace_ms: u64,
    },
    /// Send GET requests to a URL through the breaker
    Probe {
        url: url::Url,

        #[arg(long, default_value_t = 20)]
        calls: u32,

        #[arg(long, default_value_t = 250)]
        pace_ms: u64,
    },
    /// Load and validate a configuration file
    CheckConfig { path: PathBuf },
}

#[derive(Debug, Default, Serialize)]
struct Summary {
    breaker: String,
    final_state: Option<State>,
    succeeded: u32,
    failed: u32,
    rejected_open: u32,
    rejected_half_open: u32,
    transitions: TransitionCounts,
}

impl Summary {
    fn record<T, E>(&mut self, result: &Result<T, Error<E>>) {
        match result {
            Ok(_) => self.succeeded += 1,
            Err(Error::Inner(_)) => self.failed += 1,
            Err(Error::Open) => self.rejected_open += 1,
            Err(Error::HalfOpen) => self.rejected_half_open += 1,
        }
    }
}

#[derive(Debug)]
struct SimulatedFailure;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Commands::CheckConfig { path } = &cli.command {
        let config = config::load_config(path)?;
        println!(
            "{}: ok ({} breaker(s))",
            path.display(),
            config.breakers.len()
        );
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => AppConfig::default(),
    };

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.observability.log_level.clone());
    observability::logging::init(&level);

    let metrics_address = match cli.metrics_address {
        Some(addr) => Some(addr),
        None if config.observability.metrics_enabled => {
            Some(config.observability.metrics_address.parse()?)
        }
        None => None,
    };
    if let Some(addr) = metrics_address {
        if let Err(e) = observability::metrics::init_metrics(addr) {
            tracing::error!(address = %addr, error = %e, "Failed to start metrics exporter");
        }
    }

    let registry = BreakerRegistry::from_config(&config.breakers);
    let breaker = registry.get_or_insert_with(&cli.breaker, || {
        CircuitBreaker::from_config(&BreakerConfig {
            name: cli.breaker.clone(),
            ..BreakerConfig::default()
        })
    });
    let metrics = BreakerMetrics::attach(&breaker);

    tracing::info!(
        breaker = %breaker.name(),
        failure_threshold = breaker.failure_threshold(),
        open_duration = ?breaker.open_duration(),
        "Breaker ready"
    );

    let mut summary = Summary {
        breaker: breaker.name().to_string(),
        ..Summary::default()
    };

    match cli.command {
        Commands::Simulate {
            calls,
            failure_rate,
            latency_ms,
            pace_ms,
        } => {
            let failure_rate = failure_rate.clamp(0.0, 1.0);
            for _ in 0..calls {
                let result = breaker
                    .call(|| async move {
                        tokio::time::sleep(Duration::from_millis(latency_ms)).await;
                        if rand::thread_rng().gen_bool(failure_rate) {
                            Err(SimulatedFailure)
                        } else {
                            Ok(())
                        }
                    })
                    .await;
                summary.record(&result);

                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(pace_ms)) => {}
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("Interrupted");
                        break;
                    }
                }
            }
        }
        Commands::Probe {
            url,
            calls,
            pace_ms,
        } => {
            let transport = HttpTransport::http(breaker.clone());
            for attempt in 1..=calls {
                let request = Request::get(url.as_str()).body(Body::empty())?;
                let result = transport.send(request).await;
                match &result {
                    Ok(response) => {
                        tracing::info!(attempt, status = %response.status(), "Response received")
                    }
                    Err(e) if e.is_rejection() => {
                        tracing::warn!(attempt, error = %e, "Rejected by breaker")
                    }
                    Err(e) => tracing::warn!(attempt, error = %e, "Request failed"),
                }
                summary.record(&result);

                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(pace_ms)) => {}
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("Interrupted");
                        break;
                    }
                }
            }
        }
        Commands::CheckConfig { .. } => unreachable!("handled before startup"),
    }

    summary.final_state = Some(metrics.current_state());
    summary.transitions = metrics.snapshot();
    println!("{}", serde_json::to_string_pretty(&summary)?);

    tracing::debug!(states = ?registry.states(), "Registry state at exit");
    Ok(())
}
