use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use closedgate::cli::{self, Args};
use closedgate::clock::{Clock, SystemClock};
use closedgate::config::Config;
use closedgate::gate::ClosedHoursGate;
use closedgate::policy::GatingPolicy;
use closedgate::state::GateState;
use closedgate::status::{self, GateMetrics, StatusContext};
use closedgate::ticker::{self, run_ticker};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::parse_args();

    if args.help {
        cli::print_help();
        return Ok(());
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("closedgate=info".parse()?),
        )
        .init();

    if !args.errors.is_empty() {
        for e in &args.errors {
            error!("{}", e);
        }
        cli::print_help();
        std::process::exit(2);
    }

    info!("closedgate v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded");
    match &config.closed_hours {
        Some(hours) => info!(
            "  Closed hours: {:02}:00-{:02}:00 ({})",
            hours.start_hour,
            hours.end_hour,
            hours.time_zone.as_deref().unwrap_or("local time")
        ),
        None => warn!("  Closed hours not configured; gate is always open"),
    }
    info!("  Routes: open={} closed={}", config.open_route, config.closed_route);
    info!("  Tick interval: {}ms", config.tick_interval_ms);

    // Handle --validate mode
    if args.validate {
        info!("Validating configuration...");
        match config.validate() {
            Ok(()) => {
                info!("Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        }
    }

    let gate = config.build_gate()?;
    let policy = config.build_policy();

    if args.once {
        return print_once(&gate, &policy, &args);
    }

    run_service(config, gate, policy).await
}

/// Evaluate once and print the result as JSON
fn print_once(gate: &ClosedHoursGate, policy: &GatingPolicy, args: &Args) -> Result<()> {
    let now = args.at.unwrap_or_else(|| SystemClock.now());
    let snapshot = gate.evaluate(now);

    let mut output = serde_json::json!({
        "state": GateState::from_closed(snapshot.closed),
        "closed": snapshot.closed,
        "remaining": snapshot.remaining,
        "evaluatedAt": snapshot.evaluated_at,
    });

    if let Some(path) = &args.path {
        let decision = policy.decide(path, snapshot.closed);
        output["path"] = serde_json::json!(path);
        output["decision"] = serde_json::json!(decision);
        output["target"] = serde_json::json!(policy.target(decision));
    }

    let text = serde_json::to_string_pretty(&output).context("Failed to format result")?;
    println!("{}", text);
    Ok(())
}

/// Poll the gate and serve status until Ctrl-C
async fn run_service(config: Config, gate: ClosedHoursGate, policy: GatingPolicy) -> Result<()> {
    let metrics = Arc::new(GateMetrics::new());
    let (publisher, snapshots) = ticker::snapshot_channel();
    let shutdown = CancellationToken::new();

    // Start status server if configured
    let status_handle = config.status_port.map(|port| {
        let context = Arc::new(StatusContext {
            snapshots: snapshots.clone(),
            policy,
            metrics: metrics.clone(),
        });
        let cancel = shutdown.clone();
        tokio::spawn(async move {
            status::run_status_server(port, context, cancel).await;
        })
    });

    let ticker_handle = {
        let metrics = metrics.clone();
        let cancel = shutdown.clone();
        let interval = config.tick_interval();
        tokio::spawn(async move {
            run_ticker(&gate, &SystemClock, interval, &metrics, publisher, cancel).await;
        })
    };

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown requested");
    shutdown.cancel();

    if let Err(e) = ticker_handle.await {
        error!("Ticker task error: {}", e);
    }
    if let Some(handle) = status_handle {
        if let Err(e) = handle.await {
            error!("Status server task error: {}", e);
        }
    }

    let status = metrics.status();
    info!(
        "Stopped after {} evaluations and {} state changes",
        status.ticks, status.transitions
    );

    Ok(())
}
