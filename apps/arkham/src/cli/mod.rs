//! Command-line interface.
//!
//! Every `cmd_*` function writes its report to the supplied writer so the
//! integration tests can capture it.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arkham_core::journal::LogFilter;
use arkham_core::optimizer::{DEFAULT_MAX_ALTERNATIVES, OptimizationPriority};
use arkham_core::storage::{Collection, DocumentStore};
use clap::{Parser, Subcommand};
use serde_json::json;

use crate::agent::{Agent, OptimizeRequest, RouteQuery};
use crate::ledger::Ledger;
use crate::monitor::DashboardState;
use crate::{AppResult, Config};

/// Arkham AI - supply-chain risk scoring and rerouting.
#[derive(Parser, Debug)]
#[command(name = "arkham", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP server.
    Serve {
        #[arg(long, env = "HOST")]
        host: Option<String>,
        #[arg(long, env = "PORT")]
        port: Option<u16>,
    },
    /// Score the risk of a route.
    Assess {
        origin: String,
        destination: String,
        /// Extra regions along the route (repeatable).
        #[arg(long = "region")]
        regions: Vec<String>,
        /// Print the full assessment as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Rank alternatives to a route.
    Optimize {
        origin: String,
        destination: String,
        /// risk, cost, time or balanced.
        #[arg(long, default_value = "balanced")]
        priority: String,
        #[arg(long = "max", default_value_t = DEFAULT_MAX_ALTERNATIVES)]
        max_alternatives: usize,
    },
    /// List the demo routes and their current risk.
    Routes,
    /// Run one scripted disruption and print the dashboard.
    Disrupt {
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Write the log history to a JSON file.
    ExportLogs { path: PathBuf },
}

/// Agent without a document store, for one-shot commands.
fn agent(config: &Config) -> AppResult<Agent> {
    Agent::new(config, Arc::new(Ledger::new(None)))
}

// =============================================================================
// COMMANDS
// =============================================================================

pub async fn cmd_assess(
    config: &Config,
    origin: &str,
    destination: &str,
    regions: Vec<String>,
    json: bool,
    out: &mut impl Write,
) -> AppResult<()> {
    let agent = agent(config)?;
    let assessment = agent
        .assess(&RouteQuery::new(origin, destination).regions(regions))
        .await;

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&assessment)?)?;
        return Ok(());
    }

    let b = &assessment.breakdown;
    writeln!(out, "Route:       {} -> {}", assessment.origin, assessment.destination)?;
    writeln!(
        out,
        "Risk:        {:.3} ({:?})",
        assessment.overall_risk_score, assessment.risk_level
    )?;
    writeln!(
        out,
        "Breakdown:   trade {:.3}, political {:.3}, ports {:.3}",
        b.trade_news, b.political, b.port_congestion
    )?;
    writeln!(out, "Confidence:  {:.2}", assessment.confidence)?;
    for factor in &assessment.contributing_factors {
        writeln!(out, "  - [{:.2}] {} ({})", factor.severity, factor.title, factor.location)?;
    }
    writeln!(out, "{}", assessment.recommendation)?;
    Ok(())
}

pub async fn cmd_optimize(
    config: &Config,
    origin: &str,
    destination: &str,
    priority: &str,
    max_alternatives: usize,
    out: &mut impl Write,
) -> AppResult<()> {
    let agent = agent(config)?;
    let mut request = OptimizeRequest::new(origin, destination);
    request.priority = OptimizationPriority::parse(priority);
    request.max_alternatives = max_alternatives;
    request.include_predictions = false;

    let result = agent.optimize(&request).await;
    let original = &result.original_route;
    writeln!(
        out,
        "Original {}: risk {:.3}, {:.1} days, ${:.0}",
        original.route_id, original.metrics.risk_score, original.metrics.time_days, original.metrics.cost_usd
    )?;
    for route in &result.optimized_routes {
        writeln!(
            out,
            "#{} {} via {}: score {:.3}, risk {:.3}, {:.1} days, ${:.0}",
            route.rank,
            route.route_id,
            route.waypoints.join(" > "),
            route.optimization_score,
            route.metrics.risk_score,
            route.metrics.time_days,
            route.metrics.cost_usd
        )?;
    }
    writeln!(out, "{}", result.recommendation)?;
    Ok(())
}

pub fn cmd_routes(out: &mut impl Write) -> AppResult<()> {
    let state = DashboardState::new();
    let view = state.dashboard().view();
    for route in &view.routes {
        writeln!(
            out,
            "{:<10} {:<32} {:>3} days  ${:>7}  risk {:>3}%{}",
            route.route.id,
            route.route.name,
            route.transit_days,
            route.cost_usd,
            route.risk.percent(),
            if route.active { "  (active)" } else { "" }
        )?;
    }
    Ok(())
}

pub fn cmd_disrupt(seed: Option<u64>, out: &mut impl Write) -> AppResult<()> {
    let mut state = seed.map_or_else(DashboardState::new, DashboardState::seeded);
    let disruption = state.trigger_disruption();
    let recommendation = state.dashboard().canned_recommendation();
    state
        .dashboard_mut()
        .record_recommendation(chrono::Utc::now(), &recommendation);

    let report = json!({
        "disruption": disruption,
        "recommendation": recommendation,
        "dashboard": state.dashboard().view(),
    });
    writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
    Ok(())
}

/// Export logs to `path`. Reads the store's log collection when one is
/// configured, otherwise this process's (empty) journal.
pub async fn cmd_export_logs(config: &Config, path: &Path, out: &mut impl Write) -> AppResult<usize> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let count = match &config.store_path {
        Some(store_path) => {
            let store = DocumentStore::open(store_path, &config.database_name)?;
            let logs = store.documents(Collection::Logs, LogFilter::for_export().limit)?;
            std::fs::write(path, serde_json::to_string_pretty(&logs)?)?;
            logs.len()
        }
        None => {
            Ledger::new(None)
                .export(path, &LogFilter::for_export())
                .await?
        }
    };
    writeln!(out, "Exported {count} log entries to {}", path.display())?;
    Ok(count)
}

/// Dispatch a parsed command line.
pub async fn run(cli: Cli, mut config: Config) -> AppResult<()> {
    let mut stdout = std::io::stdout().lock();
    match cli.command {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            drop(stdout);
            crate::api::serve(config).await
        }
        Command::Assess {
            origin,
            destination,
            regions,
            json,
        } => cmd_assess(&config, &origin, &destination, regions, json, &mut stdout).await,
        Command::Optimize {
            origin,
            destination,
            priority,
            max_alternatives,
        } => cmd_optimize(&config, &origin, &destination, &priority, max_alternatives, &mut stdout).await,
        Command::Routes => cmd_routes(&mut stdout),
        Command::Disrupt { seed } => cmd_disrupt(seed, &mut stdout),
        Command::ExportLogs { path } => cmd_export_logs(&config, &path, &mut stdout).await.map(|_| ()),
    }
}
