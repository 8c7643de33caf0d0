use std::path::{Path, PathBuf};

use cf_app::{AppError, AppResult, CanalService};
use cf_solver::NetworkSolution;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cf-cli")]
#[command(about = "CanalFlow CLI - gravity-fed canal network hydraulics", long_about = None)]
struct Cli {
    /// Network topology file (YAML or JSON)
    #[arg(short, long, global = true, default_value = "networks/demo.yaml")]
    network: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and compile the network file
    Validate,
    /// Solve steady levels and flows
    Solve {
        /// Print the full solution as JSON
        #[arg(long)]
        json: bool,
    },
    /// Propagate a flow release and report gate arrival times
    Propagate {
        /// Release node
        source: String,
        /// Released flow (m³/s)
        flow: f64,
        /// Split branches by the steady solution instead of link capacity
        #[arg(long)]
        solved: bool,
        /// Fixed branch fraction, LINK=FRACTION (repeatable)
        #[arg(long = "split", value_parser = parse_split)]
        splits: Vec<(String, f64)>,
    },
    /// Shortest path between two nodes, with travel time when a flow is given
    Path {
        from: String,
        to: String,
        /// Flow (m³/s) used for the travel time
        #[arg(long)]
        flow: Option<f64>,
    },
    /// Gate discharge for given levels and opening
    Discharge {
        gate: String,
        /// Upstream water level (m)
        upstream: f64,
        /// Downstream water level (m)
        downstream: f64,
        /// Gate opening (m)
        opening: f64,
    },
    /// Normal depth and velocity in a canal
    NormalDepth {
        upstream: String,
        downstream: String,
        /// Flow (m³/s)
        flow: f64,
    },
    /// Replay a communication-health feed through the gate mode machine
    ReplayComms {
        /// Feed file (YAML or JSON)
        feed: PathBuf,
    },
}

fn parse_split(raw: &str) -> Result<(String, f64), String> {
    let (link, fraction) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected LINK=FRACTION, got '{raw}'"))?;
    let fraction = fraction
        .parse::<f64>()
        .map_err(|e| format!("bad fraction '{fraction}': {e}"))?;
    Ok((link.to_string(), fraction))
}

fn main() -> AppResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let service = CanalService::load(&cli.network, Utc::now())?;

    match cli.command {
        Commands::Validate => cmd_validate(&cli.network, &service),
        Commands::Solve { json } => cmd_solve(&service, json),
        Commands::Propagate {
            source,
            flow,
            solved,
            splits,
        } => cmd_propagate(&service, &source, flow, solved, &splits),
        Commands::Path { from, to, flow } => cmd_path(&service, &from, &to, flow),
        Commands::Discharge {
            gate,
            upstream,
            downstream,
            opening,
        } => {
            let q = service.discharge(&gate, upstream, downstream, opening)?;
            println!("{gate}: Q = {q:.4} m³/s");
            Ok(())
        }
        Commands::NormalDepth {
            upstream,
            downstream,
            flow,
        } => {
            let nd = service.normal_depth(&upstream, &downstream, flow)?;
            let v = service.velocity(&upstream, &downstream, flow)?;
            println!(
                "{upstream}->{downstream}: y = {:.4} m, v = {v:.4} m/s ({} iterations)",
                nd.depth.value, nd.iterations
            );
            Ok(())
        }
        Commands::ReplayComms { feed } => cmd_replay(&service, &feed),
    }
}

fn cmd_validate(path: &Path, service: &CanalService) -> AppResult<()> {
    let net = service.network();
    println!("✓ {} is valid", path.display());
    println!(
        "  {} nodes, {} gates, {} canals",
        net.graph.nodes().len(),
        net.catalog.len(),
        net.geometry.len()
    );
    Ok(())
}

fn cmd_solve(service: &CanalService, json: bool) -> AppResult<()> {
    let solution = service.solve()?;
    if json {
        let out = serde_json::to_string_pretty(&solution)
            .map_err(|e| AppError::InvalidInput(e.to_string()))?;
        println!("{out}");
        return Ok(());
    }
    print_solution(service, &solution);
    Ok(())
}

fn print_solution(service: &CanalService, solution: &NetworkSolution) {
    let graph = &service.network().graph;
    if solution.converged {
        println!("✓ Converged in {} iterations", solution.iterations);
    } else {
        println!(
            "✗ Not converged after {} iterations (max imbalance {:.4} m³/s)",
            solution.iterations, solution.max_imbalance
        );
    }

    println!("Levels:");
    for node in graph.nodes() {
        println!("  {:<16} {:>10.3} m", node.name, solution.level(node.id));
    }
    println!("Flows:");
    for link in graph.links() {
        let opening = solution
            .opening(link.id)
            .map(|e| format!("  (opening {e:.3} m)"))
            .unwrap_or_default();
        println!(
            "  {:<16} {:>10.4} m³/s{opening}",
            link.name,
            solution.flow(link.id)
        );
    }
    if !solution.deliveries.is_empty() {
        println!("Deliveries:");
        for d in &solution.deliveries {
            println!(
                "  {:<16} target {:.4}, delivered {:.4}, shortfall {:.4}{}",
                d.node,
                d.target,
                d.delivered,
                d.shortfall,
                if d.saturated { " [saturated]" } else { "" }
            );
        }
    }
}

fn cmd_propagate(
    service: &CanalService,
    source: &str,
    flow: f64,
    solved: bool,
    splits: &[(String, f64)],
) -> AppResult<()> {
    let solution = if solved { Some(service.solve()?) } else { None };
    let result = service.propagate_with_splits(source, flow, solution.as_ref(), splits)?;

    println!("Release of {flow:.3} m³/s at {source}");
    println!("Gate arrivals:");
    for (gate, t) in &result.gate_arrivals {
        println!("  {gate:<16} {:>10.1} s ({:.2} h)", t, t / 3600.0);
    }
    if !result.unreachable_gates.is_empty() {
        println!("Unreachable: {}", result.unreachable_gates.join(", "));
    }
    Ok(())
}

fn cmd_path(service: &CanalService, from: &str, to: &str, flow: Option<f64>) -> AppResult<()> {
    let path = service.find_path(from, to)?;
    println!("{}", path.join(" -> "));
    if let Some(flow) = flow {
        let t = service.travel_time(from, to, flow)?;
        println!("Travel time at {flow:.3} m³/s: {t:.1} s ({:.2} h)", t / 3600.0);
    }
    Ok(())
}

fn cmd_replay(service: &CanalService, feed: &Path) -> AppResult<()> {
    let feed = cf_project::load_feed(feed)?;
    let summary = service.replay(&feed)?;

    println!("Replayed {} health checks", summary.processed);
    for t in &summary.transitions {
        println!(
            "  {} {}: {} -> {} ({:?})",
            t.at.to_rfc3339(),
            t.gate_id,
            t.from,
            t.to,
            t.severity
        );
    }
    println!("Modes:");
    for (gate, mode) in &summary.modes {
        println!("  {gate:<16} {mode}");
    }
    Ok(())
}
