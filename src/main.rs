//! Profile aggregator binary entrypoint.
//! Loads config + credentials, builds the transport, runs the requested sources and
//! writes the JSON report.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use profile_aggregator::{
    build_transport, collect_report, report, ConnectorRegistry, Credentials, LexiconScorer,
    Orchestrator, RunConfig, SourceRequest,
};

#[derive(Debug, Parser)]
#[command(name = "profile-aggregator", version, about = "Aggregate public profile data into one report")]
struct Cli {
    /// Requests as SOURCE=TARGET, e.g. `reddit=alice twitter=@alice`.
    #[arg(required = true, value_name = "SOURCE=TARGET")]
    requests: Vec<String>,

    /// Route all traffic through the configured proxy (self-checked before use).
    #[arg(long, conflicts_with = "no_proxy")]
    proxy: bool,

    /// Force a direct connection even if the config enables the proxy.
    #[arg(long)]
    no_proxy: bool,

    /// Run config TOML (defaults to $OSINT_RUN_CONFIG, then config/run.toml).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Credentials JSON (defaults to $OSINT_CREDENTIALS, then credentials.json).
    #[arg(long, value_name = "PATH")]
    credentials: Option<PathBuf>,

    /// Directory for the report file.
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Also print the full report JSON to stdout.
    #[arg(long)]
    print_json: bool,
}

/// Compact logs by default; `OSINT_LOG_JSON=1` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("profile_aggregator=info,warn"));
    let json = std::env::var("OSINT_LOG_JSON").ok().is_some_and(|v| v == "1");

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

fn parse_requests(raw: &[String]) -> Result<Vec<SourceRequest>> {
    raw.iter()
        .map(|p| {
            SourceRequest::parse_pair(p)
                .ok_or_else(|| anyhow!("invalid request '{p}', expected SOURCE=TARGET"))
        })
        .collect()
}

async fn run(cli: Cli) -> Result<()> {
    let mut cfg = match &cli.config {
        Some(p) => RunConfig::load_from(p)?,
        None => RunConfig::load_default()?,
    };
    if cli.proxy {
        cfg.transport.use_proxy = true;
    }
    if cli.no_proxy {
        cfg.transport.use_proxy = false;
    }
    if let Some(dir) = cli.output_dir {
        cfg.output_dir = dir;
    }

    let credentials = match &cli.credentials {
        Some(p) => Credentials::load_from(p)?,
        None => Credentials::load_default()?,
    };
    let requests = parse_requests(&cli.requests)?;

    // Fail fast: a broken proxy invalidates every fetch.
    let transport = build_transport(&cfg.transport)
        .await
        .context("transport unavailable; aborting before any fetch")?;

    let orchestrator =
        Orchestrator::from_config(&cfg, ConnectorRegistry::with_defaults(), credentials, transport);
    let report = collect_report(&orchestrator, requests, &LexiconScorer::new()).await;

    print!("{}", report::render_summary(&report));
    let path = report::write_report(&report, &cfg.output_dir)?;
    println!("Report saved to {}", path.display());

    if cli.print_json {
        println!("{}", report.to_json_pretty()?);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = ?e, "run failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
