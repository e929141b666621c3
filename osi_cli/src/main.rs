mod terminal;

use anyhow::Context;
use clap::Parser;
use osi_dashboard::{DashboardConfig, DashboardHandle, DashboardRuntime, RestorePolicy, TopologyMode};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "osi_cli", about = "Terminal front end for the OSI layer analysis dashboard")]
struct Args {
    /// Analysis service endpoint (overrides OSI_WS_URL).
    #[arg(long)]
    ws_url: Option<String>,

    /// Start a scan of this target on launch.
    #[arg(long)]
    target: Option<String>,

    /// Play the encapsulation walkthrough on launch.
    #[arg(long, default_value_t = false)]
    stack: bool,

    /// Start the simulated DDoS overlay on launch.
    #[arg(long, default_value_t = false)]
    attack: bool,

    /// `osi` or `tcp_ip`.
    #[arg(long)]
    topology: Option<TopologyMode>,

    /// Panel content after the overlay ends: `placeholder` or `prior`.
    #[arg(long)]
    restore: Option<RestorePolicy>,

    #[arg(long)]
    seed: Option<u64>,

    /// Print panels as JSON lines.
    #[arg(long, default_value_t = false)]
    json: bool,

    /// How long to keep running after stdin closes.
    #[arg(long, default_value_t = 6000)]
    linger_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    osi_dashboard::init_tracing("warn");

    let mut config = DashboardConfig::from_env().context("invalid OSI_* environment")?;
    if let Some(url) = args.ws_url.clone() {
        config.ws_url = url;
    }
    if let Some(mode) = args.topology {
        config.topology = mode;
    }
    if let Some(policy) = args.restore {
        config.attack.restore = policy;
    }
    if args.seed.is_some() {
        config.attack.seed = args.seed;
    }

    let (runtime, handle) = DashboardRuntime::new(&config, terminal::sinks(args.json))
        .with_context(|| format!("cannot start dashboard against {}", config.ws_url))?;
    info!(ws_url = %config.ws_url, "dashboard ready");

    let driver = drive(handle, &args);
    let (_dashboard, outcome) = tokio::join!(runtime.run(), driver);
    outcome
}

async fn drive(handle: DashboardHandle, args: &Args) -> anyhow::Result<()> {
    if let Some(target) = args.target.as_deref() {
        handle.start_analysis(target).await?;
    }
    if args.stack {
        handle.trigger_sequence().await?;
    }
    if args.attack {
        handle.trigger_attack().await?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
        match cmd {
            "" => {}
            "scan" => handle.start_analysis(rest.trim()).await?,
            "stack" => handle.trigger_sequence().await?,
            "attack" => handle.trigger_attack().await?,
            "quit" | "exit" => return Ok(()),
            other => eprintln!("unknown command {other:?} (scan <target> | stack | attack | quit)"),
        }
    }

    tokio::time::sleep(Duration::from_millis(args.linger_ms)).await;
    Ok(())
}
