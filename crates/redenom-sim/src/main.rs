//! redenom-sim: replay a scripted redenomination session in memory.
//!
//! ```sh
//! redenom-sim --config session.json --json-logs
//! RUST_LOG=redenom_matchcore=debug redenom-sim --mechanism double-auction
//! ```

mod config;
mod script;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use redenom_types::{MarketMechanism, constants};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::SimConfig;
use crate::script::ScriptedMarket;

#[derive(Parser, Debug)]
#[command(name = "redenom-sim", version, about = "Replay a scripted redenomination session")]
struct Cli {
    /// JSON file with a `SimConfig`; built-in defaults otherwise.
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Override the configured mechanism.
    #[arg(long, short = 'm', value_enum)]
    mechanism: Option<Mechanism>,

    /// Log level when `RUST_LOG` is unset.
    #[arg(long, env = "REDENOM_LOG", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mechanism {
    PostedOffer,
    DoubleAuction,
    Decentralized,
}

impl From<Mechanism> for MarketMechanism {
    fn from(m: Mechanism) -> Self {
        match m {
            Mechanism::PostedOffer => Self::PostedOffer,
            Mechanism::DoubleAuction => Self::DoubleAuction,
            Mechanism::Decentralized => Self::Decentralized,
        }
    }
}

fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter).with_target(false);
    if cli.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => SimConfig::from_json_file(path)?,
        None => SimConfig::default(),
    };
    if let Some(mechanism) = cli.mechanism {
        config.mechanism = mechanism.into();
    }
    info!(
        mechanism = %config.mechanism,
        sellers = config.seller_costs.len(),
        buyers = config.buyer_values.len(),
        "starting scripted run"
    );

    let market = ScriptedMarket::new(config);
    let simulation = market.run().await?;
    info!(
        events = market.broadcaster().deliveries().await.len(),
        "run complete"
    );
    println!("{}", serde_json::to_string_pretty(&simulation.stats)?);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);
    info!("redenom-sim v{}", constants::VERSION);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "scripted run failed");
            ExitCode::FAILURE
        }
    }
}
