//! XPR Lending Risk CLI
//!
//! Reads the XPR lending protocol tables and reports markets, oracle
//! prices, liquidatable and at-risk positions, or a single account's
//! position as a JSON envelope on stdout. Logs go to stderr.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use xpr_lending_api::LendingTools;
use xpr_lending_chain::{InMemoryTables, ProtonClient, TableQuery};
use xpr_lending_core::{EngineConfig, LendingEngine};

#[derive(Parser, Debug)]
#[command(name = "xpr-lending", version, about = "XPR lending health factor and liquidation scanner")]
struct Args {
    /// TOML configuration file (overrides --profile)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Named profile: default, testing, production
    #[arg(long, global = true)]
    profile: Option<String>,

    /// Serve tables from a JSON fixture instead of the network
    #[arg(long, global = true)]
    fixture: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List lending markets
    Markets,
    /// Show oracle prices
    Prices {
        /// Comma-separated symbols to keep
        #[arg(long, value_delimiter = ',')]
        symbols: Vec<String>,
    },
    /// Scan for liquidatable positions
    Liquidatable {
        /// Minimum liquidator profit in USD
        #[arg(long)]
        min_profit: Option<f64>,
    },
    /// Scan for positions close to liquidation
    AtRisk {
        /// Upper health factor bound
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Show one account's position
    Position {
        account: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("info,xpr_lending_core=debug,xpr_lending_chain=debug")
            }),
        )
        .init();

    let args = Args::parse();

    let config = load_config(&args)?;
    config.log_config();

    let source = table_source(&args, &config)?;
    let engine = LendingEngine::new(source, Arc::new(config));
    let tools = LendingTools::new(Arc::new(engine));

    let response = run(&tools, args.command).await;
    println!("{}", serde_json::to_string_pretty(&response)?);

    if response["success"] != true {
        std::process::exit(1);
    }
    Ok(())
}

fn load_config(args: &Args) -> Result<EngineConfig> {
    let config = match (&args.config, &args.profile) {
        (Some(path), _) => EngineConfig::from_file(path)
            .with_context(|| format!("Failed to load config file {path}"))?,
        (None, Some(profile)) => EngineConfig::load_profile(profile)
            .with_context(|| format!("Unknown profile: {profile}"))?,
        (None, None) => return Ok(EngineConfig::from_env()),
    };
    Ok(config.with_env_overrides())
}

fn table_source(args: &Args, config: &EngineConfig) -> Result<Arc<dyn TableQuery>> {
    if let Some(path) = &args.fixture {
        let tables = InMemoryTables::from_file(path)
            .with_context(|| format!("Failed to load fixture {path}"))?;
        info!(fixture = %path, "Serving tables from fixture");
        return Ok(Arc::new(tables));
    }

    let client = ProtonClient::with_endpoints(
        config.endpoints.all(),
        config.endpoints.request_timeout(),
    )?;
    info!(endpoints = ?client.endpoints(), "Proton API client ready");
    Ok(Arc::new(client))
}

async fn run(tools: &LendingTools, command: Command) -> Value {
    match command {
        Command::Markets => tools.get_lending_markets().await.to_json(),
        Command::Prices { symbols } => {
            let symbols = (!symbols.is_empty()).then_some(symbols);
            tools.get_oracle_prices(symbols).await.to_json()
        }
        Command::Liquidatable { min_profit } => {
            tools.get_liquidatable_positions(min_profit).await.to_json()
        }
        Command::AtRisk { threshold } => tools.get_at_risk_positions(threshold).await.to_json(),
        Command::Position { account } => tools.get_lending_position(&account).await.to_json(),
    }
}
