//! l2index CLI: runs the checkpoint monitors and inspects their store.
//!
//! # Commands
//! ```text
//! l2index run                                   run every configured monitor
//! l2index status   [--json]                     cursors and record counts
//! l2index backfill --network <n> --to-block <b> operator rewind
//! l2index verify   --network <n> [--apply]      one-shot reorg re-check
//! l2index query    --network <n> --l2-block <b> first checkpoint at or after an L2 block
//! l2index networks                              built-in network registry
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

use l2index_core::Network;

mod cmd_inspect;
mod cmd_run;
mod config;
mod logging;

use config::{AppConfig, InstanceArgs};

#[derive(Parser)]
#[command(
    name = "l2index",
    about = "L2 rollup checkpoint monitor",
    long_about = "
Scans L1 for rollup checkpoint events (OP Stack OutputProposed, Arbitrum
SendRootUpdated) and stores one record per L2 block, correcting for reorgs.

ENVIRONMENT VARIABLES:
  L2INDEX_CONFIG   YAML config file with a `monitors` list
  CHAIN_NAME       single-instance rollup: optimism | base | zora | arbitrum
  CHAIN_TYPE       single-instance L1 network: mainnet | sepolia | goerli
  RPC_URL          L1 RPC endpoints, comma-separated
  L2_RPC_URL       L2 RPC endpoints (arbitrum), comma-separated
  DB_URL           store URL: postgresql://…, sqlite:…, memory://
  RUST_LOG         overrides the configured log level
",
    version
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    instance: InstanceArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every configured monitor until Ctrl-C / SIGTERM
    Run,

    /// Show stored cursors, record counts and latest checkpoints
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete records above an L1 block and rescan from there
    Backfill {
        /// Network, e.g. optimism_mainnet
        #[arg(long)]
        network: Network,
        /// Last L1 block to keep
        #[arg(long)]
        to_block: u64,
    },

    /// Re-check stored L1 anchors against the canonical chain
    Verify {
        #[arg(long)]
        network: Network,
        /// Roll back from the first mismatch instead of only reporting it
        #[arg(long)]
        apply: bool,
    },

    /// Find the first checkpoint at or after an L2 block
    Query {
        #[arg(long)]
        network: Network,
        #[arg(long)]
        l2_block: u64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the built-in networks
    Networks {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::resolve(&cli.instance)?;
    if cli.verbose {
        config.log.level = "debug".to_string();
    }
    logging::init_tracing(&config.log);

    match cli.command {
        Commands::Run => cmd_run::run(config).await,
        Commands::Status { json } => cmd_inspect::status(&config, json).await,
        Commands::Backfill { network, to_block } => {
            cmd_inspect::backfill(&config, network, to_block).await
        }
        Commands::Verify { network, apply } => cmd_inspect::verify(&config, network, apply).await,
        Commands::Query {
            network,
            l2_block,
            json,
        } => cmd_inspect::query(&config, network, l2_block, json).await,
        Commands::Networks { json } => cmd_inspect::networks(json),
    }
}
