//! gasless-purchase - buy from a let-me-buy store without holding SOL
//!
//! Builds a `make_purchase` transaction, has a Kora relay quote and pay the
//! network fee in exchange for a token payment, and submits it.
//!
//! ## Commands
//!
//! - **purchase**: relay co-signs, we broadcast and wait for confirmation
//! - **purchase-fire-and-forget**: relay co-signs and broadcasts
//! - **direct-purchase**: buyer pays fees in SOL, no relay involved

#![deny(unused_imports)]
#![deny(unused_mut)]
#![deny(unused_variables)]
#![warn(unused_must_use)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{error, info};

use gasless_purchase::config::PurchaseConfig;
use gasless_purchase::observability::init_logging;
use gasless_purchase::purchase::{GaslessPurchase, PurchasePlan};
use gasless_purchase::relay::KoraClient;
use gasless_purchase::submit::SolanaNetwork;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Relay co-signs; submit to the network and wait for confirmation
    Purchase,

    /// Relay co-signs and broadcasts; only the relay signer is reported
    PurchaseFireAndForget,

    /// Buyer pays network fees and submits without the relay
    DirectPurchase,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = init_logging(args.verbose) {
        eprintln!("Failed to initialize logging: {:#}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(args.command).await {
        error!("❌ {:#}", e);
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> Result<()> {
    info!("🚀 gasless-purchase {}", env!("CARGO_PKG_VERSION"));

    let config = PurchaseConfig::from_env().context("Failed to load configuration")?;
    let plan = PurchasePlan::from_config(&config)?;

    info!("💼 Buyer: {}", plan.buyer());
    info!(
        "🏪 Store: {} / product: {} / table: {}",
        config.store_name, config.product_name, config.table_number
    );
    info!("🪙 Fee token: {}", config.fee_mint);

    let network = SolanaNetwork::new(
        &config.endpoints.solana_rpc_url,
        &config.endpoints.solana_ws_url,
        config.relay_timeout,
    );

    match command {
        Commands::DirectPurchase => {
            info!("Submitting directly via {}", config.endpoints.solana_rpc_url);
            let receipt = plan.run_direct(&network).await?;
            info!(
                "✅ Purchase confirmed: {} ({} ms)",
                receipt.signature,
                receipt.elapsed.as_millis()
            );
        }
        Commands::Purchase | Commands::PurchaseFireAndForget => {
            info!("📡 Relay: {}", config.endpoints.kora_rpc_url);
            let relay = KoraClient::new(config.endpoints.kora_rpc_url.clone(), config.relay_timeout)
                .context("Failed to create relay client")?;
            let purchase = GaslessPurchase::new(plan, Arc::new(relay));

            if command == Commands::Purchase {
                let receipt = purchase.run_two_step(&network).await?;
                info!(
                    "✅ Purchase confirmed: {} ({} ms)",
                    receipt.signature,
                    receipt.elapsed.as_millis()
                );
            } else {
                let signer = purchase.run_fire_and_forget().await?;
                info!("✅ Transaction sent by relay signer {}", signer);
                info!("   Confirmation is not tracked in this mode");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subcommands_parse() {
        let args = Args::try_parse_from(["gasless-purchase", "-v", "purchase"]).unwrap();
        assert!(args.verbose);
        assert_eq!(args.command, Commands::Purchase);

        let args =
            Args::try_parse_from(["gasless-purchase", "purchase-fire-and-forget"]).unwrap();
        assert_eq!(args.command, Commands::PurchaseFireAndForget);

        let args = Args::try_parse_from(["gasless-purchase", "direct-purchase"]).unwrap();
        assert_eq!(args.command, Commands::DirectPurchase);
    }

    #[test]
    fn test_missing_subcommand_rejected() {
        assert!(Args::try_parse_from(["gasless-purchase"]).is_err());
    }
}
