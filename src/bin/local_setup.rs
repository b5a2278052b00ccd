//! Local Setup - bootstrap a test validator for the gasless purchase flow
//!
//! Requires `solana-test-validator` running with the let-me-buy program
//! loaded. Writes `.env`, `.kora-signer-key` and patches the relay config.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

use gasless_purchase::observability::init_logging;
use gasless_purchase::setup::{
    write_artifacts, LocalEndpoints, LocalKeys, LocalSetup, SetupPaths, DEFAULT_KORA_TOML,
    LOCAL_KORA_RPC_URL, LOCAL_RPC_URL, LOCAL_WS_URL,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Bootstrap a local validator for gasless purchases",
    long_about = None
)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Validator HTTP RPC endpoint
    #[arg(long, default_value = LOCAL_RPC_URL)]
    rpc_url: String,

    /// Validator websocket endpoint
    #[arg(long, default_value = LOCAL_WS_URL)]
    ws_url: String,

    /// Relay config whose mint placeholder gets replaced
    #[arg(long, default_value = DEFAULT_KORA_TOML)]
    kora_toml: PathBuf,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = init_logging(args.verbose) {
        eprintln!("Failed to initialize logging: {:#}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(args).await {
        error!("Setup failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    info!("=== Local Setup for Kora Gasless Purchase ===");

    info!("[1/6] Generating keypairs...");
    let keys = LocalKeys::generate();
    info!("  Relay signer:    {}", keys.relay_signer.pubkey());
    info!("  Buyer:           {}", keys.buyer.pubkey());
    info!("  Store authority: {}", keys.store_authority.pubkey());
    info!("  Fee-token mint:  {}", keys.mint.pubkey());

    let setup = LocalSetup::new(&args.rpc_url, &args.ws_url, keys);
    setup.provision().await?;

    info!("[6/6] Writing configuration files...");
    let cwd = std::env::current_dir().context("Failed to resolve working directory")?;
    let paths = SetupPaths::in_dir(&cwd).with_kora_toml(args.kora_toml);
    let endpoints = LocalEndpoints {
        kora_rpc_url: LOCAL_KORA_RPC_URL.to_string(),
        solana_rpc_url: args.rpc_url,
        solana_ws_url: args.ws_url,
    };
    write_artifacts(&paths, setup.keys(), &endpoints).await?;

    let signer_key = setup.keys().relay_signer.to_base58();
    println!();
    println!("=== Setup Complete ===");
    println!();
    println!("Next steps:");
    println!("  1. Export the relay signer key:");
    println!("     export KORA_PRIVATE_KEY=\"{}\"", signer_key);
    println!("  2. Start the Kora server:");
    println!("     cd server && kora rpc start --signers-config signers.toml");
    println!("  3. Run the purchase:");
    println!("     cargo run --bin gasless-purchase -- purchase");

    Ok(())
}
