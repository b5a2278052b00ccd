//! Local validator bootstrap
//!
//! Provisions a disposable fixture on a local test validator: funded
//! keypairs, a 6-decimal fee-token mint, token balances, and a let-me-buy
//! store with one product. Then writes the artifacts the purchase binary and
//! a local relay expect. Every step is awaited in order; the first failure
//! aborts and nothing is rolled back.

#![allow(deprecated)]

use solana_sdk::{
    instruction::Instruction,
    native_token::LAMPORTS_PER_SOL,
    program_pack::Pack,
    pubkey::Pubkey,
    signature::Signature,
    system_instruction,
};
use spl_associated_token_account::instruction::create_associated_token_account_idempotent;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::program::{
    add_product_instruction, associated_token_address, initialize_store_instruction,
    ProgramClientError,
};
use crate::observability::TraceContext;
use crate::structured_logging::StructuredLogger;
use crate::submit::{DirectSubmitter, NetworkSubmitter, SolanaNetwork, SubmitError};
use crate::tx_builder::{ExecutionContext, TransactionBuilderError, TransactionDraft, TxSigner};
use crate::wallet::WalletManager;

pub const LOCAL_RPC_URL: &str = "http://127.0.0.1:8899";
pub const LOCAL_WS_URL: &str = "ws://127.0.0.1:8900";
pub const LOCAL_KORA_RPC_URL: &str = "http://localhost:8080/";

pub const STORE_NAME: &str = "kora-test-store";
pub const PRODUCT_NAME: &str = "coffee";
/// 2 tokens at 6 decimals
pub const PRODUCT_PRICE: u64 = 2_000_000;
pub const MINT_DECIMALS: u8 = 6;
/// 100 tokens at 6 decimals
pub const MINT_AMOUNT: u64 = 100_000_000;

pub const RELAY_SIGNER_AIRDROP: u64 = 2 * LAMPORTS_PER_SOL;
pub const STORE_AUTHORITY_AIRDROP: u64 = LAMPORTS_PER_SOL;
/// Only the direct-purchase path spends it
pub const BUYER_AIRDROP: u64 = LAMPORTS_PER_SOL / 10;

/// Token placeholder in the relay's config template
pub const KORA_TOML_PLACEHOLDER: &str = "PLACEHOLDER_USDC_MINT";
pub const DEFAULT_KORA_TOML: &str = "server/kora.toml";
pub const ENV_FILE: &str = ".env";
pub const SIGNER_KEY_FILE: &str = ".kora-signer-key";

const SETUP_CONFIRM_TIMEOUT: Duration = Duration::from_secs(60);
const SETUP_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("{step} failed: {source}")]
    Network {
        step: &'static str,
        #[source]
        source: SubmitError,
    },

    #[error("{step} failed: {message}")]
    Instruction { step: &'static str, message: String },

    #[error(transparent)]
    Program(#[from] ProgramClientError),

    #[error("{step} failed: {source}")]
    Build {
        step: &'static str,
        #[source]
        source: TransactionBuilderError,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid TOML after substitution: {reason}")]
    InvalidToml { path: PathBuf, reason: String },
}

impl SetupError {
    pub fn category(&self) -> &'static str {
        match self {
            Self::Network { source, .. } => source.category(),
            Self::Instruction { .. } => "instruction",
            Self::Program(e) => e.category(),
            Self::Build { source, .. } => source.category(),
            Self::Io { .. } => "io",
            Self::InvalidToml { .. } => "config_invalid",
        }
    }

    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Keypairs generated for the fixture
#[derive(Debug, Clone)]
pub struct LocalKeys {
    /// Relay fee payer, also the mint authority
    pub relay_signer: WalletManager,
    pub buyer: WalletManager,
    pub store_authority: WalletManager,
    pub mint: WalletManager,
}

impl LocalKeys {
    pub fn generate() -> Self {
        Self {
            relay_signer: WalletManager::generate(),
            buyer: WalletManager::generate(),
            store_authority: WalletManager::generate(),
            mint: WalletManager::generate(),
        }
    }
}

/// Endpoints written into the generated `.env`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEndpoints {
    pub kora_rpc_url: String,
    pub solana_rpc_url: String,
    pub solana_ws_url: String,
}

impl Default for LocalEndpoints {
    fn default() -> Self {
        Self {
            kora_rpc_url: LOCAL_KORA_RPC_URL.to_string(),
            solana_rpc_url: LOCAL_RPC_URL.to_string(),
            solana_ws_url: LOCAL_WS_URL.to_string(),
        }
    }
}

/// Where setup artifacts are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupPaths {
    pub env_file: PathBuf,
    pub kora_toml: PathBuf,
    pub signer_key_file: PathBuf,
}

impl SetupPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            env_file: dir.join(ENV_FILE),
            kora_toml: dir.join(DEFAULT_KORA_TOML),
            signer_key_file: dir.join(SIGNER_KEY_FILE),
        }
    }

    pub fn with_kora_toml(mut self, path: impl Into<PathBuf>) -> Self {
        self.kora_toml = path.into();
        self
    }
}

/// `.env` contents consumed by the purchase binary
pub fn render_env_file(keys: &LocalKeys, endpoints: &LocalEndpoints) -> String {
    format!(
        "# Auto-generated by local_setup\n\
         KORA_RPC_URL={kora}\n\
         SOLANA_RPC_URL={rpc}\n\
         SOLANA_WS_URL={ws}\n\
         \n\
         # Buyer keypair (address: {buyer})\n\
         BUYER_KEYPAIR={buyer_secret}\n\
         \n\
         # Store configuration\n\
         STORE_NAME={store}\n\
         PRODUCT_NAME={product}\n\
         TABLE_NUMBER=1\n\
         \n\
         # Store authority (address: {authority})\n\
         STORE_AUTHORITY={authority}\n\
         \n\
         # Local test fee-token mint\n\
         USDC_MINT={mint}\n",
        kora = endpoints.kora_rpc_url,
        rpc = endpoints.solana_rpc_url,
        ws = endpoints.solana_ws_url,
        buyer = keys.buyer.pubkey(),
        buyer_secret = keys.buyer.to_base58(),
        store = STORE_NAME,
        product = PRODUCT_NAME,
        authority = keys.store_authority.pubkey(),
        mint = keys.mint.pubkey(),
    )
}

/// Replace every mint placeholder and check the result still parses
pub fn substitute_mint_placeholder(
    path: &Path,
    contents: &str,
    mint: &Pubkey,
) -> Result<String, SetupError> {
    let updated = contents.replace(KORA_TOML_PLACEHOLDER, &mint.to_string());
    toml::from_str::<toml::Value>(&updated).map_err(|e| SetupError::InvalidToml {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(updated)
}

/// Rewrite the relay config in place; the file must already exist
pub async fn update_kora_toml(path: &Path, mint: &Pubkey) -> Result<(), SetupError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SetupError::io(path, e))?;

    let updated = substitute_mint_placeholder(path, &contents, mint)?;
    tokio::fs::write(path, updated)
        .await
        .map_err(|e| SetupError::io(path, e))
}

/// Write `.env`, the relay config and the relay signer key file
pub async fn write_artifacts(
    paths: &SetupPaths,
    keys: &LocalKeys,
    endpoints: &LocalEndpoints,
) -> Result<(), SetupError> {
    tokio::fs::write(&paths.env_file, render_env_file(keys, endpoints))
        .await
        .map_err(|e| SetupError::io(&paths.env_file, e))?;
    info!(path = %paths.env_file.display(), "Environment file written");

    update_kora_toml(&paths.kora_toml, &keys.mint.pubkey()).await?;
    info!(path = %paths.kora_toml.display(), "Relay config updated with mint");

    tokio::fs::write(&paths.signer_key_file, keys.relay_signer.to_base58())
        .await
        .map_err(|e| SetupError::io(&paths.signer_key_file, e))?;
    Ok(())
}

/// Sequential bootstrap against a local validator
pub struct LocalSetup {
    network: SolanaNetwork,
    sender: DirectSubmitter,
    keys: LocalKeys,
}

impl LocalSetup {
    pub fn new(rpc_url: &str, ws_url: &str, keys: LocalKeys) -> Self {
        let logger = StructuredLogger::for_trace(&TraceContext::new("local_setup"));
        Self {
            network: SolanaNetwork::new(rpc_url, ws_url, SETUP_REQUEST_TIMEOUT),
            sender: DirectSubmitter::new(logger).with_confirm_timeout(SETUP_CONFIRM_TIMEOUT),
            keys,
        }
    }

    pub fn keys(&self) -> &LocalKeys {
        &self.keys
    }

    /// Run steps 2 through 5; artifacts are written separately
    pub async fn provision(&self) -> Result<(), SetupError> {
        info!("[2/6] Airdropping SOL...");
        self.airdrop(&self.keys.relay_signer.pubkey(), RELAY_SIGNER_AIRDROP)
            .await?;
        info!("  Relay signer: 2 SOL");
        self.airdrop(&self.keys.store_authority.pubkey(), STORE_AUTHORITY_AIRDROP)
            .await?;
        info!("  Store authority: 1 SOL");
        self.airdrop(&self.keys.buyer.pubkey(), BUYER_AIRDROP).await?;
        info!("  Buyer: 0.1 SOL (direct purchase only)");

        info!("[3/6] Creating local fee-token mint...");
        self.create_mint().await?;

        info!("[4/6] Minting tokens to buyer and relay signer...");
        self.fund_token_accounts().await?;

        info!("[5/6] Initializing let-me-buy store...");
        self.initialize_store().await?;
        Ok(())
    }

    async fn airdrop(&self, to: &Pubkey, lamports: u64) -> Result<Signature, SetupError> {
        const STEP: &str = "airdrop";
        let signature = self
            .network
            .rpc()
            .request_airdrop(to, lamports)
            .await
            .map_err(|e| SetupError::Network {
                step: STEP,
                source: SubmitError::from_client_error(None, e),
            })?;

        match tokio::time::timeout(
            SETUP_CONFIRM_TIMEOUT,
            self.network.wait_for_confirmation(&signature),
        )
        .await
        {
            Ok(Ok(())) => Ok(signature),
            Ok(Err(source)) => Err(SetupError::Network { step: STEP, source }),
            Err(_) => Err(SetupError::Network {
                step: STEP,
                source: SubmitError::ConfirmationTimeout {
                    signature,
                    timeout: SETUP_CONFIRM_TIMEOUT,
                },
            }),
        }
    }

    /// Build, sign and confirm one transaction paid by `payer`
    async fn send_instructions(
        &self,
        step: &'static str,
        payer: &WalletManager,
        extra_signers: &[&WalletManager],
        instructions: Vec<Instruction>,
    ) -> Result<Signature, SetupError> {
        let (blockhash, last_valid) = self
            .network
            .latest_blockhash()
            .await
            .map_err(|source| SetupError::Network { step, source })?;

        let mut signers = vec![TxSigner::keypair(payer.keypair_arc())];
        signers.extend(extra_signers.iter().map(|w| TxSigner::keypair(w.keypair_arc())));

        let mut draft = TransactionDraft::new()
            .with_fee_payer(TxSigner::keypair(payer.keypair_arc()))
            .with_lifetime(
                ExecutionContext::new(blockhash).with_last_valid_block_height(last_valid),
            );
        for ix in instructions {
            draft = draft.with_instruction(ix, signers.clone());
        }

        let output = draft
            .partially_sign()
            .map_err(|source| SetupError::Build { step, source })?;
        let receipt = self
            .sender
            .submit(&self.network, &output)
            .await
            .map_err(|source| SetupError::Network { step, source })?;

        info!("  {}: {}", step, receipt.signature);
        Ok(receipt.signature)
    }

    async fn create_mint(&self) -> Result<(), SetupError> {
        const STEP: &str = "create mint";
        let relay = &self.keys.relay_signer;
        let mint = &self.keys.mint;

        let rent = self
            .network
            .rpc()
            .get_minimum_balance_for_rent_exemption(spl_token::state::Mint::LEN)
            .await
            .map_err(|e| SetupError::Network {
                step: STEP,
                source: SubmitError::from_client_error(None, e),
            })?;

        let create = system_instruction::create_account(
            &relay.pubkey(),
            &mint.pubkey(),
            rent,
            spl_token::state::Mint::LEN as u64,
            &spl_token::id(),
        );
        let initialize = spl_token::instruction::initialize_mint(
            &spl_token::id(),
            &mint.pubkey(),
            &relay.pubkey(),
            None,
            MINT_DECIMALS,
        )
        .map_err(|e| SetupError::Instruction {
            step: STEP,
            message: e.to_string(),
        })?;

        self.send_instructions(STEP, relay, &[mint], vec![create, initialize])
            .await?;
        Ok(())
    }

    async fn fund_token_accounts(&self) -> Result<(), SetupError> {
        const STEP: &str = "create token accounts + mint";
        let relay = &self.keys.relay_signer;
        let mint = self.keys.mint.pubkey();
        let token_program = spl_token::id();

        let mut instructions = Vec::with_capacity(4);
        for owner in [self.keys.buyer.pubkey(), relay.pubkey()] {
            instructions.push(create_associated_token_account_idempotent(
                &relay.pubkey(),
                &owner,
                &mint,
                &token_program,
            ));
        }
        for owner in [self.keys.buyer.pubkey(), relay.pubkey()] {
            let ix = spl_token::instruction::mint_to(
                &token_program,
                &mint,
                &associated_token_address(&owner, &mint),
                &relay.pubkey(),
                &[],
                MINT_AMOUNT,
            )
            .map_err(|e| SetupError::Instruction {
                step: STEP,
                message: e.to_string(),
            })?;
            instructions.push(ix);
        }

        self.send_instructions(STEP, relay, &[], instructions).await?;
        Ok(())
    }

    async fn initialize_store(&self) -> Result<(), SetupError> {
        let authority = &self.keys.store_authority;

        let init = initialize_store_instruction(STORE_NAME, &authority.pubkey())?;
        self.send_instructions("store initialized", authority, &[], vec![init])
            .await?;

        let add = add_product_instruction(
            STORE_NAME,
            PRODUCT_NAME,
            PRODUCT_PRICE,
            &authority.pubkey(),
            &self.keys.mint.pubkey(),
        )?;
        self.send_instructions("product added", authority, &[], vec![add])
            .await?;
        Ok(())
    }
}
