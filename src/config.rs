//! Configuration module for the gasless purchase client
//!
//! All process configuration is read once at startup from environment
//! variables (optionally seeded from a `.env` file) into [`PurchaseConfig`],
//! which is then passed by reference into every component.

use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Mainnet USDC mint, used when `USDC_MINT` is not set
pub const DEFAULT_USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
pub const DEFAULT_KORA_RPC_URL: &str = "http://localhost:8080/";
pub const DEFAULT_SOLANA_RPC_URL: &str = "https://api.mainnet-beta.solana.com";
pub const DEFAULT_SOLANA_WS_URL: &str = "wss://api.mainnet-beta.solana.com";

/// Configuration errors, raised before any network call is attempted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} env variable is not set. {hint}")]
    Missing { name: &'static str, hint: &'static str },

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

impl ConfigError {
    pub fn category(&self) -> &'static str {
        match self {
            Self::Missing { .. } => "config_missing",
            Self::Invalid { .. } => "config_invalid",
        }
    }
}

/// Which lifetime checkpoint the final transaction is bound to
///
/// The relay quotes a fee against the estimation draft. `ReuseQuote` fetches a
/// fresh blockhash for the final pass and reuses that quote; `ReuseCheckpoint`
/// binds the final pass to the same blockhash the quote was produced for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuotePolicy {
    #[default]
    ReuseQuote,
    ReuseCheckpoint,
}

impl FromStr for QuotePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "reuse-quote" => Ok(Self::ReuseQuote),
            "reuse-checkpoint" => Ok(Self::ReuseCheckpoint),
            other => Err(ConfigError::Invalid {
                name: "QUOTE_POLICY",
                reason: format!("expected reuse-quote or reuse-checkpoint, got '{}'", other),
            }),
        }
    }
}

impl QuotePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReuseQuote => "reuse-quote",
            Self::ReuseCheckpoint => "reuse-checkpoint",
        }
    }
}

impl std::fmt::Display for QuotePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Kora relay JSON-RPC endpoint
    pub kora_rpc_url: String,

    /// Solana HTTP RPC endpoint (direct submission)
    pub solana_rpc_url: String,

    /// Solana websocket endpoint (confirmation subscription)
    pub solana_ws_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputeBudgetConfig {
    /// Maximum compute units the transaction may consume
    pub unit_limit: u32,

    /// Priority fee in micro-lamports per compute unit
    pub unit_price_micro_lamports: u64,
}

impl Default for ComputeBudgetConfig {
    fn default() -> Self {
        Self {
            unit_limit: default_compute_unit_limit(),
            unit_price_micro_lamports: default_compute_unit_price(),
        }
    }
}

/// Main application configuration
#[derive(Clone)]
pub struct PurchaseConfig {
    /// Base58-encoded 64-byte buyer secret key
    pub buyer_secret: String,

    pub store_name: String,
    pub product_name: String,
    pub table_number: u8,
    pub store_authority: Pubkey,

    /// Token the buyer pays the relay (and the store) in
    pub fee_mint: Pubkey,

    pub endpoints: EndpointConfig,
    pub compute_budget: ComputeBudgetConfig,

    /// Deadline for network confirmation in the two-step flow
    pub confirm_timeout: Duration,

    /// Per-request timeout for relay calls
    pub relay_timeout: Duration,

    pub quote_policy: QuotePolicy,
}

impl std::fmt::Debug for PurchaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PurchaseConfig")
            .field("buyer_secret", &"<redacted>")
            .field("store_name", &self.store_name)
            .field("product_name", &self.product_name)
            .field("table_number", &self.table_number)
            .field("store_authority", &self.store_authority)
            .field("fee_mint", &self.fee_mint)
            .field("endpoints", &self.endpoints)
            .field("compute_budget", &self.compute_budget)
            .field("confirm_timeout", &self.confirm_timeout)
            .field("relay_timeout", &self.relay_timeout)
            .field("quote_policy", &self.quote_policy)
            .finish()
    }
}

// Default value functions
fn default_compute_unit_limit() -> u32 { 300_000 }
fn default_compute_unit_price() -> u64 { 100_000 }
fn default_table_number() -> u8 { 1 }
fn default_confirm_timeout_secs() -> u64 { 60 }
fn default_relay_timeout_secs() -> u64 { 30 }

impl PurchaseConfig {
    /// Load configuration from the process environment, reading `.env` first
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    ///
    /// `BUYER_KEYPAIR` is checked first so a missing key is always the
    /// reported failure when several variables are absent.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let buyer_secret = get("BUYER_KEYPAIR").ok_or(ConfigError::Missing {
            name: "BUYER_KEYPAIR",
            hint: "Set it to a base58-encoded Solana secret key.",
        })?;

        let required_hint = "Copy .env.example to .env and fill in the values.";
        let store_name = get("STORE_NAME").ok_or(ConfigError::Missing {
            name: "STORE_NAME",
            hint: required_hint,
        })?;
        let product_name = get("PRODUCT_NAME").ok_or(ConfigError::Missing {
            name: "PRODUCT_NAME",
            hint: required_hint,
        })?;
        let store_authority = get("STORE_AUTHORITY").ok_or(ConfigError::Missing {
            name: "STORE_AUTHORITY",
            hint: required_hint,
        })?;
        let store_authority = parse_pubkey("STORE_AUTHORITY", &store_authority)?;

        let table_number = match get("TABLE_NUMBER") {
            Some(raw) => parse_number::<u8>("TABLE_NUMBER", &raw)?,
            None => default_table_number(),
        };

        let fee_mint = parse_pubkey(
            "USDC_MINT",
            &get("USDC_MINT").unwrap_or_else(|| DEFAULT_USDC_MINT.to_string()),
        )?;

        let endpoints = EndpointConfig {
            kora_rpc_url: get("KORA_RPC_URL").unwrap_or_else(|| DEFAULT_KORA_RPC_URL.to_string()),
            solana_rpc_url: get("SOLANA_RPC_URL")
                .unwrap_or_else(|| DEFAULT_SOLANA_RPC_URL.to_string()),
            solana_ws_url: get("SOLANA_WS_URL")
                .unwrap_or_else(|| DEFAULT_SOLANA_WS_URL.to_string()),
        };

        let compute_budget = ComputeBudgetConfig {
            unit_limit: match get("COMPUTE_UNIT_LIMIT") {
                Some(raw) => parse_number("COMPUTE_UNIT_LIMIT", &raw)?,
                None => default_compute_unit_limit(),
            },
            unit_price_micro_lamports: match get("COMPUTE_UNIT_PRICE") {
                Some(raw) => parse_number("COMPUTE_UNIT_PRICE", &raw)?,
                None => default_compute_unit_price(),
            },
        };

        let confirm_timeout = Duration::from_secs(match get("CONFIRM_TIMEOUT_SECS") {
            Some(raw) => parse_number("CONFIRM_TIMEOUT_SECS", &raw)?,
            None => default_confirm_timeout_secs(),
        });
        let relay_timeout = Duration::from_secs(match get("RELAY_TIMEOUT_SECS") {
            Some(raw) => parse_number("RELAY_TIMEOUT_SECS", &raw)?,
            None => default_relay_timeout_secs(),
        });

        let quote_policy = match get("QUOTE_POLICY") {
            Some(raw) => raw.parse()?,
            None => QuotePolicy::default(),
        };

        let config = Self {
            buyer_secret,
            store_name,
            product_name,
            table_number,
            store_authority,
            fee_mint,
            endpoints,
            compute_budget,
            confirm_timeout,
            relay_timeout,
            quote_policy,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would only fail later, deep inside a network flow
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.compute_budget.unit_limit == 0 {
            return Err(ConfigError::Invalid {
                name: "COMPUTE_UNIT_LIMIT",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.confirm_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                name: "CONFIRM_TIMEOUT_SECS",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_pubkey(name: &'static str, raw: &str) -> Result<Pubkey, ConfigError> {
    Pubkey::from_str(raw.trim()).map_err(|e| ConfigError::Invalid {
        name,
        reason: format!("'{}' is not a valid address: {}", raw, e),
    })
}

fn parse_number<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        name,
        reason: format!("'{}': {}", raw, e),
    })
}
