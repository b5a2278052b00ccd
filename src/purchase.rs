//! Purchase orchestration
//!
//! A purchase is assembled in stages:
//!
//! 1. **estimate**: relay fee payer as a placeholder signer, the relay's
//!    current blockhash, compute budget, `make_purchase`
//! 2. **quote**: the estimate's wire form goes to the relay, which answers
//!    with a fee and a ready-made token payment instruction
//! 3. **final**: same compute budget and purchase instruction plus the
//!    payment instruction, bound to the checkpoint chosen by [`QuotePolicy`]
//!
//! The final transaction carries the buyer's signature only; the relay adds
//! its own when submitting. [`PurchasePlan::run_direct`] skips the relay
//! entirely and has the buyer pay network fees.

use solana_sdk::{hash::Hash, pubkey::Pubkey};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::info;

use crate::config::{ComputeBudgetConfig, ConfigError, PurchaseConfig, QuotePolicy};
use crate::observability::TraceContext;
use crate::program::{make_purchase_instruction, MakePurchaseParams, ProgramClientError};
use crate::relay::{FeeRelay, PayerSigner, PaymentQuote, RelayError};
use crate::structured_logging::StructuredLogger;
use crate::submit::{
    DirectSubmitter, NetworkSubmitter, SubmissionDriver, SubmissionReceipt, SubmitError,
};
use crate::tx_builder::{
    ExecutionContext, TransactionBuilderError, TransactionDraft, TxBuildOutput, TxSigner,
};
use crate::wallet::WalletManager;

#[derive(Error, Debug)]
pub enum PurchaseError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Instruction error: {0}")]
    Program(#[from] ProgramClientError),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error("Transaction build error: {0}")]
    Build(#[from] TransactionBuilderError),

    #[error(transparent)]
    Submit(#[from] SubmitError),
}

impl PurchaseError {
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(e) => e.category(),
            Self::Program(e) => e.category(),
            Self::Relay(e) => e.category(),
            Self::Build(e) => e.category(),
            Self::Submit(e) => e.category(),
        }
    }
}

/// Relay-independent description of one purchase
#[derive(Debug, Clone)]
pub struct PurchasePlan {
    buyer: WalletManager,
    store_name: String,
    product_name: String,
    table_number: u8,
    store_authority: Pubkey,
    fee_mint: Pubkey,
    compute_budget: ComputeBudgetConfig,
    quote_policy: QuotePolicy,
    confirm_timeout: Duration,
    trace: TraceContext,
}

impl PurchasePlan {
    /// Build a plan from loaded configuration; an unusable buyer key is
    /// reported as a configuration error
    pub fn from_config(config: &PurchaseConfig) -> Result<Self, PurchaseError> {
        let buyer =
            WalletManager::from_base58(&config.buyer_secret).map_err(|e| ConfigError::Invalid {
                name: "BUYER_KEYPAIR",
                reason: format!("{:#}", e),
            })?;

        Ok(Self {
            buyer,
            store_name: config.store_name.clone(),
            product_name: config.product_name.clone(),
            table_number: config.table_number,
            store_authority: config.store_authority,
            fee_mint: config.fee_mint,
            compute_budget: config.compute_budget,
            quote_policy: config.quote_policy,
            confirm_timeout: config.confirm_timeout,
            trace: TraceContext::new("purchase"),
        })
    }

    pub fn new(
        buyer: WalletManager,
        store_name: impl Into<String>,
        product_name: impl Into<String>,
        table_number: u8,
        store_authority: Pubkey,
        fee_mint: Pubkey,
    ) -> Self {
        Self {
            buyer,
            store_name: store_name.into(),
            product_name: product_name.into(),
            table_number,
            store_authority,
            fee_mint,
            compute_budget: ComputeBudgetConfig::default(),
            quote_policy: QuotePolicy::default(),
            confirm_timeout: crate::submit::DEFAULT_CONFIRM_TIMEOUT,
            trace: TraceContext::new("purchase"),
        }
    }

    pub fn with_compute_budget(mut self, compute_budget: ComputeBudgetConfig) -> Self {
        self.compute_budget = compute_budget;
        self
    }

    pub fn with_quote_policy(mut self, policy: QuotePolicy) -> Self {
        self.quote_policy = policy;
        self
    }

    pub fn with_confirm_timeout(mut self, timeout: Duration) -> Self {
        self.confirm_timeout = timeout;
        self
    }

    pub fn buyer(&self) -> Pubkey {
        self.buyer.pubkey()
    }

    pub fn fee_mint(&self) -> Pubkey {
        self.fee_mint
    }

    pub fn logger(&self) -> StructuredLogger {
        StructuredLogger::for_trace(&self.trace)
    }

    pub fn params(&self) -> MakePurchaseParams {
        MakePurchaseParams {
            store_name: self.store_name.clone(),
            product_name: self.product_name.clone(),
            table_number: self.table_number,
            buyer: self.buyer.pubkey(),
            store_authority: self.store_authority,
            mint: self.fee_mint,
        }
    }

    /// Draft with compute budget and the buyer-signed purchase instruction
    fn base_draft(
        &self,
        fee_payer: TxSigner,
        context: ExecutionContext,
    ) -> Result<TransactionDraft, PurchaseError> {
        let purchase_ix = make_purchase_instruction(&self.params())?;
        Ok(TransactionDraft::new()
            .with_fee_payer(fee_payer)
            .with_lifetime(context)
            .with_compute_unit_limit(self.compute_budget.unit_limit)
            .with_compute_unit_price(self.compute_budget.unit_price_micro_lamports)
            .with_instruction(purchase_ix, vec![TxSigner::keypair(self.buyer.keypair_arc())]))
    }

    /// Buyer pays network fees and submits straight to the cluster
    pub async fn run_direct(
        &self,
        network: &dyn NetworkSubmitter,
    ) -> Result<SubmissionReceipt, PurchaseError> {
        let started = Instant::now();
        let logger = self.logger();
        let span = self.trace.child_span("direct");
        logger.log_stage("direct", &span);

        let result = async {
            let (blockhash, last_valid) = network.latest_blockhash().await?;
            let context = ExecutionContext::new(blockhash)
                .with_last_valid_block_height(last_valid)
                .with_trace(span.clone());

            let output = self
                .base_draft(TxSigner::keypair(self.buyer.keypair_arc()), context)?
                .partially_sign()?;

            let sender =
                DirectSubmitter::new(logger.clone()).with_confirm_timeout(self.confirm_timeout);
            Ok::<_, PurchaseError>(sender.submit(network, &output).await?)
        }
        .await;

        self.log_outcome(&logger, &result, started);
        result
    }

    fn log_outcome(
        &self,
        logger: &StructuredLogger,
        result: &Result<SubmissionReceipt, PurchaseError>,
        started: Instant,
    ) {
        let latency_ms = started.elapsed().as_millis() as u64;
        match result {
            Ok(receipt) => logger.log_purchase_success(
                &self.store_name,
                &self.product_name,
                &receipt.signature.to_string(),
                latency_ms,
            ),
            Err(e) => logger.log_purchase_failure(e.category(), &e.to_string(), latency_ms),
        }
    }
}

/// Final relay-ready transaction and what it was built from
#[derive(Debug, Clone)]
pub struct PreparedPurchase {
    pub output: TxBuildOutput,
    pub payer: PayerSigner,
    pub quote: PaymentQuote,
    /// Checkpoint the quote was produced against
    pub estimate_blockhash: Hash,
}

/// Relay-backed purchase flows
pub struct GaslessPurchase {
    plan: PurchasePlan,
    relay: Arc<dyn FeeRelay>,
}

impl GaslessPurchase {
    pub fn new(plan: PurchasePlan, relay: Arc<dyn FeeRelay>) -> Self {
        Self { plan, relay }
    }

    pub fn plan(&self) -> &PurchasePlan {
        &self.plan
    }

    fn driver(&self) -> SubmissionDriver {
        SubmissionDriver::new(self.relay.clone(), self.plan.logger())
            .with_confirm_timeout(self.plan.confirm_timeout)
    }

    /// Run the estimate, quote and final stages
    pub async fn build_purchase_transaction(&self) -> Result<PreparedPurchase, PurchaseError> {
        let plan = &self.plan;
        let logger = plan.logger();

        let payer = self.relay.get_payer_signer().await?;
        info!(
            signer = %payer.signer_address,
            payment = %payer.payment_address,
            "Relay payer resolved"
        );
        let relay_payer = TxSigner::noop(payer.signer_address);

        let estimate_span = plan.trace.child_span("estimate");
        logger.log_stage("estimate", &estimate_span);
        let estimate_blockhash = self.relay.get_blockhash().await?;
        let estimate = plan
            .base_draft(
                relay_payer.clone(),
                ExecutionContext::new(estimate_blockhash).with_trace(estimate_span),
            )?
            .partially_sign()?;

        let quote_span = plan.trace.child_span("quote");
        logger.log_stage("quote", &quote_span);
        let quote = self
            .relay
            .get_payment_instruction(&estimate.wire, &plan.fee_mint, &plan.buyer())
            .await?;
        logger.log_quote(
            quote.amount,
            &quote.payment_token.to_string(),
            plan.quote_policy.as_str(),
        );

        let final_blockhash = match plan.quote_policy {
            QuotePolicy::ReuseQuote => self.relay.get_blockhash().await?,
            QuotePolicy::ReuseCheckpoint => estimate_blockhash,
        };
        let final_span = plan.trace.child_span("final");
        logger.log_stage("final", &final_span);
        let output = plan
            .base_draft(
                relay_payer,
                ExecutionContext::new(final_blockhash).with_trace(final_span),
            )?
            .with_relay_instruction(quote.instruction.clone())
            .partially_sign()?;

        Ok(PreparedPurchase {
            output,
            payer,
            quote,
            estimate_blockhash,
        })
    }

    /// Relay co-signs, we broadcast and wait for confirmation
    pub async fn run_two_step(
        &self,
        network: &dyn NetworkSubmitter,
    ) -> Result<SubmissionReceipt, PurchaseError> {
        let started = Instant::now();
        let logger = self.plan.logger();

        let result = async {
            let prepared = self.build_purchase_transaction().await?;
            let receipt = self
                .driver()
                .two_step(network, &prepared.output, &prepared.payer.signer_address)
                .await?;
            Ok::<_, PurchaseError>(receipt)
        }
        .await;

        self.plan.log_outcome(&logger, &result, started);
        result
    }

    /// Relay co-signs and broadcasts; returns the relay signer address
    pub async fn run_fire_and_forget(&self) -> Result<Pubkey, PurchaseError> {
        let started = Instant::now();
        let logger = self.plan.logger();

        let result = async {
            let prepared = self.build_purchase_transaction().await?;
            Ok::<_, PurchaseError>(self.driver().fire_and_forget(&prepared.output).await?)
        }
        .await;

        let latency_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(signer) => info!(
                context_id = %logger.context_id(),
                relay_signer = %signer,
                latency_ms,
                "Purchase handed to relay"
            ),
            Err(e) => logger.log_purchase_failure(e.category(), &e.to_string(), latency_ms),
        }
        result
    }
}
