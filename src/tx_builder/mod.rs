//! Transaction assembly
//!
//! Builds v0 transactions for the purchase flow in one or more passes:
//!
//! - **context**: lifetime checkpoint plus trace state for a pass
//! - **instructions**: idempotent compute-budget directives and list checks
//! - **signers**: per-address signer capabilities and their dedup
//! - **builder**: the consuming [`TransactionDraft`] that compiles and
//!   partially signs
//! - **output**: the signed result and its base64 wire form
//!
//! The relay's fee-payer slot is never signed here; it stays at the default
//! signature until the relay co-signs.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use gasless_purchase::tx_builder::{ExecutionContext, TransactionDraft, TxSigner};
//! # fn example(
//! #     relay: solana_sdk::pubkey::Pubkey,
//! #     buyer: std::sync::Arc<solana_sdk::signature::Keypair>,
//! #     purchase_ix: solana_sdk::instruction::Instruction,
//! #     blockhash: solana_sdk::hash::Hash,
//! # ) -> Result<(), gasless_purchase::tx_builder::TransactionBuilderError> {
//! let output = TransactionDraft::new()
//!     .with_fee_payer(TxSigner::noop(relay))
//!     .with_lifetime(ExecutionContext::new(blockhash))
//!     .with_compute_unit_limit(300_000)
//!     .with_compute_unit_price(100_000)
//!     .with_instruction(purchase_ix, vec![TxSigner::keypair(buyer)])
//!     .partially_sign()?;
//!
//! // Hand `output.wire` to the relay for a quote or co-signature
//! # let _ = output;
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub use errors::TransactionBuilderError;

mod builder;
mod context;
mod instructions;
mod output;
mod signers;

pub use builder::TransactionDraft;
pub use context::ExecutionContext;
pub use instructions::{
    compute_budget_directive, sanity_check_ix_order, update_or_append_compute_unit_limit,
    update_or_append_compute_unit_price, ComputeBudgetDirective,
};
pub use output::{decode_wire, encode_wire, pending_signers, TxBuildOutput};
pub use signers::{dedup_signers, placeholder_signers, TxSigner};
