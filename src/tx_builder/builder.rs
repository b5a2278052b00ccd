//! Consuming builder for v0 transactions
//!
//! A [`TransactionDraft`] collects a fee payer capability, a lifetime
//! checkpoint, compute-budget settings and an ordered instruction list, then
//! compiles and partially signs in one step. Compiled instruction order is
//! always: unit limit, unit price, then body instructions as added.

use solana_sdk::{
    instruction::Instruction,
    message::{v0::Message as MessageV0, VersionedMessage},
    pubkey::Pubkey,
    signature::{Signature, Signer},
    transaction::VersionedTransaction,
};
use tracing::debug;

use crate::tx_builder::{
    context::ExecutionContext,
    errors::TransactionBuilderError,
    instructions::{
        compute_budget_directive, sanity_check_ix_order, update_or_append_compute_unit_limit,
        update_or_append_compute_unit_price, ComputeBudgetDirective,
    },
    output::TxBuildOutput,
    signers::{dedup_signers, placeholder_signers, TxSigner},
};

#[derive(Debug, Clone, Default)]
pub struct TransactionDraft {
    fee_payer: Option<TxSigner>,
    context: Option<ExecutionContext>,
    compute_unit_limit: Option<u32>,
    compute_unit_price: Option<u64>,
    instructions: Vec<Instruction>,
    signers: Vec<TxSigner>,
}

impl TransactionDraft {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set who pays network fees; a `Noop` capability leaves its slot for
    /// the remote co-signer
    pub fn with_fee_payer(mut self, fee_payer: TxSigner) -> Self {
        self.fee_payer = Some(fee_payer);
        self
    }

    pub fn with_lifetime(mut self, context: ExecutionContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_compute_unit_limit(mut self, units: u32) -> Self {
        self.compute_unit_limit = Some(units);
        self
    }

    pub fn with_compute_unit_price(mut self, micro_lamports: u64) -> Self {
        self.compute_unit_price = Some(micro_lamports);
        self
    }

    /// Append a body instruction together with the capabilities that sign it
    ///
    /// Compute-budget directives passed here are folded into the draft's
    /// settings instead of being appended.
    pub fn with_instruction(mut self, ix: Instruction, signers: Vec<TxSigner>) -> Self {
        match compute_budget_directive(&ix) {
            Some(ComputeBudgetDirective::UnitLimit(units)) => {
                self.compute_unit_limit = Some(units);
            }
            Some(ComputeBudgetDirective::UnitPrice(price)) => {
                self.compute_unit_price = Some(price);
            }
            None => self.instructions.push(ix),
        }
        self.signers.extend(signers);
        self
    }

    /// Append an instruction built by a remote party; its signer accounts
    /// get placeholder capabilities
    pub fn with_relay_instruction(self, ix: Instruction) -> Self {
        let signers = placeholder_signers(&ix);
        self.with_instruction(ix, signers)
    }

    pub fn fee_payer(&self) -> Option<Pubkey> {
        self.fee_payer.as_ref().map(TxSigner::pubkey)
    }

    /// Full instruction list in compiled order
    pub fn instructions(&self) -> Vec<Instruction> {
        let mut ixs = Vec::with_capacity(self.instructions.len() + 2);
        if let Some(price) = self.compute_unit_price {
            ixs = update_or_append_compute_unit_price(ixs, price);
        }
        if let Some(units) = self.compute_unit_limit {
            ixs = update_or_append_compute_unit_limit(ixs, units);
        }
        ixs.extend(self.instructions.iter().cloned());
        ixs
    }

    /// Signer capabilities after dedup, fee payer first
    pub fn signers(&self) -> Vec<TxSigner> {
        dedup_signers(
            self.fee_payer
                .iter()
                .cloned()
                .chain(self.signers.iter().cloned()),
        )
    }

    pub fn compile(&self) -> Result<VersionedMessage, TransactionBuilderError> {
        let payer = self.fee_payer().ok_or_else(|| {
            TransactionBuilderError::Configuration("fee payer not set".to_string())
        })?;
        let context = self.context.as_ref().ok_or_else(|| {
            TransactionBuilderError::blockhash_unavailable("lifetime checkpoint not set")
        })?;

        let instructions = self.instructions();
        sanity_check_ix_order(&instructions)?;

        let message = MessageV0::try_compile(&payer, &instructions, &[], context.blockhash)
            .map_err(|e| TransactionBuilderError::Compile(e.to_string()))?;

        Ok(VersionedMessage::V0(message))
    }

    /// Compile, then sign every slot we hold a keypair for
    ///
    /// Slots belonging to placeholder capabilities keep the default signature.
    /// A required signer without any capability is an error.
    pub fn partially_sign(&self) -> Result<TxBuildOutput, TransactionBuilderError> {
        let message = self.compile()?;
        let signers = self.signers();
        let message_bytes = message.serialize();

        let signatures = crate::compat::get_required_signers(&message)
            .iter()
            .map(|required| {
                let signer = signers
                    .iter()
                    .find(|s| s.pubkey() == *required)
                    .ok_or(TransactionBuilderError::MissingSigner(*required))?;
                Ok(match signer {
                    TxSigner::Keypair(keypair) => keypair.sign_message(&message_bytes),
                    TxSigner::Noop(_) => Signature::default(),
                })
            })
            .collect::<Result<Vec<_>, TransactionBuilderError>>()?;

        let tx = VersionedTransaction {
            signatures,
            message,
        };
        let output = TxBuildOutput::new(tx)?;

        let trace_id = self
            .context
            .as_ref()
            .and_then(|c| c.trace_context.as_ref())
            .map(|t| t.trace_id().to_string())
            .unwrap_or_default();
        debug!(
            trace_id = %trace_id,
            blockhash = %output.blockhash,
            required = output.required_signers.len(),
            pending = output.pending_signers.len(),
            "Transaction partially signed"
        );

        Ok(output)
    }
}
