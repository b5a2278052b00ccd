//! Test Utilities Module
//!
//! In-memory doubles for the relay and the network so purchase flows can be
//! exercised deterministically without a validator or a relay process.
//!
//! These utilities are only compiled when running tests or when the
//! `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use async_trait::async_trait;
use solana_sdk::{
    hash::Hash,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::VersionedTransaction,
};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::program::associated_token_address;
use crate::relay::{FeeRelay, PayerSigner, PaymentQuote, RelayError};
use crate::submit::{NetworkSubmitter, SubmitError};
use crate::tx_builder::{decode_wire, encode_wire};

/// Relay double that really co-signs with its own keypair
#[derive(Clone)]
pub struct MockRelay {
    pub signer: Arc<Keypair>,
    pub payment_address: Pubkey,

    /// Fee quoted for every transaction
    pub fee_amount: u64,

    /// Blockhashes handed out, in order
    pub blockhashes: Arc<Mutex<Vec<Hash>>>,

    /// Wire transactions received by `getPaymentInstruction`
    pub quoted: Arc<Mutex<Vec<String>>>,

    /// Transactions co-signed by either signing method
    pub cosigned: Arc<Mutex<Vec<VersionedTransaction>>>,

    /// Relay methods invoked, in order
    pub calls: Arc<Mutex<Vec<&'static str>>>,

    /// Methods that answer with a JSON-RPC error
    pub failing: Arc<Mutex<Vec<&'static str>>>,
}

impl MockRelay {
    pub fn new() -> Self {
        Self {
            signer: Arc::new(Keypair::new()),
            payment_address: Pubkey::new_unique(),
            fee_amount: 10_000,
            blockhashes: Arc::new(Mutex::new(Vec::new())),
            quoted: Arc::new(Mutex::new(Vec::new())),
            cosigned: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            failing: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn signer_address(&self) -> Pubkey {
        self.signer.pubkey()
    }

    pub async fn fail_on(&self, method: &'static str) {
        self.failing.lock().await.push(method);
    }

    pub async fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().await.clone()
    }

    async fn enter(&self, method: &'static str) -> Result<(), RelayError> {
        self.calls.lock().await.push(method);
        if self.failing.lock().await.contains(&method) {
            return Err(RelayError::Rpc {
                method,
                code: -32000,
                message: format!("{} failed", method),
            });
        }
        Ok(())
    }

    /// Fill the fee-payer slot with the relay signature
    async fn cosign(
        &self,
        method: &'static str,
        wire: &str,
    ) -> Result<VersionedTransaction, RelayError> {
        let mut tx =
            decode_wire(wire).map_err(|e| RelayError::invalid(method, e.to_string()))?;
        let message_bytes = tx.message.serialize();
        let slot = crate::compat::get_required_signers(&tx.message)
            .iter()
            .position(|key| *key == self.signer.pubkey())
            .ok_or_else(|| RelayError::invalid(method, "relay is not a required signer"))?;
        tx.signatures[slot] = self.signer.sign_message(&message_bytes);
        self.cosigned.lock().await.push(tx.clone());
        Ok(tx)
    }
}

impl Default for MockRelay {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeeRelay for MockRelay {
    async fn get_payer_signer(&self) -> Result<PayerSigner, RelayError> {
        self.enter("getPayerSigner").await?;
        Ok(PayerSigner {
            signer_address: self.signer.pubkey(),
            payment_address: self.payment_address,
        })
    }

    async fn get_blockhash(&self) -> Result<Hash, RelayError> {
        self.enter("getBlockhash").await?;
        let hash = Hash::new_unique();
        self.blockhashes.lock().await.push(hash);
        Ok(hash)
    }

    async fn get_payment_instruction(
        &self,
        transaction: &str,
        fee_token: &Pubkey,
        source_wallet: &Pubkey,
    ) -> Result<PaymentQuote, RelayError> {
        const METHOD: &str = "getPaymentInstruction";
        self.enter(METHOD).await?;
        decode_wire(transaction).map_err(|e| RelayError::invalid(METHOD, e.to_string()))?;
        self.quoted.lock().await.push(transaction.to_string());

        let instruction = spl_token::instruction::transfer(
            &spl_token::id(),
            &associated_token_address(source_wallet, fee_token),
            &associated_token_address(&self.payment_address, fee_token),
            source_wallet,
            &[],
            self.fee_amount,
        )
        .map_err(|e| RelayError::invalid(METHOD, e.to_string()))?;

        Ok(PaymentQuote {
            amount: self.fee_amount,
            instruction,
            payment_token: *fee_token,
        })
    }

    async fn sign_transaction(
        &self,
        transaction: &str,
        signer_key: &Pubkey,
    ) -> Result<String, RelayError> {
        const METHOD: &str = "signTransaction";
        self.enter(METHOD).await?;
        if *signer_key != self.signer.pubkey() {
            return Err(RelayError::Rpc {
                method: METHOD,
                code: -32602,
                message: format!("unknown signer {}", signer_key),
            });
        }
        let tx = self.cosign(METHOD, transaction).await?;
        encode_wire(&tx).map_err(|e| RelayError::invalid(METHOD, e.to_string()))
    }

    async fn sign_and_send_transaction(&self, transaction: &str) -> Result<Pubkey, RelayError> {
        const METHOD: &str = "signAndSendTransaction";
        self.enter(METHOD).await?;
        self.cosign(METHOD, transaction).await?;
        Ok(self.signer.pubkey())
    }
}

/// How [`MockNetwork`] resolves confirmation waits
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmBehavior {
    Confirm,
    Reject(String),
    /// Status never resolves
    Hang,
}

/// Network double that verifies signatures on submission
#[derive(Clone)]
pub struct MockNetwork {
    pub blockhash: Hash,
    pub behavior: ConfirmBehavior,
    pub sent: Arc<Mutex<Vec<VersionedTransaction>>>,
}

impl MockNetwork {
    pub fn new(behavior: ConfirmBehavior) -> Self {
        Self {
            blockhash: Hash::new_unique(),
            behavior,
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn confirming() -> Self {
        Self::new(ConfirmBehavior::Confirm)
    }

    pub async fn sent(&self) -> Vec<VersionedTransaction> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl NetworkSubmitter for MockNetwork {
    async fn latest_blockhash(&self) -> Result<(Hash, u64), SubmitError> {
        Ok((self.blockhash, 1_000))
    }

    async fn send_transaction(&self, tx: &VersionedTransaction) -> Result<Signature, SubmitError> {
        let signature = tx.signatures.first().copied().unwrap_or_default();
        if tx.verify_with_results().iter().any(|ok| !ok) {
            return Err(SubmitError::Rejected {
                signature: tx.signatures.first().copied(),
                reason: "signature verification failure".to_string(),
            });
        }
        self.sent.lock().await.push(tx.clone());
        Ok(signature)
    }

    async fn wait_for_confirmation(&self, signature: &Signature) -> Result<(), SubmitError> {
        match &self.behavior {
            ConfirmBehavior::Confirm => Ok(()),
            ConfirmBehavior::Reject(reason) => Err(SubmitError::Rejected {
                signature: Some(*signature),
                reason: reason.clone(),
            }),
            ConfirmBehavior::Hang => std::future::pending().await,
        }
    }
}
