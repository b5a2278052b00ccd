//! Assembled transaction plus its signing state
//!
//! [`TxBuildOutput`] is what every assembly pass hands back: the (possibly
//! partially signed) transaction, its wire encoding, and which required
//! signers still owe a signature. The wire format is the one the relay and
//! the network RPC both accept: bincode-serialized `VersionedTransaction`,
//! base64 encoded.

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use solana_sdk::{
    hash::Hash,
    pubkey::Pubkey,
    signature::Signature,
    transaction::VersionedTransaction,
};

use crate::tx_builder::errors::TransactionBuilderError;

/// Serialize a transaction to base64 wire form
pub fn encode_wire(tx: &VersionedTransaction) -> Result<String, TransactionBuilderError> {
    let bytes = bincode::serialize(tx).map_err(TransactionBuilderError::encoding)?;
    Ok(BASE64_STANDARD.encode(bytes))
}

/// Parse a base64 wire transaction
pub fn decode_wire(wire: &str) -> Result<VersionedTransaction, TransactionBuilderError> {
    let bytes = BASE64_STANDARD
        .decode(wire.trim().as_bytes())
        .map_err(TransactionBuilderError::encoding)?;
    bincode::deserialize(&bytes).map_err(TransactionBuilderError::encoding)
}

/// Required signers whose slot still holds the default signature
pub fn pending_signers(tx: &VersionedTransaction) -> Vec<Pubkey> {
    crate::compat::get_required_signers(&tx.message)
        .iter()
        .enumerate()
        .filter(|(slot, _)| {
            tx.signatures
                .get(*slot)
                .map_or(true, |sig| *sig == Signature::default())
        })
        .map(|(_, key)| *key)
        .collect()
}

/// Result of an assembly pass
#[derive(Debug, Clone)]
pub struct TxBuildOutput {
    pub tx: VersionedTransaction,

    /// Base64 wire encoding of `tx`
    pub wire: String,

    /// All accounts that must sign, in slot order
    pub required_signers: Vec<Pubkey>,

    /// Subset of `required_signers` not yet signed
    pub pending_signers: Vec<Pubkey>,

    pub blockhash: Hash,
}

impl TxBuildOutput {
    pub fn new(tx: VersionedTransaction) -> Result<Self, TransactionBuilderError> {
        let wire = encode_wire(&tx)?;
        let required_signers = crate::compat::get_required_signers(&tx.message).to_vec();
        let pending_signers = pending_signers(&tx);
        let blockhash = *crate::compat::get_recent_blockhash(&tx.message);

        Ok(Self {
            tx,
            wire,
            required_signers,
            pending_signers,
            blockhash,
        })
    }

    /// Rebuild from a wire transaction returned by a co-signer
    pub fn from_wire(wire: &str) -> Result<Self, TransactionBuilderError> {
        Self::new(decode_wire(wire)?)
    }

    pub fn is_fully_signed(&self) -> bool {
        self.pending_signers.is_empty()
    }

    /// The fee payer's signature, which doubles as the transaction id
    pub fn signature(&self) -> Option<Signature> {
        self.tx
            .signatures
            .first()
            .copied()
            .filter(|sig| *sig != Signature::default())
    }

    pub fn fee_payer(&self) -> Option<Pubkey> {
        crate::compat::get_fee_payer(&self.tx.message).copied()
    }
}
