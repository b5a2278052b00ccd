//! Version-agnostic accessors for `VersionedMessage`
//!
//! Transactions exchanged with the relay are v0, but anything decoded from
//! the wire may be either format. These helpers give one API over both so the
//! signing and inspection code never matches on the message version itself.

use solana_sdk::{
    hash::Hash,
    message::{MessageHeader, VersionedMessage},
    pubkey::Pubkey,
};

/// Message header for either message format
#[inline]
#[must_use]
pub fn get_message_header(message: &VersionedMessage) -> &MessageHeader {
    match message {
        VersionedMessage::Legacy(legacy_msg) => &legacy_msg.header,
        VersionedMessage::V0(v0_msg) => &v0_msg.header,
    }
}

/// Account keys embedded in the message (lookup-table addresses excluded)
#[inline]
#[must_use]
pub fn get_static_account_keys(message: &VersionedMessage) -> &[Pubkey] {
    match message {
        VersionedMessage::Legacy(legacy_msg) => &legacy_msg.account_keys,
        VersionedMessage::V0(v0_msg) => &v0_msg.account_keys,
    }
}

/// Accounts that must sign, in signature-slot order
///
/// Required signers are always the first `num_required_signatures` static
/// keys; slot `i` of the transaction's signature list belongs to key `i`.
#[inline]
#[must_use]
pub fn get_required_signers(message: &VersionedMessage) -> &[Pubkey] {
    let header = get_message_header(message);
    let account_keys = get_static_account_keys(message);
    let num_signers = header.num_required_signatures as usize;

    &account_keys[..num_signers.min(account_keys.len())]
}

/// The lifetime checkpoint the message is bound to
#[inline]
#[must_use]
pub fn get_recent_blockhash(message: &VersionedMessage) -> &Hash {
    message.recent_blockhash()
}

/// Fee payer (first static key), if any
#[inline]
#[must_use]
pub fn get_fee_payer(message: &VersionedMessage) -> Option<&Pubkey> {
    get_static_account_keys(message).first()
}
