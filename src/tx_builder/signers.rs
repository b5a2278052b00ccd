//! Signer capabilities attached to a transaction draft
//!
//! Every address that must sign gets exactly one capability: either a local
//! keypair, or a placeholder for a signature produced elsewhere (the relay's
//! fee payer). Instructions coming from the relay carry placeholders for each
//! signer account they reference, which can collide with our own keypair or
//! with the fee-payer placeholder. [`dedup_signers`] collapses those to one
//! capability per address before signing.

use solana_sdk::{
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
pub enum TxSigner {
    /// Signs locally
    Keypair(Arc<Keypair>),
    /// Signature slot left empty for a remote co-signer
    Noop(Pubkey),
}

impl TxSigner {
    pub fn keypair(keypair: Arc<Keypair>) -> Self {
        Self::Keypair(keypair)
    }

    pub fn noop(pubkey: Pubkey) -> Self {
        Self::Noop(pubkey)
    }

    pub fn pubkey(&self) -> Pubkey {
        match self {
            Self::Keypair(kp) => kp.pubkey(),
            Self::Noop(pubkey) => *pubkey,
        }
    }

    pub fn can_sign(&self) -> bool {
        matches!(self, Self::Keypair(_))
    }
}

impl std::fmt::Debug for TxSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Keypair(kp) => write!(f, "Keypair({})", kp.pubkey()),
            Self::Noop(pubkey) => write!(f, "Noop({})", pubkey),
        }
    }
}

impl PartialEq for TxSigner {
    fn eq(&self, other: &Self) -> bool {
        self.pubkey() == other.pubkey() && self.can_sign() == other.can_sign()
    }
}

/// Placeholder capabilities for every signer account of an instruction
pub fn placeholder_signers(ix: &Instruction) -> Vec<TxSigner> {
    ix.accounts
        .iter()
        .filter(|meta| meta.is_signer)
        .map(|meta| TxSigner::noop(meta.pubkey))
        .collect()
}

/// One capability per address, first-seen order; a keypair replaces a
/// placeholder for the same address, never the reverse.
pub fn dedup_signers<I>(signers: I) -> Vec<TxSigner>
where
    I: IntoIterator<Item = TxSigner>,
{
    let mut out: Vec<TxSigner> = Vec::new();
    let mut index: HashMap<Pubkey, usize> = HashMap::new();

    for signer in signers {
        let key = signer.pubkey();
        match index.get(&key) {
            Some(&pos) => {
                if signer.can_sign() && !out[pos].can_sign() {
                    out[pos] = signer;
                }
            }
            None => {
                index.insert(key, out.len());
                out.push(signer);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::instruction::AccountMeta;

    #[test]
    fn test_duplicate_placeholders_collapse() {
        let relay = Pubkey::new_unique();
        let signers = dedup_signers(vec![TxSigner::noop(relay), TxSigner::noop(relay)]);
        assert_eq!(signers, vec![TxSigner::noop(relay)]);
    }

    #[test]
    fn test_keypair_wins_over_placeholder() {
        let buyer = Arc::new(Keypair::new());
        let relay = Pubkey::new_unique();

        let signers = dedup_signers(vec![
            TxSigner::noop(relay),
            TxSigner::noop(buyer.pubkey()),
            TxSigner::keypair(buyer.clone()),
        ]);

        assert_eq!(signers.len(), 2);
        assert_eq!(signers[0].pubkey(), relay);
        assert_eq!(signers[1].pubkey(), buyer.pubkey());
        assert!(signers[1].can_sign());
    }

    #[test]
    fn test_placeholder_never_downgrades_keypair() {
        let buyer = Arc::new(Keypair::new());
        let signers = dedup_signers(vec![
            TxSigner::keypair(buyer.clone()),
            TxSigner::noop(buyer.pubkey()),
        ]);
        assert_eq!(signers.len(), 1);
        assert!(signers[0].can_sign());
    }

    #[test]
    fn test_placeholder_signers_only_for_signer_accounts() {
        let owner = Pubkey::new_unique();
        let ix = Instruction {
            program_id: spl_token::id(),
            accounts: vec![
                AccountMeta::new(Pubkey::new_unique(), false),
                AccountMeta::new(Pubkey::new_unique(), false),
                AccountMeta::new_readonly(owner, true),
            ],
            data: vec![3],
        };
        assert_eq!(placeholder_signers(&ix), vec![TxSigner::noop(owner)]);
    }
}
