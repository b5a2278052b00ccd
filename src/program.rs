//! Client for the let-me-buy store program
//!
//! Derives the program's deterministic addresses and encodes its instructions
//! byte-for-byte the way the deployed program expects:
//!
//! - 8-byte instruction discriminator
//! - strings as u32 little-endian length prefix + UTF-8 bytes
//! - integers as fixed-width little-endian
//!
//! Account lists are fixed in order and role; the program rejects anything
//! else.

use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::{Pubkey, MAX_SEED_LEN},
    system_program,
};
use spl_associated_token_account::get_associated_token_address_with_program_id;
use thiserror::Error;

/// let-me-buy program id
pub const LET_ME_BUY_PROGRAM_ID: Pubkey =
    Pubkey::from_str_const("BUYuxRfhCMWavaUWxhGtPP3ksKEDZxCD5gzknk3JfAya");

/// Seed tag of the per-store receipts record
pub const RECEIPTS_SEED: &[u8] = b"receipts";

pub const MAKE_PURCHASE_DISCRIMINATOR: [u8; 8] = [193, 62, 227, 136, 105, 212, 201, 20];
pub const INITIALIZE_DISCRIMINATOR: [u8; 8] = [175, 175, 109, 31, 13, 152, 155, 237];
pub const ADD_PRODUCT_DISCRIMINATOR: [u8; 8] = [0, 219, 137, 36, 105, 180, 164, 93];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProgramClientError {
    #[error("seed too long: {len} bytes (max {max})")]
    SeedTooLong { len: usize, max: usize },

    #[error("no valid program address for seeds under program {program}")]
    AddressNotFound { program: Pubkey },

    #[error("instruction data too short: needed {needed} bytes at offset {offset}")]
    Truncated { offset: usize, needed: usize },

    #[error("unexpected discriminator {found:?}")]
    Discriminator { found: [u8; 8] },

    #[error("invalid UTF-8 in string field: {0}")]
    InvalidUtf8(String),

    #[error("{0} trailing bytes after instruction data")]
    TrailingBytes(usize),
}

impl ProgramClientError {
    pub fn category(&self) -> &'static str {
        match self {
            Self::SeedTooLong { .. } | Self::AddressNotFound { .. } => "derivation",
            Self::Truncated { .. }
            | Self::Discriminator { .. }
            | Self::InvalidUtf8(_)
            | Self::TrailingBytes(_) => "decode",
        }
    }
}

/// Role of an account within an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountRole {
    Readonly,
    Writable,
    ReadonlySigner,
    WritableSigner,
}

impl AccountRole {
    pub fn is_signer(self) -> bool {
        matches!(self, Self::ReadonlySigner | Self::WritableSigner)
    }

    pub fn is_writable(self) -> bool {
        matches!(self, Self::Writable | Self::WritableSigner)
    }

    pub fn meta(self, pubkey: Pubkey) -> AccountMeta {
        AccountMeta {
            pubkey,
            is_signer: self.is_signer(),
            is_writable: self.is_writable(),
        }
    }

    pub fn of(meta: &AccountMeta) -> Self {
        match (meta.is_signer, meta.is_writable) {
            (false, false) => Self::Readonly,
            (false, true) => Self::Writable,
            (true, false) => Self::ReadonlySigner,
            (true, true) => Self::WritableSigner,
        }
    }
}

/// Inputs of the `make_purchase` instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MakePurchaseParams {
    pub store_name: String,
    pub product_name: String,
    pub table_number: u8,
    pub buyer: Pubkey,
    pub store_authority: Pubkey,
    pub mint: Pubkey,
}

/// Decoded `make_purchase` arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MakePurchaseArgs {
    pub store_name: String,
    pub product_name: String,
    pub table_number: u8,
}

impl MakePurchaseArgs {
    pub fn encode(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(
            8 + 4 + self.store_name.len() + 4 + self.product_name.len() + 1,
        );
        data.extend_from_slice(&MAKE_PURCHASE_DISCRIMINATOR);
        put_string(&mut data, &self.store_name);
        put_string(&mut data, &self.product_name);
        data.push(self.table_number);
        data
    }

    pub fn decode(data: &[u8]) -> Result<Self, ProgramClientError> {
        let mut reader = Reader::new(data);
        let found = reader.discriminator()?;
        if found != MAKE_PURCHASE_DISCRIMINATOR {
            return Err(ProgramClientError::Discriminator { found });
        }
        let store_name = reader.string()?;
        let product_name = reader.string()?;
        let table_number = reader.u8()?;
        reader.finish()?;
        Ok(Self {
            store_name,
            product_name,
            table_number,
        })
    }
}

/// Receipts record address of a store
pub fn find_receipts_address(store_name: &str) -> Result<(Pubkey, u8), ProgramClientError> {
    find_receipts_address_for(&LET_ME_BUY_PROGRAM_ID, store_name)
}

/// Receipts record address under an arbitrary program id
pub fn find_receipts_address_for(
    program_id: &Pubkey,
    store_name: &str,
) -> Result<(Pubkey, u8), ProgramClientError> {
    let name = store_name.as_bytes();
    if name.len() > MAX_SEED_LEN {
        return Err(ProgramClientError::SeedTooLong {
            len: name.len(),
            max: MAX_SEED_LEN,
        });
    }
    Pubkey::try_find_program_address(&[RECEIPTS_SEED, name], program_id).ok_or(
        ProgramClientError::AddressNotFound {
            program: *program_id,
        },
    )
}

/// Associated token account of `owner` for `mint` under the SPL Token program
pub fn associated_token_address(owner: &Pubkey, mint: &Pubkey) -> Pubkey {
    get_associated_token_address_with_program_id(owner, mint, &spl_token::id())
}

/// Build the `make_purchase` instruction
pub fn make_purchase_instruction(
    params: &MakePurchaseParams,
) -> Result<Instruction, ProgramClientError> {
    let (receipts, _bump) = find_receipts_address(&params.store_name)?;
    let buyer_token_account = associated_token_address(&params.buyer, &params.mint);
    let authority_token_account = associated_token_address(&params.store_authority, &params.mint);

    let data = MakePurchaseArgs {
        store_name: params.store_name.clone(),
        product_name: params.product_name.clone(),
        table_number: params.table_number,
    }
    .encode();

    let accounts = vec![
        AccountRole::Writable.meta(receipts),
        AccountRole::WritableSigner.meta(params.buyer),
        AccountRole::Writable.meta(params.store_authority),
        AccountRole::Readonly.meta(params.mint),
        AccountRole::Writable.meta(buyer_token_account),
        AccountRole::Writable.meta(authority_token_account),
        AccountRole::Readonly.meta(spl_token::id()),
        AccountRole::Readonly.meta(system_program::id()),
        AccountRole::Readonly.meta(spl_associated_token_account::id()),
    ];

    Ok(Instruction {
        program_id: LET_ME_BUY_PROGRAM_ID,
        accounts,
        data,
    })
}

/// Build the `initialize` instruction that creates a store's receipts record
pub fn initialize_store_instruction(
    store_name: &str,
    authority: &Pubkey,
) -> Result<Instruction, ProgramClientError> {
    let (receipts, _bump) = find_receipts_address(store_name)?;

    let mut data = Vec::with_capacity(8 + 4 + store_name.len());
    data.extend_from_slice(&INITIALIZE_DISCRIMINATOR);
    put_string(&mut data, store_name);

    Ok(Instruction {
        program_id: LET_ME_BUY_PROGRAM_ID,
        accounts: vec![
            AccountRole::Writable.meta(receipts),
            AccountRole::WritableSigner.meta(*authority),
            AccountRole::Readonly.meta(system_program::id()),
        ],
        data,
    })
}

/// Build the `add_product` instruction; `price` is in the mint's smallest unit
pub fn add_product_instruction(
    store_name: &str,
    product_name: &str,
    price: u64,
    authority: &Pubkey,
    mint: &Pubkey,
) -> Result<Instruction, ProgramClientError> {
    let (receipts, _bump) = find_receipts_address(store_name)?;

    let mut data = Vec::with_capacity(8 + 4 + store_name.len() + 4 + product_name.len() + 8);
    data.extend_from_slice(&ADD_PRODUCT_DISCRIMINATOR);
    put_string(&mut data, store_name);
    put_string(&mut data, product_name);
    data.extend_from_slice(&price.to_le_bytes());

    Ok(Instruction {
        program_id: LET_ME_BUY_PROGRAM_ID,
        accounts: vec![
            AccountRole::Writable.meta(receipts),
            AccountRole::WritableSigner.meta(*authority),
            AccountRole::Readonly.meta(*mint),
            AccountRole::Readonly.meta(system_program::id()),
        ],
        data,
    })
}

fn put_string(buf: &mut Vec<u8>, value: &str) {
    buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
    buf.extend_from_slice(value.as_bytes());
}

struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn take(&mut self, needed: usize) -> Result<&'a [u8], ProgramClientError> {
        let end = self
            .offset
            .checked_add(needed)
            .filter(|end| *end <= self.data.len())
            .ok_or(ProgramClientError::Truncated {
                offset: self.offset,
                needed,
            })?;
        let slice = &self.data[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn discriminator(&mut self) -> Result<[u8; 8], ProgramClientError> {
        let mut out = [0u8; 8];
        out.copy_from_slice(self.take(8)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, ProgramClientError> {
        Ok(self.take(1)?[0])
    }

    fn string(&mut self) -> Result<String, ProgramClientError> {
        let mut len = [0u8; 4];
        len.copy_from_slice(self.take(4)?);
        let bytes = self.take(u32::from_le_bytes(len) as usize)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| ProgramClientError::InvalidUtf8(e.to_string()))
    }

    fn finish(self) -> Result<(), ProgramClientError> {
        match self.data.len() - self.offset {
            0 => Ok(()),
            rest => Err(ProgramClientError::TrailingBytes(rest)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn params() -> MakePurchaseParams {
        MakePurchaseParams {
            store_name: "kora-test-store".to_string(),
            product_name: "coffee".to_string(),
            table_number: 1,
            buyer: Pubkey::new_unique(),
            store_authority: Pubkey::new_unique(),
            mint: Pubkey::new_unique(),
        }
    }

    #[test]
    fn test_make_purchase_payload_layout() {
        let ix = make_purchase_instruction(&params()).unwrap();

        let mut expected = MAKE_PURCHASE_DISCRIMINATOR.to_vec();
        expected.extend_from_slice(&15u32.to_le_bytes());
        expected.extend_from_slice(b"kora-test-store");
        expected.extend_from_slice(&6u32.to_le_bytes());
        expected.extend_from_slice(b"coffee");
        expected.push(1);

        assert_eq!(ix.data, expected);
        assert_eq!(ix.program_id, LET_ME_BUY_PROGRAM_ID);
    }

    #[test]
    fn test_make_purchase_account_layout() {
        let p = params();
        let ix = make_purchase_instruction(&p).unwrap();
        let (receipts, _) = find_receipts_address(&p.store_name).unwrap();

        let roles: Vec<(Pubkey, AccountRole)> =
            ix.accounts.iter().map(|m| (m.pubkey, AccountRole::of(m))).collect();

        assert_eq!(
            roles,
            vec![
                (receipts, AccountRole::Writable),
                (p.buyer, AccountRole::WritableSigner),
                (p.store_authority, AccountRole::Writable),
                (p.mint, AccountRole::Readonly),
                (associated_token_address(&p.buyer, &p.mint), AccountRole::Writable),
                (
                    associated_token_address(&p.store_authority, &p.mint),
                    AccountRole::Writable
                ),
                (spl_token::id(), AccountRole::Readonly),
                (system_program::id(), AccountRole::Readonly),
                (spl_associated_token_account::id(), AccountRole::Readonly),
            ]
        );
    }

    #[test]
    fn test_receipts_address_deterministic() {
        let a = find_receipts_address("kora-test-store").unwrap();
        let b = find_receipts_address("kora-test-store").unwrap();
        assert_eq!(a, b);

        let expected = Pubkey::find_program_address(
            &[b"receipts", b"kora-test-store"],
            &LET_ME_BUY_PROGRAM_ID,
        );
        assert_eq!(a, expected);
    }

    #[test]
    fn test_receipts_address_changes_with_one_character() {
        let names = ["kora-test-store", "kora-test-storf", "kora-test-stor", "Kora-test-store"];
        let addresses: std::collections::HashSet<Pubkey> = names
            .iter()
            .map(|n| find_receipts_address(n).unwrap().0)
            .collect();
        assert_eq!(addresses.len(), names.len());
    }

    #[test]
    fn test_receipts_seed_too_long() {
        let name = "x".repeat(MAX_SEED_LEN + 1);
        assert_eq!(
            find_receipts_address(&name),
            Err(ProgramClientError::SeedTooLong {
                len: MAX_SEED_LEN + 1,
                max: MAX_SEED_LEN
            })
        );
        assert!(make_purchase_instruction(&MakePurchaseParams {
            store_name: name,
            ..params()
        })
        .is_err());
    }

    #[test]
    fn test_associated_token_address_matches_derivation_formula() {
        let owner = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let (expected, _) = Pubkey::find_program_address(
            &[owner.as_ref(), spl_token::id().as_ref(), mint.as_ref()],
            &spl_associated_token_account::id(),
        );
        assert_eq!(associated_token_address(&owner, &mint), expected);
    }

    #[test]
    fn test_initialize_store_layout() {
        let authority = Pubkey::new_unique();
        let ix = initialize_store_instruction("kora-test-store", &authority).unwrap();

        assert_eq!(&ix.data[..8], &INITIALIZE_DISCRIMINATOR);
        assert_eq!(&ix.data[8..12], &15u32.to_le_bytes());
        assert_eq!(&ix.data[12..], b"kora-test-store");
        assert_eq!(ix.accounts.len(), 3);
        assert_eq!(AccountRole::of(&ix.accounts[1]), AccountRole::WritableSigner);
        assert_eq!(ix.accounts[1].pubkey, authority);
    }

    #[test]
    fn test_add_product_layout() {
        let authority = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let ix = add_product_instruction("kora-test-store", "coffee", 2_000_000, &authority, &mint)
            .unwrap();

        assert_eq!(&ix.data[..8], &ADD_PRODUCT_DISCRIMINATOR);
        assert_eq!(&ix.data[ix.data.len() - 8..], &2_000_000u64.to_le_bytes());
        assert_eq!(ix.data.len(), 8 + 4 + 15 + 4 + 6 + 8);
        assert_eq!(ix.accounts[2].pubkey, mint);
        assert_eq!(AccountRole::of(&ix.accounts[2]), AccountRole::Readonly);
    }

    #[test]
    fn test_decode_rejects_malformed() {
        let good = MakePurchaseArgs {
            store_name: "s".to_string(),
            product_name: "p".to_string(),
            table_number: 9,
        }
        .encode();

        let mut wrong_disc = good.clone();
        wrong_disc[0] ^= 0xff;
        assert!(matches!(
            MakePurchaseArgs::decode(&wrong_disc),
            Err(ProgramClientError::Discriminator { .. })
        ));

        assert!(matches!(
            MakePurchaseArgs::decode(&good[..good.len() - 1]),
            Err(ProgramClientError::Truncated { .. })
        ));

        let mut trailing = good.clone();
        trailing.push(0);
        assert_eq!(
            MakePurchaseArgs::decode(&trailing),
            Err(ProgramClientError::TrailingBytes(1))
        );
    }

    #[test]
    fn test_role_flags_round_trip_through_meta() {
        let key = Pubkey::new_unique();
        for role in [
            AccountRole::Readonly,
            AccountRole::Writable,
            AccountRole::ReadonlySigner,
            AccountRole::WritableSigner,
        ] {
            assert_eq!(AccountRole::of(&role.meta(key)), role);
        }
    }

    proptest! {
        #[test]
        fn prop_payload_fields_recovered(
            store in "\\PC{0,32}",
            product in "\\PC{0,64}",
            table in any::<u8>(),
        ) {
            let args = MakePurchaseArgs {
                store_name: store.clone(),
                product_name: product.clone(),
                table_number: table,
            };
            let data = args.encode();

            let store_len = u32::from_le_bytes(data[8..12].try_into().unwrap()) as usize;
            prop_assert_eq!(store_len, store.len());
            prop_assert_eq!(data.len(), 8 + 4 + store.len() + 4 + product.len() + 1);
            prop_assert_eq!(*data.last().unwrap(), table);
            prop_assert_eq!(MakePurchaseArgs::decode(&data).unwrap(), args);
        }
    }
}
