//! Compute-budget directives and instruction list validation
//!
//! A transaction carries at most one `SetComputeUnitPrice` and one
//! `SetComputeUnitLimit` directive. The update functions here replace an
//! existing directive in place and only append when none is present, so
//! re-applying them never grows the list.

use crate::tx_builder::errors::TransactionBuilderError;
use solana_sdk::{compute_budget::ComputeBudgetInstruction, instruction::Instruction};

/// ComputeBudget instruction tags (borsh enum discriminants)
const SET_COMPUTE_UNIT_LIMIT_TAG: u8 = 2;
const SET_COMPUTE_UNIT_PRICE_TAG: u8 = 3;

/// Decoded compute-budget directive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeBudgetDirective {
    UnitLimit(u32),
    UnitPrice(u64),
}

/// Decode `ix` if it is a unit-limit or unit-price directive
pub fn compute_budget_directive(ix: &Instruction) -> Option<ComputeBudgetDirective> {
    if ix.program_id != solana_sdk::compute_budget::id() {
        return None;
    }
    let (tag, rest) = ix.data.split_first()?;
    match *tag {
        SET_COMPUTE_UNIT_LIMIT_TAG => {
            let bytes: [u8; 4] = rest.try_into().ok()?;
            Some(ComputeBudgetDirective::UnitLimit(u32::from_le_bytes(bytes)))
        }
        SET_COMPUTE_UNIT_PRICE_TAG => {
            let bytes: [u8; 8] = rest.try_into().ok()?;
            Some(ComputeBudgetDirective::UnitPrice(u64::from_le_bytes(bytes)))
        }
        _ => None,
    }
}

fn is_unit_price(ix: &Instruction) -> bool {
    matches!(
        compute_budget_directive(ix),
        Some(ComputeBudgetDirective::UnitPrice(_))
    )
}

fn is_unit_limit(ix: &Instruction) -> bool {
    matches!(
        compute_budget_directive(ix),
        Some(ComputeBudgetDirective::UnitLimit(_))
    )
}

/// Replace every matching directive with `replacement`, keeping only the first
/// position; append when there is none.
fn update_or_append(
    instructions: Vec<Instruction>,
    replacement: Instruction,
    is_target: fn(&Instruction) -> bool,
) -> Vec<Instruction> {
    let mut out = Vec::with_capacity(instructions.len() + 1);
    let mut replacement = Some(replacement);
    let mut seen = false;

    for ix in instructions {
        if is_target(&ix) {
            if let Some(new_ix) = replacement.take() {
                out.push(new_ix);
            }
            seen = true;
        } else {
            out.push(ix);
        }
    }
    if !seen {
        if let Some(new_ix) = replacement {
            out.push(new_ix);
        }
    }
    out
}

/// Set the per-unit priority price, replacing any existing price directive
pub fn update_or_append_compute_unit_price(
    instructions: Vec<Instruction>,
    micro_lamports: u64,
) -> Vec<Instruction> {
    update_or_append(
        instructions,
        ComputeBudgetInstruction::set_compute_unit_price(micro_lamports),
        is_unit_price,
    )
}

/// Set the compute unit limit, replacing any existing limit directive
pub fn update_or_append_compute_unit_limit(
    instructions: Vec<Instruction>,
    units: u32,
) -> Vec<Instruction> {
    update_or_append(
        instructions,
        ComputeBudgetInstruction::set_compute_unit_limit(units),
        is_unit_limit,
    )
}

/// Validate an instruction list before compilation
///
/// Rejects an empty list and any list carrying more than one price or more
/// than one limit directive (the runtime fails such transactions with
/// `DuplicateInstruction`).
pub fn sanity_check_ix_order(instructions: &[Instruction]) -> Result<(), TransactionBuilderError> {
    if instructions.is_empty() {
        return Err(TransactionBuilderError::invalid_order(
            "Instruction list is empty",
        ));
    }

    let prices = instructions.iter().filter(|ix| is_unit_price(ix)).count();
    if prices > 1 {
        return Err(TransactionBuilderError::invalid_order(format!(
            "{} compute unit price directives found, at most one allowed",
            prices
        )));
    }

    let limits = instructions.iter().filter(|ix| is_unit_limit(ix)).count();
    if limits > 1 {
        return Err(TransactionBuilderError::invalid_order(format!(
            "{} compute unit limit directives found, at most one allowed",
            limits
        )));
    }

    Ok(())
}
