//! Consistency checks for wage-entry payment state.
//!
//! Every wage entry must satisfy `0 <= payed_amount <= total`, and its
//! `is_paid` flag must equal `payed_amount >= total`. The reconciliation
//! engine preserves both; edit workflows outside the engine call
//! [`check_entry_invariants`] before persisting a hand-edited entry.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::WageEntry;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("wage entry {entry_id}: paid amount {payed_amount} is negative")]
    NegativePayment { entry_id: i64, payed_amount: Decimal },

    #[error("wage entry {entry_id}: paid amount {payed_amount} exceeds total {total}")]
    Overpaid {
        entry_id: i64,
        payed_amount: Decimal,
        total: Decimal,
    },

    #[error(
        "wage entry {entry_id}: is_paid is {is_paid} but {payed_amount} of {total} has been paid"
    )]
    PaidFlagMismatch {
        entry_id: i64,
        is_paid: bool,
        payed_amount: Decimal,
        total: Decimal,
    },
}

/// Checks a single entry, reporting the first violated rule.
pub fn check_entry_invariants(entry: &WageEntry) -> Result<(), InvariantViolation> {
    if entry.payed_amount < Decimal::ZERO {
        return Err(InvariantViolation::NegativePayment {
            entry_id: entry.id,
            payed_amount: entry.payed_amount,
        });
    }

    if entry.payed_amount > entry.total {
        return Err(InvariantViolation::Overpaid {
            entry_id: entry.id,
            payed_amount: entry.payed_amount,
            total: entry.total,
        });
    }

    if entry.is_paid != (entry.payed_amount >= entry.total) {
        return Err(InvariantViolation::PaidFlagMismatch {
            entry_id: entry.id,
            is_paid: entry.is_paid,
            payed_amount: entry.payed_amount,
            total: entry.total,
        });
    }

    Ok(())
}

/// Checks every entry and collects all violations.
pub fn check_all<'a, I>(entries: I) -> Vec<InvariantViolation>
where
    I: IntoIterator<Item = &'a WageEntry>,
{
    entries
        .into_iter()
        .filter_map(|entry| check_entry_invariants(entry).err())
        .collect()
}
