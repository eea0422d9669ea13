//! Pure planning step of reconciliation.
//!
//! A planner looks at a snapshot of wage entries and decides how
//! `payed_amount` must move to absorb a change of `delta`. It never touches
//! the store; the engine applies the resulting [`ReconciliationPlan`] inside
//! a transaction.
//!
//! * Applying money walks open entries **oldest first** (`worked_day`
//!   ascending, then `id` ascending).
//! * Clawing money back walks entries with a paid portion **newest first**
//!   (`worked_day` descending, then `id` descending), and every entry it
//!   touches is reopened.

use std::cmp::Ordering;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::WageEntry;
use crate::money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Money flows into wage entries (advance raised, direct payment).
    Apply,
    /// Money is taken back from wage entries (advance lowered or removed).
    Reverse,
}

/// New payment state for one wage entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAdjustment {
    pub entry_id: i64,
    pub worked_day: NaiveDate,
    pub previous_payed_amount: Decimal,
    pub new_payed_amount: Decimal,
    pub is_paid: bool,
}

impl PaymentAdjustment {
    /// Signed change of `payed_amount`; positive when applying.
    pub fn delta(&self) -> Decimal {
        self.new_payed_amount - self.previous_payed_amount
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationPlan {
    pub direction: Direction,
    /// The amount the caller asked to move.
    pub requested: Decimal,
    /// Entry updates in the order they were decided.
    pub adjustments: Vec<PaymentAdjustment>,
    /// Part of `requested` no entry could absorb. When applying this is
    /// surplus kept only on the advance; when reversing it is the
    /// claw-back that found nothing left to reduce.
    pub remaining: Decimal,
}

impl ReconciliationPlan {
    /// A plan that moves nothing and leaves all of `requested` remaining.
    pub fn empty(direction: Direction, requested: Decimal) -> Self {
        Self {
            direction,
            requested,
            adjustments: Vec::new(),
            remaining: requested,
        }
    }

    /// Total absolute amount moved across all adjustments.
    pub fn moved(&self) -> Decimal {
        money::sum(self.adjustments.iter().map(|a| a.delta().abs()))
    }

    pub fn is_noop(&self) -> bool {
        self.adjustments.is_empty()
    }
}

fn oldest_first(a: &&WageEntry, b: &&WageEntry) -> Ordering {
    a.worked_day.cmp(&b.worked_day).then(a.id.cmp(&b.id))
}

/// Distribute `delta` over open entries, oldest first.
///
/// Entries already flagged paid are skipped, as are entries with nothing
/// left to pay. A non-positive `delta` yields an empty plan.
pub fn plan_increase(entries: &[WageEntry], delta: Decimal) -> ReconciliationPlan {
    let mut plan = ReconciliationPlan::empty(Direction::Apply, delta);

    let mut open: Vec<&WageEntry> = entries.iter().filter(|e| !e.is_paid).collect();
    open.sort_by(oldest_first);

    for entry in open {
        if plan.remaining <= Decimal::ZERO {
            break;
        }

        let apply = plan.remaining.min(entry.unpaid());
        if apply > Decimal::ZERO {
            let new_payed_amount = entry.payed_amount + apply;
            plan.adjustments.push(PaymentAdjustment {
                entry_id: entry.id,
                worked_day: entry.worked_day,
                previous_payed_amount: entry.payed_amount,
                new_payed_amount,
                is_paid: new_payed_amount >= entry.total,
            });
            plan.remaining -= apply;
        }
    }

    plan
}

/// Take `delta` back from entries with a paid portion, newest first.
///
/// Every reduced entry is reopened. If the entries hold less than `delta`
/// the plan reduces them all to zero and reports the rest in
/// [`ReconciliationPlan::remaining`].
pub fn plan_decrease(entries: &[WageEntry], delta: Decimal) -> ReconciliationPlan {
    let mut plan = ReconciliationPlan::empty(Direction::Reverse, delta);

    let mut paid: Vec<&WageEntry> = entries
        .iter()
        .filter(|e| e.payed_amount > Decimal::ZERO)
        .collect();
    paid.sort_by(|a, b| oldest_first(b, a));

    for entry in paid {
        if plan.remaining <= Decimal::ZERO {
            break;
        }

        let reduce = plan.remaining.min(entry.payed_amount);
        if reduce > Decimal::ZERO {
            plan.adjustments.push(PaymentAdjustment {
                entry_id: entry.id,
                worked_day: entry.worked_day,
                previous_payed_amount: entry.payed_amount,
                new_payed_amount: entry.payed_amount - reduce,
                is_paid: false,
            });
            plan.remaining -= reduce;
        }
    }

    plan
}

/// Copy of `entries` with `plan` applied; entries the plan does not touch
/// are returned unchanged.
pub fn apply_to(entries: &[WageEntry], plan: &ReconciliationPlan) -> Vec<WageEntry> {
    entries
        .iter()
        .map(|entry| {
            match plan.adjustments.iter().find(|a| a.entry_id == entry.id) {
                Some(adj) => WageEntry {
                    payed_amount: adj.new_payed_amount,
                    is_paid: adj.is_paid,
                    ..entry.clone()
                },
                None => entry.clone(),
            }
        })
        .collect()
}
