//! Transactional side of reconciliation.
//!
//! Every public operation opens one store transaction, reads the candidate
//! wage entries, plans the adjustments, writes them together with the
//! advance mutation and commits. A failure anywhere, or the configured
//! deadline expiring, rolls the whole unit back.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use super::error::ReconcileError;
use super::plan::{Direction, ReconciliationPlan, plan_decrease, plan_increase};
use crate::db::{LedgerStore, LedgerTransaction};
use crate::models::{AdvanceRecord, AdvanceUpdate, Employee, NewAdvance};
use crate::money;

/// Future returned by a unit of work run through
/// [`ReconciliationEngine::run_in_transaction`].
pub type TxFuture<'t, T> = Pin<Box<dyn Future<Output = Result<T, ReconcileError>> + Send + 't>>;

pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound on one transaction, from `begin` to `commit`.
    pub transaction_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            transaction_timeout: DEFAULT_TRANSACTION_TIMEOUT,
        }
    }
}

/// Result of creating or changing an advance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvanceChange {
    /// The advance as committed.
    pub advance: AdvanceRecord,
    /// Wage-entry adjustments, or `None` when the amount did not change.
    pub plan: Option<ReconciliationPlan>,
}

pub struct ReconciliationEngine {
    store: Arc<dyn LedgerStore>,
    config: EngineConfig,
}

impl ReconciliationEngine {
    pub fn new(store: Arc<dyn LedgerStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Record a new advance and spend it on the employee's oldest open
    /// wage entries.
    pub async fn create_advance(
        &self,
        user_id: i64,
        advance: NewAdvance,
    ) -> Result<AdvanceChange, ReconcileError> {
        validate_amount("advance amount", advance.amount)?;
        if advance.amount.is_zero() {
            return Err(ReconcileError::Validation(
                "advance amount must be positive".to_string(),
            ));
        }

        self.run_in_transaction("create_advance", move |tx| {
            Box::pin(create_within(tx, user_id, advance))
        })
        .await
    }

    /// Change an advance. A higher amount pays open entries oldest first; a
    /// lower amount claws back from the newest paid entries.
    pub async fn apply_advance_amount_change(
        &self,
        user_id: i64,
        advance_id: i64,
        update: AdvanceUpdate,
    ) -> Result<AdvanceChange, ReconcileError> {
        if let Some(amount) = update.amount {
            validate_amount("advance amount", amount)?;
        }

        self.run_in_transaction("apply_advance_amount_change", move |tx| {
            Box::pin(change_within(tx, user_id, advance_id, update))
        })
        .await
    }

    /// Delete an advance after clawing back its whole amount.
    pub async fn remove_advance(
        &self,
        user_id: i64,
        advance_id: i64,
    ) -> Result<ReconciliationPlan, ReconcileError> {
        self.run_in_transaction("remove_advance", move |tx| {
            Box::pin(remove_within(tx, user_id, advance_id))
        })
        .await
    }

    /// Settle wages directly, oldest open entry first. With `entry_id` only
    /// that entry is paid. The payment may not exceed what is outstanding.
    pub async fn pay_wages(
        &self,
        user_id: i64,
        employee_id: i64,
        entry_id: Option<i64>,
        amount: Decimal,
    ) -> Result<ReconciliationPlan, ReconcileError> {
        validate_amount("payment amount", amount)?;
        if amount.is_zero() {
            return Err(ReconcileError::Validation(
                "payment amount must be positive".to_string(),
            ));
        }

        self.run_in_transaction("pay_wages", move |tx| {
            Box::pin(pay_within(tx, user_id, employee_id, entry_id, amount))
        })
        .await
    }

    /// Run `work` inside one store transaction bounded by the configured
    /// timeout. The transaction commits only if `work` succeeds; otherwise,
    /// or on timeout, nothing it did is persisted.
    pub async fn run_in_transaction<T, F>(
        &self,
        operation: &'static str,
        work: F,
    ) -> Result<T, ReconcileError>
    where
        F: for<'t> FnOnce(&'t mut dyn LedgerTransaction) -> TxFuture<'t, T>,
    {
        let timeout = self.config.transaction_timeout;
        match tokio::time::timeout(timeout, self.execute(operation, work)).await {
            Ok(result) => result,
            Err(_) => {
                error!(
                    operation,
                    timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    "transaction timed out and was abandoned"
                );
                Err(ReconcileError::TimedOut(timeout))
            }
        }
    }

    async fn execute<T, F>(&self, operation: &'static str, work: F) -> Result<T, ReconcileError>
    where
        F: for<'t> FnOnce(&'t mut dyn LedgerTransaction) -> TxFuture<'t, T>,
    {
        let mut tx = self.store.begin().await?;
        let result = work(&mut *tx).await;
        finish(operation, tx, result).await
    }

    /// Pay `delta` of a raised advance into open entries, oldest first.
    ///
    /// Anything beyond what is outstanding is not applied anywhere; it stays
    /// only on the advance's own amount.
    pub async fn increase_advance(
        tx: &mut dyn LedgerTransaction,
        employee_id: i64,
        user_id: i64,
        delta: Decimal,
    ) -> Result<ReconciliationPlan, ReconcileError> {
        validate_delta(delta)?;

        let entries = tx.list_unpaid_entries(employee_id, user_id).await?;
        let plan = plan_increase(&entries, delta);
        apply_plan(tx, &plan).await?;

        if plan.remaining > Decimal::ZERO {
            info!(
                employee_id,
                surplus = %plan.remaining,
                "advance exceeds outstanding wages; surplus kept on the advance"
            );
        }
        Ok(plan)
    }

    /// Take `delta` of a lowered advance back from paid entries, newest
    /// first, reopening each one touched.
    ///
    /// If the entries hold less than `delta` everything reducible is reduced
    /// and the shortfall is reported in [`ReconciliationPlan::remaining`].
    pub async fn decrease_advance(
        tx: &mut dyn LedgerTransaction,
        employee_id: i64,
        user_id: i64,
        delta: Decimal,
    ) -> Result<ReconciliationPlan, ReconcileError> {
        validate_delta(delta)?;

        let entries = tx.list_paid_portion_entries(employee_id, user_id).await?;
        let plan = plan_decrease(&entries, delta);
        apply_plan(tx, &plan).await?;

        if plan.remaining > Decimal::ZERO {
            warn!(
                employee_id,
                unresolved = %plan.remaining,
                "claw-back exceeds paid wages; remainder left unresolved"
            );
        }
        Ok(plan)
    }

    /// Claw back the full amount of `advance`, then delete it.
    pub async fn delete_advance(
        tx: &mut dyn LedgerTransaction,
        advance: &AdvanceRecord,
    ) -> Result<ReconciliationPlan, ReconcileError> {
        let plan = if advance.amount > Decimal::ZERO {
            Self::decrease_advance(tx, advance.employee_id, advance.user_id, advance.amount)
                .await?
        } else {
            ReconciliationPlan::empty(Direction::Reverse, Decimal::ZERO)
        };

        tx.delete_advance(advance.id).await?;
        Ok(plan)
    }
}

async fn create_within(
    tx: &mut dyn LedgerTransaction,
    user_id: i64,
    advance: NewAdvance,
) -> Result<AdvanceChange, ReconcileError> {
    verify_employee(tx, user_id, advance.employee_id).await?;

    let record = tx.insert_advance(user_id, &advance).await?;
    let plan =
        ReconciliationEngine::increase_advance(tx, record.employee_id, user_id, record.amount)
            .await?;

    info!(
        advance_id = record.id,
        employee_id = record.employee_id,
        amount = %record.amount,
        entries = plan.adjustments.len(),
        "advance created"
    );
    Ok(AdvanceChange {
        advance: record,
        plan: Some(plan),
    })
}

async fn change_within(
    tx: &mut dyn LedgerTransaction,
    user_id: i64,
    advance_id: i64,
    update: AdvanceUpdate,
) -> Result<AdvanceChange, ReconcileError> {
    let existing = load_owned_advance(tx, user_id, advance_id).await?;
    let updated = existing.merged(&update);
    let difference = updated.amount - existing.amount;

    let plan = if difference > Decimal::ZERO {
        Some(
            ReconciliationEngine::increase_advance(tx, existing.employee_id, user_id, difference)
                .await?,
        )
    } else if difference < Decimal::ZERO {
        Some(
            ReconciliationEngine::decrease_advance(
                tx,
                existing.employee_id,
                user_id,
                difference.abs(),
            )
            .await?,
        )
    } else {
        None
    };

    tx.update_advance(&updated).await?;

    info!(
        advance_id,
        from = %existing.amount,
        to = %updated.amount,
        entries = plan.as_ref().map_or(0, |p| p.adjustments.len()),
        "advance updated"
    );
    Ok(AdvanceChange {
        advance: updated,
        plan,
    })
}

async fn remove_within(
    tx: &mut dyn LedgerTransaction,
    user_id: i64,
    advance_id: i64,
) -> Result<ReconciliationPlan, ReconcileError> {
    let advance = load_owned_advance(tx, user_id, advance_id).await?;
    let plan = ReconciliationEngine::delete_advance(tx, &advance).await?;

    info!(
        advance_id,
        amount = %advance.amount,
        entries = plan.adjustments.len(),
        "advance removed"
    );
    Ok(plan)
}

async fn pay_within(
    tx: &mut dyn LedgerTransaction,
    user_id: i64,
    employee_id: i64,
    entry_id: Option<i64>,
    amount: Decimal,
) -> Result<ReconciliationPlan, ReconcileError> {
    verify_employee(tx, user_id, employee_id).await?;

    let mut entries = tx.list_unpaid_entries(employee_id, user_id).await?;
    if let Some(id) = entry_id {
        entries.retain(|e| e.id == id);
    }
    if entries.is_empty() {
        return Err(ReconcileError::NotFound(match entry_id {
            Some(id) => format!("unpaid wage entry {id}"),
            None => format!("unpaid wage entries for employee {employee_id}"),
        }));
    }

    let outstanding = money::sum(entries.iter().map(|e| e.unpaid()));
    if amount > outstanding {
        return Err(ReconcileError::Validation(format!(
            "payment {amount} exceeds outstanding {outstanding}"
        )));
    }

    let plan = plan_increase(&entries, amount);
    apply_plan(tx, &plan).await?;

    info!(
        employee_id,
        amount = %amount,
        entries = plan.adjustments.len(),
        "wages paid"
    );
    Ok(plan)
}

async fn apply_plan(
    tx: &mut dyn LedgerTransaction,
    plan: &ReconciliationPlan,
) -> Result<(), ReconcileError> {
    for adj in &plan.adjustments {
        debug!(
            entry_id = adj.entry_id,
            worked_day = %adj.worked_day,
            from = %adj.previous_payed_amount,
            to = %adj.new_payed_amount,
            is_paid = adj.is_paid,
            "adjusting wage entry payment"
        );
        tx.update_entry_payment(adj.entry_id, adj.new_payed_amount, adj.is_paid)
            .await?;
    }
    Ok(())
}

async fn finish<T>(
    operation: &'static str,
    mut tx: Box<dyn LedgerTransaction>,
    result: Result<T, ReconcileError>,
) -> Result<T, ReconcileError> {
    match result {
        Ok(value) => {
            if let Err(err) = tx.commit().await {
                error!(operation, error = %err, "commit failed");
                return Err(err.into());
            }
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(operation, error = %rollback_err, "explicit rollback failed");
            }
            if err.is_transaction_failure() {
                error!(operation, error = %err, "transaction rolled back");
            } else {
                debug!(operation, error = %err, "operation rejected");
            }
            Err(err)
        }
    }
}

async fn load_owned_advance(
    tx: &mut dyn LedgerTransaction,
    user_id: i64,
    advance_id: i64,
) -> Result<AdvanceRecord, ReconcileError> {
    match tx.find_advance(advance_id).await? {
        None => Err(ReconcileError::NotFound(format!("advance {advance_id}"))),
        Some(advance) if advance.user_id != user_id => {
            warn!(advance_id, user_id, "advance belongs to another tenant");
            Err(ReconcileError::Unauthorized)
        }
        Some(advance) => Ok(advance),
    }
}

async fn verify_employee(
    tx: &mut dyn LedgerTransaction,
    user_id: i64,
    employee_id: i64,
) -> Result<Employee, ReconcileError> {
    match tx.find_employee(employee_id).await? {
        None => Err(ReconcileError::NotFound(format!("employee {employee_id}"))),
        Some(employee) if employee.user_id != user_id => {
            warn!(employee_id, user_id, "employee belongs to another tenant");
            Err(ReconcileError::Unauthorized)
        }
        Some(employee) if !employee.is_active => Err(ReconcileError::Validation(format!(
            "employee {employee_id} is inactive"
        ))),
        Some(employee) => Ok(employee),
    }
}

fn validate_amount(label: &str, amount: Decimal) -> Result<(), ReconcileError> {
    if amount < Decimal::ZERO {
        return Err(ReconcileError::Validation(format!(
            "{label} must not be negative, got {amount}"
        )));
    }
    if !money::is_whole_cents(amount) {
        return Err(ReconcileError::Validation(format!(
            "{label} must be in whole cents, got {amount}"
        )));
    }
    Ok(())
}

fn validate_delta(delta: Decimal) -> Result<(), ReconcileError> {
    if delta <= Decimal::ZERO {
        return Err(ReconcileError::Validation(format!(
            "delta must be positive, got {delta}"
        )));
    }
    Ok(())
}
