//! Wage-advance reconciliation.
//!
//! Keeps `payed_amount` across an employee's wage entries consistent with
//! the advances handed to that employee. Reconciliation is amount-based:
//! the store does not record which advance funded which entry, so raising
//! an advance pays the oldest open entries and lowering one claws back from
//! the most recently worked days.

pub mod engine;
pub mod error;
pub mod plan;

pub use engine::{AdvanceChange, EngineConfig, ReconciliationEngine};
pub use error::ReconcileError;
pub use plan::{
    Direction, PaymentAdjustment, ReconciliationPlan, apply_to, plan_decrease, plan_increase,
};
