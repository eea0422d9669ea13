pub mod db;
pub mod invariants;
pub mod models;
pub mod money;
pub mod reconciliation;

pub use db::repository::{LedgerStore, LedgerTransaction, RepositoryError};
pub use invariants::{InvariantViolation, check_entry_invariants};
pub use models::*;
pub use reconciliation::{ReconcileError, ReconciliationEngine};
