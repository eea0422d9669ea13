use std::time::Duration;

use thiserror::Error;

use crate::db::RepositoryError;

/// Failures reported by the reconciliation engine.
///
/// Apart from [`ReconcileError::TimedOut`], nothing is persisted when any of
/// these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// The advance, employee or wage entries named by the caller do not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The record exists but belongs to another tenant.
    #[error("Unauthorized")]
    Unauthorized,

    /// Malformed amount or delta, rejected before the store is touched.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// The store failed while the transaction was open; it was rolled back.
    #[error("Transaction failed: {0}")]
    TransactionFailed(#[from] RepositoryError),

    /// The transaction exceeded its deadline and was abandoned.
    ///
    /// If the deadline hit while the commit was in flight the whole unit
    /// may have been persisted. Either all of it landed or none did; re-read
    /// the stored amounts before retrying.
    #[error("Transaction timed out after {0:?}")]
    TimedOut(Duration),
}

impl ReconcileError {
    /// True for store-level failures. These are never retried automatically:
    /// a retry must recompute its delta from freshly stored amounts.
    pub fn is_transaction_failure(&self) -> bool {
        matches!(self, Self::TransactionFailed(_) | Self::TimedOut(_))
    }
}
