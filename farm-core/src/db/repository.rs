use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::{
    AdvanceRecord, Employee, NewAdvance, NewEmployee, NewWageEntry, WageEntry,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("Record not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Entry point to a wage-entry store.
///
/// Plain reads and inserts run directly against the backend. Anything that
/// must be atomic goes through [`LedgerStore::begin`].
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Open a transaction. The store must give at least read-committed
    /// isolation for everything done through the returned handle.
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, RepositoryError>;

    // Employees
    async fn create_employee(&self, employee: NewEmployee) -> Result<Employee, RepositoryError>;
    async fn get_employee(&self, id: i64) -> Result<Employee, RepositoryError>;

    /// Toggle whether advances and payments may be recorded for an employee.
    /// `NotFound` unless the employee exists and belongs to `user_id`.
    async fn set_employee_active(
        &self,
        id: i64,
        user_id: i64,
        is_active: bool,
    ) -> Result<Employee, RepositoryError>;

    // Wage entries
    /// Insert a batch of entries atomically; either all rows land or none.
    async fn insert_wage_entries(
        &self,
        entries: &[NewWageEntry],
    ) -> Result<Vec<WageEntry>, RepositoryError>;

    async fn get_wage_entry(&self, id: i64) -> Result<WageEntry, RepositoryError>;

    /// All entries of one employee, oldest `worked_day` first.
    async fn list_wage_entries(
        &self,
        employee_id: i64,
        user_id: i64,
    ) -> Result<Vec<WageEntry>, RepositoryError>;

    // Advances
    async fn get_advance(&self, id: i64) -> Result<AdvanceRecord, RepositoryError>;

    /// All advances of one employee, newest `date` first.
    async fn list_advances(
        &self,
        employee_id: i64,
        user_id: i64,
    ) -> Result<Vec<AdvanceRecord>, RepositoryError>;
}

/// Operations available inside one open transaction.
///
/// Dropping a handle without calling [`commit`](LedgerTransaction::commit)
/// discards every change made through it. Once `commit` or `rollback` has
/// returned, further calls fail with [`RepositoryError::Connection`].
#[async_trait]
pub trait LedgerTransaction: Send {
    async fn find_employee(&mut self, id: i64) -> Result<Option<Employee>, RepositoryError>;

    async fn find_advance(&mut self, id: i64) -> Result<Option<AdvanceRecord>, RepositoryError>;

    /// Entries with `is_paid == false`, ordered by `worked_day` ascending
    /// then `id` ascending.
    async fn list_unpaid_entries(
        &mut self,
        employee_id: i64,
        user_id: i64,
    ) -> Result<Vec<WageEntry>, RepositoryError>;

    /// Entries with `payed_amount > 0`, ordered by `worked_day` descending
    /// then `id` descending.
    async fn list_paid_portion_entries(
        &mut self,
        employee_id: i64,
        user_id: i64,
    ) -> Result<Vec<WageEntry>, RepositoryError>;

    async fn update_entry_payment(
        &mut self,
        entry_id: i64,
        payed_amount: Decimal,
        is_paid: bool,
    ) -> Result<(), RepositoryError>;

    async fn insert_advance(
        &mut self,
        user_id: i64,
        advance: &NewAdvance,
    ) -> Result<AdvanceRecord, RepositoryError>;

    async fn update_advance(&mut self, advance: &AdvanceRecord) -> Result<(), RepositoryError>;

    async fn delete_advance(&mut self, id: i64) -> Result<(), RepositoryError>;

    async fn commit(&mut self) -> Result<(), RepositoryError>;

    async fn rollback(&mut self) -> Result<(), RepositoryError>;
}
