//! SQLite backend for the farm ledger.

pub mod decimal;
pub mod factory;
pub mod repository;

pub use factory::SqliteRepositoryFactory;
pub use repository::{MEMORY_CONNECTION, SqliteLedgerTransaction, SqliteRepository};
