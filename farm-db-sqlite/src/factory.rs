use async_trait::async_trait;

use farm_core::db::repository::{LedgerStore, RepositoryError};
use farm_core::db::{DbConfig, RepositoryFactory};

use crate::repository::SqliteRepository;

/// [`RepositoryFactory`] for SQLite.
///
/// Register this with a [`farm_core::db::RepositoryRegistry`] to make the
/// `"sqlite"` backend available:
///
/// ```rust,no_run
/// use farm_core::db::RepositoryRegistry;
/// use farm_db_sqlite::SqliteRepositoryFactory;
///
/// let mut registry = RepositoryRegistry::new();
/// registry.register(Box::new(SqliteRepositoryFactory));
/// ```
pub struct SqliteRepositoryFactory;

#[async_trait]
impl RepositoryFactory for SqliteRepositoryFactory {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    /// Open the database described by `config.connection_string` and bring
    /// its schema up to date.
    ///
    /// Accepted connection-string values:
    /// * A bare file path, e.g. `"farm.db"`. The file is created if missing.
    /// * A sqlx URL such as `"sqlite:farm.db?mode=rwc"`.
    /// * `":memory:"` for an ephemeral database (useful for tests).
    async fn create(&self, config: &DbConfig) -> Result<Box<dyn LedgerStore>, RepositoryError> {
        let repo = SqliteRepository::open(&config.connection_string)
            .await
            .map_err(|e| RepositoryError::Connection(format!("{e:#}")))?;
        repo.run_migrations()
            .await
            .map_err(|e| RepositoryError::Database(format!("{e:#}")))?;
        Ok(Box::new(repo))
    }
}
