use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use farm_core::{
    AdvanceRecord, Employee, LedgerStore, LedgerTransaction, NewAdvance, NewEmployee,
    NewWageEntry, RepositoryError, WageEntry, WorkType,
};
use rust_decimal::Decimal;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Row, Sqlite, Transaction};
use tracing::debug;

use crate::decimal::{decimal_to_f64, get_money};

const EMPLOYEE_COLUMNS: &str = "id, user_id, name, is_active";

const WAGE_ENTRY_COLUMNS: &str = "id, employee_id, user_id, worked_day, work_type,
    salary_amount, extras, total, payed_amount, is_paid, notes";

const ADVANCE_COLUMNS: &str = "id, employee_id, user_id, amount, date, notes";

/// Connection string that selects a private in-memory database.
pub const MEMORY_CONNECTION: &str = ":memory:";

pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Open a database from a bare file path, creating it if missing, or
    /// from [`MEMORY_CONNECTION`].
    ///
    /// An in-memory database lives inside a single connection, so the pool
    /// is capped at one.
    pub async fn open(connection_string: &str) -> Result<Self> {
        if connection_string == MEMORY_CONNECTION {
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect("sqlite::memory:")
                .await
                .context("Failed to open in-memory database")?;
            return Ok(Self { pool });
        }

        let options = SqliteConnectOptions::from_str(connection_string)
            .with_context(|| format!("Invalid database path: {}", connection_string))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database: {}", connection_string))?;
        Ok(Self { pool })
    }

    pub async fn new_with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn db_error(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Database(e.to_string())
}

fn column<T>(row: &SqliteRow, name: &str) -> Result<T, RepositoryError>
where
    T: for<'r> sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(name)
        .map_err(|e| RepositoryError::Database(format!("Failed to get {}: {}", name, e)))
}

fn row_to_employee(row: &SqliteRow) -> Result<Employee, RepositoryError> {
    Ok(Employee {
        id: column(row, "id")?,
        user_id: column(row, "user_id")?,
        name: column(row, "name")?,
        is_active: column(row, "is_active")?,
    })
}

fn row_to_wage_entry(row: &SqliteRow) -> Result<WageEntry, RepositoryError> {
    let work_type: String = column(row, "work_type")?;
    let work_type = WorkType::parse(&work_type)
        .ok_or_else(|| RepositoryError::Database(format!("Invalid work type: {}", work_type)))?;

    Ok(WageEntry {
        id: column(row, "id")?,
        employee_id: column(row, "employee_id")?,
        user_id: column(row, "user_id")?,
        worked_day: column(row, "worked_day")?,
        work_type,
        salary_amount: get_money(row, "salary_amount")?,
        extras: get_money(row, "extras")?,
        total: get_money(row, "total")?,
        payed_amount: get_money(row, "payed_amount")?,
        is_paid: column(row, "is_paid")?,
        notes: column(row, "notes")?,
    })
}

fn row_to_advance(row: &SqliteRow) -> Result<AdvanceRecord, RepositoryError> {
    Ok(AdvanceRecord {
        id: column(row, "id")?,
        employee_id: column(row, "employee_id")?,
        user_id: column(row, "user_id")?,
        amount: get_money(row, "amount")?,
        date: column(row, "date")?,
        notes: column(row, "notes")?,
    })
}

async fn insert_wage_entry(
    conn: &mut SqliteConnection,
    entry: &NewWageEntry,
) -> Result<WageEntry, RepositoryError> {
    let total = entry.total();
    let is_paid = entry.is_paid();

    let result = sqlx::query(
        "INSERT INTO wage_entries (
            employee_id, user_id, worked_day, work_type, salary_amount,
            extras, total, payed_amount, is_paid, notes
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(entry.employee_id)
    .bind(entry.user_id)
    .bind(entry.worked_day)
    .bind(entry.work_type.as_str())
    .bind(decimal_to_f64(entry.salary_amount))
    .bind(decimal_to_f64(entry.extras))
    .bind(decimal_to_f64(total))
    .bind(decimal_to_f64(entry.payed_amount))
    .bind(is_paid)
    .bind(entry.notes.as_deref())
    .execute(&mut *conn)
    .await
    .map_err(db_error)?;

    Ok(WageEntry {
        id: result.last_insert_rowid(),
        employee_id: entry.employee_id,
        user_id: entry.user_id,
        worked_day: entry.worked_day,
        work_type: entry.work_type,
        salary_amount: entry.salary_amount,
        extras: entry.extras,
        total,
        payed_amount: entry.payed_amount,
        is_paid,
        notes: entry.notes.clone(),
    })
}

#[async_trait]
impl LedgerStore for SqliteRepository {
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, RepositoryError> {
        // Take the write lock up front so a concurrent writer cannot slip in
        // between our reads and our updates.
        let tx = self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(|e| RepositoryError::Connection(e.to_string()))?;
        debug!("sqlite transaction started");
        Ok(Box::new(SqliteLedgerTransaction { tx: Some(tx) }))
    }

    async fn create_employee(&self, employee: NewEmployee) -> Result<Employee, RepositoryError> {
        let result = sqlx::query("INSERT INTO employees (user_id, name, is_active) VALUES (?, ?, 1)")
            .bind(employee.user_id)
            .bind(&employee.name)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(Employee {
            id: result.last_insert_rowid(),
            user_id: employee.user_id,
            name: employee.name,
            is_active: true,
        })
    }

    async fn get_employee(&self, id: i64) -> Result<Employee, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM employees WHERE id = ?",
            EMPLOYEE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .ok_or(RepositoryError::NotFound)?;

        row_to_employee(&row)
    }

    async fn set_employee_active(
        &self,
        id: i64,
        user_id: i64,
        is_active: bool,
    ) -> Result<Employee, RepositoryError> {
        let result = sqlx::query("UPDATE employees SET is_active = ? WHERE id = ? AND user_id = ?")
            .bind(is_active)
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        debug!(employee_id = id, is_active, "employee status changed");
        self.get_employee(id).await
    }

    async fn insert_wage_entries(
        &self,
        entries: &[NewWageEntry],
    ) -> Result<Vec<WageEntry>, RepositoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepositoryError::Connection(e.to_string()))?;

        let mut inserted = Vec::with_capacity(entries.len());
        for entry in entries {
            inserted.push(insert_wage_entry(&mut tx, entry).await?);
        }

        tx.commit().await.map_err(db_error)?;
        debug!(count = inserted.len(), "wage entries inserted");
        Ok(inserted)
    }

    async fn get_wage_entry(&self, id: i64) -> Result<WageEntry, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM wage_entries WHERE id = ?",
            WAGE_ENTRY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .ok_or(RepositoryError::NotFound)?;

        row_to_wage_entry(&row)
    }

    async fn list_wage_entries(
        &self,
        employee_id: i64,
        user_id: i64,
    ) -> Result<Vec<WageEntry>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM wage_entries
             WHERE employee_id = ? AND user_id = ?
             ORDER BY worked_day ASC, id ASC",
            WAGE_ENTRY_COLUMNS
        ))
        .bind(employee_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(row_to_wage_entry).collect()
    }

    async fn get_advance(&self, id: i64) -> Result<AdvanceRecord, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM advances WHERE id = ?",
            ADVANCE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .ok_or(RepositoryError::NotFound)?;

        row_to_advance(&row)
    }

    async fn list_advances(
        &self,
        employee_id: i64,
        user_id: i64,
    ) -> Result<Vec<AdvanceRecord>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM advances
             WHERE employee_id = ? AND user_id = ?
             ORDER BY date DESC, id DESC",
            ADVANCE_COLUMNS
        ))
        .bind(employee_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(row_to_advance).collect()
    }
}

/// One `BEGIN IMMEDIATE` transaction on a pooled connection.
///
/// Dropping it unfinished lets sqlx roll the connection back before it
/// returns to the pool.
pub struct SqliteLedgerTransaction {
    tx: Option<Transaction<'static, Sqlite>>,
}

impl SqliteLedgerTransaction {
    fn conn(&mut self) -> Result<&mut SqliteConnection, RepositoryError> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| RepositoryError::Connection("transaction already finished".to_string()))
    }

    async fn fetch_entries(
        &mut self,
        filter: &str,
        order: &str,
        employee_id: i64,
        user_id: i64,
    ) -> Result<Vec<WageEntry>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM wage_entries
             WHERE employee_id = ? AND user_id = ? AND {}
             ORDER BY {}",
            WAGE_ENTRY_COLUMNS, filter, order
        );
        let rows = sqlx::query(&sql)
            .bind(employee_id)
            .bind(user_id)
            .fetch_all(self.conn()?)
            .await
            .map_err(db_error)?;

        rows.iter().map(row_to_wage_entry).collect()
    }
}

#[async_trait]
impl LedgerTransaction for SqliteLedgerTransaction {
    async fn find_employee(&mut self, id: i64) -> Result<Option<Employee>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM employees WHERE id = ?",
            EMPLOYEE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.conn()?)
        .await
        .map_err(db_error)?;

        row.as_ref().map(row_to_employee).transpose()
    }

    async fn find_advance(&mut self, id: i64) -> Result<Option<AdvanceRecord>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM advances WHERE id = ?",
            ADVANCE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.conn()?)
        .await
        .map_err(db_error)?;

        row.as_ref().map(row_to_advance).transpose()
    }

    async fn list_unpaid_entries(
        &mut self,
        employee_id: i64,
        user_id: i64,
    ) -> Result<Vec<WageEntry>, RepositoryError> {
        self.fetch_entries("is_paid = 0", "worked_day ASC, id ASC", employee_id, user_id)
            .await
    }

    async fn list_paid_portion_entries(
        &mut self,
        employee_id: i64,
        user_id: i64,
    ) -> Result<Vec<WageEntry>, RepositoryError> {
        self.fetch_entries(
            "payed_amount > 0",
            "worked_day DESC, id DESC",
            employee_id,
            user_id,
        )
        .await
    }

    async fn update_entry_payment(
        &mut self,
        entry_id: i64,
        payed_amount: Decimal,
        is_paid: bool,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE wage_entries SET payed_amount = ?, is_paid = ? WHERE id = ?")
            .bind(decimal_to_f64(payed_amount))
            .bind(is_paid)
            .bind(entry_id)
            .execute(self.conn()?)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn insert_advance(
        &mut self,
        user_id: i64,
        advance: &NewAdvance,
    ) -> Result<AdvanceRecord, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO advances (employee_id, user_id, amount, date, notes)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(advance.employee_id)
        .bind(user_id)
        .bind(decimal_to_f64(advance.amount))
        .bind(advance.date)
        .bind(advance.notes.as_deref())
        .execute(self.conn()?)
        .await
        .map_err(db_error)?;

        Ok(AdvanceRecord {
            id: result.last_insert_rowid(),
            employee_id: advance.employee_id,
            user_id,
            amount: advance.amount,
            date: advance.date,
            notes: advance.notes.clone(),
        })
    }

    async fn update_advance(&mut self, advance: &AdvanceRecord) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE advances SET amount = ?, date = ?, notes = ? WHERE id = ?")
            .bind(decimal_to_f64(advance.amount))
            .bind(advance.date)
            .bind(advance.notes.as_deref())
            .bind(advance.id)
            .execute(self.conn()?)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn delete_advance(&mut self, id: i64) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM advances WHERE id = ?")
            .bind(id)
            .execute(self.conn()?)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn commit(&mut self) -> Result<(), RepositoryError> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| RepositoryError::Connection("transaction already finished".to_string()))?;
        tx.commit().await.map_err(db_error)?;
        debug!("sqlite transaction committed");
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), RepositoryError> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| RepositoryError::Connection("transaction already finished".to_string()))?;
        tx.rollback().await.map_err(db_error)?;
        debug!("sqlite transaction rolled back");
        Ok(())
    }
}
