use farm_core::RepositoryError;
use farm_core::money::round_cents;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, TypeInfo, ValueRef};

/// Read a decimal column stored as INTEGER or REAL. NULL reads as zero.
pub fn get_decimal(row: &SqliteRow, column: &str) -> Result<Decimal, RepositoryError> {
    let value_ref = row
        .try_get_raw(column)
        .map_err(|e| RepositoryError::Database(format!("Column '{}' not found: {}", column, e)))?;

    if value_ref.is_null() {
        return Ok(Decimal::ZERO);
    }

    let type_info = value_ref.type_info();
    match type_info.name() {
        "INTEGER" => {
            let val: i64 = row.try_get(column).map_err(|e| {
                RepositoryError::Database(format!(
                    "Failed to get INTEGER from '{}': {}",
                    column, e
                ))
            })?;
            Ok(Decimal::from(val))
        }
        "REAL" => {
            let val: f64 = row.try_get(column).map_err(|e| {
                RepositoryError::Database(format!("Failed to get REAL from '{}': {}", column, e))
            })?;
            Decimal::try_from(val).map_err(|e| {
                RepositoryError::Database(format!("Failed to convert {} to Decimal: {}", val, e))
            })
        }
        other => Err(RepositoryError::Database(format!(
            "Unexpected type '{}' for column '{}'",
            other, column
        ))),
    }
}

/// Read a money column, rounded to whole cents.
///
/// REAL storage can carry binary noise (`45.4999999…`); rounding here keeps
/// every amount that leaves the store exact to the cent.
pub fn get_money(row: &SqliteRow, column: &str) -> Result<Decimal, RepositoryError> {
    get_decimal(row, column).map(round_cents)
}

/// Convert a Decimal to f64 for SQLite storage.
pub fn decimal_to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}
