use std::collections::BTreeSet;
use std::io::Read;

use chrono::NaiveDate;
use farm_core::money::round_cents;
use farm_core::{LedgerStore, NewWageEntry, RepositoryError, WorkType};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur when importing wage entries.
#[derive(Debug, Error)]
pub enum WageLoaderError {
    #[error("CSV parse error: {0}")]
    CsvParse(String),

    #[error("Row {row}: unknown work type '{value}' (expected fullDay or halfDay)")]
    InvalidWorkType { row: usize, value: String },

    #[error("Row {row}: {field} must not be negative, got {value}")]
    NegativeAmount {
        row: usize,
        field: &'static str,
        value: Decimal,
    },

    #[error("Row {row}: payed_amount {payed} exceeds total {total}")]
    Overpaid {
        row: usize,
        payed: Decimal,
        total: Decimal,
    },

    #[error("Employee {0} not found in database")]
    EmployeeNotFound(i64),

    #[error("Employee {0} belongs to another user")]
    EmployeeNotOwned(i64),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<csv::Error> for WageLoaderError {
    fn from(err: csv::Error) -> Self {
        WageLoaderError::CsvParse(err.to_string())
    }
}

/// A single row of a wage-entry CSV file.
///
/// Columns:
/// - `employee_id`: owner of the entry
/// - `worked_day`: ISO date (`2025-01-31`)
/// - `work_type`: `fullDay` or `halfDay`
/// - `salary_amount`: base pay for the day
/// - `extras`: bonuses on top of the salary (empty for none)
/// - `payed_amount`: already settled (empty for none)
/// - `notes`: free text, optional
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct WageEntryRecord {
    pub employee_id: i64,
    pub worked_day: NaiveDate,
    pub work_type: String,
    pub salary_amount: Decimal,
    #[serde(default, deserialize_with = "deserialize_amount_or_zero")]
    pub extras: Decimal,
    #[serde(default, deserialize_with = "deserialize_amount_or_zero")]
    pub payed_amount: Decimal,
    #[serde(default)]
    pub notes: Option<String>,
}

fn deserialize_amount_or_zero<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s {
        Some(s) if !s.trim().is_empty() => s
            .trim()
            .parse::<Decimal>()
            .map_err(serde::de::Error::custom),
        _ => Ok(Decimal::ZERO),
    }
}

/// Imports wage entries from CSV through any [`LedgerStore`] backend.
pub struct WageEntryLoader;

impl WageEntryLoader {
    /// Parse records from any CSV source, such as a file or a string slice.
    pub fn parse<R: Read>(reader: R) -> Result<Vec<WageEntryRecord>, WageLoaderError> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut records = Vec::new();

        for result in csv_reader.deserialize() {
            let record: WageEntryRecord = result?;
            records.push(record);
        }

        Ok(records)
    }

    /// Validate records and turn them into insertable entries for `user_id`.
    ///
    /// Amounts are rounded to cents. Rows are numbered from 1, excluding the
    /// header.
    pub fn to_new_entries(
        user_id: i64,
        records: &[WageEntryRecord],
    ) -> Result<Vec<NewWageEntry>, WageLoaderError> {
        records
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let row = i + 1;
                let work_type = WorkType::parse(record.work_type.trim()).ok_or_else(|| {
                    WageLoaderError::InvalidWorkType {
                        row,
                        value: record.work_type.clone(),
                    }
                })?;

                let salary_amount = non_negative(row, "salary_amount", record.salary_amount)?;
                let extras = non_negative(row, "extras", record.extras)?;
                let payed_amount = non_negative(row, "payed_amount", record.payed_amount)?;

                let entry = NewWageEntry {
                    employee_id: record.employee_id,
                    user_id,
                    worked_day: record.worked_day,
                    work_type,
                    salary_amount,
                    extras,
                    payed_amount,
                    notes: record
                        .notes
                        .as_ref()
                        .map(|n| n.trim().to_string())
                        .filter(|n| !n.is_empty()),
                };

                if entry.payed_amount > entry.total() {
                    return Err(WageLoaderError::Overpaid {
                        row,
                        payed: entry.payed_amount,
                        total: entry.total(),
                    });
                }
                Ok(entry)
            })
            .collect()
    }

    /// Validate and insert `records` for `user_id` in one batch.
    ///
    /// Every referenced employee must exist and belong to `user_id`. Either
    /// all rows are inserted or none are. Returns the number inserted.
    pub async fn load(
        store: &dyn LedgerStore,
        user_id: i64,
        records: &[WageEntryRecord],
    ) -> Result<usize, WageLoaderError> {
        let entries = Self::to_new_entries(user_id, records)?;

        let employee_ids: BTreeSet<i64> = entries.iter().map(|e| e.employee_id).collect();
        for employee_id in employee_ids {
            let employee = store.get_employee(employee_id).await.map_err(|e| match e {
                RepositoryError::NotFound => WageLoaderError::EmployeeNotFound(employee_id),
                other => WageLoaderError::Repository(other),
            })?;
            if employee.user_id != user_id {
                return Err(WageLoaderError::EmployeeNotOwned(employee_id));
            }
            debug!(employee_id, "employee verified for import");
        }

        let inserted = store.insert_wage_entries(&entries).await?;
        info!(user_id, count = inserted.len(), "wage entries imported");
        Ok(inserted.len())
    }
}

fn non_negative(row: usize, field: &'static str, value: Decimal) -> Result<Decimal, WageLoaderError> {
    if value < Decimal::ZERO {
        return Err(WageLoaderError::NegativeAmount { row, field, value });
    }
    Ok(round_cents(value))
}
