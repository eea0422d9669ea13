use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A cash advance (acconto) handed to an employee ahead of wage settlement.
///
/// Only `amount` takes part in reconciliation; `date` and `notes` are
/// descriptive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceRecord {
    pub id: i64,
    pub employee_id: i64,
    pub user_id: i64,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub notes: Option<String>,
}

/// For creating new advances (no id)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAdvance {
    pub employee_id: i64,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub notes: Option<String>,
}

/// Partial update of an advance. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceUpdate {
    pub amount: Option<Decimal>,
    pub date: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl AdvanceRecord {
    /// Returns a copy with `update` applied on top of the stored values.
    pub fn merged(&self, update: &AdvanceUpdate) -> AdvanceRecord {
        AdvanceRecord {
            amount: update.amount.unwrap_or(self.amount),
            date: update.date.unwrap_or(self.date),
            notes: update.notes.clone().or_else(|| self.notes.clone()),
            ..self.clone()
        }
    }
}
