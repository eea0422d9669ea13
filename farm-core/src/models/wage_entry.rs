use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkType {
    FullDay,
    HalfDay,
}

impl WorkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FullDay => "fullDay",
            Self::HalfDay => "halfDay",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fullDay" => Some(Self::FullDay),
            "halfDay" => Some(Self::HalfDay),
            _ => None,
        }
    }
}

/// One worked day (or half-day) for one employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WageEntry {
    pub id: i64,
    pub employee_id: i64,
    pub user_id: i64,
    pub worked_day: NaiveDate,
    pub work_type: WorkType,
    pub salary_amount: Decimal,
    pub extras: Decimal,

    /// Amount owed; fixed once the entry is created.
    pub total: Decimal,
    /// Portion of `total` already covered.
    pub payed_amount: Decimal,
    pub is_paid: bool,

    pub notes: Option<String>,
}

impl WageEntry {
    /// What is still owed on this entry.
    pub fn unpaid(&self) -> Decimal {
        self.total - self.payed_amount
    }
}

/// For creating new wage entries (no id). `total` is derived on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWageEntry {
    pub employee_id: i64,
    pub user_id: i64,
    pub worked_day: NaiveDate,
    pub work_type: WorkType,
    pub salary_amount: Decimal,
    pub extras: Decimal,
    pub payed_amount: Decimal,
    pub notes: Option<String>,
}

impl NewWageEntry {
    pub fn total(&self) -> Decimal {
        self.salary_amount + self.extras
    }

    pub fn is_paid(&self) -> bool {
        self.payed_amount >= self.total()
    }
}
