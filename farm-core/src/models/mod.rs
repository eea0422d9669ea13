mod advance;
mod employee;
mod wage_entry;

pub use advance::{AdvanceRecord, AdvanceUpdate, NewAdvance};
pub use employee::{Employee, NewEmployee};
pub use wage_entry::{NewWageEntry, WageEntry, WorkType};
