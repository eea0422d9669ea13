//! Command-line front end for the farm ledger: configuration, logging,
//! CSV import and report rendering.

pub mod app;
pub mod config;
pub mod loader;
pub mod logging;

pub use config::AppConfig;
pub use loader::{WageEntryLoader, WageEntryRecord, WageLoaderError};
