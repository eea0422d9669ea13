use std::fmt::Write;
use std::sync::Arc;

use anyhow::Result;
use farm_core::db::{DbConfig, RepositoryRegistry};
use farm_core::invariants::check_all;
use farm_core::reconciliation::{Direction, ReconciliationEngine, ReconciliationPlan};
use farm_core::{AdvanceRecord, LedgerStore, WageEntry, money};
use farm_db_sqlite::SqliteRepositoryFactory;
use tracing::debug;

use crate::config::AppConfig;

/// Registry with every backend this binary ships.
pub fn build_registry() -> RepositoryRegistry {
    let mut registry = RepositoryRegistry::new();
    registry.register(Box::new(SqliteRepositoryFactory));
    registry
}

pub async fn open_store(db: &DbConfig) -> Result<Arc<dyn LedgerStore>> {
    debug!(backend = %db.backend, "opening store");
    let store = build_registry().create(db).await?;
    Ok(Arc::from(store))
}

pub fn build_engine(
    store: Arc<dyn LedgerStore>,
    config: &AppConfig,
) -> Result<ReconciliationEngine> {
    Ok(ReconciliationEngine::new(store, config.engine_config()?))
}

/// One line per entry, oldest first, followed by totals.
pub fn render_entries(entries: &[WageEntry]) -> String {
    let mut out = String::new();
    for e in entries {
        let _ = writeln!(
            out,
            "#{:<5} {}  {:<7}  total {:>10}  paid {:>10}  {}{}",
            e.id,
            e.worked_day,
            e.work_type.as_str(),
            e.total,
            e.payed_amount,
            if e.is_paid { "PAID" } else { "open" },
            e.notes
                .as_deref()
                .map(|n| format!("  ({n})"))
                .unwrap_or_default(),
        );
    }
    let owed = money::sum(entries.iter().map(|e| e.total));
    let paid = money::sum(entries.iter().map(|e| e.payed_amount));
    let _ = writeln!(
        out,
        "{} entries, owed {}, paid {}, outstanding {}",
        entries.len(),
        owed,
        paid,
        owed - paid
    );
    out
}

pub fn render_advances(advances: &[AdvanceRecord]) -> String {
    let mut out = String::new();
    for a in advances {
        let _ = writeln!(
            out,
            "advance #{:<5} {}  {:>10}{}",
            a.id,
            a.date,
            a.amount,
            a.notes
                .as_deref()
                .map(|n| format!("  ({n})"))
                .unwrap_or_default(),
        );
    }
    out
}

/// Summary of what a reconciliation moved.
pub fn render_plan(plan: &ReconciliationPlan) -> String {
    let verb = match plan.direction {
        Direction::Apply => "applied",
        Direction::Reverse => "reversed",
    };
    let mut out = format!(
        "{} {} of {} across {} entries\n",
        verb,
        plan.moved(),
        plan.requested,
        plan.adjustments.len()
    );
    for adj in &plan.adjustments {
        let _ = writeln!(
            out,
            "  #{:<5} {}  {} -> {}{}",
            adj.entry_id,
            adj.worked_day,
            adj.previous_payed_amount,
            adj.new_payed_amount,
            if adj.is_paid { "  PAID" } else { "" },
        );
    }
    if !plan.remaining.is_zero() {
        let _ = writeln!(out, "  {} left unassigned", plan.remaining);
    }
    out
}

/// Invariant report for `entries`; `Ok` carries a one-line summary.
pub fn check_report(entries: &[WageEntry]) -> Result<String, String> {
    let violations = check_all(entries);
    if violations.is_empty() {
        return Ok(format!("{} entries consistent", entries.len()));
    }
    let mut out = String::new();
    for v in &violations {
        let _ = writeln!(out, "{v}");
    }
    Err(out)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use farm_core::WorkType;
    use farm_core::reconciliation::plan_increase;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::*;

    fn entry(id: i64, d: u32, total: Decimal, payed: Decimal) -> WageEntry {
        WageEntry {
            id,
            employee_id: 1,
            user_id: 1,
            worked_day: NaiveDate::from_ymd_opt(2025, 2, d).unwrap(),
            work_type: WorkType::FullDay,
            salary_amount: total,
            extras: dec!(0),
            total,
            payed_amount: payed,
            is_paid: payed >= total,
            notes: None,
        }
    }

    #[test]
    fn registry_ships_sqlite() {
        assert_eq!(build_registry().available_backends(), vec!["sqlite"]);
    }

    #[test]
    fn entries_report_ends_with_totals() {
        let report = render_entries(&[
            entry(1, 1, dec!(100), dec!(100)),
            entry(2, 2, dec!(80), dec!(30)),
        ]);

        assert!(report.contains("PAID"));
        assert!(
            report.ends_with("2 entries, owed 180, paid 130, outstanding 50\n"),
            "got: {report}"
        );
    }

    #[test]
    fn plan_report_lists_adjustments_and_surplus() {
        let plan = plan_increase(&[entry(1, 1, dec!(100), dec!(0))], dec!(120));

        let report = render_plan(&plan);

        assert!(report.starts_with("applied 100 of 120 across 1 entries\n"), "got: {report}");
        assert!(report.contains("0 -> 100  PAID"));
        assert!(report.contains("20 left unassigned"));
    }

    #[test]
    fn check_report_flags_overpaid_entry() {
        let mut bad = entry(9, 1, dec!(50), dec!(0));
        bad.payed_amount = dec!(60);
        bad.is_paid = true;

        assert!(check_report(&[entry(1, 1, dec!(50), dec!(10))]).is_ok());
        let report = check_report(&[bad]).unwrap_err();
        assert!(report.contains("wage entry 9"), "got: {report}");
    }

    #[tokio::test]
    async fn build_engine_rejects_zero_timeout() {
        let mut config = AppConfig::default();
        config.database.connection_string = ":memory:".to_string();
        let store = open_store(&config.database).await.expect("in-memory store");

        config.engine.transaction_timeout_ms = 0;
        assert!(build_engine(store.clone(), &config).is_err());

        config.engine.transaction_timeout_ms = 250;
        assert!(build_engine(store, &config).is_ok());
    }

    #[tokio::test]
    async fn open_store_rejects_unknown_backend() {
        let db = DbConfig {
            backend: "postgres".to_string(),
            connection_string: String::new(),
        };

        assert!(open_store(&db).await.is_err());
    }
}
