use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use farm_core::{AdvanceUpdate, LedgerStore, NewAdvance, NewEmployee};
use farm_ledger::app::{
    build_engine, check_report, open_store, render_advances, render_entries, render_plan,
};
use farm_ledger::logging::init_logging;
use farm_ledger::{AppConfig, WageEntryLoader};
use rust_decimal::Decimal;
use tracing::{debug, info};

// ─── CLI definition ──────────────────────────────────────────────────────────

/// Wage ledger for farm workers: record worked days, hand out advances and
/// keep every entry's paid amount reconciled with them.
#[derive(Debug, Parser)]
#[command(name = "farm-ledger", version, about, long_about = None)]
struct Cli {
    /// TOML configuration file. Missing files fall back to defaults.
    #[arg(long, global = true, default_value = "farm-ledger.toml")]
    config: PathBuf,

    /// Database backend, overriding the config file.
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Database connection string, overriding the config file.
    /// For SQLite this is a file path (e.g. `farm.db`) or `:memory:`.
    #[arg(long, global = true)]
    db: Option<String>,

    /// Transaction timeout in milliseconds, overriding the config file.
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Log level used when RUST_LOG is not set, overriding the config file.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Also append log output to this file.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Tenant on whose behalf the command runs.
    #[arg(long, global = true, default_value_t = 1)]
    user: i64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Register an employee.
    AddEmployee {
        #[arg(long)]
        name: String,
    },

    /// Allow advances and payments for an employee again.
    ActivateEmployee {
        #[arg(long)]
        id: i64,
    },

    /// Stop recording advances and payments for an employee.
    DeactivateEmployee {
        #[arg(long)]
        id: i64,
    },

    /// Import wage entries from a CSV file.
    ImportWages {
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Create, change or delete advances.
    Advance {
        #[command(subcommand)]
        action: AdvanceCommand,
    },

    /// Pay wages directly, oldest open entry first.
    Pay {
        #[arg(long)]
        employee: i64,
        /// Pay only this entry.
        #[arg(long)]
        entry: Option<i64>,
        #[arg(long)]
        amount: Decimal,
    },

    /// Show an employee's wage entries and advances.
    List {
        #[arg(long)]
        employee: i64,
    },

    /// Verify every wage entry of an employee is consistent.
    Check {
        #[arg(long)]
        employee: i64,
    },
}

#[derive(Debug, Subcommand)]
enum AdvanceCommand {
    Create {
        #[arg(long)]
        employee: i64,
        #[arg(long)]
        amount: Decimal,
        /// Date handed out (YYYY-MM-DD); defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        notes: Option<String>,
    },
    Update {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        amount: Option<Decimal>,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        notes: Option<String>,
    },
    Delete {
        #[arg(long)]
        id: i64,
    },
}

fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::load(&cli.config)?;
    if let Some(backend) = &cli.backend {
        config.database.backend = backend.clone();
    }
    if let Some(db) = &cli.db {
        config.database.connection_string = db.clone();
    }
    if let Some(ms) = cli.timeout_ms {
        config.engine.transaction_timeout_ms = ms;
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    config.engine_config()?;
    Ok(config)
}

// ─── entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    init_logging(&config.log_level, cli.log_file.as_deref())?;

    debug!(
        backend = %config.database.backend,
        db = %config.database.connection_string,
        "configuration resolved"
    );
    let store = open_store(&config.database)
        .await
        .with_context(|| format!("Failed to open {}", config.database.connection_string))?;
    let user = cli.user;

    match cli.command {
        Command::AddEmployee { name } => {
            let employee = store.create_employee(NewEmployee { user_id: user, name }).await?;
            println!("employee #{} {}", employee.id, employee.name);
        }

        Command::ActivateEmployee { id } => {
            let employee = store.set_employee_active(id, user, true).await?;
            println!("employee #{} {} is active", employee.id, employee.name);
        }

        Command::DeactivateEmployee { id } => {
            let employee = store.set_employee_active(id, user, false).await?;
            println!("employee #{} {} is inactive", employee.id, employee.name);
        }

        Command::ImportWages { file } => {
            let reader = File::open(&file)
                .with_context(|| format!("Failed to open: {}", file.display()))?;
            let records = WageEntryLoader::parse(reader)
                .with_context(|| format!("Failed to parse CSV: {}", file.display()))?;
            info!(records = records.len(), file = %file.display(), "parsed wage entries");

            let inserted = WageEntryLoader::load(&*store, user, &records)
                .await
                .context("Failed to import wage entries")?;
            println!("imported {inserted} wage entries");
        }

        Command::Advance { action } => {
            let engine = build_engine(store, &config)?;
            match action {
                AdvanceCommand::Create {
                    employee,
                    amount,
                    date,
                    notes,
                } => {
                    let advance = NewAdvance {
                        employee_id: employee,
                        amount,
                        date: date.unwrap_or_else(|| chrono::Local::now().date_naive()),
                        notes,
                    };
                    let change = engine.create_advance(user, advance).await?;
                    println!("advance #{} for {}", change.advance.id, change.advance.amount);
                    if let Some(plan) = &change.plan {
                        print!("{}", render_plan(plan));
                    }
                }
                AdvanceCommand::Update {
                    id,
                    amount,
                    date,
                    notes,
                } => {
                    let update = AdvanceUpdate {
                        amount,
                        date,
                        notes,
                    };
                    let change = engine.apply_advance_amount_change(user, id, update).await?;
                    println!("advance #{} now {}", change.advance.id, change.advance.amount);
                    match &change.plan {
                        Some(plan) => print!("{}", render_plan(plan)),
                        None => println!("amount unchanged; no wage entries touched"),
                    }
                }
                AdvanceCommand::Delete { id } => {
                    let plan = engine.remove_advance(user, id).await?;
                    println!("advance #{id} deleted");
                    print!("{}", render_plan(&plan));
                }
            }
        }

        Command::Pay {
            employee,
            entry,
            amount,
        } => {
            let engine = build_engine(store, &config)?;
            let plan = engine.pay_wages(user, employee, entry, amount).await?;
            print!("{}", render_plan(&plan));
        }

        Command::List { employee } => {
            let entries = store.list_wage_entries(employee, user).await?;
            let advances = store.list_advances(employee, user).await?;
            print!("{}", render_entries(&entries));
            print!("{}", render_advances(&advances));
        }

        Command::Check { employee } => {
            let entries = store.list_wage_entries(employee, user).await?;
            match check_report(&entries) {
                Ok(summary) => println!("{summary}"),
                Err(report) => {
                    eprint!("{report}");
                    bail!("wage entries of employee {employee} are inconsistent");
                }
            }
        }
    }

    Ok(())
}
