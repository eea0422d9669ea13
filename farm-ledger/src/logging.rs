use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    EnvFilter,
    fmt::{
        FmtContext,
        format::{FormatEvent, FormatFields, Writer},
    },
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
};

/// Local-time event format: timestamp, padded level, source location, fields.
pub struct LocalFmt;

fn level_color(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "\x1b[1;31m",
        Level::WARN => "\x1b[1;33m",
        Level::INFO => "\x1b[1;32m",
        Level::DEBUG => "\x1b[1;34m",
        Level::TRACE => "\x1b[1;35m",
    }
}

/// `farm-core/src/reconciliation/engine.rs` becomes
/// `farm-core/reconciliation/engine.rs`; a bare `src/` prefix is dropped.
fn short_location(file: &str) -> String {
    match file.split_once("/src/") {
        Some((krate, rest)) => format!("{krate}/{rest}"),
        None => file.strip_prefix("src/").unwrap_or(file).to_string(),
    }
}

impl<S, N> FormatEvent<S, N> for LocalFmt
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let meta = event.metadata();
        let stamp = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
        let location = match (meta.file(), meta.line()) {
            (Some(file), Some(line)) => format!("{}:{line} ", short_location(file)),
            _ => String::new(),
        };

        if writer.has_ansi_escapes() {
            write!(
                writer,
                "\x1b[2m{stamp}\x1b[0m {}{:>5}\x1b[0m \x1b[36m{location}\x1b[0m",
                level_color(meta.level()),
                meta.level()
            )?;
        } else {
            write!(writer, "{stamp} {:>5} {location}", meta.level())?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

fn open_log_file(path: &Path) -> Result<File> {
    File::options()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open log file '{}'", path.display()))
}

/// `RUST_LOG` when set, otherwise `default_level`.
pub fn make_filter(default_level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(default_level)
            .with_context(|| format!("invalid log level '{default_level}'")),
    }
}

/// Install the global subscriber. Call once at startup.
///
/// Events go to stderr, colored when attached to a terminal, so command
/// output on stdout stays clean. With `log_file` every event is also
/// appended there without color.
pub fn init_logging(default_level: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = make_filter(default_level)?;

    let stderr_layer = tracing_subscriber::fmt::layer()
        .event_format(LocalFmt)
        .with_ansi(io::stderr().is_terminal())
        .with_writer(io::stderr);

    let file_layer = match log_file {
        Some(path) => {
            let file = open_log_file(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .event_format(LocalFmt)
                    .with_ansi(false)
                    .with_writer(Arc::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("logging already initialized")
}
