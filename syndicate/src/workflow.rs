//! GitHub workflow integration: log formatting and job state.
//!
//! Inside GitHub Actions (`GITHUB_ACTIONS=true`) events are printed as
//! workflow commands so the runner can classify them, and spans named
//! `group` fold their output under a collapsible `::group::` section.
//! Values that later steps of the job need are appended to the files named
//! by `$GITHUB_ENV` and `$GITHUB_OUTPUT`.

use std::fmt::{self, Write as _};
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::{self, FormatEvent, FormatFields};
use tracing_subscriber::fmt::{FmtContext, MakeWriter};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

/// Spans with this name become `::group::` sections.
pub const GROUP_SPAN: &str = "group";

/// Renders events as workflow commands: `::error::`, `::warning::`,
/// `::debug::`, or a plain line for INFO.
#[derive(Debug, Default, Clone, Copy)]
pub struct WorkflowFormat;

fn command_prefix(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "::error::",
        Level::WARN => "::warning::",
        Level::INFO => "",
        _ => "::debug::",
    }
}

/// Workflow commands end at the first newline, so data must be escaped.
fn escape_command_data(data: &str) -> String {
    data.replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

impl<S, N> FormatEvent<S, N> for WorkflowFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut message = String::new();
        ctx.field_format()
            .format_fields(format::Writer::new(&mut message), event)?;

        let prefix = command_prefix(event.metadata().level());
        if prefix.is_empty() {
            writeln!(writer, "{message}")
        } else {
            writeln!(writer, "{prefix}{}", escape_command_data(&message))
        }
    }
}

#[derive(Default)]
struct TitleVisitor(Option<String>);

impl Visit for TitleVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "title" {
            self.0 = Some(value.to_owned());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "title" {
            self.0 = Some(format!("{value:?}"));
        }
    }
}

/// Prints `::group::{title}` when a `group` span opens and `::endgroup::`
/// when it closes.
pub struct WorkflowGroups<W> {
    make_writer: W,
}

impl<W> WorkflowGroups<W> {
    pub fn new(make_writer: W) -> Self {
        Self { make_writer }
    }
}

impl<S, W> Layer<S> for WorkflowGroups<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'a> MakeWriter<'a> + 'static,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
        if attrs.metadata().name() != GROUP_SPAN {
            return;
        }
        let mut title = TitleVisitor::default();
        attrs.record(&mut title);
        let title = title.0.unwrap_or_else(|| GROUP_SPAN.to_string());
        let _ = writeln!(self.make_writer.make_writer(), "::group::{title}");
    }

    fn on_close(&self, id: Id, ctx: Context<'_, S>) {
        if ctx.metadata(&id).map(|m| m.name()) == Some(GROUP_SPAN) {
            let _ = writeln!(self.make_writer.make_writer(), "::endgroup::");
        }
    }
}

/// Install the global subscriber: workflow commands inside GitHub Actions,
/// the default formatter elsewhere. `RUST_LOG` overrides the level.
pub fn init_tracing() {
    let in_actions = std::env::var("GITHUB_ACTIONS").is_ok_and(|v| v == "true");
    let default_level = if in_actions { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if in_actions {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .event_format(WorkflowFormat)
                    .with_writer(std::io::stdout),
            )
            .with(WorkflowGroups::new(std::io::stdout))
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// The job's state files. A missing file means there is no later step to
/// hand state to; writes are then skipped.
#[derive(Debug, Clone, Default)]
pub struct JobFiles {
    pub env: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

impl JobFiles {
    pub fn from_env() -> Self {
        let path = |key: &str| {
            std::env::var_os(key)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        };
        Self {
            env: path("GITHUB_ENV"),
            output: path("GITHUB_OUTPUT"),
        }
    }

    /// Set `key` in the environment of the job's later steps.
    pub fn export_env(&self, key: &str, value: &str) -> std::io::Result<()> {
        append_assignment(self.env.as_deref(), key, value)
    }

    /// Set an output of the current step.
    pub fn set_output(&self, key: &str, value: &str) -> std::io::Result<()> {
        append_assignment(self.output.as_deref(), key, value)
    }
}

fn append_assignment(file: Option<&Path>, key: &str, value: &str) -> std::io::Result<()> {
    let Some(file) = file else {
        tracing::debug!(key, "No job state file; not persisting");
        return Ok(());
    };

    let mut line = String::new();
    if value.contains('\n') {
        let delimiter = format!("SYNDICATE_EOF_{}", std::process::id());
        let _ = write!(line, "{key}<<{delimiter}\n{value}\n{delimiter}\n");
    } else {
        let _ = writeln!(line, "{key}={value}");
    }

    let mut f = OpenOptions::new().create(true).append(true).open(file)?;
    f.write_all(line.as_bytes())?;
    tracing::debug!(key, file = %file.display(), "Persisted job state");
    Ok(())
}
