//! `themewatch log`: query, export and clear the change log.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tabled::{settings::Style, Table, Tabled};

use themewatch_core::{EventCause, ThemeEvent};
use themewatch_store::{EventFilter, EventQuery, SortKey, SortOrder};

use super::{home, open_service};
use crate::ModeArg;

#[derive(Subcommand, Debug)]
pub enum LogCommand {
    /// List recorded theme changes.
    List(ListArgs),
    /// Write the whole log as CSV.
    Export(ExportArgs),
    /// Delete every recorded change.
    Clear,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only events that switched to this mode.
    #[arg(long)]
    pub mode: Option<ModeArg>,

    /// external | enforced | manual
    #[arg(long)]
    pub cause: Option<EventCause>,

    /// Case-insensitive substring of the source process.
    #[arg(long)]
    pub source: Option<String>,

    /// timestamp | mode | source
    #[arg(long, default_value = "timestamp")]
    pub sort: SortKey,

    /// Newest (or highest) first.
    #[arg(long)]
    pub desc: bool,

    #[arg(long)]
    pub limit: Option<usize>,

    #[arg(long, default_value_t = 0)]
    pub offset: usize,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Destination file; stdout when omitted.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

#[derive(Tabled)]
struct EventRow {
    #[tabled(rename = "id")]
    id: i64,
    #[tabled(rename = "time (UTC)")]
    time: String,
    #[tabled(rename = "mode")]
    mode: String,
    #[tabled(rename = "cause")]
    cause: String,
    #[tabled(rename = "source")]
    source: String,
    #[tabled(rename = "detail")]
    detail: String,
}

impl From<ThemeEvent> for EventRow {
    fn from(event: ThemeEvent) -> Self {
        Self {
            id: event.id.0,
            time: event.timestamp.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            mode: event.mode.to_string(),
            cause: event.cause.to_string(),
            source: event.source_process,
            detail: event.detail,
        }
    }
}

pub fn run(command: LogCommand) -> Result<()> {
    match command {
        LogCommand::List(args) => list(args),
        LogCommand::Export(args) => export(args),
        LogCommand::Clear => clear(),
    }
}

fn list(args: ListArgs) -> Result<()> {
    let service = open_service(&home()?)?;
    let query = EventQuery {
        filter: EventFilter {
            mode: args.mode.map(Into::into),
            cause: args.cause,
            source_contains: args.source,
            ..EventFilter::default()
        },
        sort: args.sort,
        order: if args.desc {
            SortOrder::Descending
        } else {
            SortOrder::Ascending
        },
        limit: args.limit,
        offset: args.offset,
    };
    let events = service
        .query_events(&query)
        .context("failed to query the event log")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&events).context("failed to serialize events")?
        );
        return Ok(());
    }

    if events.is_empty() {
        println!("No theme changes recorded.");
        return Ok(());
    }
    let rows: Vec<EventRow> = events.into_iter().map(EventRow::from).collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}

fn export(args: ExportArgs) -> Result<()> {
    let service = open_service(&home()?)?;
    match args.output {
        Some(path) => {
            let file =
                File::create(&path).with_context(|| format!("create {}", path.display()))?;
            let rows = service
                .export_events(BufWriter::new(file))
                .with_context(|| format!("failed to export to {}", path.display()))?;
            eprintln!("exported {rows} events to {}", path.display());
        }
        None => {
            service
                .export_events(io::stdout().lock())
                .context("failed to export the event log")?;
        }
    }
    Ok(())
}

fn clear() -> Result<()> {
    let service = open_service(&home()?)?;
    let removed = service
        .clear_events()
        .context("failed to clear the event log")?;
    println!("cleared {removed} events");
    Ok(())
}
