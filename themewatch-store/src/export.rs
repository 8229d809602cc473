//! CSV export of the event log.
//!
//! Layout: a header row `id,timestamp,mode,source_process,detail,cause`, then
//! one row per event. Timestamps are RFC 3339 UTC with millisecond precision.
//! Fields containing a comma, quote or line break are quoted, with embedded
//! quotes doubled.

use std::io::{Read, Write};

use chrono::{DateTime, SecondsFormat, Utc};
use themewatch_core::{EventCause, EventId, ThemeEvent, ThemeMode};

use crate::error::StorageError;

pub const CSV_HEADER: [&str; 6] = ["id", "timestamp", "mode", "source_process", "detail", "cause"];

/// Write `events` in the order given.
pub fn write_csv<W: Write>(mut out: W, events: &[ThemeEvent]) -> Result<(), StorageError> {
    write_record(&mut out, &CSV_HEADER)?;
    for event in events {
        let id = event.id.to_string();
        let timestamp = event.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true);
        let mode = event.mode.to_string();
        write_record(
            &mut out,
            &[
                id.as_str(),
                timestamp.as_str(),
                mode.as_str(),
                event.source_process.as_str(),
                event.detail.as_str(),
                event.cause.as_str(),
            ],
        )?;
    }
    out.flush().map_err(StorageError::Export)
}

fn write_record<W: Write>(out: &mut W, fields: &[&str]) -> Result<(), StorageError> {
    let line = fields
        .iter()
        .map(|f| escape(f))
        .collect::<Vec<_>>()
        .join(",");
    out.write_all(line.as_bytes())
        .and_then(|_| out.write_all(b"\r\n"))
        .map_err(StorageError::Export)
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Parse a document produced by [`write_csv`].
pub fn read_csv<R: Read>(mut input: R) -> Result<Vec<ThemeEvent>, StorageError> {
    let mut text = String::new();
    input
        .read_to_string(&mut text)
        .map_err(StorageError::Export)?;

    let mut records = split_records(&text)?.into_iter();
    match records.next() {
        Some((_, header)) if header == CSV_HEADER => {}
        Some((line, header)) => {
            return Err(StorageError::Csv {
                line,
                reason: format!("unexpected header {header:?}"),
            })
        }
        None => {
            return Err(StorageError::Csv {
                line: 1,
                reason: "missing header".to_string(),
            })
        }
    }

    records
        .map(|(line, fields)| parse_event(line, fields))
        .collect()
}

fn parse_event(line: usize, fields: Vec<String>) -> Result<ThemeEvent, StorageError> {
    let bad = |reason: String| StorageError::Csv { line, reason };
    let [id, timestamp, mode, source_process, detail, cause]: [String; 6] = fields
        .try_into()
        .map_err(|f: Vec<String>| bad(format!("expected 6 fields, found {}", f.len())))?;

    let id = id
        .parse::<i64>()
        .map_err(|_| bad(format!("bad id {id:?}")))?;
    let timestamp = DateTime::parse_from_rfc3339(&timestamp)
        .map_err(|e| bad(format!("bad timestamp {timestamp:?}: {e}")))?
        .with_timezone(&Utc);
    let mode = mode
        .parse::<ThemeMode>()
        .map_err(|e| bad(e.to_string()))?;
    let cause = cause.parse::<EventCause>().map_err(bad)?;

    Ok(ThemeEvent {
        id: EventId(id),
        timestamp,
        mode,
        source_process,
        detail,
        cause,
    })
}

/// Split into records of fields, tagging each with the line it starts on.
fn split_records(text: &str) -> Result<Vec<(usize, Vec<String>)>, StorageError> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut record_line = 1;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => fields.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                fields.push(std::mem::take(&mut field));
                records.push((record_line, std::mem::take(&mut fields)));
                line += 1;
                record_line = line;
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(StorageError::Csv {
            line: record_line,
            reason: "unterminated quoted field".to_string(),
        });
    }
    if !field.is_empty() || !fields.is_empty() {
        fields.push(field);
        records.push((record_line, fields));
    }
    Ok(records)
}
