//! Query model for the event log: filter, sort, paginate.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use themewatch_core::{EventCause, ThemeMode};

/// Column to sort on. Ties always fall back to `id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Timestamp,
    Mode,
    Source,
}

impl SortKey {
    fn column(self) -> &'static str {
        match self {
            SortKey::Timestamp => "timestamp_ms",
            SortKey::Mode => "mode",
            SortKey::Source => "source_process",
        }
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "timestamp" | "time" => Ok(SortKey::Timestamp),
            "mode" => Ok(SortKey::Mode),
            "source" | "source_process" => Ok(SortKey::Source),
            other => Err(format!(
                "unknown sort key '{other}'; expected: timestamp, mode, source"
            )),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortKey::Timestamp => write!(f, "timestamp"),
            SortKey::Mode => write!(f, "mode"),
            SortKey::Source => write!(f, "source"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    fn keyword(self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

/// Row filter; every `None` field matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub mode: Option<ThemeMode>,
    pub cause: Option<EventCause>,
    /// Case-insensitive substring of the source process.
    pub source_contains: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl EventFilter {
    /// `WHERE …` clause (empty when unfiltered) and its bound values.
    pub(crate) fn to_sql(&self) -> (String, Vec<Value>) {
        let mut clauses = Vec::new();
        let mut values = Vec::new();

        if let Some(mode) = self.mode {
            clauses.push("mode = ?");
            values.push(Value::Text(mode.to_string()));
        }
        if let Some(cause) = self.cause {
            clauses.push("cause = ?");
            values.push(Value::Text(cause.as_str().to_string()));
        }
        if let Some(source) = self.source_contains.as_ref() {
            clauses.push("instr(lower(source_process), lower(?)) > 0");
            values.push(Value::Text(source.clone()));
        }
        if let Some(since) = self.since {
            clauses.push("timestamp_ms >= ?");
            values.push(Value::Integer(since.timestamp_millis()));
        }
        if let Some(until) = self.until {
            clauses.push("timestamp_ms <= ?");
            values.push(Value::Integer(until.timestamp_millis()));
        }

        if clauses.is_empty() {
            (String::new(), values)
        } else {
            (format!(" WHERE {}", clauses.join(" AND ")), values)
        }
    }
}

/// A full query: filter, ordering and pagination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQuery {
    pub filter: EventFilter,
    pub sort: SortKey,
    pub order: SortOrder,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl EventQuery {
    /// Newest first, at most `limit` rows: the dashboard view.
    pub fn latest(limit: usize) -> Self {
        Self {
            order: SortOrder::Descending,
            limit: Some(limit),
            ..Self::default()
        }
    }

    /// `ORDER BY … LIMIT … OFFSET …` tail. The `id` tiebreak follows the
    /// primary direction.
    pub(crate) fn order_sql(&self) -> String {
        let dir = self.order.keyword();
        let limit = self
            .limit
            .map(|l| i64::try_from(l).unwrap_or(i64::MAX))
            .unwrap_or(-1);
        format!(
            " ORDER BY {col} {dir}, id {dir} LIMIT {limit} OFFSET {offset}",
            col = self.sort.column(),
            offset = self.offset,
        )
    }
}
