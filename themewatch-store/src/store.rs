//! SQLite-backed event log.
//!
//! Schema:
//! - `theme_events`: one row per recorded change, keyed by an
//!   autoincrement `id`; timestamps are Unix milliseconds (UTC).
//!
//! A single connection behind a mutex serialises every write, so an append
//! is atomic with respect to concurrent appends and queries.

use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use themewatch_core::{EventCause, EventId, NewThemeEvent, ThemeEvent, ThemeMode};

use crate::error::{io_err, StorageError};
use crate::export::write_csv;
use crate::query::{EventFilter, EventQuery};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS theme_events (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp_ms   INTEGER NOT NULL,
        mode           TEXT    NOT NULL,
        source_process TEXT    NOT NULL,
        detail         TEXT    NOT NULL,
        cause          TEXT    NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_theme_events_timestamp
        ON theme_events(timestamp_ms);
";

const SELECT_COLUMNS: &str =
    "SELECT id, timestamp_ms, mode, source_process, detail, cause FROM theme_events";

/// Raw column values before conversion into domain types.
struct RawRow {
    id: i64,
    timestamp_ms: i64,
    mode: String,
    source_process: String,
    detail: String,
    cause: String,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            timestamp_ms: row.get(1)?,
            mode: row.get(2)?,
            source_process: row.get(3)?,
            detail: row.get(4)?,
            cause: row.get(5)?,
        })
    }

    fn into_event(self) -> Result<ThemeEvent, StorageError> {
        let corrupt = |column: &'static str, value: String| StorageError::CorruptRow {
            id: self.id,
            column,
            value,
        };
        let timestamp = millis_to_utc(self.timestamp_ms)
            .ok_or_else(|| corrupt("timestamp_ms", self.timestamp_ms.to_string()))?;
        let mode = self
            .mode
            .parse::<ThemeMode>()
            .map_err(|_| corrupt("mode", self.mode.clone()))?;
        let cause = self
            .cause
            .parse::<EventCause>()
            .map_err(|_| corrupt("cause", self.cause.clone()))?;
        Ok(ThemeEvent {
            id: EventId(self.id),
            timestamp,
            mode,
            source_process: self.source_process,
            detail: self.detail,
            cause,
        })
    }
}

/// Append-only log of theme events.
pub struct EventStore {
    conn: Mutex<Connection>,
}

impl EventStore {
    /// Open (or create) the database at `path`, creating parent directories.
    pub fn open_at(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
            }
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        tracing::debug!(path = %path.display(), "opened event store");
        Self::init(conn)
    }

    /// Private in-memory database; used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert one event and return it as stored.
    ///
    /// The stored timestamp never precedes the newest existing row; a clock
    /// that stepped backwards is clamped forward so id order and time order
    /// agree.
    pub fn append(&self, event: &NewThemeEvent) -> Result<ThemeEvent, StorageError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        let newest: Option<i64> = tx
            .query_row("SELECT MAX(timestamp_ms) FROM theme_events", [], |row| {
                row.get(0)
            })
            .optional()?
            .flatten();
        let requested = event.timestamp.timestamp_millis();
        let timestamp_ms = match newest {
            Some(newest) if newest > requested => {
                tracing::debug!(requested, newest, "clamped event timestamp forward");
                newest
            }
            _ => requested,
        };

        tx.execute(
            "INSERT INTO theme_events (timestamp_ms, mode, source_process, detail, cause)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                timestamp_ms,
                event.mode.to_string(),
                event.source_process,
                event.detail,
                event.cause.as_str(),
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        let timestamp = millis_to_utc(timestamp_ms).unwrap_or(event.timestamp);
        Ok(ThemeEvent {
            id: EventId(id),
            timestamp,
            mode: event.mode,
            source_process: event.source_process.clone(),
            detail: event.detail.clone(),
            cause: event.cause,
        })
    }

    /// Events matching `query`, in the requested order.
    pub fn query(&self, query: &EventQuery) -> Result<Vec<ThemeEvent>, StorageError> {
        let (where_sql, values) = query.filter.to_sql();
        let sql = format!("{SELECT_COLUMNS}{where_sql}{}", query.order_sql());

        let rows = {
            let conn = self.lock();
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values), RawRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };
        rows.into_iter().map(RawRow::into_event).collect()
    }

    /// Number of events matching `filter`.
    pub fn count(&self, filter: &EventFilter) -> Result<u64, StorageError> {
        let (where_sql, values) = filter.to_sql();
        let sql = format!("SELECT COUNT(*) FROM theme_events{where_sql}");
        let conn = self.lock();
        let n: i64 = conn.query_row(&sql, params_from_iter(values), |row| row.get(0))?;
        Ok(u64::try_from(n).unwrap_or(0))
    }

    /// Delete every event; returns how many were removed.
    pub fn clear(&self) -> Result<u64, StorageError> {
        let conn = self.lock();
        let removed = conn.execute("DELETE FROM theme_events", [])?;
        tracing::info!(removed, "cleared event log");
        Ok(removed as u64)
    }

    /// Write every event, oldest first, as CSV. Returns the row count.
    ///
    /// The rows are read before any output is produced, so a slow writer
    /// never holds the database lock.
    pub fn export_csv<W: Write>(&self, out: W) -> Result<usize, StorageError> {
        let events = self.query(&EventQuery::default())?;
        write_csv(out, &events)?;
        Ok(events.len())
    }
}

fn millis_to_utc(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(ms: i64, mode: ThemeMode, cause: EventCause) -> NewThemeEvent {
        NewThemeEvent {
            timestamp: millis_to_utc(ms).unwrap(),
            mode,
            source_process: "explorer.exe".to_string(),
            detail: "apps: Light -> Dark, system: Light -> Dark".to_string(),
            cause,
        }
    }

    #[test]
    fn append_assigns_increasing_ids() {
        let store = EventStore::open_in_memory().unwrap();
        let a = store
            .append(&event(1_000, ThemeMode::Dark, EventCause::External))
            .unwrap();
        let b = store
            .append(&event(2_000, ThemeMode::Light, EventCause::Enforced))
            .unwrap();
        assert!(b.id > a.id);
        assert_eq!(store.count(&EventFilter::default()).unwrap(), 2);
    }

    #[test]
    fn backwards_clock_is_clamped() {
        let store = EventStore::open_in_memory().unwrap();
        store
            .append(&event(5_000, ThemeMode::Dark, EventCause::External))
            .unwrap();
        let late = store
            .append(&event(4_000, ThemeMode::Light, EventCause::External))
            .unwrap();
        assert_eq!(late.timestamp.timestamp_millis(), 5_000);
    }

    #[test]
    fn corrupt_mode_is_reported_with_row_id() {
        let store = EventStore::open_in_memory().unwrap();
        store
            .lock()
            .execute(
                "INSERT INTO theme_events (timestamp_ms, mode, source_process, detail, cause)
                 VALUES (1, 'Sepia', 'x', 'y', 'external')",
                [],
            )
            .unwrap();
        let err = store.query(&EventQuery::default()).unwrap_err();
        assert!(matches!(
            err,
            StorageError::CorruptRow { column: "mode", .. }
        ));
    }

    #[test]
    fn clear_reports_removed_rows() {
        let store = EventStore::open_in_memory().unwrap();
        for ms in [1, 2, 3] {
            store
                .append(&event(ms, ThemeMode::Dark, EventCause::External))
                .unwrap();
        }
        assert_eq!(store.clear().unwrap(), 3);
        assert_eq!(store.clear().unwrap(), 0);
    }
}
