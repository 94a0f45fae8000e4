//! Storage layer for vibecheck.
//!
//! Both cores persist through the [`KeyValueStore`] trait. [`SqliteStore`] is
//! the durable backend used by the binary: it holds the key-value table and
//! doubles as the delivery sink, logging delivered events and consent
//! notifications. [`MemoryStore`] is a volatile backend for tests and
//! embedding.

mod memory;
pub mod migrations;
pub mod schema;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::analytics::{ConsentState, DeliverySink, Record, EVENT_FIELD};
use crate::error::{Error, Result};

pub use memory::MemoryStore;

/// A string key-value store.
pub trait KeyValueStore: Send + Sync + fmt::Debug {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the write.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete `key`. Deleting a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the delete.
    fn remove(&self, key: &str) -> Result<()>;
}

/// `SQLite`-backed storage.
#[derive(Debug)]
pub struct SqliteStore {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        debug!("Database opened at {}", path.display());
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Mutex::new(conn),
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The most recent delivered events, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn recent_events(&self, limit: usize) -> Result<Vec<DeliveredEvent>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            r"
            SELECT id, timestamp, name, payload
            FROM events ORDER BY id DESC LIMIT ?1
            ",
        )?;

        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut events: Vec<DeliveredEvent> = stmt
            .query_map([limit_i64], Self::row_to_event)?
            .collect::<std::result::Result<Vec<_>, _>>()?
            .into_iter()
            .flatten()
            .collect();
        events.reverse();

        Ok(events)
    }

    /// Delivered events with the given name, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn events_named(&self, name: &str, limit: usize) -> Result<Vec<DeliveredEvent>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            r"
            SELECT id, timestamp, name, payload
            FROM events WHERE name = ?1 ORDER BY id DESC LIMIT ?2
            ",
        )?;

        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut events: Vec<DeliveredEvent> = stmt
            .query_map(params![name, limit_i64], Self::row_to_event)?
            .collect::<std::result::Result<Vec<_>, _>>()?
            .into_iter()
            .flatten()
            .collect();
        events.reverse();

        Ok(events)
    }

    /// Count delivered events.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn event_count(&self) -> Result<i64> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(count)
    }

    /// The most recent consent changes, newest first.
    ///
    /// Only transitions are recorded, so restoring an unchanged decision at
    /// startup does not add an entry. Rows with an unknown state or an
    /// unreadable timestamp are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn consent_history(&self, limit: usize) -> Result<Vec<ConsentUpdate>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            r"
            SELECT id, timestamp, state
            FROM consent_updates ORDER BY id DESC LIMIT ?1
            ",
        )?;

        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map([limit_i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows
            .into_iter()
            .filter_map(|(id, timestamp, state)| {
                let state = match state.parse() {
                    Ok(state) => state,
                    Err(e) => {
                        warn!("Skipping consent update {}: {}", id, e);
                        return None;
                    }
                };
                let Some(timestamp) = parse_timestamp(&timestamp) else {
                    warn!("Skipping consent update {}: bad timestamp '{}'", id, timestamp);
                    return None;
                };
                Some(ConsentUpdate {
                    id,
                    timestamp,
                    state,
                })
            })
            .collect())
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let conn = self.conn();
        let total_events: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        let consent_updates: i64 =
            conn.query_row("SELECT COUNT(*) FROM consent_updates", [], |row| row.get(0))?;
        let stored_keys: i64 = conn.query_row("SELECT COUNT(*) FROM kv", [], |row| row.get(0))?;

        let oldest: Option<String> = conn
            .query_row(
                "SELECT timestamp FROM events ORDER BY id ASC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        let newest: Option<String> = conn
            .query_row(
                "SELECT timestamp FROM events ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            total_events,
            consent_updates,
            stored_keys,
            oldest_event: oldest.as_deref().and_then(parse_timestamp),
            newest_event: newest.as_deref().and_then(parse_timestamp),
            db_size_bytes,
        })
    }

    /// Convert a row, or `None` if its timestamp cannot be read.
    fn row_to_event(row: &rusqlite::Row) -> rusqlite::Result<Option<DeliveredEvent>> {
        let id: i64 = row.get(0)?;
        let timestamp: String = row.get(1)?;
        let name: String = row.get(2)?;
        let payload: String = row.get(3)?;

        let Some(parsed) = parse_timestamp(&timestamp) else {
            warn!("Skipping event {}: bad timestamp '{}'", id, timestamp);
            return Ok(None);
        };

        let record = match serde_json::from_str::<Record>(&payload) {
            Ok(record) => record,
            Err(e) => {
                warn!("Unreadable payload for event {}: {}", id, e);
                let mut record = Record::new();
                record.insert(EVENT_FIELD.to_string(), Value::String(name.clone()));
                record
            }
        };

        Ok(Some(DeliveredEvent {
            id,
            timestamp: parsed,
            name,
            record,
        }))
    }

    fn latest_consent(&self) -> Result<Option<String>> {
        let state = self
            .conn()
            .query_row(
                "SELECT state FROM consent_updates ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(state)
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn()
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn().execute(
            r"
            INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            ",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.conn().execute("DELETE FROM kv WHERE key = ?1", [key])?;
        Ok(())
    }
}

impl DeliverySink for SqliteStore {
    fn notify_consent(&self, state: ConsentState) -> Result<()> {
        if self.latest_consent()?.as_deref() == Some(state.as_str()) {
            debug!("Consent unchanged ({}), not recorded", state);
            return Ok(());
        }
        self.conn().execute(
            "INSERT INTO consent_updates (timestamp, state) VALUES (?1, ?2)",
            params![Utc::now().to_rfc3339(), state.as_str()],
        )?;
        Ok(())
    }

    fn append_event(&self, record: &Record) -> Result<()> {
        let name = record
            .get(EVENT_FIELD)
            .and_then(Value::as_str)
            .ok_or_else(|| Error::sink_unavailable("record has no event name"))?;
        let payload = serde_json::to_string(record)?;

        self.conn().execute(
            "INSERT INTO events (timestamp, name, payload) VALUES (?1, ?2, ?3)",
            params![Utc::now().to_rfc3339(), name, payload],
        )?;
        Ok(())
    }
}

/// An event as recorded by [`SqliteStore`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveredEvent {
    /// Row id, increasing in delivery order.
    pub id: i64,
    /// When the event was delivered.
    pub timestamp: DateTime<Utc>,
    /// The event name.
    pub name: String,
    /// The delivered record.
    pub record: Record,
}

/// A consent notification as recorded by [`SqliteStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsentUpdate {
    /// Row id.
    pub id: i64,
    /// When the notification arrived.
    pub timestamp: DateTime<Utc>,
    /// The new consent state.
    pub state: ConsentState,
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    /// Total number of delivered events.
    pub total_events: i64,
    /// Total number of consent notifications.
    pub consent_updates: i64,
    /// Number of keys in the key-value table.
    pub stored_keys: i64,
    /// Timestamp of the oldest delivered event.
    pub oldest_event: Option<DateTime<Utc>>,
    /// Timestamp of the newest delivered event.
    pub newest_event: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}
