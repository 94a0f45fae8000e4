//! `SQLite` schema definitions for vibecheck.

/// SQL statement to create the key-value table.
pub const CREATE_KV_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
";

/// SQL statement to create the delivered events table.
pub const CREATE_EVENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    name TEXT NOT NULL,
    payload TEXT NOT NULL
)
";

/// SQL statement to create an index on event name for filtering.
pub const CREATE_EVENT_NAME_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_events_name ON events(name)
";

/// SQL statement to create the consent notification table.
pub const CREATE_CONSENT_UPDATES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS consent_updates (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    state TEXT NOT NULL
)
";

/// SQL statement to create the metadata table for schema bookkeeping.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_KV_TABLE,
    CREATE_EVENTS_TABLE,
    CREATE_EVENT_NAME_INDEX,
    CREATE_CONSENT_UPDATES_TABLE,
    CREATE_METADATA_TABLE,
];
