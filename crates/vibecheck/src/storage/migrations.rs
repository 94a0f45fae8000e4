//! Schema versioning for the vibecheck database.
//!
//! The base schema is created idempotently by [`SCHEMA_STATEMENTS`]; anything
//! added later goes into [`MIGRATIONS`] as a numbered step, applied in order
//! inside a transaction and recorded in the `metadata` table.

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::{Error, Result};

use super::schema::SCHEMA_STATEMENTS;

/// Key used to store the schema version in the metadata table.
const VERSION_KEY: &str = "schema_version";

/// Numbered schema changes applied on top of the base schema.
///
/// Version 1 is the base schema itself and carries no SQL.
const MIGRATIONS: &[(i32, &str)] = &[(1, "")];

/// The current schema version.
pub const CURRENT_VERSION: i32 = 1;

/// Create the base schema and bring it up to [`CURRENT_VERSION`].
///
/// # Errors
///
/// Returns an error if schema creation or a migration fails, or if the
/// database was written by a newer version.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    for statement in SCHEMA_STATEMENTS {
        conn.execute(statement, [])?;
    }

    let version = schema_version(conn)?;
    if version > CURRENT_VERSION {
        return Err(Error::DatabaseMigration {
            message: format!(
                "database schema version {version} is newer than supported version {CURRENT_VERSION}"
            ),
        });
    }

    for &(target, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > version) {
        apply(conn, target, sql)?;
    }

    Ok(())
}

/// Read the recorded schema version, 0 for a fresh database.
fn schema_version(conn: &Connection) -> Result<i32> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            [VERSION_KEY],
            |row| row.get(0),
        )
        .optional()?;

    match value {
        None => Ok(0),
        Some(value) => value.parse().map_err(|_| Error::DatabaseMigration {
            message: format!("invalid schema version: {value}"),
        }),
    }
}

fn apply(conn: &Connection, version: i32, sql: &str) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    if !sql.is_empty() {
        tx.execute_batch(sql).map_err(|e| Error::DatabaseMigration {
            message: format!("migration {version} failed: {e}"),
        })?;
    }
    tx.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        (VERSION_KEY, version.to_string()),
    )?;
    tx.commit()?;

    if version == 1 {
        debug!("Initialized schema");
    } else {
        info!("Migrated schema to version {}", version);
    }
    Ok(())
}
