//! Error types for vibecheck.
//!
//! This module defines all error types used throughout the vibecheck crate.
//! Note that the analytics and persistence cores never hand these to their
//! callers for storage or sink failures; they log and carry on. The `Result`
//! plumbing exists so backends can report what went wrong.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for vibecheck operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    /// A key-value backend rejected a read or write.
    #[error("storage error: {0}")]
    Storage(String),

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Analytics Errors ===
    /// An event name is blank.
    #[error("invalid event name '{name}'")]
    InvalidEventName {
        /// The rejected name.
        name: String,
    },

    /// A stored consent value is neither `granted` nor `denied`.
    #[error("unrecognized consent state '{value}'")]
    InvalidConsentState {
        /// The rejected value.
        value: String,
    },

    /// A link target is not an absolute `http` or `https` URL.
    #[error("refusing to follow '{url}': only http and https links are allowed")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
    },

    /// The delivery sink is unavailable or rejected a record.
    #[error("delivery sink unavailable: {0}")]
    SinkUnavailable(String),

    // === Checklist Errors ===
    /// Failed to read a checklist definition.
    #[error("failed to load checklist from {path}: {source}")]
    ChecklistLoad {
        /// Path to the checklist file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A checklist definition is structurally invalid.
    #[error("invalid checklist: {message}")]
    ChecklistInvalid {
        /// Description of the problem.
        message: String,
    },

    /// No checklist item has the given id.
    #[error("unknown checklist item '{0}'")]
    UnknownItem(String),

    /// No checklist section has the given id.
    #[error("unknown checklist section '{0}'")]
    UnknownSection(String),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for vibecheck operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new storage error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Create a new sink-unavailable error.
    #[must_use]
    pub fn sink_unavailable(message: impl Into<String>) -> Self {
        Self::SinkUnavailable(message.into())
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a checklist validation error.
    #[must_use]
    pub fn checklist_invalid(message: impl Into<String>) -> Self {
        Self::ChecklistInvalid {
            message: message.into(),
        }
    }

    /// Check if this error came from a storage backend.
    #[must_use]
    pub fn is_storage_error(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::DatabaseQuery(_) | Self::DatabaseOpen { .. }
        )
    }

    /// Check if this error refers to an id missing from the checklist.
    #[must_use]
    pub fn is_unknown_id(&self) -> bool {
        matches!(self, Self::UnknownItem(_) | Self::UnknownSection(_))
    }
}
