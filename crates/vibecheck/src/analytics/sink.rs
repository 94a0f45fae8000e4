//! Delivery sinks for telemetry records.
//!
//! A sink is where delivered events end up: an ordered, append-only log plus
//! a separate consent notification channel. Both calls are best-effort; the
//! consent gate logs and ignores any failure.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::event::{ConsentState, Record};
use crate::error::{Error, Result};

/// Destination for delivered telemetry.
pub trait DeliverySink: Send + Sync + fmt::Debug {
    /// Tell the sink's native consent mechanism about a new decision.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink has no consent mechanism or it failed.
    fn notify_consent(&self, state: ConsentState) -> Result<()>;

    /// Append a record to the end of the sink's log.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink is unavailable.
    fn append_event(&self, record: &Record) -> Result<()>;
}

/// In-memory data layer: keeps every delivered record and consent
/// notification in arrival order.
#[derive(Debug, Default)]
pub struct DataLayer {
    inner: Mutex<DataLayerLog>,
}

#[derive(Debug, Default)]
struct DataLayerLog {
    records: Vec<Record>,
    consent_updates: Vec<ConsentState>,
}

impl DataLayer {
    /// Create an empty data layer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn log(&self) -> MutexGuard<'_, DataLayerLog> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of every delivered record.
    #[must_use]
    pub fn records(&self) -> Vec<Record> {
        self.log().records.clone()
    }

    /// Names of the delivered events, in delivery order.
    #[must_use]
    pub fn event_names(&self) -> Vec<String> {
        self.log()
            .records
            .iter()
            .filter_map(|r| r.get(super::event::EVENT_FIELD))
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    }

    /// Number of delivered records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.log().records.len()
    }

    /// Whether nothing has been delivered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.log().records.is_empty()
    }

    /// Consent notifications received, in order.
    #[must_use]
    pub fn consent_updates(&self) -> Vec<ConsentState> {
        self.log().consent_updates.clone()
    }
}

impl DeliverySink for DataLayer {
    fn notify_consent(&self, state: ConsentState) -> Result<()> {
        self.log().consent_updates.push(state);
        Ok(())
    }

    fn append_event(&self, record: &Record) -> Result<()> {
        self.log().records.push(record.clone());
        Ok(())
    }
}

/// A sink that is never available. Every call fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DeliverySink for NullSink {
    fn notify_consent(&self, _state: ConsentState) -> Result<()> {
        Err(Error::sink_unavailable("no consent mechanism"))
    }

    fn append_event(&self, _record: &Record) -> Result<()> {
        Err(Error::sink_unavailable("no data layer"))
    }
}
