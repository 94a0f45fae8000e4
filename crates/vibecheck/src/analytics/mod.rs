//! Consent-gated analytics.
//!
//! [`Analytics`] owns the per-session consent flag and the queue of events
//! captured before consent. Events go straight to the [`DeliverySink`] while
//! consent is granted and wait in the queue otherwise. Granting consent
//! drains the queue, in insertion order, before the call returns.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use vibecheck::analytics::{Analytics, ConsentState, DataLayer};
//! use vibecheck::storage::MemoryStore;
//!
//! let sink = Arc::new(DataLayer::new());
//! let mut analytics = Analytics::new(Arc::new(MemoryStore::new()), sink.clone());
//!
//! analytics.track_progress_milestone(25);
//! assert_eq!(analytics.queued_len(), 1);
//!
//! analytics.set_consent(ConsentState::Granted);
//! assert_eq!(analytics.queued_len(), 0);
//! assert_eq!(sink.event_names(), vec!["progress_milestone"]);
//! ```

mod event;
mod sink;
mod track;

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::{Config, DEFAULT_CONSENT_KEY};
use crate::storage::KeyValueStore;

pub use event::{
    is_valid_event_name, names, ConsentState, Event, ParamValue, Params, Record, CONSENT_PARAM,
    EVENT_FIELD,
};
pub use sink::{DataLayer, DeliverySink, NullSink};

/// Consent state machine and pre-consent event queue.
///
/// Invariant: while [`is_consent_granted`](Self::is_consent_granted) is true
/// the queue is empty.
#[derive(Debug)]
pub struct Analytics {
    store: Arc<dyn KeyValueStore>,
    sink: Arc<dyn DeliverySink>,
    consent_key: String,
    max_queued: Option<usize>,
    granted: bool,
    queue: VecDeque<Event>,
}

impl Analytics {
    /// Create an analytics core with default settings. Consent starts
    /// ungranted and the queue starts empty.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, sink: Arc<dyn DeliverySink>) -> Self {
        Self {
            store,
            sink,
            consent_key: DEFAULT_CONSENT_KEY.to_string(),
            max_queued: None,
            granted: false,
            queue: VecDeque::new(),
        }
    }

    /// Create an analytics core using the key and queue cap from `config`.
    #[must_use]
    pub fn from_config(
        config: &Config,
        store: Arc<dyn KeyValueStore>,
        sink: Arc<dyn DeliverySink>,
    ) -> Self {
        Self::new(store, sink)
            .with_consent_key(config.analytics.consent_key.clone())
            .with_max_queued(config.max_queued_events())
    }

    /// Use a different storage key for the consent decision.
    #[must_use]
    pub fn with_consent_key(mut self, key: impl Into<String>) -> Self {
        self.consent_key = key.into();
        self
    }

    /// Cap the pre-consent queue. When full, the oldest queued event is
    /// dropped. `None` leaves the queue unbounded.
    #[must_use]
    pub fn with_max_queued(mut self, max: Option<usize>) -> Self {
        self.max_queued = max.filter(|&n| n > 0);
        self
    }

    /// Record a consent decision.
    ///
    /// Notifies the sink and persists the decision, ignoring failures of
    /// either. Granting (when not already granted) delivers every queued
    /// event in order and empties the queue; denying re-arms queueing.
    pub fn set_consent(&mut self, state: ConsentState) {
        if let Err(e) = self.sink.notify_consent(state) {
            debug!(error = %e, "Sink consent notification unavailable");
        }

        if let Err(e) = self.store.set(&self.consent_key, state.as_str()) {
            warn!(error = %e, "Failed to persist consent state");
        }

        match state {
            ConsentState::Granted if !self.granted => {
                self.granted = true;
                self.flush_queue();
            }
            ConsentState::Granted => {}
            ConsentState::Denied => self.granted = false,
        }

        debug!(%state, "Consent updated");
    }

    /// Apply the persisted consent decision, if there is one.
    pub fn restore_consent(&mut self) {
        if let Some(state) = self.get_consent_state() {
            self.set_consent(state);
            debug!(%state, "Consent restored from storage");
        }
    }

    /// Read the persisted consent decision. Does not touch the session flag
    /// or the queue.
    #[must_use]
    pub fn get_consent_state(&self) -> Option<ConsentState> {
        match self.store.get(&self.consent_key) {
            Ok(Some(value)) => match value.parse() {
                Ok(state) => Some(state),
                Err(_) => {
                    warn!(value = %value, "Ignoring unrecognized stored consent state");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read consent state");
                None
            }
        }
    }

    /// Whether consent has been granted during this session.
    #[must_use]
    pub fn is_consent_granted(&self) -> bool {
        self.granted
    }

    /// Build an event and deliver or queue it.
    ///
    /// Blank names are logged and dropped; this never fails.
    pub fn push_event(&mut self, name: &str, params: Params) {
        match Event::new(name, params) {
            Ok(event) => self.push(event),
            Err(e) => warn!(error = %e, "Dropping event"),
        }
    }

    /// Deliver `event` if consent is granted, otherwise queue it.
    pub fn push(&mut self, event: Event) {
        if self.granted {
            self.deliver(&event);
            debug!(event = event.name(), "Event pushed");
            return;
        }

        if let Some(max) = self.max_queued {
            while self.queue.len() >= max {
                if let Some(dropped) = self.queue.pop_front() {
                    warn!(event = dropped.name(), max, "Event queue full, dropping oldest");
                }
            }
        }
        debug!(event = event.name(), "Event queued (awaiting consent)");
        self.queue.push_back(event);
    }

    /// Number of events waiting for consent.
    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    /// Events waiting for consent, oldest first.
    pub fn queued_events(&self) -> impl Iterator<Item = &Event> {
        self.queue.iter()
    }

    /// Discard every queued event.
    pub fn clear_queue(&mut self) {
        self.queue.clear();
    }

    fn flush_queue(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        debug!(count = self.queue.len(), "Flushing queued events");
        let queued = std::mem::take(&mut self.queue);
        for event in &queued {
            self.deliver(event);
        }
    }

    fn deliver(&self, event: &Event) {
        if let Err(e) = self.sink.append_event(&event.to_record()) {
            debug!(event = event.name(), error = %e, "Delivery sink unavailable");
        }
    }
}
