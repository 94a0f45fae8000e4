//! `vibecheck` - A security checklist with consent-gated analytics
//!
//! This library provides the two engines behind the checklist: an analytics
//! queue that holds events until the user grants consent, and a debounced
//! persister that coalesces bursts of checklist changes into single writes.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod analytics;
pub mod checklist;
pub mod cli;
pub mod config;
pub mod error;
pub mod links;
pub mod logging;
pub mod persist;
pub mod session;
pub mod storage;

pub use analytics::{Analytics, ConsentState, DataLayer, DeliverySink, Event};
pub use checklist::{Checklist, Progress};
pub use config::Config;
pub use error::{Error, Result};
pub use links::{is_valid_external_url, sanitize_url};
pub use logging::init_logging;
pub use persist::{ChecklistState, DebouncedPersister, Scheduler, TokioScheduler};
pub use session::ChecklistSession;
pub use storage::{KeyValueStore, MemoryStore, SqliteStore, StorageStats};
