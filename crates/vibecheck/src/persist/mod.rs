//! Debounced persistence of checklist state.
//!
//! Checkbox toggles arrive in bursts. [`DebouncedPersister`] keeps only the
//! latest snapshot and writes it once the idle window passes without another
//! [`save`](DebouncedPersister::save). [`flush`](DebouncedPersister::flush)
//! writes immediately; it runs on drop so a window still open at teardown is
//! not lost.

mod scheduler;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::{Config, DEFAULT_DEBOUNCE_MS, DEFAULT_STATE_KEY};
use crate::storage::KeyValueStore;

pub use scheduler::{ManualScheduler, Scheduler, Task, TimerHandle, TokioScheduler};

/// Checked state per checklist item id.
pub type ChecklistState = BTreeMap<String, bool>;

/// Coalesces checklist snapshots into one write per idle window.
#[derive(Debug)]
pub struct DebouncedPersister {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    store: Arc<dyn KeyValueStore>,
    scheduler: Arc<dyn Scheduler>,
    key: String,
    delay: Duration,
    pending: Mutex<Pending>,
}

#[derive(Debug, Default)]
struct Pending {
    snapshot: Option<ChecklistState>,
    timer: Option<TimerHandle>,
    /// Bumped on every save so a timer that fires after being superseded
    /// does nothing.
    generation: u64,
}

impl DebouncedPersister {
    /// Create a persister with the default key and a 500 ms window.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self::with_settings(
            store,
            scheduler,
            DEFAULT_STATE_KEY,
            Duration::from_millis(DEFAULT_DEBOUNCE_MS),
        )
    }

    /// Create a persister using the key and window from `config`.
    #[must_use]
    pub fn from_config(
        config: &Config,
        store: Arc<dyn KeyValueStore>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self::with_settings(
            store,
            scheduler,
            config.persistence.state_key.clone(),
            config.debounce(),
        )
    }

    /// Create a persister with an explicit key and idle window.
    #[must_use]
    pub fn with_settings(
        store: Arc<dyn KeyValueStore>,
        scheduler: Arc<dyn Scheduler>,
        key: impl Into<String>,
        delay: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                scheduler,
                key: key.into(),
                delay,
                pending: Mutex::new(Pending::default()),
            }),
        }
    }

    /// The idle window.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.shared.delay
    }

    /// Replace the pending snapshot and restart the idle timer.
    pub fn save(&self, snapshot: ChecklistState) {
        let mut pending = self.shared.lock();
        pending.snapshot = Some(snapshot);
        pending.generation += 1;
        if let Some(timer) = pending.timer.take() {
            timer.cancel();
        }

        let generation = pending.generation;
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let timer = self.shared.scheduler.schedule(
            self.shared.delay,
            Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.write_if_current(generation);
                }
            }),
        );
        pending.timer = Some(timer);
    }

    /// Write the pending snapshot now, if there is one.
    pub fn flush(&self) {
        let mut pending = self.shared.lock();
        if let Some(timer) = pending.timer.take() {
            timer.cancel();
        }
        if let Some(snapshot) = pending.snapshot.take() {
            debug!("Flushing pending checklist state");
            self.shared.write(&snapshot);
        }
    }

    /// Whether a snapshot is waiting to be written.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.shared.lock().snapshot.is_some()
    }

    /// Read the persisted state.
    ///
    /// A missing, unreadable or malformed value yields an empty state.
    #[must_use]
    pub fn load(&self) -> ChecklistState {
        match self.shared.store.get(&self.shared.key) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "Ignoring malformed checklist state");
                ChecklistState::new()
            }),
            Ok(None) => ChecklistState::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read checklist state");
                ChecklistState::new()
            }
        }
    }
}

impl Drop for DebouncedPersister {
    fn drop(&mut self) {
        self.flush();
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_if_current(&self, generation: u64) {
        let mut pending = self.lock();
        if pending.generation != generation {
            return;
        }
        pending.timer = None;
        if let Some(snapshot) = pending.snapshot.take() {
            self.write(&snapshot);
        }
    }

    /// Serialize and store. Failures are logged and the snapshot is dropped.
    fn write(&self, snapshot: &ChecklistState) {
        let result = serde_json::to_string(snapshot)
            .map_err(crate::error::Error::from)
            .and_then(|json| self.store.set(&self.key, &json));

        match result {
            Ok(()) => debug!(items = snapshot.len(), "Checklist state saved"),
            Err(e) => warn!(error = %e, "Failed to save checklist state"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::storage::MemoryStore;

    const WINDOW: Duration = Duration::from_millis(500);

    fn state(pairs: &[(&str, bool)]) -> ChecklistState {
        pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
    }

    fn setup() -> (Arc<MemoryStore>, ManualScheduler, DebouncedPersister) {
        let store = Arc::new(MemoryStore::new());
        let scheduler = ManualScheduler::new();
        let persister = DebouncedPersister::new(store.clone(), Arc::new(scheduler.clone()));
        (store, scheduler, persister)
    }

    /// A store whose writes always fail.
    #[derive(Debug, Default)]
    struct FullStore;

    impl KeyValueStore for FullStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(Error::storage("quota exceeded"))
        }

        fn remove(&self, _key: &str) -> Result<()> {
            Ok(())
        }
    }

    /// A store whose reads always fail.
    #[derive(Debug, Default)]
    struct UnreadableStore;

    impl KeyValueStore for UnreadableStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(Error::storage("disk gone"))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Ok(())
        }

        fn remove(&self, _key: &str) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_save_writes_after_idle_window() {
        let (store, scheduler, persister) = setup();
        persister.save(state(&[("a", true)]));

        scheduler.advance(WINDOW - Duration::from_millis(1));
        assert_eq!(store.writes(), 0);
        assert!(persister.has_pending());

        scheduler.advance(Duration::from_millis(1));
        assert_eq!(store.writes(), 1);
        assert!(!persister.has_pending());
        assert_eq!(persister.load(), state(&[("a", true)]));
    }

    #[test]
    fn test_rapid_saves_collapse_to_last() {
        let (store, scheduler, persister) = setup();
        persister.save(state(&[("a", true)]));
        scheduler.advance(Duration::from_millis(100));
        persister.save(state(&[("a", true), ("b", true)]));
        scheduler.advance(Duration::from_millis(100));
        persister.save(state(&[("a", false), ("b", true)]));

        scheduler.advance(Duration::from_secs(5));

        assert_eq!(store.writes(), 1);
        assert_eq!(
            store.get(DEFAULT_STATE_KEY).unwrap(),
            Some(r#"{"a":false,"b":true}"#.to_string())
        );
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_each_save_restarts_the_window() {
        let (store, scheduler, persister) = setup();
        persister.save(state(&[("a", true)]));
        scheduler.advance(Duration::from_millis(400));
        persister.save(state(&[("a", false)]));
        scheduler.advance(Duration::from_millis(400));

        assert_eq!(store.writes(), 0);

        scheduler.advance(Duration::from_millis(100));
        assert_eq!(store.writes(), 1);
    }

    #[test]
    fn test_flush_writes_immediately() {
        let (store, scheduler, persister) = setup();
        persister.save(state(&[("x", true)]));

        persister.flush();

        assert_eq!(store.writes(), 1);
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(persister.load(), state(&[("x", true)]));

        // The cancelled timer must not write again
        scheduler.advance(Duration::from_secs(5));
        assert_eq!(store.writes(), 1);
    }

    #[test]
    fn test_flush_with_nothing_pending_is_noop() {
        let (store, _scheduler, persister) = setup();
        persister.flush();
        persister.save(state(&[("x", true)]));
        persister.flush();
        persister.flush();

        assert_eq!(store.writes(), 1);
    }

    #[test]
    fn test_stale_timer_does_not_write() {
        let (store, _scheduler, persister) = setup();
        persister.save(state(&[("x", true)]));
        let stale = persister.shared.lock().generation;
        persister.save(state(&[("x", false)]));

        persister.shared.write_if_current(stale);
        assert_eq!(store.writes(), 0);
        assert!(persister.has_pending());
    }

    #[test]
    fn test_drop_flushes_pending() {
        let (store, scheduler, persister) = setup();
        persister.save(state(&[("late", true)]));
        drop(persister);

        assert_eq!(store.writes(), 1);
        assert_eq!(
            store.get(DEFAULT_STATE_KEY).unwrap(),
            Some(r#"{"late":true}"#.to_string())
        );
        scheduler.advance(Duration::from_secs(5));
        assert_eq!(store.writes(), 1);
    }

    #[test]
    fn test_load_empty_store() {
        let (_store, _scheduler, persister) = setup();
        assert!(persister.load().is_empty());
    }

    #[test]
    fn test_load_garbage_returns_empty() {
        let (store, _scheduler, persister) = setup();
        store.set(DEFAULT_STATE_KEY, "{not json").unwrap();
        assert!(persister.load().is_empty());

        store.set(DEFAULT_STATE_KEY, "42").unwrap();
        assert!(persister.load().is_empty());

        store.set(DEFAULT_STATE_KEY, r#"{"a":"yes"}"#).unwrap();
        assert!(persister.load().is_empty());
    }

    #[test]
    fn test_load_unreadable_store_returns_empty() {
        let persister =
            DebouncedPersister::new(Arc::new(UnreadableStore), Arc::new(ManualScheduler::new()));
        assert!(persister.load().is_empty());
    }

    #[test]
    fn test_write_failure_is_swallowed_and_clears_pending() {
        crate::logging::init_test_logging();
        let scheduler = ManualScheduler::new();
        let persister = DebouncedPersister::new(Arc::new(FullStore), Arc::new(scheduler.clone()));
        persister.save(state(&[("a", true)]));

        scheduler.advance(WINDOW);
        assert!(!persister.has_pending());

        // Still usable afterwards
        persister.save(state(&[("b", true)]));
        persister.flush();
        assert!(!persister.has_pending());
    }

    #[test]
    fn test_custom_key_and_window() {
        let store = Arc::new(MemoryStore::new());
        let scheduler = ManualScheduler::new();
        let persister = DebouncedPersister::with_settings(
            store.clone(),
            Arc::new(scheduler.clone()),
            "progress",
            Duration::from_millis(50),
        );
        persister.save(state(&[("a", true)]));
        scheduler.advance(Duration::from_millis(50));

        assert!(store.get("progress").unwrap().is_some());
        assert_eq!(persister.delay(), Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_tokio_scheduler_debounces() {
        let store = Arc::new(MemoryStore::new());
        let scheduler = Arc::new(TokioScheduler::current().unwrap());
        let persister = DebouncedPersister::with_settings(
            store.clone(),
            scheduler,
            DEFAULT_STATE_KEY,
            Duration::from_millis(30),
        );

        persister.save(state(&[("a", true)]));
        persister.save(state(&[("a", true), ("b", true)]));
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(store.writes(), 1);
        assert_eq!(persister.load(), state(&[("a", true), ("b", true)]));
    }
}
