//! A checklist session: the front-end actions wired to analytics and
//! persistence.
//!
//! [`ChecklistSession`] owns the checklist definition, the in-memory checked
//! state, the consent-gated [`Analytics`] queue and the
//! [`DebouncedPersister`]. Every state change is handed to the persister as a
//! full snapshot and reported as a tracking event.

use tracing::{debug, info};

use crate::analytics::{Analytics, ConsentState};
use crate::checklist::{crossed_milestones, Checklist, Progress};
use crate::error::{Error, Result};
use crate::links::is_valid_external_url;
use crate::persist::{ChecklistState, DebouncedPersister};

/// Location reported for links followed from the command line.
pub const DEFAULT_LINK_LOCATION: &str = "resources";

/// Checklist state plus the two cores that observe it.
#[derive(Debug)]
pub struct ChecklistSession {
    checklist: Checklist,
    state: ChecklistState,
    analytics: Analytics,
    persister: DebouncedPersister,
}

impl ChecklistSession {
    /// Start a session, loading previously persisted state.
    #[must_use]
    pub fn new(checklist: Checklist, analytics: Analytics, persister: DebouncedPersister) -> Self {
        let state = persister.load();
        debug!(
            title = %checklist.title,
            restored = state.len(),
            "Checklist session started"
        );
        Self {
            checklist,
            state,
            analytics,
            persister,
        }
    }

    /// The checklist definition.
    #[must_use]
    pub fn checklist(&self) -> &Checklist {
        &self.checklist
    }

    /// Current checked state.
    #[must_use]
    pub fn state(&self) -> &ChecklistState {
        &self.state
    }

    /// The analytics queue.
    #[must_use]
    pub fn analytics(&self) -> &Analytics {
        &self.analytics
    }

    /// Whether `item_id` is checked.
    #[must_use]
    pub fn is_checked(&self, item_id: &str) -> bool {
        self.state.get(item_id).copied().unwrap_or(false)
    }

    /// Overall progress.
    #[must_use]
    pub fn progress(&self) -> Progress {
        self.checklist.progress(&self.state)
    }

    /// Progress of one section.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownSection`] if no section has that id.
    pub fn section_progress(&self, section_id: &str) -> Result<Progress> {
        self.checklist
            .section(section_id)
            .map(|s| s.progress(&self.state))
            .ok_or_else(|| Error::UnknownSection(section_id.to_string()))
    }

    /// Check or uncheck an item.
    ///
    /// Tracks `checkbox_toggle`, then `section_complete` if this completed
    /// the item's section, then `progress_milestone` for each milestone the
    /// overall progress crossed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownItem`] if no item has that id.
    pub fn toggle(&mut self, item_id: &str, checked: bool) -> Result<()> {
        let (section, item) = self
            .checklist
            .find_item(item_id)
            .ok_or_else(|| Error::UnknownItem(item_id.to_string()))?;

        let before = self.checklist.progress(&self.state);
        let was_complete = section.is_complete(&self.state);

        self.state.insert(item.id.clone(), checked);
        self.persister.save(self.state.clone());

        self.analytics
            .track_checkbox_toggle(&item.id, &section.id, &section.title, &item.text, checked);

        if !was_complete && section.is_complete(&self.state) {
            self.analytics
                .track_section_complete(&section.id, &section.title, section.items.len());
        }

        let after = self.checklist.progress(&self.state);
        for milestone in crossed_milestones(before, after) {
            self.analytics.track_progress_milestone(milestone);
        }
        Ok(())
    }

    /// Uncheck every item in a section and track `clear_all`.
    ///
    /// Returns how many items were unchecked. State is only saved when
    /// something changed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownSection`] if no section has that id.
    pub fn clear_section(&mut self, section_id: &str) -> Result<usize> {
        let section = self
            .checklist
            .section(section_id)
            .ok_or_else(|| Error::UnknownSection(section_id.to_string()))?;

        let mut cleared = 0;
        for item in &section.items {
            if let Some(checked) = self.state.get_mut(&item.id) {
                if *checked {
                    *checked = false;
                    cleared += 1;
                }
            }
        }

        if cleared > 0 {
            self.persister.save(self.state.clone());
        }
        self.analytics.track_clear_all(&section.id, &section.title);
        debug!(section = %section.id, cleared, "Section cleared");
        Ok(cleared)
    }

    /// Record a theme switch.
    pub fn set_theme(&mut self, theme: &str) {
        self.analytics.track_theme_change(theme);
    }

    /// Record a page view.
    pub fn view_page(&mut self, page_path: &str, page_title: Option<&str>) {
        self.analytics.track_page_view(page_path, page_title);
    }

    /// Record an external link being followed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] unless `link_url` is an absolute `http`
    /// or `https` URL. Nothing is tracked in that case.
    pub fn follow_link(&mut self, link_url: &str, link_text: &str, location: &str) -> Result<()> {
        if !is_valid_external_url(link_url) {
            debug!(url = link_url, "Refusing to follow link");
            return Err(Error::InvalidUrl {
                url: link_url.to_string(),
            });
        }
        self.analytics
            .track_external_link_click(link_url, link_text, location);
        Ok(())
    }

    /// Record the user's consent decision.
    pub fn set_consent(&mut self, state: ConsentState) {
        self.analytics.set_consent(state);
    }

    /// The persisted consent decision, if any.
    #[must_use]
    pub fn consent(&self) -> Option<ConsentState> {
        self.analytics.get_consent_state()
    }

    /// Write pending state now.
    pub fn flush(&self) {
        self.persister.flush();
    }

    /// Tear the session down: flush pending state and report events that
    /// never got consent. Returns the number of discarded events.
    pub fn shutdown(mut self) -> usize {
        self.persister.flush();
        let discarded = self.analytics.queued_len();
        if discarded > 0 {
            info!(
                count = discarded,
                "Discarding events queued without analytics consent"
            );
            self.analytics.clear_queue();
        }
        discarded
    }
}
