//! Named tracking calls used by the checklist front end.
//!
//! Each wrapper only shapes parameters and hands the event to
//! [`Analytics::push`]; gating and ordering are the core's job.

use super::{Analytics, Event};

impl Analytics {
    /// Track a checkbox being checked or unchecked.
    pub fn track_checkbox_toggle(
        &mut self,
        item_id: &str,
        section_id: &str,
        section_title: &str,
        item_title: &str,
        checked: bool,
    ) {
        self.push(Event::checkbox_toggle(
            item_id,
            section_id,
            section_title,
            item_title,
            checked,
        ));
    }

    /// Track a section becoming fully checked.
    pub fn track_section_complete(
        &mut self,
        section_id: &str,
        section_title: &str,
        item_count: usize,
    ) {
        self.push(Event::section_complete(section_id, section_title, item_count));
    }

    /// Track overall progress reaching a milestone (25, 50, 75, 100).
    pub fn track_progress_milestone(&mut self, percentage: u32) {
        self.push(Event::progress_milestone(percentage));
    }

    /// Track a theme switch.
    pub fn track_theme_change(&mut self, theme: &str) {
        self.push(Event::theme_change(theme));
    }

    /// Track a section's "clear all" action.
    pub fn track_clear_all(&mut self, section_id: &str, section_title: &str) {
        self.push(Event::clear_all(section_id, section_title));
    }

    /// Track a page view.
    pub fn track_page_view(&mut self, page_path: &str, page_title: Option<&str>) {
        self.push(Event::page_view(page_path, page_title));
    }

    /// Track a click on an external resource link.
    pub fn track_external_link_click(&mut self, link_url: &str, link_text: &str, location: &str) {
        self.push(Event::external_link_click(link_url, link_text, location));
    }
}
