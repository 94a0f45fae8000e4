//! Checklist definitions and progress tracking.
//!
//! A checklist is a titled list of sections, each holding items with stable
//! ids. Checked state lives outside the definition in a
//! [`ChecklistState`] map so it can be persisted independently.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::ChecklistConfig;
use crate::error::{Error, Result};
use crate::persist::ChecklistState;

/// Overall-progress percentages that are reported as milestones.
pub const MILESTONES: [u32; 4] = [25, 50, 75, 100];

const BUILTIN_CHECKLIST: &str = include_str!("../data/checklist.json");

/// A single checkable item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Stable identifier, used as the key in persisted state.
    pub id: String,
    /// Display text.
    pub text: String,
}

/// A titled group of items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Stable identifier.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Items in display order.
    pub items: Vec<Item>,
}

/// A checklist definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checklist {
    /// Display title.
    pub title: String,
    /// Sections in display order.
    pub sections: Vec<Section>,
}

/// Checked versus total item counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// Items currently checked.
    pub checked: usize,
    /// Items in scope.
    pub total: usize,
}

impl Progress {
    /// Percentage checked, 0 when there is nothing to check.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.checked as f64 / self.total as f64 * 100.0
        }
    }

    /// Whether every item is checked. An empty scope is never complete.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.checked == self.total
    }

    /// Whether progress is at or above `percentage`.
    ///
    /// Compared in integers so 3 of 4 reaches 75 exactly.
    #[must_use]
    pub fn reached(&self, percentage: u32) -> bool {
        self.total > 0 && self.checked * 100 >= percentage as usize * self.total
    }
}

/// Milestones that `after` has reached and `before` had not.
#[must_use]
pub fn crossed_milestones(before: Progress, after: Progress) -> Vec<u32> {
    MILESTONES
        .into_iter()
        .filter(|&m| !before.reached(m) && after.reached(m))
        .collect()
}

impl Section {
    /// Progress of this section under `state`.
    #[must_use]
    pub fn progress(&self, state: &ChecklistState) -> Progress {
        Progress {
            checked: self.items.iter().filter(|i| is_checked(state, &i.id)).count(),
            total: self.items.len(),
        }
    }

    /// Whether every item in this section is checked.
    #[must_use]
    pub fn is_complete(&self, state: &ChecklistState) -> bool {
        self.progress(state).is_complete()
    }
}

impl Checklist {
    /// Parse and validate a checklist from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the checklist is invalid.
    pub fn from_json(json: &str) -> Result<Self> {
        let checklist: Self = serde_json::from_str(json)?;
        checklist.validate()?;
        Ok(checklist)
    }

    /// Load a checklist from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid checklist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| Error::ChecklistLoad {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// The checklist shipped with the binary.
    ///
    /// # Errors
    ///
    /// Only fails if the embedded definition is broken.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_CHECKLIST)
    }

    /// Load the configured checklist, falling back to the built-in one.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured file cannot be loaded.
    pub fn from_config(config: &ChecklistConfig) -> Result<Self> {
        match &config.path {
            Some(path) => Self::load(path),
            None => Self::builtin(),
        }
    }

    /// Check that every section and item has a non-empty, unique id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChecklistInvalid`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        let mut section_ids = HashSet::new();
        let mut item_ids = HashSet::new();

        for section in &self.sections {
            if section.id.is_empty() {
                return Err(Error::checklist_invalid(format!(
                    "section '{}' has an empty id",
                    section.title
                )));
            }
            if !section_ids.insert(section.id.as_str()) {
                return Err(Error::checklist_invalid(format!(
                    "duplicate section id '{}'",
                    section.id
                )));
            }
            for item in &section.items {
                if item.id.is_empty() {
                    return Err(Error::checklist_invalid(format!(
                        "item in section '{}' has an empty id",
                        section.id
                    )));
                }
                if !item_ids.insert(item.id.as_str()) {
                    return Err(Error::checklist_invalid(format!(
                        "duplicate item id '{}'",
                        item.id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Total number of items.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.sections.iter().map(|s| s.items.len()).sum()
    }

    /// Look up a section by id.
    #[must_use]
    pub fn section(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }

    /// Look up an item by id, along with its section.
    #[must_use]
    pub fn find_item(&self, id: &str) -> Option<(&Section, &Item)> {
        self.sections
            .iter()
            .find_map(|s| s.items.iter().find(|i| i.id == id).map(|i| (s, i)))
    }

    /// Overall progress under `state`. Ids in `state` that are not part of
    /// this checklist are ignored.
    #[must_use]
    pub fn progress(&self, state: &ChecklistState) -> Progress {
        self.sections
            .iter()
            .map(|s| s.progress(state))
            .fold(Progress::default(), |acc, p| Progress {
                checked: acc.checked + p.checked,
                total: acc.total + p.total,
            })
    }
}

fn is_checked(state: &ChecklistState, id: &str) -> bool {
    state.get(id).copied().unwrap_or(false)
}
