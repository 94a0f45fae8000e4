//! Telemetry events and their wire shape.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{Error, Result};

/// Field of a delivered record that carries the event name.
pub const EVENT_FIELD: &str = "event";

/// Parameter name used when notifying the sink of a consent change.
pub const CONSENT_PARAM: &str = "analytics_storage";

/// Names of the events emitted by the tracking wrappers.
pub mod names {
    /// A checklist item was checked or unchecked.
    pub const CHECKBOX_TOGGLE: &str = "checkbox_toggle";
    /// Every item of a section is checked.
    pub const SECTION_COMPLETE: &str = "section_complete";
    /// Overall progress crossed a milestone.
    pub const PROGRESS_MILESTONE: &str = "progress_milestone";
    /// The colour theme changed.
    pub const THEME_CHANGE: &str = "theme_change";
    /// A section was reset.
    pub const CLEAR_ALL: &str = "clear_all";
    /// A page was shown.
    pub const PAGE_VIEW: &str = "page_view";
    /// An external resource link was followed.
    pub const EXTERNAL_LINK_CLICK: &str = "external_link_click";
}

/// A user's analytics consent decision.
///
/// An undecided user has no stored value at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentState {
    /// Analytics collection is permitted.
    Granted,
    /// Analytics collection is not permitted.
    Denied,
}

impl ConsentState {
    /// The stored and wire representation of this state.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Granted => "granted",
            Self::Denied => "denied",
        }
    }
}

impl fmt::Display for ConsentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsentState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "granted" => Ok(Self::Granted),
            "denied" => Ok(Self::Denied),
            other => Err(Error::InvalidConsentState {
                value: other.to_string(),
            }),
        }
    }
}

/// A scalar event parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// A boolean flag.
    Bool(bool),
    /// An integral number.
    Integer(i64),
    /// A fractional number.
    Float(f64),
    /// A string.
    Text(String),
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<usize> for ParamValue {
    fn from(value: usize) -> Self {
        Self::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&ParamValue> for Value {
    fn from(value: &ParamValue) -> Self {
        match value {
            ParamValue::Bool(b) => Value::Bool(*b),
            ParamValue::Integer(n) => Value::from(*n),
            // Non-finite floats have no JSON form
            ParamValue::Float(x) => serde_json::Number::from_f64(*x).map_or(Value::Null, Value::Number),
            ParamValue::Text(s) => Value::String(s.clone()),
        }
    }
}

/// Event parameters, keyed by name.
pub type Params = BTreeMap<String, ParamValue>;

/// A flattened record as appended to a delivery sink.
pub type Record = serde_json::Map<String, Value>;

/// Check whether `name` is usable as an event name.
///
/// Any non-blank string is accepted, so names like `page-view` or `gtm.js`
/// pass through unchanged.
#[must_use]
pub fn is_valid_event_name(name: &str) -> bool {
    !name.trim().is_empty()
}

/// A telemetry event: a name and its parameters. Immutable once built.
///
/// Deserializing goes through [`Event::new`], so a decoded event obeys the
/// same rules as a constructed one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEvent")]
pub struct Event {
    name: String,
    params: Params,
}

#[derive(Deserialize)]
struct RawEvent {
    name: String,
    #[serde(default)]
    params: Params,
}

impl TryFrom<RawEvent> for Event {
    type Error = Error;

    fn try_from(raw: RawEvent) -> Result<Self> {
        Self::new(raw.name, raw.params)
    }
}

impl Event {
    /// Build an event from a name and parameters.
    ///
    /// A parameter named `event` would shadow the event name in the delivered
    /// record, so it is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEventName`] if `name` is blank.
    pub fn new(name: impl Into<String>, mut params: Params) -> Result<Self> {
        let name = name.into();
        if !is_valid_event_name(&name) {
            return Err(Error::InvalidEventName { name });
        }
        if params.remove(EVENT_FIELD).is_some() {
            warn!(event = %name, "Dropping parameter that collides with the event name field");
        }
        Ok(Self { name, params })
    }

    /// Build an event with a known-good name.
    fn fixed(name: &'static str, params: Params) -> Self {
        Self {
            name: name.to_string(),
            params,
        }
    }

    /// The event name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The event parameters.
    #[must_use]
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Look up a single parameter.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&ParamValue> {
        self.params.get(key)
    }

    /// Flatten into the record shape a sink receives: the name under
    /// [`EVENT_FIELD`] with every parameter alongside it.
    #[must_use]
    pub fn to_record(&self) -> Record {
        let mut record: Record = self
            .params
            .iter()
            .map(|(key, value)| (key.clone(), Value::from(value)))
            .collect();
        record.insert(EVENT_FIELD.to_string(), Value::String(self.name.clone()));
        record
    }

    /// A checklist item was toggled.
    #[must_use]
    pub fn checkbox_toggle(
        item_id: &str,
        section_id: &str,
        section_title: &str,
        item_title: &str,
        checked: bool,
    ) -> Self {
        let mut params = Params::new();
        params.insert("item_id".into(), item_id.into());
        params.insert("section_id".into(), section_id.into());
        params.insert("section_title".into(), section_title.into());
        params.insert("item_title".into(), item_title.into());
        params.insert("checked".into(), checked.into());
        Self::fixed(names::CHECKBOX_TOGGLE, params)
    }

    /// Every item of a section is now checked.
    #[must_use]
    pub fn section_complete(section_id: &str, section_title: &str, item_count: usize) -> Self {
        let mut params = Params::new();
        params.insert("section_id".into(), section_id.into());
        params.insert("section_title".into(), section_title.into());
        params.insert("item_count".into(), item_count.into());
        Self::fixed(names::SECTION_COMPLETE, params)
    }

    /// Overall progress reached `percentage`.
    #[must_use]
    pub fn progress_milestone(percentage: u32) -> Self {
        let mut params = Params::new();
        params.insert("percentage".into(), percentage.into());
        Self::fixed(names::PROGRESS_MILESTONE, params)
    }

    /// The theme switched to `theme`.
    #[must_use]
    pub fn theme_change(theme: &str) -> Self {
        let mut params = Params::new();
        params.insert("theme".into(), theme.into());
        Self::fixed(names::THEME_CHANGE, params)
    }

    /// A section was cleared.
    #[must_use]
    pub fn clear_all(section_id: &str, section_title: &str) -> Self {
        let mut params = Params::new();
        params.insert("section_id".into(), section_id.into());
        params.insert("section_title".into(), section_title.into());
        Self::fixed(names::CLEAR_ALL, params)
    }

    /// A page was viewed. An empty title is left out.
    #[must_use]
    pub fn page_view(page_path: &str, page_title: Option<&str>) -> Self {
        let mut params = Params::new();
        params.insert("page_path".into(), page_path.into());
        if let Some(title) = page_title.filter(|t| !t.is_empty()) {
            params.insert("page_title".into(), title.into());
        }
        Self::fixed(names::PAGE_VIEW, params)
    }

    /// An external link was followed from `location`.
    #[must_use]
    pub fn external_link_click(link_url: &str, link_text: &str, location: &str) -> Self {
        let mut params = Params::new();
        params.insert("link_url".into(), link_url.into());
        params.insert("link_text".into(), link_text.into());
        params.insert("link_location".into(), location.into());
        Self::fixed(names::EXTERNAL_LINK_CLICK, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consent_state_display() {
        assert_eq!(ConsentState::Granted.to_string(), "granted");
        assert_eq!(ConsentState::Denied.to_string(), "denied");
    }

    #[test]
    fn test_consent_state_from_str() {
        assert_eq!("granted".parse::<ConsentState>().unwrap(), ConsentState::Granted);
        assert_eq!("denied".parse::<ConsentState>().unwrap(), ConsentState::Denied);
        assert!("GRANTED".parse::<ConsentState>().is_err());

        let err = "maybe".parse::<ConsentState>().unwrap_err();
        assert!(matches!(err, Error::InvalidConsentState { ref value } if value == "maybe"));
        assert!(!err.is_storage_error());
    }

    #[test]
    fn test_consent_state_serde() {
        let json = serde_json::to_string(&ConsentState::Granted).unwrap();
        assert_eq!(json, "\"granted\"");
    }

    #[test]
    fn test_event_name_validation() {
        assert!(is_valid_event_name("checkbox_toggle"));
        assert!(is_valid_event_name("pageView2"));
        assert!(is_valid_event_name("page-view"));
        assert!(is_valid_event_name("gtm.js"));
        assert!(!is_valid_event_name(""));
        assert!(!is_valid_event_name("   "));
    }

    #[test]
    fn test_deserialize_validates_name() {
        let result = serde_json::from_str::<Event>(r#"{"name":"","params":{}}"#);
        assert!(result.is_err());

        let event: Event = serde_json::from_str(r#"{"name":"gtm.js"}"#).unwrap();
        assert_eq!(event.name(), "gtm.js");
        assert!(event.params().is_empty());
    }

    #[test]
    fn test_deserialize_cannot_override_event_field() {
        let event: Event =
            serde_json::from_str(r#"{"name":"custom","params":{"event":"spoofed","n":1}}"#)
                .unwrap();

        assert!(event.param("event").is_none());
        let record = event.to_record();
        assert_eq!(record["event"], "custom");
        assert_eq!(record["n"], 1);
    }

    #[test]
    fn test_serde_round_trip_keeps_event() {
        let event = Event::page_view("/resources", Some("Resources"));
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(serde_json::from_str::<Event>(&json).unwrap(), event);
    }

    #[test]
    fn test_event_new_rejects_empty_name() {
        let result = Event::new("", Params::new());
        assert!(matches!(result, Err(Error::InvalidEventName { .. })));
    }

    #[test]
    fn test_event_new_drops_reserved_param() {
        let mut params = Params::new();
        params.insert("event".into(), "spoofed".into());
        params.insert("kept".into(), 1_i64.into());

        let event = Event::new("custom", params).unwrap();
        let record = event.to_record();
        assert_eq!(record["event"], "custom");
        assert_eq!(record["kept"], 1);
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn test_to_record_flattens_params() {
        let event = Event::checkbox_toggle("item-1", "auth", "Authentication", "Use MFA", true);
        let record = event.to_record();

        assert_eq!(record["event"], "checkbox_toggle");
        assert_eq!(record["item_id"], "item-1");
        assert_eq!(record["section_id"], "auth");
        assert_eq!(record["section_title"], "Authentication");
        assert_eq!(record["item_title"], "Use MFA");
        assert_eq!(record["checked"], true);
    }

    #[test]
    fn test_section_complete_shape() {
        let event = Event::section_complete("auth", "Authentication", 4);
        assert_eq!(event.name(), names::SECTION_COMPLETE);
        assert_eq!(event.param("item_count"), Some(&ParamValue::Integer(4)));
        assert_eq!(event.params().len(), 3);
    }

    #[test]
    fn test_progress_milestone_shape() {
        let event = Event::progress_milestone(75);
        assert_eq!(event.to_record()["percentage"], 75);
    }

    #[test]
    fn test_theme_and_clear_all_shapes() {
        let theme = Event::theme_change("dark");
        assert_eq!(theme.param("theme"), Some(&ParamValue::Text("dark".into())));

        let clear = Event::clear_all("secrets", "Secrets");
        assert_eq!(clear.name(), "clear_all");
        assert_eq!(clear.params().len(), 2);
    }

    #[test]
    fn test_page_view_optional_title() {
        let without = Event::page_view("/", None);
        assert!(without.param("page_title").is_none());

        let empty = Event::page_view("/", Some(""));
        assert!(empty.param("page_title").is_none());

        let with = Event::page_view("/resources", Some("Resources"));
        assert_eq!(
            with.param("page_title"),
            Some(&ParamValue::Text("Resources".into()))
        );
    }

    #[test]
    fn test_external_link_click_shape() {
        let event = Event::external_link_click("https://owasp.org", "OWASP", "resources");
        let record = event.to_record();
        assert_eq!(record["link_url"], "https://owasp.org");
        assert_eq!(record["link_location"], "resources");
    }

    #[test]
    fn test_non_finite_float_becomes_null() {
        let mut params = Params::new();
        params.insert("ratio".into(), f64::NAN.into());
        let event = Event::new("custom", params).unwrap();
        assert!(event.to_record()["ratio"].is_null());
    }
}
