//! Meme state: decaying workflow signals
//!
//! A signal is a small piece of evidence about workflow state (for example
//! "project p1 finished initialization"). Signals lose strength on every
//! dynamics pass, get boosted when the same `(signalType, target)` is reported
//! more than once, and are dropped once they fall below the prune threshold.
//!
//! The persisted document looks like:
//!
//! ```json
//! {
//!   "signals": [ { "id": "...", "signalType": "...", "target": "...", ... } ],
//!   "documentation_registry": []
//! }
//! ```

use std::fmt;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub mod dynamics;
pub mod error;
pub mod lock;
pub mod store;

pub use dynamics::{DynamicsConfig, DynamicsReport};
pub use error::{MemeError, MemeResult};
pub use store::{FileStore, SignalStore};

/// Messages longer than this are cut when a signal is created
pub const MESSAGE_MAX_CHARS: usize = 256;

/// Category used when a signal does not name one
pub const DEFAULT_CATEGORY: &str = "default";

/// A decaying evidence record about some workflow fact.
///
/// Optional fields stay `None` when the stored document omits them, and
/// timestamps are kept as the exact strings read, so a load/save cycle
/// writes back what it was given for everything the engine does not touch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: String,
    #[serde(rename = "signalType")]
    pub signal_type: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub strength: Strength,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<IndexMap<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated_timestamp: Option<String>,
    /// Fields this crate does not interpret, carried through untouched
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

impl Signal {
    /// Create a fresh signal with a new id, stamped with the current second
    pub fn new(signal_type: &str, target: &str, category: &str, strength: f64) -> Self {
        let now = Utc::now()
            .trunc_subsecs(0)
            .to_rfc3339_opts(SecondsFormat::Secs, true);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            signal_type: signal_type.to_string(),
            target: target.to_string(),
            category: Some(category.to_string()),
            strength: Strength::new(strength),
            message: Some(String::new()),
            data: Some(IndexMap::new()),
            timestamp_created: Some(now.clone()),
            last_updated_timestamp: Some(now),
            extra: IndexMap::new(),
        }
    }

    /// Attach a message, truncated to `MESSAGE_MAX_CHARS` characters
    pub fn with_message(mut self, message: &str) -> Self {
        self.message = Some(truncate_chars(message, MESSAGE_MAX_CHARS));
        self
    }

    #[allow(dead_code)] // callers outside the CLI attach data directly
    pub fn with_data(mut self, key: &str, value: serde_json::Value) -> Self {
        self.data.get_or_insert_with(IndexMap::new).insert(key.to_string(), value);
        self
    }

    /// Category for rate lookup; absent means `DEFAULT_CATEGORY`
    pub fn category(&self) -> &str {
        self.category.as_deref().unwrap_or(DEFAULT_CATEGORY)
    }

    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or_default()
    }

    /// Parsed `last_updated_timestamp`, if present and RFC 3339
    pub fn last_updated_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.last_updated_timestamp.as_deref()?;
        DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.with_timezone(&Utc))
    }

    /// Key identifying the duplicate group this signal belongs to
    pub fn group_key(&self) -> (&str, &str) {
        (&self.signal_type, &self.target)
    }
}

/// Signal strength, a finite non-negative number.
///
/// Integers read from disk are written back as integers until the value
/// changes.
#[derive(Debug, Clone, Copy)]
pub struct Strength {
    value: f64,
    integral: bool,
}

impl Strength {
    pub fn new(value: f64) -> Self {
        Self {
            value: if value.is_finite() { value.max(0.0) } else { 0.0 },
            integral: false,
        }
    }

    pub fn value(self) -> f64 {
        self.value
    }

    /// Replace the value; an unchanged value keeps its stored form
    pub fn set(&mut self, value: f64) {
        if value != self.value {
            *self = Self::new(value);
        }
    }
}

impl PartialEq for Strength {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl PartialEq<f64> for Strength {
    fn eq(&self, other: &f64) -> bool {
        self.value == *other
    }
}

impl PartialOrd<f64> for Strength {
    fn partial_cmp(&self, other: &f64) -> Option<std::cmp::Ordering> {
        self.value.partial_cmp(other)
    }
}

impl fmt::Display for Strength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

impl Serialize for Strength {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if self.integral && self.value.fract() == 0.0 && self.value <= u64::MAX as f64 {
            serializer.serialize_u64(self.value as u64)
        } else {
            serializer.serialize_f64(self.value)
        }
    }
}

impl<'de> Deserialize<'de> for Strength {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let number = serde_json::Number::deserialize(deserializer)?;
        let value = number
            .as_f64()
            .ok_or_else(|| serde::de::Error::custom(format!("strength {} is not representable", number)))?;
        if !value.is_finite() || value < 0.0 {
            return Err(serde::de::Error::custom(format!(
                "strength must be a finite non-negative number, got {}",
                number
            )));
        }
        Ok(Self {
            value,
            integral: !number.is_f64(),
        })
    }
}

/// Everything persisted in the meme state file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemeState {
    pub signals: Vec<Signal>,
    /// Opaque records, passed through unmodified
    #[serde(default)]
    pub documentation_registry: Vec<serde_json::Value>,
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

impl MemeState {
    pub fn push(&mut self, signal: Signal) {
        log::debug!(
            "Appending signal {} ({} -> {}, strength {})",
            signal.id,
            signal.signal_type,
            signal.target,
            signal.strength
        );
        self.signals.push(signal);
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty() && self.documentation_registry.is_empty()
    }
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a signal with fixed timestamps so states compare equal
    pub fn signal(signal_type: &str, target: &str, category: &str, strength: f64) -> Signal {
        let mut s = Signal::new(signal_type, target, category, strength);
        s.timestamp_created = Some("2026-01-03T12:00:00Z".to_string());
        s.last_updated_timestamp = Some("2026-01-03T12:00:00Z".to_string());
        s
    }

    #[test]
    fn test_new_signal_has_unique_id() {
        let a = Signal::new("x", "p1", "state", 1.0);
        let b = Signal::new("x", "p1", "state", 1.0);
        assert_ne!(a.id, b.id);
        assert_eq!(a.timestamp_created, a.last_updated_timestamp);

        let stamp = a.timestamp_created.as_deref().unwrap();
        assert!(stamp.ends_with('Z'));
        assert!(!stamp.contains('.'), "whole seconds only: {}", stamp);
        assert!(a.last_updated_at().is_some());
    }

    #[test]
    fn test_message_truncated_on_char_boundary() {
        let long = "é".repeat(300);
        let s = Signal::new("x", "p1", "state", 1.0).with_message(&long);
        assert_eq!(s.message().chars().count(), MESSAGE_MAX_CHARS);

        let short = Signal::new("x", "p1", "state", 1.0).with_message("done");
        assert_eq!(short.message(), "done");
    }

    #[test]
    fn test_signal_wire_format() {
        let s = signal("project_initialization_complete", "p1", "state", 0.8)
            .with_message("Initialization complete")
            .with_data("handoff_reason", serde_json::json!("ready"));
        let json = serde_json::to_value(&s).unwrap();

        assert_eq!(json["signalType"], "project_initialization_complete");
        assert_eq!(json["target"], "p1");
        assert_eq!(json["category"], "state");
        assert_eq!(json["timestamp_created"], "2026-01-03T12:00:00Z");
        assert_eq!(json["last_updated_timestamp"], "2026-01-03T12:00:00Z");
        assert_eq!(json["data"]["handoff_reason"], "ready");
    }

    #[test]
    fn test_missing_optional_fields() {
        let json = r#"{"id": "a", "signalType": "x", "target": "p1", "strength": 0.5}"#;
        let s: Signal = serde_json::from_str(json).unwrap();
        assert_eq!(s.category(), DEFAULT_CATEGORY);
        assert_eq!(s.message(), "");
        assert!(s.data.is_none());
        assert!(s.timestamp_created.is_none());
        assert!(s.last_updated_at().is_none());

        let back = serde_json::to_value(&s).unwrap();
        assert_eq!(back, serde_json::from_str::<serde_json::Value>(json).unwrap());
    }

    #[test]
    fn test_negative_strength_rejected() {
        let json = r#"{"id": "a", "signalType": "x", "target": "p1", "strength": -0.1}"#;
        assert!(serde_json::from_str::<Signal>(json).is_err());
        let json = r#"{"id": "a", "signalType": "x", "target": "p1", "strength": -1}"#;
        assert!(serde_json::from_str::<Signal>(json).is_err());
    }

    #[test]
    fn test_stored_form_kept_verbatim() {
        let json = r#"{"id":"a","signalType":"x","target":"p1","strength":1,"timestamp_created":"2025-05-01T10:00:00.000Z","last_updated_timestamp":"2025-05-01T12:00:00+02:00"}"#;
        let s: Signal = serde_json::from_str(json).unwrap();
        assert_eq!(s.strength, 1.0);
        assert_eq!(
            s.last_updated_at().unwrap().to_rfc3339_opts(SecondsFormat::Secs, true),
            "2025-05-01T10:00:00Z"
        );
        assert_eq!(serde_json::to_string(&s).unwrap(), json);

        let float: Signal = serde_json::from_str(r#"{"id":"a","signalType":"x","target":"p1","strength":1.0}"#).unwrap();
        assert_eq!(serde_json::to_value(&float).unwrap()["strength"], serde_json::json!(1.0));
    }

    #[test]
    fn test_changed_strength_written_as_float() {
        let json = r#"{"id":"a","signalType":"x","target":"p1","strength":2}"#;
        let mut s: Signal = serde_json::from_str(json).unwrap();

        s.strength.set(2.0);
        assert_eq!(serde_json::to_value(&s).unwrap()["strength"], serde_json::json!(2));

        s.strength.set(1.0);
        let written = serde_json::to_value(&s).unwrap()["strength"].clone();
        assert!(written.is_f64());
        assert_eq!(written, serde_json::json!(1.0));
    }

    #[test]
    fn test_unknown_fields_preserved() {
        let json = r#"{
            "id": "a", "signalType": "x", "target": "p1", "category": "state", "strength": 0.5,
            "message": "m", "data": {"z": 1, "a": 2},
            "timestamp_created": "2026-01-03T12:00:00Z",
            "last_updated_timestamp": "2026-01-03T12:00:00Z",
            "origin": {"agent": "scribe"}
        }"#;
        let s: Signal = serde_json::from_str(json).unwrap();
        assert_eq!(s.extra["origin"]["agent"], "scribe");

        let back = serde_json::to_value(&s).unwrap();
        assert_eq!(back, serde_json::from_str::<serde_json::Value>(json).unwrap());
        let keys: Vec<_> = s.data.as_ref().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a"]);
    }

    #[test]
    fn test_state_requires_signals_key() {
        assert!(serde_json::from_str::<MemeState>(r#"{"documentation_registry": []}"#).is_err());
        let state: MemeState = serde_json::from_str(r#"{"signals": []}"#).unwrap();
        assert!(state.is_empty());
    }
}
