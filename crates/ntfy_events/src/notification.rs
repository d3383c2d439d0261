use serde::Serialize;
use serde_json::{Map, Value};

/// Field names every [`Notification`] carries, in record order.
///
/// Mirrors the notification object returned by the provider's client API.
pub const CANONICAL_FIELDS: [&str; 20] = [
    "id",
    "id_str",
    "umid",
    "umid_str",
    "title",
    "message",
    "app",
    "aid",
    "aid_str",
    "icon",
    "date",
    "queued_date",
    "dispatched_date",
    "priority",
    "sound",
    "url",
    "url_title",
    "acked",
    "receipt",
    "html",
];

/// A normalized inbound notification.
///
/// Every name in [`CANONICAL_FIELDS`] is present; fields the provider left out hold
/// `Value::Null`, the absence marker. Non-canonical fields from the source event
/// follow the canonical ones in the order they were supplied.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Notification {
    fields: Map<String, Value>,
}

impl Notification {
    /// Builds a complete record from whatever fields an event carried.
    ///
    /// Supplied values override the absent defaults; values are not type-checked.
    pub fn normalize(event: Map<String, Value>) -> Self {
        let mut fields = Map::with_capacity(CANONICAL_FIELDS.len() + event.len());
        for name in CANONICAL_FIELDS {
            fields.insert(name.to_string(), Value::Null);
        }
        for (name, value) in event {
            fields.insert(name, value);
        }
        Self { fields }
    }

    /// Record with every canonical field absent.
    pub fn empty() -> Self {
        Self::normalize(Map::new())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// True when the field is missing or holds the absence marker.
    pub fn is_absent(&self, field: &str) -> bool {
        self.fields.get(field).map_or(true, Value::is_null)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }

    /// Fields outside [`CANONICAL_FIELDS`], in supplied order.
    pub fn extra_fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields
            .iter()
            .filter(|(name, _)| !CANONICAL_FIELDS.contains(&name.as_str()))
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn message(&self) -> Option<&str> {
        self.str_field("message")
    }

    pub fn title(&self) -> Option<&str> {
        self.str_field("title")
    }

    pub fn app(&self) -> Option<&str> {
        self.str_field("app")
    }

    /// Numeric id, falling back to `id_str` when the provider only sent the string form.
    pub fn id(&self) -> Option<u64> {
        self.fields
            .get("id")
            .and_then(Value::as_u64)
            .or_else(|| self.str_field("id_str").and_then(|s| s.parse().ok()))
    }

    pub fn priority(&self) -> Option<i64> {
        self.fields.get("priority").and_then(Value::as_i64)
    }

    /// Unix timestamp (seconds) the provider received the message.
    pub fn date(&self) -> Option<i64> {
        self.fields.get("date").and_then(Value::as_i64)
    }

    /// Whitespace-delimited words of the message; empty when there is no text.
    pub fn tokens(&self) -> Vec<&str> {
        self.message()
            .map(|message| message.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// First word of the message, used as the dispatch key.
    pub fn command(&self) -> Option<&str> {
        self.message()
            .and_then(|message| message.split_whitespace().next())
    }

    fn str_field(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }
}

impl Default for Notification {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Map<String, Value>> for Notification {
    fn from(event: Map<String, Value>) -> Self {
        Self::normalize(event)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn event(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn empty_event_yields_every_field_absent() {
        let record = Notification::normalize(Map::new());
        for name in CANONICAL_FIELDS {
            assert_eq!(record.get(name), Some(&Value::Null), "field {name}");
            assert!(record.is_absent(name));
        }
        assert_eq!(record.fields().len(), CANONICAL_FIELDS.len());
    }

    #[test]
    fn supplied_fields_override_defaults() {
        for name in CANONICAL_FIELDS {
            let record = Notification::normalize(event(json!({ name: 42 })));
            assert_eq!(record.get(name), Some(&json!(42)), "field {name}");
        }
    }

    #[test]
    fn extra_fields_pass_through_after_canonical_ones() {
        let record = Notification::normalize(event(json!({
            "zeta": [1, 2],
            "message": "hi",
            "alpha": {"nested": true},
        })));

        let names: Vec<&str> = record.fields().keys().map(String::as_str).collect();
        assert_eq!(&names[..20], &CANONICAL_FIELDS[..]);
        assert_eq!(&names[20..], &["zeta", "alpha"]);

        let extras: Vec<_> = record.extra_fields().collect();
        assert_eq!(extras[0], ("zeta", &json!([1, 2])));
        assert_eq!(extras[1], ("alpha", &json!({"nested": true})));
    }

    #[test]
    fn typed_accessors_ignore_mismatched_types() {
        let record = Notification::normalize(event(json!({
            "message": 7,
            "title": "Build",
            "id_str": "991",
            "priority": "high",
        })));

        assert_eq!(record.message(), None);
        assert_eq!(record.title(), Some("Build"));
        assert_eq!(record.id(), Some(991));
        assert_eq!(record.priority(), None);
        assert!(record.tokens().is_empty());
    }

    #[test]
    fn command_is_first_word() {
        let record = Notification::normalize(event(json!({"message": "  reboot   now "})));
        assert_eq!(record.command(), Some("reboot"));
        assert_eq!(record.tokens(), vec!["reboot", "now"]);
    }
}
