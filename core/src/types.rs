//! Records and wire envelopes.
//!
//! # Design
//! Entities are configured, not compiled in, so a record is a JSON object
//! rather than a struct. `Record` wraps the object map and adds the one field
//! every entity has: an integer `id`. Form inputs produce strings, so `id()`
//! accepts numeric strings as well as numbers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single row of an entity: field name to JSON value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build a record from a JSON value; `None` unless it is an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.0.insert("id".to_string(), Value::from(id));
        self
    }

    pub fn id(&self) -> Option<i64> {
        self.0.get("id").and_then(value_as_id)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Field rendered as the text a form input would hold.
    pub fn get_text(&self, field: &str) -> Option<String> {
        self.0.get(field).map(value_as_text)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Deep-merge `patch` into this record: nested objects merge field by
    /// field, every other value overwrites.
    pub fn merge(&mut self, patch: &Record) {
        merge_maps(&mut self.0, &patch.0);
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn merge_maps(target: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (key, value) in patch {
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => merge_maps(existing, incoming),
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Interpret a JSON value as an integer id.
pub fn value_as_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Text form of a scalar, as it would appear in an input field.
pub fn value_as_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Response body shape shared by every backend endpoint: `{status, data}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub status: Option<i64>,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Envelope {
    /// Business status, falling back to the HTTP status when the body has none.
    pub fn status_or(&self, http_status: u16) -> i64 {
        self.status.unwrap_or(i64::from(http_status))
    }

    pub fn data_record(&self) -> Option<Record> {
        Record::from_value(self.data.clone())
    }

    /// Records in `data`, skipping anything that is not an object.
    pub fn data_records(&self) -> Vec<Record> {
        match &self.data {
            Value::Array(items) => items.iter().cloned().filter_map(Record::from_value).collect(),
            _ => Vec::new(),
        }
    }
}

/// Entry of a select widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: i64,
    pub label: String,
}

impl SelectOption {
    pub fn placeholder() -> Self {
        Self {
            value: 0,
            label: "Select an option".to_string(),
        }
    }

    /// Options for a related list: placeholder first, then `"{id} - {name}"`.
    pub fn from_records(records: &[Record]) -> Vec<SelectOption> {
        let mut options = vec![SelectOption::placeholder()];
        options.extend(records.iter().filter_map(|record| {
            let id = record.id()?;
            let name = record.get_text("name").unwrap_or_default();
            Some(SelectOption {
                value: id,
                label: format!("{id} - {name}"),
            })
        }));
        options
    }
}
