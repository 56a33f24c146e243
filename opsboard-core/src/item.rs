//! Collection items and their typed views.
//!
//! On disk and on the wire an item is one flat JSON object: an `id` plus the
//! collection-specific fields. `Item` keeps the fields as an ordered map so
//! unknown attributes round-trip untouched; `Event` and `Task` are the typed
//! views the CLI uses to construct well-formed field maps.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ordered mapping of field names to values, as stored in the JSON array.
pub type FieldMap = serde_json::Map<String, Value>;

/// One record in a collection.
///
/// The id is assigned exactly once, by the server, and is immutable after
/// creation. Everything else lives in `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub fields: FieldMap,
}

impl Item {
    pub fn new(id: impl Into<String>, fields: FieldMap) -> Self {
        Item {
            id: id.into(),
            fields,
        }
    }

    /// Field value as a display string ("" when absent).
    pub fn field_str(&self, key: &str) -> String {
        match self.fields.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }
}

/// A calendar event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub title: String,
    pub start: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_day: Option<bool>,
}

impl Event {
    pub fn into_fields(self) -> FieldMap {
        let mut fields = FieldMap::new();
        fields.insert("title".into(), Value::String(self.title));
        fields.insert("start".into(), Value::String(self.start.to_string()));
        if let Some(end) = self.end {
            fields.insert("end".into(), Value::String(end.to_string()));
        }
        if let Some(all_day) = self.all_day {
            fields.insert("allDay".into(), Value::Bool(all_day));
        }
        fields
    }
}

/// One row of the daily-task reporting table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub description: String,
    pub task: String,
    pub action_plan: String,
    pub pic: String,
    pub target_date: NaiveDate,
    pub completion_date: Option<NaiveDate>,
    /// Completion percentage, clamped to 0..=100 on every write path.
    pub percentage: i64,
}

impl Task {
    pub fn into_fields(self) -> FieldMap {
        let mut fields = FieldMap::new();
        fields.insert("description".into(), Value::String(self.description));
        fields.insert("task".into(), Value::String(self.task));
        fields.insert("actionPlan".into(), Value::String(self.action_plan));
        fields.insert("pic".into(), Value::String(self.pic));
        fields.insert(
            "targetDate".into(),
            Value::String(self.target_date.to_string()),
        );
        // The reporting table shows an empty cell for tasks not yet done
        let completion = self
            .completion_date
            .map(|d| d.to_string())
            .unwrap_or_default();
        fields.insert("completionDate".into(), Value::String(completion));
        fields.insert(
            "percentage".into(),
            Value::from(self.percentage.clamp(0, 100)),
        );
        fields
    }
}
