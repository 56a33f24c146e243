//! The named collections opsboard persists, with their seed data and
//! field normalization rules.

use std::fmt;
use std::str::FromStr;

use serde_json::{Value, json};

use crate::error::OpsboardError;
use crate::item::{FieldMap, Item};

/// A named collection backed by one JSON file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Events,
    Tasks,
}

impl CollectionKind {
    pub const ALL: [CollectionKind; 2] = [CollectionKind::Events, CollectionKind::Tasks];

    pub fn name(&self) -> &'static str {
        match self {
            CollectionKind::Events => "events",
            CollectionKind::Tasks => "tasks",
        }
    }

    /// Default contents written when the backing file is missing or unreadable.
    pub fn seed(&self) -> Vec<Item> {
        match self {
            CollectionKind::Events => vec![
                seed_item("1", json!({ "title": "Team Meeting", "start": "2025-12-05" })),
                seed_item("2", json!({ "title": "Project Deadline", "start": "2025-12-10" })),
                seed_item("3", json!({ "title": "Client Call", "start": "2025-12-15" })),
            ],
            CollectionKind::Tasks => Vec::new(),
        }
    }

    /// Enforce collection-specific field invariants in place.
    ///
    /// Tasks: `percentage` is clamped to 0..=100; non-numeric input becomes 0.
    pub fn normalize(&self, fields: &mut FieldMap) {
        if !matches!(self, CollectionKind::Tasks) {
            return;
        }
        let clamped = match fields.get("percentage") {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.round() as i64))
                .unwrap_or(0)
                .clamp(0, 100),
            Some(Value::String(s)) => s.trim().parse::<i64>().unwrap_or(0).clamp(0, 100),
            Some(_) => 0,
            None => return,
        };
        fields.insert("percentage".into(), Value::from(clamped));
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for CollectionKind {
    type Err = OpsboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CollectionKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| OpsboardError::UnknownCollection(s.to_string()))
    }
}

fn seed_item(id: &str, fields: Value) -> Item {
    let fields = match fields {
        Value::Object(map) => map,
        _ => FieldMap::new(),
    };
    Item::new(id, fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task_fields(percentage: Value) -> FieldMap {
        let mut fields = FieldMap::new();
        fields.insert("description".into(), Value::String("Review".into()));
        fields.insert("percentage".into(), percentage);
        fields
    }

    #[test]
    fn percentage_is_clamped_on_normalize() {
        for (input, expected) in [
            (json!(-5), 0),
            (json!(150), 100),
            (json!(42), 42),
            (json!("37"), 37),
            (json!("not a number"), 0),
            (json!(99.6), 100),
        ] {
            let mut fields = task_fields(input.clone());
            CollectionKind::Tasks.normalize(&mut fields);
            assert_eq!(
                fields.get("percentage"),
                Some(&json!(expected)),
                "input {input}"
            );
        }
    }

    #[test]
    fn normalize_leaves_events_untouched() {
        let mut fields = FieldMap::new();
        fields.insert("title".into(), Value::String("Standup".into()));
        fields.insert("percentage".into(), json!(999));
        let before = fields.clone();

        CollectionKind::Events.normalize(&mut fields);
        assert_eq!(fields, before);
    }

    #[test]
    fn events_seed_has_three_items() {
        let seed = CollectionKind::Events.seed();
        assert_eq!(seed.len(), 3);
        assert_eq!(seed[0].field_str("title"), "Team Meeting");
        assert!(seed.iter().all(|item| !item.id.is_empty()));
    }

    #[test]
    fn collection_names_round_trip() {
        for kind in CollectionKind::ALL {
            assert_eq!(kind.name().parse::<CollectionKind>().unwrap(), kind);
        }
        assert!("users".parse::<CollectionKind>().is_err());
    }
}
