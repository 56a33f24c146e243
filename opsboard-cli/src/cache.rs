//! The client-held mirror of one collection.
//!
//! An explicit owned value, mutated optimistically by the coordinator and
//! passed to the rendering code; there is no free-floating global state.

use opsboard_core::{FieldMap, Item};

#[derive(Debug, Default, Clone)]
pub struct ClientCache {
    items: Vec<Item>,
}

impl ClientCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: Vec<Item>) -> Self {
        ClientCache { items }
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn insert(&mut self, item: Item) {
        self.items.push(item);
    }

    /// Remove an item; false when the id is unknown.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        self.items.len() != before
    }

    /// Merge fields into an item; false when the id is unknown.
    pub fn merge_fields(&mut self, id: &str, fields: &FieldMap) -> bool {
        let Some(item) = self.items.iter_mut().find(|item| item.id == id) else {
            return false;
        };
        for (key, value) in fields {
            if key != "id" {
                item.fields.insert(key.clone(), value.clone());
            }
        }
        true
    }

    /// Swap a provisional item for the server-confirmed one, keeping its
    /// position in the collection.
    pub fn replace_item(&mut self, old_id: &str, item: Item) -> bool {
        let Some(slot) = self.items.iter_mut().find(|i| i.id == old_id) else {
            return false;
        };
        *slot = item;
        true
    }
}
