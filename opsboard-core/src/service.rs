//! Mediates all reads and writes to the named collections.
//!
//! Every mutation is a load-modify-save against the backing file, so each
//! collection carries a mutex serializing that sequence; without it two
//! concurrent appends could both read the same prior array and each write
//! back a version missing the other's item. Collections are independent:
//! one lock per collection, no cross-collection transactions.

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::collection::CollectionKind;
use crate::error::{OpsboardError, OpsboardResult};
use crate::item::{FieldMap, Item};
use crate::store::Store;

struct CollectionState {
    /// Bumped on every successful save. In-memory only; resets per process.
    version: u64,
}

impl CollectionState {
    fn new() -> Mutex<Self> {
        Mutex::new(CollectionState { version: 0 })
    }
}

pub struct CollectionService {
    store: Store,
    events: Mutex<CollectionState>,
    tasks: Mutex<CollectionState>,
}

impl CollectionService {
    pub fn new(store: Store) -> Self {
        CollectionService {
            store,
            events: CollectionState::new(),
            tasks: CollectionState::new(),
        }
    }

    fn state(&self, kind: CollectionKind) -> &Mutex<CollectionState> {
        match kind {
            CollectionKind::Events => &self.events,
            CollectionKind::Tasks => &self.tasks,
        }
    }

    /// Current version token and full contents of a collection.
    pub async fn get_all(&self, kind: CollectionKind) -> (u64, Vec<Item>) {
        let state = self.state(kind).lock().await;
        (state.version, self.store.load(kind))
    }

    /// Append a new item built from `fields`, assigning it a fresh id.
    ///
    /// Any caller-supplied id is discarded; the server is the only id
    /// assigner. Returns the item exactly as persisted.
    pub async fn append(&self, kind: CollectionKind, mut fields: FieldMap) -> OpsboardResult<Item> {
        let mut state = self.state(kind).lock().await;

        fields.shift_remove("id");
        kind.normalize(&mut fields);

        let mut items = self.store.load(kind);
        let item = Item::new(fresh_id(&items), fields);
        items.push(item.clone());

        self.store.save(kind, &items)?;
        state.version += 1;
        Ok(item)
    }

    /// Merge `fields` into the item with the given id.
    pub async fn update_fields(
        &self,
        kind: CollectionKind,
        id: &str,
        fields: FieldMap,
    ) -> OpsboardResult<Item> {
        let mut state = self.state(kind).lock().await;

        let mut items = self.store.load(kind);
        let item = items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or_else(|| OpsboardError::NotFound {
                collection: kind.name(),
                id: id.to_string(),
            })?;

        for (key, value) in fields {
            if key == "id" {
                continue;
            }
            item.fields.insert(key, value);
        }
        kind.normalize(&mut item.fields);
        let updated = item.clone();

        self.store.save(kind, &items)?;
        state.version += 1;
        Ok(updated)
    }

    /// Remove the item with the given id.
    ///
    /// Not-found is an error distinct from success, and nothing is persisted
    /// when no item was removed.
    pub async fn remove_by_id(&self, kind: CollectionKind, id: &str) -> OpsboardResult<()> {
        let mut state = self.state(kind).lock().await;

        let mut items = self.store.load(kind);
        let before = items.len();
        items.retain(|item| item.id != id);

        if items.len() == before {
            return Err(OpsboardError::NotFound {
                collection: kind.name(),
                id: id.to_string(),
            });
        }

        self.store.save(kind, &items)?;
        state.version += 1;
        Ok(())
    }

    /// Replace the whole collection, guarded by an optimistic version token.
    ///
    /// A submitted version that does not match the current one means another
    /// writer changed the collection since the caller fetched it; the
    /// replacement is rejected and the caller must reload and reapply.
    /// Returns the new version.
    pub async fn replace_all(
        &self,
        kind: CollectionKind,
        mut items: Vec<Item>,
        submitted_version: u64,
    ) -> OpsboardResult<u64> {
        let mut state = self.state(kind).lock().await;

        if submitted_version != state.version {
            return Err(OpsboardError::VersionConflict {
                collection: kind.name(),
                submitted: submitted_version,
                current: state.version,
            });
        }

        let mut seen = std::collections::HashSet::new();
        for item in &mut items {
            kind.normalize(&mut item.fields);
            if item.id.is_empty() || !seen.insert(item.id.clone()) {
                let id = fresh_id_excluding(&seen);
                seen.insert(id.clone());
                item.id = id;
            }
        }

        self.store.save(kind, &items)?;
        state.version += 1;
        Ok(state.version)
    }
}

fn fresh_id(items: &[Item]) -> String {
    loop {
        let id = Uuid::new_v4().to_string();
        if !items.iter().any(|item| item.id == id) {
            return id;
        }
    }
}

fn fresh_id_excluding(seen: &std::collections::HashSet<String>) -> String {
    loop {
        let id = Uuid::new_v4().to_string();
        if !seen.contains(&id) {
            return id;
        }
    }
}
