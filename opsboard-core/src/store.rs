//! File-backed persistence for collections.
//!
//! Each collection is one human-readable JSON array at
//! `<data_dir>/<name>.json`, rewritten wholesale on every save.

use std::fs;
use std::io;
use std::path::PathBuf;

use crate::collection::CollectionKind;
use crate::error::OpsboardResult;
use crate::item::Item;

pub struct Store {
    data_dir: PathBuf,
}

impl Store {
    /// Open a store rooted at `data_dir`, creating the directory if needed.
    pub fn open(data_dir: impl Into<PathBuf>) -> OpsboardResult<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)?;
        Ok(Store { data_dir })
    }

    fn file_path(&self, kind: CollectionKind) -> PathBuf {
        self.data_dir.join(format!("{}.json", kind.name()))
    }

    /// Read a collection from disk.
    ///
    /// A missing, empty, or unparseable file is replaced with the collection's
    /// seed data; load never fails the caller. A corrupt file is a data-loss
    /// event and is logged as such.
    pub fn load(&self, kind: CollectionKind) -> Vec<Item> {
        let path = self.file_path(kind);

        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) => {
                if err.kind() != io::ErrorKind::NotFound {
                    log::error!("failed to read {}: {}", path.display(), err);
                }
                return self.seed(kind);
            }
        };

        if raw.trim().is_empty() {
            return self.seed(kind);
        }

        match serde_json::from_str(&raw) {
            Ok(items) => items,
            Err(err) => {
                log::error!(
                    "data loss: {} is corrupt ({}); discarding its contents and reseeding defaults",
                    path.display(),
                    err
                );
                self.seed(kind)
            }
        }
    }

    /// Overwrite a collection on disk.
    ///
    /// Writes go through a sibling temp file and a rename, so a reader never
    /// observes a partial array. Failures are returned to the caller; a
    /// mutation that did not persist must not be reported as success.
    pub fn save(&self, kind: CollectionKind, items: &[Item]) -> OpsboardResult<()> {
        fs::create_dir_all(&self.data_dir)?;

        let path = self.file_path(kind);
        let tmp = self.data_dir.join(format!("{}.json.tmp", kind.name()));

        let json = serde_json::to_string_pretty(items)?;
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn seed(&self, kind: CollectionKind) -> Vec<Item> {
        let items = kind.seed();
        log::info!("seeding '{}' with {} default item(s)", kind, items.len());
        if let Err(err) = self.save(kind, &items) {
            log::error!("failed to write default '{}' collection: {}", kind, err);
        }
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OpsboardError;
    use serde_json::json;
    use tempfile::TempDir;

    fn store() -> (Store, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();
        (store, dir)
    }

    fn item(id: &str, title: &str) -> Item {
        let mut fields = crate::item::FieldMap::new();
        fields.insert("title".into(), json!(title));
        Item::new(id, fields)
    }

    #[test]
    fn load_of_absent_file_seeds_defaults_and_creates_file() {
        let (store, dir) = store();

        let items = store.load(CollectionKind::Events);
        assert_eq!(items.len(), 3);

        let path = dir.path().join("events.json");
        assert!(path.exists());
        let on_disk: Vec<Item> = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(on_disk, items);
    }

    #[test]
    fn save_then_load_round_trips_order_and_fields() {
        let (store, _dir) = store();

        let items = vec![item("b", "second"), item("a", "first"), item("c", "third")];
        store.save(CollectionKind::Events, &items).unwrap();

        assert_eq!(store.load(CollectionKind::Events), items);
    }

    #[test]
    fn corrupt_file_is_reseeded() {
        let (store, dir) = store();
        fs::write(dir.path().join("events.json"), "{not json").unwrap();

        let items = store.load(CollectionKind::Events);
        assert_eq!(items.len(), 3);

        // The corrupt file was replaced with the seeded array
        assert_eq!(store.load(CollectionKind::Events), items);
    }

    #[test]
    fn empty_file_is_reseeded() {
        let (store, dir) = store();
        fs::write(dir.path().join("tasks.json"), "  \n").unwrap();

        assert!(store.load(CollectionKind::Tasks).is_empty());
        let raw = fs::read_to_string(dir.path().join("tasks.json")).unwrap();
        assert_eq!(raw.trim(), "[]");
    }

    #[test]
    fn save_surfaces_io_errors_to_the_caller() {
        let (store, dir) = store();
        // A directory squatting on the target path makes the rename fail
        fs::create_dir(dir.path().join("events.json")).unwrap();

        let err = store
            .save(CollectionKind::Events, &[item("1", "x")])
            .unwrap_err();
        assert!(matches!(err, OpsboardError::Io(_)));
    }

    #[test]
    fn save_leaves_no_temp_file_behind() {
        let (store, dir) = store();
        store
            .save(CollectionKind::Events, &[item("1", "only")])
            .unwrap();

        assert!(!dir.path().join("events.json.tmp").exists());
    }

    #[test]
    fn unknown_extra_fields_survive_a_round_trip() {
        let (store, _dir) = store();

        let mut fields = crate::item::FieldMap::new();
        fields.insert("title".into(), json!("X"));
        fields.insert("color".into(), json!("#ff0000"));
        let items = vec![Item::new("1", fields)];

        store.save(CollectionKind::Events, &items).unwrap();
        let loaded = store.load(CollectionKind::Events);
        assert_eq!(loaded[0].field_str("color"), "#ff0000");
    }
}
