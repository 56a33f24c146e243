//! Core types for the opsboard tools.
//!
//! This crate provides everything shared between opsboard-server and
//! opsboard-cli:
//! - `Item` and the typed `Event`/`Task` views
//! - `Store` for file-backed JSON persistence
//! - `CollectionService` for serialized collection mutations

pub mod collection;
pub mod config;
pub mod error;
pub mod item;
pub mod service;
pub mod store;

pub use collection::CollectionKind;
pub use self::config::Config;
pub use error::{OpsboardError, OpsboardResult};
pub use item::{Event, FieldMap, Item, Task};
pub use service::CollectionService;
pub use store::Store;
