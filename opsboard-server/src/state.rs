use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use opsboard_core::{CollectionService, Config, Store};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    service: Arc<CollectionService>,
}

impl AppState {
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_data_dir(config.data_dir())
    }

    pub fn with_data_dir(data_dir: impl AsRef<Path>) -> Result<Self> {
        let store = Store::open(data_dir.as_ref())?;
        Ok(AppState {
            service: Arc::new(CollectionService::new(store)),
        })
    }

    pub fn service(&self) -> &CollectionService {
        &self.service
    }
}
