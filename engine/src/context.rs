// Process-wide context built once at start and handed to components
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::EngineSettings;
use crate::data::catalog::Catalog;
use crate::data::persist::{LocalStore, Preferences};

#[derive(Clone)]
pub struct AppContext {
    pub settings: EngineSettings,
    pub catalog: Arc<Catalog>,
    pub preferences: Arc<Mutex<Preferences>>,
}

impl AppContext {
    pub fn new(settings: EngineSettings, catalog: Catalog, preferences: Preferences) -> Self {
        AppContext {
            settings,
            catalog: Arc::new(catalog),
            preferences: Arc::new(Mutex::new(preferences)),
        }
    }

    /// Built-in catalog plus preferences from the configured state file. Falls
    /// back to an in-memory store when no data directory can be resolved.
    pub fn load(settings: EngineSettings) -> Self {
        let store = match settings.state_path.clone().or_else(LocalStore::default_path) {
            Some(path) => LocalStore::open(path),
            None => {
                tracing::warn!("No data directory available, preferences will not survive a restart");
                LocalStore::in_memory()
            }
        };
        Self::new(settings, Catalog::builtin(), Preferences::load(store))
    }
}
