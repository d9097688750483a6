//! Configuration backends
//!
//! The persisted configuration is one JSON document. Loading and saving it is
//! the only asynchronous step of the engine, so the backend trait is the only
//! `async` seam in the crate.

use std::cell::{Cell, RefCell};

use async_trait::async_trait;

use super::ConfigSnapshot;
use crate::error::{Result, ShieldError};

/// Default localStorage key of the configuration document.
pub const STORAGE_KEY: &str = "shelter_config";

/// Persistent key/value store holding the configuration snapshot.
#[async_trait(?Send)]
pub trait ConfigBackend {
    /// Load the stored snapshot; an empty store yields the default snapshot.
    async fn load(&self) -> Result<ConfigSnapshot>;

    /// Replace the stored snapshot.
    async fn save(&self, snapshot: &ConfigSnapshot) -> Result<()>;
}

/// In-memory backend for native builds and tests.
///
/// Stores the serialized document so that round trips exercise the same
/// serde path as the browser backend.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    document: RefCell<Option<String>>,
    unavailable: Cell<bool>,
    saves: Cell<usize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend pre-filled with a JSON document.
    pub fn with_document(json: impl Into<String>) -> Self {
        let backend = Self::default();
        *backend.document.borrow_mut() = Some(json.into());
        backend
    }

    /// Simulate the store going away (every call fails while set).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.set(unavailable);
    }

    /// Replace the stored document, as another writer would.
    pub fn set_document(&self, json: impl Into<String>) {
        *self.document.borrow_mut() = Some(json.into());
    }

    pub fn document(&self) -> Option<String> {
        self.document.borrow().clone()
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.get()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.get() {
            return Err(ShieldError::StoreUnavailable("memory store offline".into()));
        }
        Ok(())
    }
}

#[async_trait(?Send)]
impl ConfigBackend for MemoryBackend {
    async fn load(&self) -> Result<ConfigSnapshot> {
        self.check_available()?;
        match self.document.borrow().as_deref() {
            Some(json) => ConfigSnapshot::from_json(json),
            None => Ok(ConfigSnapshot::default()),
        }
    }

    async fn save(&self, snapshot: &ConfigSnapshot) -> Result<()> {
        self.check_available()?;
        let json = snapshot.to_json()?;
        *self.document.borrow_mut() = Some(json);
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }
}

/// Backend storing the snapshot in `window.localStorage`.
#[derive(Debug, Clone)]
pub struct LocalStorageBackend {
    storage_key: String,
}

impl LocalStorageBackend {
    pub fn new() -> Self {
        Self::with_key(STORAGE_KEY)
    }

    pub fn with_key(key: impl Into<String>) -> Self {
        Self {
            storage_key: key.into(),
        }
    }

    fn storage() -> Result<web_sys::Storage> {
        let window = web_sys::window()
            .ok_or_else(|| ShieldError::StoreUnavailable("No window".into()))?;
        window
            .local_storage()
            .map_err(|_| ShieldError::StoreUnavailable("localStorage not available".into()))?
            .ok_or_else(|| ShieldError::StoreUnavailable("localStorage is null".into()))
    }

    /// Remove the stored snapshot.
    pub async fn clear(&self) -> Result<()> {
        let storage = Self::storage()?;
        storage
            .remove_item(&self.storage_key)
            .map_err(|_| ShieldError::StoreUnavailable("Failed to clear configuration".into()))?;
        log::info!("🗑️ Cleared stored configuration");
        Ok(())
    }
}

impl Default for LocalStorageBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl ConfigBackend for LocalStorageBackend {
    async fn load(&self) -> Result<ConfigSnapshot> {
        let storage = Self::storage()?;
        match storage.get_item(&self.storage_key) {
            Ok(Some(json)) => {
                log::info!("📂 Loaded configuration from storage");
                ConfigSnapshot::from_json(&json)
            }
            Ok(None) => {
                log::info!("📂 No saved configuration, starting fresh");
                Ok(ConfigSnapshot::default())
            }
            Err(e) => Err(ShieldError::StoreUnavailable(format!("{:?}", e))),
        }
    }

    async fn save(&self, snapshot: &ConfigSnapshot) -> Result<()> {
        let storage = Self::storage()?;
        let json = snapshot.to_json()?;
        storage
            .set_item(&self.storage_key, &json)
            .map_err(|_| ShieldError::StoreUnavailable("Failed to save configuration".into()))?;
        log::info!("💾 Saved configuration ({} domains)", snapshot.domains.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn test_empty_memory_backend_loads_default() {
        let backend = MemoryBackend::new();
        let snapshot = block_on(backend.load()).unwrap();
        assert_eq!(snapshot, ConfigSnapshot::default());
    }

    #[test]
    fn test_memory_round_trip() {
        let backend = MemoryBackend::new();
        let snapshot = ConfigSnapshot {
            default_level: Some("strict".into()),
            ..Default::default()
        };
        block_on(backend.save(&snapshot)).unwrap();
        assert_eq!(backend.save_count(), 1);
        assert!(backend.document().unwrap().contains("__default__"));
        assert_eq!(block_on(backend.load()).unwrap(), snapshot);
    }

    #[test]
    fn test_unavailable_backend() {
        let backend = MemoryBackend::new();
        backend.set_unavailable(true);
        let err = block_on(backend.load()).unwrap_err();
        assert!(err.is_recoverable());
        assert!(block_on(backend.save(&ConfigSnapshot::default())).is_err());
        assert_eq!(backend.save_count(), 0);
    }
}
