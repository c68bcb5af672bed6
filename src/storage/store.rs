use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::error::StoreError;
use super::registry::{JsonRegistryStorage, RegistryStorage};
use crate::models::Registry;

/// Birthday store: CRUD over the persisted registry
///
/// Every operation reloads the registry from its backing storage and runs
/// under a single lock, so concurrent load-mutate-save cycles are serialized
/// and readers never see a half-written file.
pub struct BirthdayStore {
    storage: Box<dyn RegistryStorage>,
    lock: Mutex<()>,
}

impl BirthdayStore {
    /// Create a store over any storage backend
    pub fn new(storage: Box<dyn RegistryStorage>) -> Self {
        BirthdayStore {
            storage,
            lock: Mutex::new(()),
        }
    }

    /// Create a store backed by a JSON file at `path`
    pub fn open(path: PathBuf) -> Self {
        Self::new(Box::new(JsonRegistryStorage::new(path)))
    }

    /// The guard protects no data of its own, so a poisoned lock is still usable
    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ensure the backing file exists; safe to call repeatedly
    pub fn initialize_if_absent(&self) -> Result<(), StoreError> {
        let _guard = self.guard();
        self.storage.initialize_if_absent()
    }

    /// Load a consistent snapshot of the registry
    pub fn load(&self) -> Registry {
        let _guard = self.guard();
        self.storage.load()
    }

    /// Overwrite the backing store with `registry`
    pub fn save(&self, registry: &Registry) -> Result<(), StoreError> {
        let _guard = self.guard();
        self.persist(registry)
    }

    /// Get the date stored for `name`
    pub fn get(&self, name: &str) -> Option<String> {
        self.load().get(name).map(str::to_string)
    }

    /// Insert or overwrite the record for `name`, then persist
    pub fn put(&self, name: &str, date: &str) -> Result<Registry, StoreError> {
        let _guard = self.guard();

        let mut registry = self.storage.load();
        registry.insert(name, date);
        self.persist(&registry)?;

        log::debug!("Stored birthday for {:?}", name);
        Ok(registry)
    }

    /// Remove the record for `name`
    /// Persists only when something was removed; the flag reports whether
    /// the name existed.
    pub fn delete(&self, name: &str) -> Result<(Registry, bool), StoreError> {
        let _guard = self.guard();

        let mut registry = self.storage.load();
        if registry.remove(name).is_none() {
            log::debug!("No birthday stored for {:?}, nothing to delete", name);
            return Ok((registry, false));
        }

        self.persist(&registry)?;

        log::debug!("Deleted birthday for {:?}", name);
        Ok((registry, true))
    }

    /// Get the storage file path
    pub fn path(&self) -> &Path {
        self.storage.path()
    }

    // Caller must hold the lock
    fn persist(&self, registry: &Registry) -> Result<(), StoreError> {
        self.storage.save(registry).inspect_err(|e| {
            log::error!("Error saving birthdays: {}", e);
        })
    }
}
