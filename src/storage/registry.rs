use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use super::error::StoreError;
use crate::models::Registry;

/// Trait for registry persistence
pub trait RegistryStorage: Send + Sync {
    /// Load the registry, falling back to an empty one when the backing
    /// file is missing, unreadable, or malformed
    fn load(&self) -> Registry;

    /// Overwrite the backing file with the full registry
    fn save(&self, registry: &Registry) -> Result<(), StoreError>;

    /// Create the backing file holding an empty registry if it doesn't exist
    fn initialize_if_absent(&self) -> Result<(), StoreError>;

    /// Get the storage file path
    fn path(&self) -> &Path;
}

/// JSON-based implementation of RegistryStorage
/// Uses atomic write pattern with .tmp file for safety
pub struct JsonRegistryStorage {
    path: PathBuf,
}

impl JsonRegistryStorage {
    /// Create a new JsonRegistryStorage with the given path
    pub fn new(path: PathBuf) -> Self {
        JsonRegistryStorage { path }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("birthdays.json"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// Pretty-print with 4-space indentation
fn to_json(registry: &Registry) -> Result<Vec<u8>, StoreError> {
    let mut buf = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    registry.serialize(&mut serializer)?;
    buf.push(b'\n');
    Ok(buf)
}

impl RegistryStorage for JsonRegistryStorage {
    fn load(&self) -> Registry {
        if !self.path.exists() {
            if let Err(e) = self.initialize_if_absent() {
                log::error!("Could not create data file: {}", e);
            }
            return Registry::new();
        }

        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                log::error!("Could not load data from {:?}: {}", self.path, e);
                return Registry::new();
            }
        };

        // Malformed content is left on disk untouched; the next save replaces it
        match serde_json::from_str::<Registry>(&contents) {
            Ok(registry) => {
                log::info!("Loaded {} birthdays from {:?}", registry.len(), self.path);
                registry
            }
            Err(e) => {
                log::error!("Could not parse data in {:?}: {}", self.path, e);
                Registry::new()
            }
        }
    }

    fn save(&self, registry: &Registry) -> Result<(), StoreError> {
        let bytes = to_json(registry)?;

        // Ensure parent directory exists
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        // Atomic write pattern: write to .tmp, then rename
        let tmp_path = self.tmp_path();
        fs::write(&tmp_path, &bytes).map_err(|e| StoreError::io(&tmp_path, e))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::io(&self.path, e))?;

        log::info!("Saved {} birthdays to {:?}", registry.len(), self.path);

        Ok(())
    }

    fn initialize_if_absent(&self) -> Result<(), StoreError> {
        if self.path.exists() {
            return Ok(());
        }

        self.save(&Registry::new())?;
        log::info!("Created data file: {:?}", self.path);

        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }
}
