use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::record::BirthdayRecord;

/// Registry of birthdays keyed by name
/// Keeps insertion order so listings are stable across reloads.
/// Serializes as a plain JSON object: `{"Alice": "1990-05-12"}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Registry {
    records: IndexMap<String, String>,
}

impl Registry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Registry {
            records: IndexMap::new(),
        }
    }

    /// Insert or overwrite the date for `name`
    /// Overwriting keeps the record at its original position.
    /// Returns the previous date if there was one.
    pub fn insert(&mut self, name: impl Into<String>, date: impl Into<String>) -> Option<String> {
        self.records.insert(name.into(), date.into())
    }

    /// Remove the record for `name`, returning its date if it existed
    pub fn remove(&mut self, name: &str) -> Option<String> {
        // shift_remove keeps the remaining records in order
        self.records.shift_remove(name)
    }

    /// Get the date stored for `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.records.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    /// Records in insertion order
    pub fn records(&self) -> impl Iterator<Item = BirthdayRecord> + '_ {
        self.records
            .iter()
            .map(|(name, date)| BirthdayRecord::new(name.as_str(), date.as_str()))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
