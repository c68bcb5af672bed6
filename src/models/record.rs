use serde::{Deserialize, Serialize};
use std::fmt;

/// A single birthday entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BirthdayRecord {
    /// Unique key, compared exactly as typed
    pub name: String,
    /// Free-form date token, documented to users as YYYY-MM-DD
    pub date: String,
}

impl BirthdayRecord {
    pub fn new(name: impl Into<String>, date: impl Into<String>) -> Self {
        BirthdayRecord {
            name: name.into(),
            date: date.into(),
        }
    }
}

/// Formats as a listing line: `Alice : 1990-05-12`
impl fmt::Display for BirthdayRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} : {}", self.name, self.date)
    }
}
