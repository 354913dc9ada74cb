//! Per-execution write-once key/value exchange.
//!
//! `set` models key-exchange semantics: a peer must not be able to clobber
//! another peer's published key, so a second `set` for the same key fails
//! with `AlreadySet` instead of overwriting.
mod connection;

pub use connection::{DirectPkiConnection, HttpPkiConnection, PkiConnection};

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::PkiError;

#[derive(Debug, Default)]
pub struct PkiStore {
    entries: RwLock<HashMap<String, String>>,
}

impl PkiStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Returns [`PkiError::NotFound`] when the key has not been published.
    pub fn get(&self, key: &str) -> Result<String, PkiError> {
        let entries = self.entries.read().unwrap_or_else(|poisoned| {
            // A writer never panics while holding the lock; recover the map.
            poisoned.into_inner()
        });
        entries.get(key).cloned().ok_or_else(|| PkiError::NotFound {
            key: key.to_owned(),
        })
    }

    /// Write-once set.
    ///
    /// # Errors
    ///
    /// Returns [`PkiError::AlreadySet`] when the key already has a value;
    /// the stored value is left unchanged.
    pub fn set(&self, key: &str, value: &str) -> Result<(), PkiError> {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if entries.contains_key(key) {
            return Err(PkiError::AlreadySet {
                key: key.to_owned(),
            });
        }
        entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}
