use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),
    #[error("Failed to create database directory: {0}")]
    DirectoryError(String),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// A string key-value slot store, the same shape as browser local storage
pub trait Storage {
    /// Read the value stored under `key`, `None` if the key was never written
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the value stored under `key`
    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
}

impl<T: Storage + ?Sized> Storage for &mut T {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get_item(key)
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set_item(key, value)
    }
}

/// Storage kept entirely in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a slot, as if written by an earlier session
    pub fn with_item(mut self, key: &str, value: &str) -> Self {
        self.items.insert(key.to_string(), value.to_string());
        self
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_storage_round_trips_values() {
        let mut storage = MemoryStorage::new();
        assert!(storage.get_item("memos").unwrap().is_none());

        storage.set_item("memos", "[]").unwrap();
        storage.set_item("memos", "[1]").unwrap();
        assert_eq!(storage.get_item("memos").unwrap().as_deref(), Some("[1]"));
    }

    #[test]
    fn mutable_reference_is_storage() {
        fn write_through<S: Storage>(mut storage: S) {
            storage.set_item("k", "v").unwrap();
        }

        let mut storage = MemoryStorage::new();
        write_through(&mut storage);
        assert_eq!(storage.get_item("k").unwrap().as_deref(), Some("v"));
    }
}
