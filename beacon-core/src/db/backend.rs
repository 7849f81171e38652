//! Durable key/value backend abstraction
//!
//! The store only needs string values addressed by `(namespace, key)` plus an
//! atomic multi-write commit. [`Database`](super::Database) is the SQLite
//! implementation; tests wrap it to inject failures.

use crate::error::Result;

/// A single write inside a batch commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreferenceWrite {
    /// Store `value` under `key`, replacing any previous value
    Put { key: String, value: String },
    /// Physically remove `key`
    Remove { key: String },
}

impl PreferenceWrite {
    pub fn put(key: impl Into<String>, value: impl Into<String>) -> Self {
        PreferenceWrite::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn remove(key: impl Into<String>) -> Self {
        PreferenceWrite::Remove { key: key.into() }
    }

    pub fn key(&self) -> &str {
        match self {
            PreferenceWrite::Put { key, .. } | PreferenceWrite::Remove { key } => key,
        }
    }
}

/// Namespaced durable string storage
///
/// Implementations must apply every write of a [`commit`](Self::commit) or
/// none of them.
pub trait PreferenceBackend: Send + Sync {
    /// Fail if the backend cannot serve reads and writes yet
    fn ensure_ready(&self) -> Result<()>;

    /// Read the value stored under `key`, if any
    fn get(&self, namespace: &str, key: &str) -> Result<Option<String>>;

    /// Apply `writes` atomically
    fn commit(&self, namespace: &str, writes: &[PreferenceWrite]) -> Result<()>;

    fn put(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        self.commit(namespace, &[PreferenceWrite::put(key, value)])
    }

    fn remove(&self, namespace: &str, key: &str) -> Result<()> {
        self.commit(namespace, &[PreferenceWrite::remove(key)])
    }

    fn contains(&self, namespace: &str, key: &str) -> Result<bool> {
        Ok(self.get(namespace, key)?.is_some())
    }
}
