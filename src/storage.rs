//! Key/value storage backends for the persisted session.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{Error, Result};

/// Synchronous string key/value storage, like browser `sessionStorage` or
/// `localStorage`.
///
/// Implementations report unavailability as [`Error::StorageUnavailable`].
pub trait StorageBackend: Send + Sync {
    /// Backend name used in logs.
    fn name(&self) -> &str;

    /// Reads a value.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Writes a value.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removes a value. Removing a missing key succeeds.
    fn remove(&self, key: &str) -> Result<()>;
}

/// Process-local storage backend.
///
/// Clones share the same map, so two handles can model two tabs of one
/// browser profile sharing `localStorage`.
#[derive(Clone)]
pub struct MemoryBackend {
    name: Arc<str>,
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryBackend {
    /// Empty backend; `name` shows up in logs.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: Arc::from(name.as_ref()),
            entries: Arc::default(),
        }
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("name", &self.name)
            .field("len", &self.len())
            .finish()
    }
}

impl StorageBackend for MemoryBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        let guard = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        guard.remove(key);
        Ok(())
    }
}

/// Backend that always fails, standing in for disabled or quota-exceeded storage.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableBackend;

impl StorageBackend for UnavailableBackend {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(Error::StorageUnavailable("storage is disabled".to_string()))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<()> {
        Err(Error::StorageUnavailable("storage is disabled".to_string()))
    }

    fn remove(&self, _key: &str) -> Result<()> {
        Err(Error::StorageUnavailable("storage is disabled".to_string()))
    }
}

/// Ordered list of backends: reads take the first hit, writes go to all.
#[derive(Clone, Default)]
pub struct BackendChain {
    backends: Vec<Arc<dyn StorageBackend>>,
}

impl fmt::Debug for BackendChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.backends.iter().map(|backend| backend.name()).collect();
        f.debug_struct("BackendChain").field("backends", &names).finish()
    }
}

impl BackendChain {
    /// Creates a chain; earlier backends take read priority.
    pub fn new(backends: Vec<Arc<dyn StorageBackend>>) -> Self {
        Self { backends }
    }

    /// Session-scoped store first, cross-reload store second.
    pub fn session_then_persistent(
        session: impl StorageBackend + 'static,
        persistent: impl StorageBackend + 'static,
    ) -> Self {
        Self::new(vec![Arc::new(session), Arc::new(persistent)])
    }

    /// Returns the first value found, skipping backends that fail.
    ///
    /// Fails only when every backend failed and nothing was found.
    pub fn read_in_order(&self, key: &str) -> Result<Option<String>> {
        self.read_in_order_with(key, |raw| Some(raw.to_string()))
    }

    /// Returns the first value `decode` accepts, in backend order.
    ///
    /// A value rejected by `decode` is skipped like a miss, so a corrupt
    /// entry in an earlier backend does not hide a good one further down.
    /// Fails only when every backend failed and nothing was found.
    pub fn read_in_order_with<T>(
        &self,
        key: &str,
        decode: impl Fn(&str) -> Option<T>,
    ) -> Result<Option<T>> {
        let mut first_error = None;
        let mut any_ok = false;
        for backend in &self.backends {
            match backend.get(key) {
                Ok(Some(raw)) => {
                    if let Some(value) = decode(&raw) {
                        return Ok(Some(value));
                    }
                    tracing::debug!(
                        backend = backend.name(),
                        "stored value rejected, trying next backend"
                    );
                    any_ok = true;
                }
                Ok(None) => any_ok = true,
                Err(err) => {
                    tracing::warn!(backend = backend.name(), error = %err, "storage read failed");
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            Some(err) if !any_ok => Err(err),
            _ => Ok(None),
        }
    }

    /// Writes to every backend. Succeeds if at least one write succeeded.
    pub fn write_all(&self, key: &str, value: &str) -> Result<()> {
        self.apply_all(|backend| backend.set(key, value))
    }

    /// Removes from every backend. Succeeds if at least one removal succeeded.
    pub fn remove_all(&self, key: &str) -> Result<()> {
        self.apply_all(|backend| backend.remove(key))
    }

    fn apply_all(&self, op: impl Fn(&dyn StorageBackend) -> Result<()>) -> Result<()> {
        let mut first_error = None;
        let mut any_ok = false;
        for backend in &self.backends {
            match op(backend.as_ref()) {
                Ok(()) => any_ok = true,
                Err(err) => {
                    tracing::warn!(backend = backend.name(), error = %err, "storage write failed");
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            Some(err) if !any_ok => Err(err),
            _ => Ok(()),
        }
    }
}
