//! Durable slots: typed in-memory values mirrored to a durable medium
//!
//! A slot is loaded once, on first open, and written through on every change.
//! Loading never fails the caller: a missing, unparseable or wrongly shaped
//! value degrades to the slot's default. Persisting never fails the caller
//! either: errors are logged and the in-memory value still changes.
//!
//! Mutations run as closures over the current value while the slot's write
//! lock is held, so queued updates always see the result of the previous one.

use crate::interface::VaultError;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, warn};

/// Storage a slot value is mirrored to. Values are JSON documents.
pub trait DurableMedium: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>, VaultError>;

    fn save(&self, key: &str, value: &str) -> Result<(), VaultError>;

    /// Size of the underlying storage, when the medium can tell
    fn size_bytes(&self) -> Option<i64> {
        None
    }
}

/// Process-local medium. Can be switched into a "full" state where every
/// save is rejected, like a browser storage quota.
#[derive(Default)]
pub struct MemoryMedium {
    values: RwLock<HashMap<String, String>>,
    full: AtomicBool,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_full(&self, full: bool) {
        self.full.store(full, Ordering::SeqCst);
    }

    /// Raw stored document, bypassing any open slot
    pub fn raw(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    /// Store a raw document, bypassing any open slot
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.values.write().insert(key.to_string(), value.to_string());
    }
}

impl DurableMedium for MemoryMedium {
    fn load(&self, key: &str) -> Result<Option<String>, VaultError> {
        Ok(self.raw(key))
    }

    fn save(&self, key: &str, value: &str) -> Result<(), VaultError> {
        if self.full.load(Ordering::SeqCst) {
            return Err(VaultError::Io("storage quota exceeded".to_string()));
        }
        self.insert_raw(key, value);
        Ok(())
    }
}

/// Read `key` from the medium, falling back to `default` on any problem
fn load_or_default<T, F>(medium: &dyn DurableMedium, key: &str, default: F) -> T
where
    T: DeserializeOwned,
    F: FnOnce() -> T,
{
    match medium.load(key) {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "discarding malformed slot value, using default");
                default()
            }
        },
        Ok(None) => default(),
        Err(e) => {
            warn!(key, error = %e, "failed to load slot, using default");
            default()
        }
    }
}

/// Write `value` under `key`. Returns false if it could not be persisted.
fn persist<T: Serialize>(medium: &dyn DurableMedium, key: &str, value: &T) -> bool {
    let raw = match serde_json::to_string(value) {
        Ok(raw) => raw,
        Err(e) => {
            error!(key, error = %e, "failed to serialize slot value");
            return false;
        }
    };
    match medium.save(key, &raw) {
        Ok(()) => true,
        Err(e) => {
            error!(key, error = %e, "failed to persist slot value");
            false
        }
    }
}

struct SlotInner<T> {
    key: String,
    value: RwLock<T>,
    revision: AtomicU64,
    medium: Arc<dyn DurableMedium>,
    feed: Arc<watch::Sender<u64>>,
}

/// Shared handle to one durable slot. Clones refer to the same value.
pub struct Slot<T> {
    inner: Arc<SlotInner<T>>,
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Serialize> Slot<T> {
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Number of changes applied since the slot was opened
    pub fn revision(&self) -> u64 {
        self.inner.revision.load(Ordering::Acquire)
    }

    /// Borrow the current value
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.read())
    }

    /// Borrow the current value together with the revision it belongs to
    pub fn snapshot<R>(&self, f: impl FnOnce(&T, u64) -> R) -> R {
        let guard = self.inner.value.read();
        f(&guard, self.revision())
    }

    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.inner.value.read().clone()
    }

    /// Replace the value
    pub fn set(&self, value: T) {
        let mut guard = self.inner.value.write();
        *guard = value;
        self.commit(&guard);
    }

    /// Transform the current value in place. The closure returns whether it
    /// changed anything; unchanged values are not persisted.
    pub fn update(&self, f: impl FnOnce(&mut T) -> bool) -> bool {
        let mut guard = self.inner.value.write();
        if !f(&mut guard) {
            return false;
        }
        self.commit(&guard);
        true
    }

    // Runs under the write lock so revisions and persisted values stay in order.
    fn commit(&self, value: &T) {
        self.inner.revision.fetch_add(1, Ordering::AcqRel);
        persist(self.inner.medium.as_ref(), &self.inner.key, value);
        self.inner.feed.send_modify(|generation| *generation = generation.wrapping_add(1));
    }
}

/// Opens slots over one medium. Opening the same key twice returns the same
/// shared slot, so every write is visible to every reader of that key.
pub struct SlotStore {
    medium: Arc<dyn DurableMedium>,
    open: Mutex<HashMap<String, Arc<dyn Any + Send + Sync>>>,
    feed: Arc<watch::Sender<u64>>,
}

impl SlotStore {
    pub fn new(medium: Arc<dyn DurableMedium>) -> Self {
        let (feed, _) = watch::channel(0);
        Self {
            medium,
            open: Mutex::new(HashMap::new()),
            feed: Arc::new(feed),
        }
    }

    pub fn medium(&self) -> &Arc<dyn DurableMedium> {
        &self.medium
    }

    /// Open (or re-open) the slot stored under `key`.
    /// Fails only if `key` is already open with a different value type.
    pub fn slot<T, F>(&self, key: &str, default: F) -> Result<Slot<T>, VaultError>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        let mut open = self.open.lock();

        if let Some(existing) = open.get(key) {
            return Arc::clone(existing)
                .downcast::<SlotInner<T>>()
                .map(|inner| Slot { inner })
                .map_err(|_| VaultError::SlotType { key: key.to_string() });
        }

        let value = load_or_default(self.medium.as_ref(), key, default);
        let inner = Arc::new(SlotInner {
            key: key.to_string(),
            value: RwLock::new(value),
            revision: AtomicU64::new(0),
            medium: Arc::clone(&self.medium),
            feed: Arc::clone(&self.feed),
        });
        open.insert(key.to_string(), Arc::clone(&inner) as Arc<dyn Any + Send + Sync>);

        Ok(Slot { inner })
    }

    /// Change feed shared by every slot of this store
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.feed.subscribe()
    }
}
