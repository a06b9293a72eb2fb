//! ContentVault - the single owner of vault state
//!
//! Holds the item collection, the search query and the preferences as durable
//! slots over one medium, and exposes them through `ContentVaultApi`.
//!
//! Concurrency Model:
//! - Every slot is behind its own RwLock; mutations are closures applied under
//!   the write lock, so same-tick updates never race on a stale copy
//! - Image captures encode on the tokio runtime and append on completion
//! - Uses a shared fallback runtime when called outside any runtime
//! - Opening a database file that is already open in this process returns a
//!   handle to the same vault, so every handle sees every write
//! - A vault has at most one capture listener; listening again replaces it

use crate::capture::CaptureEvent;
use crate::config::VaultConfig;
use crate::database::SlotDatabase;
use crate::ingest::{CaptureTask, Pipeline};
use crate::interface::{ContentVaultApi, Layout, Preferences, VaultError};
use crate::listener::{self, CaptureSubscription, PasteBus};
use crate::models::ContentItem;
use crate::search::VisibleItems;
use crate::slot::{DurableMedium, Slot, SlotStore};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// Durable key of the item collection
pub const ITEMS_KEY: &str = "content-vault-items";
/// Durable key of the search query
pub const QUERY_KEY: &str = "content-vault-search";
/// Durable key of the theme flag
pub const DARK_MODE_KEY: &str = "dark-mode";
/// Durable key of the layout mode
pub const LAYOUT_KEY: &str = "grid-layout";

/// Vaults open on a database file, keyed by canonical path
static OPEN_VAULTS: Lazy<Mutex<HashMap<PathBuf, Weak<VaultInner>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

struct VaultInner {
    slots: SlotStore,
    items: Slot<Vec<ContentItem>>,
    query: Slot<String>,
    dark_mode: Slot<bool>,
    layout: Slot<Layout>,
    pipeline: Pipeline,
    visible: VisibleItems,
    listener: Mutex<Option<CancellationToken>>,
}

impl Drop for VaultInner {
    fn drop(&mut self) {
        // A listener must not outlive the vault it appends to
        if let Some(token) = self.listener.get_mut().take() {
            token.cancel();
        }
    }
}

/// Handle to a vault. Clones, and opens of the same database file, share state.
#[derive(Clone)]
pub struct ContentVault {
    inner: Arc<VaultInner>,
}

impl ContentVault {
    /// Open the vault described by `config`
    pub fn open(config: &VaultConfig) -> Result<Self, VaultError> {
        Self::open_path(&config.db_path)
    }

    /// Open or create a vault database at the given path.
    /// If the file is already open in this process, the existing vault is returned.
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, VaultError> {
        let path = path.as_ref();
        let mut open = OPEN_VAULTS.lock();

        if let Ok(key) = path.canonicalize() {
            if let Some(inner) = open.get(&key).and_then(Weak::upgrade) {
                debug!(path = %key.display(), "sharing already open vault");
                return Ok(Self { inner });
            }
        }

        let db = SlotDatabase::open(path)?;
        let key = path.canonicalize()?;
        let vault = Self::with_medium(Arc::new(db))?;

        open.retain(|_, existing| existing.strong_count() > 0);
        open.insert(key, Arc::downgrade(&vault.inner));
        Ok(vault)
    }

    /// Vault backed by an in-memory database; nothing survives the process
    pub fn new_in_memory() -> Result<Self, VaultError> {
        let db = SlotDatabase::open_in_memory()?;
        Self::with_medium(Arc::new(db))
    }

    /// Vault over any durable medium. Slot values that are missing or
    /// malformed load as their defaults.
    pub fn with_medium(medium: Arc<dyn DurableMedium>) -> Result<Self, VaultError> {
        let slots = SlotStore::new(medium);
        let defaults = Preferences::default();

        let items: Slot<Vec<ContentItem>> = slots.slot(ITEMS_KEY, Vec::new)?;
        let query: Slot<String> = slots.slot(QUERY_KEY, String::new)?;
        let dark_mode: Slot<bool> = slots.slot(DARK_MODE_KEY, || defaults.dark_mode)?;
        let layout: Slot<Layout> = slots.slot(LAYOUT_KEY, || defaults.layout)?;

        debug!(items = items.read(|v| v.len()), "vault opened");

        Ok(Self {
            inner: Arc::new(VaultInner {
                pipeline: Pipeline::new(items.clone()),
                slots,
                items,
                query,
                dark_mode,
                layout,
                visible: VisibleItems::default(),
                listener: Mutex::new(None),
            }),
        })
    }

    /// Attach to the paste bus. Dropping (or detaching) the subscription
    /// stops listening. A vault listens at most once: attaching again
    /// detaches the previous subscription first.
    pub fn listen(&self, bus: &PasteBus) -> CaptureSubscription {
        let mut active = self.inner.listener.lock();
        if let Some(previous) = active.take() {
            if !previous.is_cancelled() {
                debug!("replacing existing capture listener");
                previous.cancel();
            }
        }
        let subscription = listener::attach(self.inner.pipeline.clone(), bus);
        *active = Some(subscription.cancel_token());
        subscription
    }

    /// True while a capture listener is attached
    pub fn is_listening(&self) -> bool {
        self.inner
            .listener
            .lock()
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    /// Look up one item by id
    pub fn get(&self, id: Uuid) -> Option<ContentItem> {
        self.inner
            .items
            .read(|items| items.iter().find(|item| item.id() == id).cloned())
    }

    /// Number of stored items, ignoring the query
    pub fn len(&self) -> usize {
        self.inner.items.read(|items| items.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of the durable storage in bytes, when the medium reports it
    pub fn storage_size(&self) -> Option<i64> {
        self.inner.slots.medium().size_bytes()
    }
}

#[async_trait::async_trait]
impl ContentVaultApi for ContentVault {
    // ─────────────────────────────────────────────────────────────────────────────
    // Read Operations
    // ─────────────────────────────────────────────────────────────────────────────

    fn items(&self) -> Arc<[ContentItem]> {
        self.inner.visible.get(&self.inner.items, &self.inner.query)
    }

    fn all_items(&self) -> Vec<ContentItem> {
        self.inner.items.get()
    }

    fn query(&self) -> String {
        self.inner.query.get()
    }

    fn preferences(&self) -> Preferences {
        Preferences {
            dark_mode: self.inner.dark_mode.get(),
            layout: self.inner.layout.get(),
        }
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.slots.subscribe()
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Write Operations
    // ─────────────────────────────────────────────────────────────────────────────

    fn add_from_capture(&self, event: CaptureEvent) -> CaptureTask {
        self.inner.pipeline.ingest(event)
    }

    fn set_query(&self, query: String) {
        self.inner.query.update(move |current| {
            if *current == query {
                return false;
            }
            *current = query;
            true
        });
    }

    fn set_dark_mode(&self, enabled: bool) {
        self.inner.dark_mode.set(enabled);
    }

    fn set_layout(&self, layout: Layout) {
        self.inner.layout.set(layout);
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Delete Operations
    // ─────────────────────────────────────────────────────────────────────────────

    fn remove(&self, id: Uuid) -> bool {
        let removed = self.inner.items.update(|items| {
            let before = items.len();
            items.retain(|item| item.id() != id);
            items.len() != before
        });
        if removed {
            debug!(%id, "removed item");
        }
        removed
    }

    fn clear_all(&self) {
        let cleared = self.inner.items.update(|items| {
            if items.is_empty() {
                return false;
            }
            items.clear();
            true
        });
        self.inner.query.update(|query| {
            if query.is_empty() {
                return false;
            }
            query.clear();
            true
        });
        if cleared {
            debug!("cleared all items");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{Attachment, MIME_PNG};
    use crate::interface::{ContentType, IngestOutcome};
    use crate::slot::MemoryMedium;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    fn contents(vault: &ContentVault) -> Vec<String> {
        vault.items().iter().map(|i| i.content().to_string()).collect()
    }

    #[test]
    fn test_store_creation() {
        let vault = ContentVault::new_in_memory().unwrap();
        assert!(vault.is_empty());
        assert_eq!(vault.query(), "");
        assert_eq!(vault.preferences(), Preferences::default());
        assert!(vault.storage_size().unwrap() > 0);
    }

    #[test]
    fn test_capture_scenarios() {
        let rt = runtime();
        let vault = ContentVault::new_in_memory().unwrap();

        let article = rt.block_on(vault.ingest(CaptureEvent::html("<b>hi</b>")));
        let link = rt.block_on(vault.ingest(CaptureEvent::uri_list("https://x.test")));
        let text = rt.block_on(vault.ingest(CaptureEvent::text("hello")));

        let types: Vec<ContentType> = vault.all_items().iter().map(|i| i.content_type()).collect();
        assert_eq!(types, vec![ContentType::Text, ContentType::Link, ContentType::Article]);

        assert_eq!(vault.get(article.added_id().unwrap()).unwrap().content(), "<b>hi</b>");
        assert_eq!(vault.get(link.added_id().unwrap()).unwrap().content(), "https://x.test");
        assert_eq!(vault.get(text.added_id().unwrap()).unwrap().content(), "hello");
    }

    #[test]
    fn test_query_filters_visible_items() {
        let rt = runtime();
        let vault = ContentVault::new_in_memory().unwrap();
        rt.block_on(vault.ingest(CaptureEvent::text("hello")));

        vault.set_query("ell".to_string());
        assert_eq!(contents(&vault), vec!["hello"]);

        vault.set_query("zzz".to_string());
        assert!(vault.items().is_empty());
        // The collection itself is untouched
        assert_eq!(vault.len(), 1);
    }

    #[test]
    fn test_remove_twice_is_noop() {
        let rt = runtime();
        let vault = ContentVault::new_in_memory().unwrap();
        let keep = rt.block_on(vault.ingest(CaptureEvent::text("keep"))).added_id().unwrap();
        let gone = rt.block_on(vault.ingest(CaptureEvent::text("gone"))).added_id().unwrap();

        assert!(vault.remove(gone));
        assert_eq!(vault.len(), 1);
        assert!(!vault.remove(gone));
        assert_eq!(vault.len(), 1);
        assert!(vault.get(keep).is_some());
    }

    #[test]
    fn test_remove_unknown_id() {
        let vault = ContentVault::new_in_memory().unwrap();
        assert!(!vault.remove(Uuid::new_v4()));
    }

    #[test]
    fn test_clear_all_resets_query() {
        let rt = runtime();
        let vault = ContentVault::new_in_memory().unwrap();
        rt.block_on(vault.ingest(CaptureEvent::text("one")));
        rt.block_on(vault.ingest(CaptureEvent::text("two")));
        vault.set_query("one".to_string());

        vault.clear_all();
        assert!(vault.is_empty());
        assert_eq!(vault.query(), "");
        assert!(vault.items().is_empty());
    }

    #[test]
    fn test_clear_empty_vault_is_noop() {
        let vault = ContentVault::new_in_memory().unwrap();
        let feed = vault.subscribe();
        vault.clear_all();
        assert!(vault.is_empty());
        assert_eq!(*feed.borrow(), 0);
    }

    #[test]
    fn test_preferences_roundtrip() {
        let vault = ContentVault::new_in_memory().unwrap();
        vault.set_dark_mode(false);
        vault.set_layout(Layout::List);
        assert_eq!(
            vault.preferences(),
            Preferences { dark_mode: false, layout: Layout::List }
        );
    }

    #[test]
    fn test_subscribe_sees_changes() {
        let rt = runtime();
        let vault = ContentVault::new_in_memory().unwrap();
        let mut feed = vault.subscribe();

        rt.block_on(vault.ingest(CaptureEvent::text("hello")));
        assert!(feed.has_changed().unwrap());
        feed.mark_unchanged();

        vault.set_query("hello".to_string());
        assert!(feed.has_changed().unwrap());
        feed.mark_unchanged();

        // Same query again is not a change
        vault.set_query("hello".to_string());
        assert!(!feed.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_image_capture_does_not_block_other_operations() {
        let vault = ContentVault::new_in_memory().unwrap();
        let existing = vault.ingest(CaptureEvent::text("existing")).await.added_id().unwrap();

        let image = vault.add_from_capture(
            CaptureEvent::new().with_file(Attachment::from_bytes(MIME_PNG, vec![1u8, 2, 3])),
        );
        // Other events proceed while the encode is pending
        vault.set_query("exist".to_string());
        assert!(vault.remove(existing));
        vault.ingest(CaptureEvent::text("later text")).await;

        let outcome = image.await;
        assert!(matches!(outcome, IngestOutcome::Added { content_type: ContentType::Image, .. }));
        vault.set_query(String::new());
        assert_eq!(vault.len(), 2);
        assert_eq!(vault.all_items()[1].content(), "later text");
    }

    #[test]
    fn test_swallowed_persist_failure() {
        let rt = runtime();
        let medium = Arc::new(MemoryMedium::new());
        let vault = ContentVault::with_medium(medium.clone()).unwrap();

        medium.set_full(true);
        let outcome = rt.block_on(vault.ingest(CaptureEvent::text("in memory only")));
        assert!(outcome.is_added());
        assert_eq!(vault.len(), 1);
        assert_eq!(medium.raw(ITEMS_KEY), None);
    }

    #[test]
    fn test_malformed_slots_degrade_to_defaults() {
        let medium = Arc::new(MemoryMedium::new());
        medium.insert_raw(ITEMS_KEY, r#"[{"id":"nope","type":"video"}]"#);
        medium.insert_raw(QUERY_KEY, "42");
        medium.insert_raw(DARK_MODE_KEY, "\"yes\"");
        medium.insert_raw(LAYOUT_KEY, "\"masonry\"");

        let vault = ContentVault::with_medium(medium).unwrap();
        assert!(vault.is_empty());
        assert_eq!(vault.query(), "");
        assert_eq!(vault.preferences(), Preferences::default());
    }

    #[test]
    fn test_reopen_same_medium() {
        let rt = runtime();
        let medium = Arc::new(MemoryMedium::new());
        let first = ContentVault::with_medium(medium.clone()).unwrap();
        rt.block_on(first.ingest(CaptureEvent::text("persisted")));
        first.set_query("pers".to_string());
        first.set_layout(Layout::List);
        let saved = first.all_items();
        drop(first);

        let second = ContentVault::with_medium(medium).unwrap();
        assert_eq!(second.all_items(), saved);
        assert_eq!(second.query(), "pers");
        assert_eq!(second.preferences().layout, Layout::List);
    }

    #[test]
    fn test_clones_share_state() {
        let a = ContentVault::new_in_memory().unwrap();
        let b = a.clone();
        b.set_query("shared".to_string());
        assert_eq!(a.query(), "shared");
    }

    #[tokio::test]
    async fn test_listen_again_replaces_listener() {
        let bus = PasteBus::default();
        let vault = ContentVault::new_in_memory().unwrap();

        let first = vault.listen(&bus);
        let second = vault.listen(&bus);
        assert!(!first.is_attached());
        assert!(second.is_attached());
        assert!(vault.is_listening());

        first.detach().await;
        assert_eq!(bus.listener_count(), 1);

        second.detach().await;
        assert!(!vault.is_listening());
        assert_eq!(bus.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_dropping_vault_detaches_listener() {
        let bus = PasteBus::default();
        let vault = ContentVault::new_in_memory().unwrap();
        let subscription = vault.listen(&bus);

        drop(vault);
        assert!(!subscription.is_attached());
        subscription.detach().await;
        assert_eq!(bus.listener_count(), 0);
    }
}
