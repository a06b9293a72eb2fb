//! Content Vault Core - capture, classify and keep pasted content
//!
//! Paste events are classified into text, link, article or image items and
//! prepended to a collection that survives restarts. A search query narrows
//! the visible items by plain substring containment.
//!
//! Everything durable lives in slots over one medium (SQLite by default).

pub mod capture;
pub mod config;
pub mod content_detection;
pub mod database;
mod ingest;
pub mod interface;
mod listener;
pub mod models;
pub mod search;
pub mod slot;
mod store;

pub use capture::{Attachment, AttachmentSource, CaptureEvent, Representation};
pub use config::VaultConfig;
pub use ingest::{encode_data_uri, CaptureTask};
pub use interface::*;
pub use listener::{CaptureSubscription, PasteBus};
pub use models::ContentItem;
pub use store::{ContentVault, DARK_MODE_KEY, ITEMS_KEY, LAYOUT_KEY, QUERY_KEY};
