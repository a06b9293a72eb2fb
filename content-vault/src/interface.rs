//! Content Vault Interface Definition
//!
//! This file defines the surface the presentation layer talks to.
//! It acts as the source of truth for shared types.

use crate::capture::CaptureEvent;
use crate::ingest::CaptureTask;
use crate::models::ContentItem;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

// ═══════════════════════════════════════════════════════════════════════════════
// ENUMS
// ═══════════════════════════════════════════════════════════════════════════════

/// Category assigned to a captured payload. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Link,
    Article,
    Image,
}

impl ContentType {
    pub const ALL: [ContentType; 4] = [
        ContentType::Text,
        ContentType::Link,
        ContentType::Article,
        ContentType::Image,
    ];

    /// Lower-case name, as persisted and as matched by search
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Link => "link",
            ContentType::Article => "article",
            ContentType::Image => "image",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the presentation layer arranges items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    #[default]
    Grid,
    List,
}

impl Layout {
    pub fn as_str(&self) -> &'static str {
        match self {
            Layout::Grid => "grid",
            Layout::List => "list",
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Layout {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "grid" => Ok(Layout::Grid),
            "list" => Ok(Layout::List),
            other => Err(VaultError::InvalidInput(format!("unknown layout `{}`", other))),
        }
    }
}

/// Result of ingesting one capture event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// A new item was prepended to the collection
    Added { id: Uuid, content_type: ContentType },
    /// Nothing usable in the event; no side effect happened
    Empty,
    /// The image attachment could not be read; nothing was appended
    Failed { error: VaultError },
}

impl IngestOutcome {
    /// ID of the added item, if any
    pub fn added_id(&self) -> Option<Uuid> {
        match self {
            IngestOutcome::Added { id, .. } => Some(*id),
            _ => None,
        }
    }

    pub fn is_added(&self) -> bool {
        matches!(self, IngestOutcome::Added { .. })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RECORDS (Structs)
// ═══════════════════════════════════════════════════════════════════════════════

/// User preferences persisted next to the collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preferences {
    pub dark_mode: bool,
    pub layout: Layout,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            dark_mode: true,
            layout: Layout::Grid,
        }
    }
}

/// Error type for Content Vault operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Slot `{key}` is already open with a different value type")]
    SlotType { key: String },
    #[error("Capture task aborted")]
    Aborted,
}

// ═══════════════════════════════════════════════════════════════════════════════
// SERVICE INTERFACE
// ═══════════════════════════════════════════════════════════════════════════════

/// Everything the presentation layer may do with a vault.
/// Operations never fail once the vault is open: they succeed, no-op, or
/// degrade to a safe default.
#[async_trait::async_trait]
pub trait ContentVaultApi: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────────
    // Read Operations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Items matching the current query, newest first
    fn items(&self) -> Arc<[ContentItem]>;

    /// Every stored item regardless of the query, newest first
    fn all_items(&self) -> Vec<ContentItem>;

    /// Current search query
    fn query(&self) -> String;

    fn preferences(&self) -> Preferences;

    /// Change feed: the value bumps on every change to items, query or preferences
    fn subscribe(&self) -> watch::Receiver<u64>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Write Operations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Classify a capture event and prepend the resulting item.
    /// Text, link and article captures are appended before this returns;
    /// image captures complete when the returned task does.
    fn add_from_capture(&self, event: CaptureEvent) -> CaptureTask;

    /// Capture and wait for the outcome
    async fn ingest(&self, event: CaptureEvent) -> IngestOutcome {
        self.add_from_capture(event).await
    }

    fn set_query(&self, query: String);

    fn set_dark_mode(&self, enabled: bool);

    fn set_layout(&self, layout: Layout);

    // ─────────────────────────────────────────────────────────────────────────────
    // Delete Operations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Remove one item. Returns false if no item has this id.
    fn remove(&self, id: Uuid) -> bool;

    /// Empty the collection and reset the query.
    /// Confirmation is the caller's job.
    fn clear_all(&self);
}

impl From<crate::database::DatabaseError> for VaultError {
    fn from(e: crate::database::DatabaseError) -> Self {
        VaultError::Database(e.to_string())
    }
}

impl From<std::io::Error> for VaultError {
    fn from(e: std::io::Error) -> Self {
        VaultError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(e: serde_json::Error) -> Self {
        VaultError::Serialization(e.to_string())
    }
}
