//! Core data model for Content Vault

use crate::interface::ContentType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One captured unit. Fields are private so an item cannot change once built;
/// the store only ever prepends or removes whole items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    id: Uuid,
    #[serde(rename = "type")]
    content_type: ContentType,
    content: String,
    tags: Vec<String>,
    created_at: DateTime<Utc>,
}

impl ContentItem {
    /// Build a fresh item with a new id and the current time
    pub fn new(content_type: ContentType, content: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            content_type,
            content,
            tags: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn new_text(text: String) -> Self {
        Self::new(ContentType::Text, text)
    }

    pub fn new_link(uri_list: String) -> Self {
        Self::new(ContentType::Link, uri_list)
    }

    pub fn new_article(html: String) -> Self {
        Self::new(ContentType::Article, html)
    }

    /// Image item from an already-encoded `data:` URI
    pub fn new_image(data_uri: String) -> Self {
        Self::new(ContentType::Image, data_uri)
    }

    #[cfg(test)]
    pub(crate) fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Case-insensitive substring match against content, tags and type name.
    /// `needle` must already be lower-cased.
    pub fn matches_query(&self, needle: &str) -> bool {
        self.content.to_lowercase().contains(needle)
            || self.tags.iter().any(|tag| tag.to_lowercase().contains(needle))
            || self.content_type.as_str().contains(needle)
    }

    /// Single-line preview, whitespace collapsed, at most `max_chars` chars
    pub fn preview(&self, max_chars: usize) -> String {
        if self.content_type == ContentType::Image {
            return format!("[image, {} bytes encoded]", self.content.len());
        }
        let collapsed = self.content.split_whitespace().collect::<Vec<_>>().join(" ");
        collapsed.chars().take(max_chars).collect()
    }
}
