//! Content classification for capture events
//!
//! Environments offer the richest representation first, so the first present
//! kind wins: HTML, then URI list, then a PNG/JPEG attachment, then plain text.

use crate::capture::{Attachment, CaptureEvent, FORMAT_HTML, FORMAT_PLAIN, FORMAT_URI_LIST};
use crate::interface::ContentType;

/// Decision for one capture event, before any asynchronous work
#[derive(Debug, Clone)]
pub enum Classification {
    /// Content is available right away
    Ready { content_type: ContentType, content: String },
    /// Bytes must be read and encoded before an item can be built
    Image(Attachment),
    /// Nothing usable; the capture is a no-op
    Empty,
}

impl Classification {
    /// Type the resulting item will have, if any
    pub fn content_type(&self) -> Option<ContentType> {
        match self {
            Classification::Ready { content_type, .. } => Some(*content_type),
            Classification::Image(_) => Some(ContentType::Image),
            Classification::Empty => None,
        }
    }
}

/// Classify a capture event.
///
/// Presence of a representation selects the branch. A selected branch with an
/// empty payload yields `Empty` rather than falling through to a poorer one.
pub fn classify(event: &CaptureEvent) -> Classification {
    if let Some(html) = event.data(FORMAT_HTML) {
        return ready(ContentType::Article, html);
    }

    if let Some(uris) = event.data(FORMAT_URI_LIST) {
        return ready(ContentType::Link, uris);
    }

    if let Some(file) = event.files().iter().find(|f| f.is_supported_image()) {
        return Classification::Image(file.clone());
    }

    match event.data(FORMAT_PLAIN) {
        Some(text) => ready(ContentType::Text, text),
        None => Classification::Empty,
    }
}

fn ready(content_type: ContentType, content: &str) -> Classification {
    if content.is_empty() {
        Classification::Empty
    } else {
        Classification::Ready {
            content_type,
            content: content.to_string(),
        }
    }
}
