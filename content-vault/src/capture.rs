//! Capture events: what the environment hands us on paste
//!
//! An event carries any number of `(format, payload)` representations, richest
//! first as offered by the environment, plus attached files.

use crate::interface::VaultError;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const FORMAT_HTML: &str = "text/html";
pub const FORMAT_URI_LIST: &str = "text/uri-list";
pub const FORMAT_PLAIN: &str = "text/plain";

pub const MIME_PNG: &str = "image/png";
pub const MIME_JPEG: &str = "image/jpeg";

/// Mime used for attachments whose type could not be determined
const MIME_UNKNOWN: &str = "application/octet-stream";

/// One textual representation of the clipboard payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Representation {
    pub format: String,
    pub payload: String,
}

/// Where an attachment's bytes live
#[derive(Debug, Clone)]
pub enum AttachmentSource {
    Bytes(Arc<[u8]>),
    /// Read lazily when the attachment is ingested
    Path(PathBuf),
}

/// A binary file attached to a capture event
#[derive(Debug, Clone)]
pub struct Attachment {
    pub mime: String,
    pub source: AttachmentSource,
}

impl Attachment {
    pub fn from_bytes(mime: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            mime: mime.into(),
            source: AttachmentSource::Bytes(bytes.into()),
        }
    }

    pub fn from_path(mime: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            mime: mime.into(),
            source: AttachmentSource::Path(path.into()),
        }
    }

    /// Attachment for an image file, mime taken from the file extension
    pub fn from_image_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let mime = image::ImageFormat::from_path(path)
            .map(|format| format.to_mime_type())
            .unwrap_or(MIME_UNKNOWN);
        Self::from_path(mime, path)
    }

    /// PNG and JPEG are the only image kinds the pipeline accepts
    pub fn is_supported_image(&self) -> bool {
        let mime = self.mime.trim();
        mime.eq_ignore_ascii_case(MIME_PNG) || mime.eq_ignore_ascii_case(MIME_JPEG)
    }

    /// Load the attachment's bytes. Path sources are read without blocking.
    pub(crate) async fn read(&self) -> Result<Arc<[u8]>, VaultError> {
        match &self.source {
            AttachmentSource::Bytes(bytes) => Ok(Arc::clone(bytes)),
            AttachmentSource::Path(path) => Ok(tokio::fs::read(path).await?.into()),
        }
    }
}

/// A single paste event
#[derive(Debug, Clone, Default)]
pub struct CaptureEvent {
    representations: Vec<Representation>,
    files: Vec<Attachment>,
}

impl CaptureEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plain-text-only event
    pub fn text(text: impl Into<String>) -> Self {
        Self::new().with_data(FORMAT_PLAIN, text)
    }

    pub fn html(html: impl Into<String>) -> Self {
        Self::new().with_data(FORMAT_HTML, html)
    }

    pub fn uri_list(uris: impl Into<String>) -> Self {
        Self::new().with_data(FORMAT_URI_LIST, uris)
    }

    pub fn with_data(mut self, format: impl Into<String>, payload: impl Into<String>) -> Self {
        self.representations.push(Representation {
            format: format.into(),
            payload: payload.into(),
        });
        self
    }

    pub fn with_file(mut self, attachment: Attachment) -> Self {
        self.files.push(attachment);
        self
    }

    pub fn has_format(&self, format: &str) -> bool {
        self.data(format).is_some()
    }

    /// Payload of the first representation with this format (case-insensitive)
    pub fn data(&self, format: &str) -> Option<&str> {
        self.representations
            .iter()
            .find(|r| r.format.trim().eq_ignore_ascii_case(format))
            .map(|r| r.payload.as_str())
    }

    pub fn representations(&self) -> &[Representation] {
        &self.representations
    }

    pub fn files(&self) -> &[Attachment] {
        &self.files
    }

    /// True when the event carries nothing at all
    pub fn is_blank(&self) -> bool {
        self.representations.is_empty() && self.files.is_empty()
    }
}
