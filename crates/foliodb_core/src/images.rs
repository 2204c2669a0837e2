//! Image attachment loader.
//!
//! Resolves image attachments to shareable byte handles and caches them
//! per (document, attachment name), so repeated renders of the same image
//! never re-read the store.

use crate::change_feed::{ChangeEvent, ChangeKind};
use crate::document::DocumentId;
use crate::error::{StoreError, StoreResult};
use crate::store::Store;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Attachment name extensions treated as images.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp", "svg"];

/// Returns true when the attachment name carries an image extension.
///
/// The check is case-insensitive.
#[must_use]
pub fn is_image_name(name: &str) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// A loaded image: content type plus shared payload bytes.
///
/// Cloning a handle shares the underlying buffer.
#[derive(Debug, Clone)]
pub struct ImageHandle {
    content_type: String,
    data: Arc<Vec<u8>>,
}

impl ImageHandle {
    /// Returns the declared content type.
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Returns the image bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the payload size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true when the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Caching loader for image attachments.
pub struct ImageLoader {
    cache: RwLock<HashMap<(DocumentId, String), ImageHandle>>,
}

impl Default for ImageLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageLoader {
    /// Creates an empty loader.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Loads an image attachment, from cache when possible.
    ///
    /// A miss reads the attachment from the store; if that read races a
    /// concurrent write and fails, it is retried once before the error is
    /// propagated. Non-image names are rejected up front.
    pub fn load(&self, store: &Store, id: &DocumentId, name: &str) -> StoreResult<ImageHandle> {
        if !is_image_name(name) {
            return Err(StoreError::InvalidQuery(format!(
                "{name} is not an image attachment"
            )));
        }

        let key = (id.clone(), name.to_string());
        if let Some(handle) = self.cache.read().get(&key) {
            return Ok(handle.clone());
        }

        let attachment = match store.get_attachment(id, name) {
            Ok(attachment) => attachment,
            Err(StoreError::NotFound { .. } | StoreError::AttachmentNotFound { .. }) => {
                store.get_attachment(id, name)?
            }
            Err(err) => return Err(err),
        };

        let handle = ImageHandle {
            content_type: attachment.content_type,
            data: Arc::new(attachment.data.unwrap_or_default()),
        };
        self.cache.write().insert(key, handle.clone());
        Ok(handle)
    }

    /// Drops every cached image of one document.
    pub fn evict(&self, id: &DocumentId) {
        self.cache.write().retain(|(doc_id, _), _| doc_id != id);
    }

    /// Drops one cached image.
    pub fn evict_attachment(&self, id: &DocumentId, name: &str) {
        self.cache
            .write()
            .remove(&(id.clone(), name.to_string()));
    }

    /// Keeps the cache consistent with a committed change.
    ///
    /// Updates evict too, since an attachment may have been replaced under
    /// the same name.
    pub fn apply(&self, event: &ChangeEvent) {
        match event.kind {
            ChangeKind::Insert => {}
            ChangeKind::Update | ChangeKind::Delete => self.evict(&event.id),
        }
    }

    /// Drops everything.
    pub fn clear(&self) {
        self.cache.write().clear();
    }

    /// Returns the number of cached images.
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    /// Returns true when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }
}
