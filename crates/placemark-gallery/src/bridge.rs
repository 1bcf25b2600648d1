//! Capability interface for a remote document gallery

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GalleryResult;

/// Value of [`SaveMetadata::source`] for documents saved by this editor
pub const SAVE_SOURCE: &str = "placemark-play";

/// Metadata attached to a saved document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveMetadata {
    pub source: String,
    pub feature_count: usize,
}

impl SaveMetadata {
    pub fn for_features(feature_count: usize) -> Self {
        SaveMetadata {
            source: SAVE_SOURCE.to_string(),
            feature_count,
        }
    }
}

/// A document picked in the gallery
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryFile {
    pub document: Value,
    pub title: Option<String>,
}

/// Callback invoked when the picker closes
///
/// `Some` carries the picked file, `None` reports that the user dismissed
/// the picker without choosing one.
pub type FileSelectedHandler = Box<dyn Fn(Option<GalleryFile>) + Send + Sync>;

/// Remote gallery, injected into [`crate::GalleryService`]
#[async_trait]
pub trait GalleryBridge: Send + Sync {
    /// Upload a document, returning the gallery's identifier for it
    async fn save(&self, document: Value, title: &str, metadata: SaveMetadata) -> GalleryResult<String>;

    /// Show the gallery picker
    ///
    /// The outcome arrives through the file selected handler. A bridge must
    /// either call it once, with `None` on dismissal, or drop it; a picker
    /// that closes while the bridge keeps the handler silently leaves
    /// [`crate::GalleryService::open_from_gallery`] waiting.
    fn open_picker(&self) -> GalleryResult<()>;

    fn is_authenticated(&self) -> bool;

    /// Replace the handler called when the user picks a file
    fn set_file_selected_handler(&self, handler: FileSelectedHandler);
}
