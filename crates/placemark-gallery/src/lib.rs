//! Import pipeline and gallery bridge for the placemark editor
//!
//! Everything here goes through the public [`placemark_store::Session`] API:
//! an import or a gallery open is one transaction, so a single undo removes
//! it.

pub mod bridge;
pub mod codec;
pub mod error;
pub mod import;
pub mod service;

pub use bridge::{FileSelectedHandler, GalleryBridge, GalleryFile, SaveMetadata, SAVE_SOURCE};
pub use codec::{FeatureCodec, FeatureCollectionCodec};
pub use error::{GalleryError, GalleryResult};
pub use import::{ImportOptions, ImportOutcome, Importer, DEFAULT_IMPORT_NOTE};
pub use service::{GalleryService, DEFAULT_SAVE_TITLE, GALLERY_IMPORT_NOTE};
