//! Error types for import and gallery flows

use placemark_store::StoreError;
use thiserror::Error;

/// Result type for gallery operations
pub type GalleryResult<T> = Result<T, GalleryError>;

/// Errors that can occur while importing or exchanging documents with the gallery
#[derive(Debug, Error)]
pub enum GalleryError {
    /// No gallery bridge was injected into this service
    #[error("Gallery is not available")]
    Unavailable,

    /// The bridge reports no signed-in user
    #[error("Sign in to use the gallery")]
    NotSignedIn,

    /// The picker closed without a selection
    #[error("Gallery selection cancelled")]
    Cancelled,

    /// Nothing to import
    #[error("Import contains no features")]
    EmptyImport,

    /// Document could not be encoded or decoded
    #[error("Codec error: {0}")]
    Codec(String),

    /// The bridge reported a failure
    #[error("Gallery bridge error: {0}")]
    Bridge(String),

    /// The session rejected the resulting transaction
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl GalleryError {
    pub fn codec_error(msg: impl Into<String>) -> Self {
        Self::Codec(msg.into())
    }

    pub fn bridge_error(msg: impl Into<String>) -> Self {
        Self::Bridge(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_convert() {
        let err: GalleryError = StoreError::validation_error("empty batch").into();
        assert!(matches!(err, GalleryError::Store(_)));
        assert_eq!(err.to_string(), "Validation error: empty batch");
    }

    #[test]
    fn test_helper_constructors() {
        assert_eq!(
            GalleryError::bridge_error("upload failed").to_string(),
            "Gallery bridge error: upload failed"
        );
        assert!(matches!(GalleryError::codec_error("bad"), GalleryError::Codec(_)));
    }
}
