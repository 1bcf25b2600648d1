//! Save to and open from the gallery through an injected bridge

use std::sync::Arc;

use placemark_store::Session;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::bridge::{GalleryBridge, GalleryFile, SaveMetadata};
use crate::codec::{FeatureCodec, FeatureCollectionCodec};
use crate::error::{GalleryError, GalleryResult};
use crate::import::{ImportOptions, ImportOutcome, Importer};

/// Title used when saving without one
pub const DEFAULT_SAVE_TITLE: &str = "untitled.geojson";

/// Moment note for a gallery file that carries no title
pub const GALLERY_IMPORT_NOTE: &str = "Imported from gallery";

/// Gallery flows bound to one session
pub struct GalleryService {
    session: Arc<Session>,
    bridge: Option<Arc<dyn GalleryBridge>>,
    codec: Arc<dyn FeatureCodec>,
}

impl GalleryService {
    /// Service without a bridge; every gallery call reports [`GalleryError::Unavailable`]
    pub fn new(session: Arc<Session>) -> Self {
        GalleryService {
            session,
            bridge: None,
            codec: Arc::new(FeatureCollectionCodec),
        }
    }

    pub fn with_bridge(mut self, bridge: Arc<dyn GalleryBridge>) -> Self {
        self.bridge = Some(bridge);
        self
    }

    pub fn with_codec(mut self, codec: Arc<dyn FeatureCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn is_available(&self) -> bool {
        self.bridge.is_some()
    }

    /// Whether save and open can go ahead right now
    pub fn is_signed_in(&self) -> bool {
        self.bridge
            .as_ref()
            .map(|bridge| bridge.is_authenticated())
            .unwrap_or(false)
    }

    fn signed_in_bridge(&self) -> GalleryResult<&Arc<dyn GalleryBridge>> {
        let bridge = self.bridge.as_ref().ok_or(GalleryError::Unavailable)?;
        if !bridge.is_authenticated() {
            return Err(GalleryError::NotSignedIn);
        }
        Ok(bridge)
    }

    /// Upload every feature of the document, returning the gallery id
    pub async fn save_current(&self, title: Option<&str>) -> GalleryResult<String> {
        let bridge = self.signed_in_bridge()?;

        let features = self.session.read_all();
        let document = self.codec.encode(&features)?;
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_SAVE_TITLE);

        let id = bridge
            .save(document, title, SaveMetadata::for_features(features.len()))
            .await
            .map_err(|e| {
                warn!(title, error = %e, "Gallery save failed");
                e
            })?;

        info!(title, gallery_id = %id, features = features.len(), "Saved to gallery");
        Ok(id)
    }

    /// Open the picker and load the first selected file, replacing the document
    ///
    /// Returns [`GalleryError::Cancelled`] when the bridge reports a dismissal
    /// or drops the handler without a selection.
    pub async fn open_from_gallery(&self) -> GalleryResult<ImportOutcome> {
        let bridge = self.signed_in_bridge()?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        bridge.set_file_selected_handler(Box::new(move |file: Option<GalleryFile>| {
            // Only the first outcome is awaited
            let _ = tx.send(file);
        }));
        bridge.open_picker()?;

        let file = rx.recv().await.flatten().ok_or_else(|| {
            debug!("Gallery picker closed without a selection");
            GalleryError::Cancelled
        })?;
        debug!(title = ?file.title, "Gallery file selected");
        self.load_selection(file).await
    }

    /// Decode a picked file and load it as one replacing moment
    pub async fn load_selection(&self, file: GalleryFile) -> GalleryResult<ImportOutcome> {
        let features = self.codec.decode(&file.document)?;
        let note = file
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| GALLERY_IMPORT_NOTE.to_string());

        Importer::import(&self.session, features, ImportOptions::replace(note)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::FileSelectedHandler;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use placemark_store::{Feature, Geometry, SessionConfig, TransactRequest};
    use serde_json::{json, Value};
    use tokio_test::{assert_err, assert_ok};

    enum Pick {
        Select(GalleryFile),
        /// Close the picker and report the dismissal
        Dismiss,
        /// Close the picker and drop the handler
        Cancel,
    }

    struct MockBridge {
        authenticated: bool,
        pick: Mutex<Option<Pick>>,
        handler: Mutex<Option<FileSelectedHandler>>,
        saved: Mutex<Vec<(Value, String, SaveMetadata)>>,
    }

    impl MockBridge {
        fn new(authenticated: bool, pick: Pick) -> Self {
            MockBridge {
                authenticated,
                pick: Mutex::new(Some(pick)),
                handler: Mutex::new(None),
                saved: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl GalleryBridge for MockBridge {
        async fn save(&self, document: Value, title: &str, metadata: SaveMetadata) -> GalleryResult<String> {
            let mut saved = self.saved.lock();
            saved.push((document, title.to_string(), metadata));
            Ok(format!("gallery-{}", saved.len()))
        }

        fn open_picker(&self) -> GalleryResult<()> {
            let handler = self.handler.lock().take();
            match (self.pick.lock().take(), handler) {
                (Some(Pick::Select(file)), Some(handler)) => handler(Some(file)),
                (Some(Pick::Dismiss), Some(handler)) => {
                    handler(None);
                    // Keep the handler registered, as a long-lived picker would
                    *self.handler.lock() = Some(handler);
                }
                // Dropping the handler closes the selection channel
                (Some(Pick::Cancel), _) => {}
                _ => return Err(GalleryError::bridge_error("picker already used")),
            }
            Ok(())
        }

        fn is_authenticated(&self) -> bool {
            self.authenticated
        }

        fn set_file_selected_handler(&self, handler: FileSelectedHandler) {
            *self.handler.lock() = Some(handler);
        }
    }

    async fn session_with_points() -> Arc<Session> {
        let session = Arc::new(Session::new(SessionConfig::default()).unwrap());
        session
            .transact(TransactRequest::new("Draw").create([
                Feature::new("a", Geometry::point(0.0, 0.0)),
                Feature::new("b", Geometry::point(1.0, 1.0)),
            ]))
            .await
            .unwrap();
        session
    }

    fn picked(title: Option<&str>) -> GalleryFile {
        GalleryFile {
            document: json!({
                "type": "FeatureCollection",
                "features": [
                    { "type": "Feature", "id": "x", "geometry": { "type": "Point", "coordinates": [5.0, 6.0] }, "properties": {} }
                ]
            }),
            title: title.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_save_requires_bridge_and_sign_in() {
        let session = session_with_points().await;

        let without_bridge = GalleryService::new(session.clone());
        assert!(matches!(
            without_bridge.save_current(None).await,
            Err(GalleryError::Unavailable)
        ));

        let signed_out = GalleryService::new(session)
            .with_bridge(Arc::new(MockBridge::new(false, Pick::Cancel)));
        assert!(matches!(
            signed_out.save_current(None).await,
            Err(GalleryError::NotSignedIn)
        ));
    }

    #[tokio::test]
    async fn test_save_sends_document_and_metadata() {
        let session = session_with_points().await;
        let bridge = Arc::new(MockBridge::new(true, Pick::Cancel));
        let service = GalleryService::new(session).with_bridge(bridge.clone());

        let id = assert_ok!(service.save_current(Some("  ")).await);
        assert_eq!(id, "gallery-1");

        let saved = bridge.saved.lock();
        let (document, title, metadata) = &saved[0];
        assert_eq!(title, DEFAULT_SAVE_TITLE);
        assert_eq!(metadata, &SaveMetadata::for_features(2));
        assert_eq!(document["type"], json!("FeatureCollection"));
        assert_eq!(document["features"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_open_replaces_document_in_one_moment() {
        let session = session_with_points().await;
        let bridge = Arc::new(MockBridge::new(true, Pick::Select(picked(Some("parks.geojson")))));
        let service = GalleryService::new(session.clone()).with_bridge(bridge);

        let outcome = assert_ok!(service.open_from_gallery().await);
        assert_eq!(outcome.moment.note, "parks.geojson");
        let extent = outcome.extent.unwrap();
        assert_eq!((extent.min_lng, extent.min_lat), (5.0, 6.0));

        assert_eq!(session.feature_count(), 1);
        assert_eq!(session.observe_moment_log().undo_notes(), vec!["Draw", "parks.geojson"]);

        session.undo().await.unwrap();
        assert_eq!(session.feature_count(), 2);
    }

    #[tokio::test]
    async fn test_open_cancelled_leaves_document_alone() {
        let session = session_with_points().await;
        let service = GalleryService::new(session.clone())
            .with_bridge(Arc::new(MockBridge::new(true, Pick::Cancel)));

        let err = assert_err!(service.open_from_gallery().await);
        assert!(matches!(err, GalleryError::Cancelled));
        assert_eq!(session.observe_moment_log().undo_notes(), vec!["Draw"]);
    }

    #[tokio::test]
    async fn test_open_dismissed_while_handler_kept() {
        let session = session_with_points().await;
        let bridge = Arc::new(MockBridge::new(true, Pick::Dismiss));
        let service = GalleryService::new(session.clone()).with_bridge(bridge.clone());

        let err = assert_err!(service.open_from_gallery().await);
        assert!(matches!(err, GalleryError::Cancelled));
        assert!(bridge.handler.lock().is_some());
        assert_eq!(session.feature_count(), 2);
        assert_eq!(session.observe_moment_log().undo_notes(), vec!["Draw"]);
    }

    #[tokio::test]
    async fn test_untitled_selection_uses_default_note() {
        let session = session_with_points().await;
        let service = GalleryService::new(session.clone());

        let outcome = service.load_selection(picked(None)).await.unwrap();
        assert_eq!(outcome.moment.note, GALLERY_IMPORT_NOTE);
    }
}
