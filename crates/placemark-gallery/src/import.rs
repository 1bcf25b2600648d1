//! Import pipeline: brings external features into the session as one moment

use std::collections::HashSet;

use placemark_store::{Extent, Feature, FeatureId, Moment, Operation, Session};
use tracing::{debug, info};

use crate::error::{GalleryError, GalleryResult};

/// Note used when the caller does not name the import
pub const DEFAULT_IMPORT_NOTE: &str = "Import";

/// How an import lands in the document
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Moment note
    pub note: String,
    /// Delete every existing feature first, in the same moment
    pub replace: bool,
}

impl ImportOptions {
    pub fn append(note: impl Into<String>) -> Self {
        ImportOptions {
            note: note.into(),
            replace: false,
        }
    }

    pub fn replace(note: impl Into<String>) -> Self {
        ImportOptions {
            note: note.into(),
            replace: true,
        }
    }
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self::append(DEFAULT_IMPORT_NOTE)
    }
}

/// Result of a successful import
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    /// The recorded moment; undoing it removes the import
    pub moment: Moment,
    /// Bounding box of the imported features, for fitting the view
    pub extent: Option<Extent>,
}

/// Turns decoded features into a single session transaction
pub struct Importer;

impl Importer {
    pub async fn import(
        session: &Session,
        features: Vec<Feature>,
        options: ImportOptions,
    ) -> GalleryResult<ImportOutcome> {
        if features.is_empty() {
            return Err(GalleryError::EmptyImport);
        }

        let extent = Extent::of(&features);
        let count = features.len();
        let replace = options.replace;

        let moment = session
            .transact_with(options.note, move |store| {
                let mut ops = Vec::with_capacity(count + if replace { store.len() } else { 0 });
                let mut taken: HashSet<FeatureId> = HashSet::new();

                if replace {
                    ops.extend(store.ids().into_iter().map(Operation::delete));
                } else {
                    taken.extend(store.ids());
                }

                for mut feature in features {
                    if !taken.insert(feature.id.clone()) {
                        let fresh = FeatureId::new();
                        debug!(from = %feature.id, to = %fresh, "Re-keyed colliding import");
                        feature.id = fresh.clone();
                        taken.insert(fresh);
                    }
                    ops.push(Operation::create(feature));
                }
                ops
            })
            .await?
            .ok_or(GalleryError::EmptyImport)?;

        info!(note = %moment.note, features = count, replace, "Import applied");
        Ok(ImportOutcome { moment, extent })
    }
}
