//! Conversion between store features and exchanged documents

use placemark_store::{Feature, FeatureId, Geometry, Properties};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GalleryError, GalleryResult};

/// Encodes features into an exchange document and back
pub trait FeatureCodec: Send + Sync {
    fn encode(&self, features: &[Feature]) -> GalleryResult<Value>;

    fn decode(&self, document: &Value) -> GalleryResult<Vec<Feature>>;
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum Document {
    FeatureCollection { features: Vec<Member> },
    Feature(GeoJsonFeature),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum Member {
    Feature(GeoJsonFeature),
}

#[derive(Debug, Serialize, Deserialize)]
struct GeoJsonFeature {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<Value>,
    // Always written, as `null` when absent
    #[serde(default)]
    geometry: Option<Geometry>,
    #[serde(default)]
    properties: Option<Properties>,
}

/// GeoJSON `FeatureCollection` codec
///
/// Decoding also accepts a bare `Feature`. String and numeric ids are kept;
/// features without one are given a fresh id.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureCollectionCodec;

impl FeatureCollectionCodec {
    pub fn new() -> Self {
        Self
    }
}

impl FeatureCodec for FeatureCollectionCodec {
    fn encode(&self, features: &[Feature]) -> GalleryResult<Value> {
        let document = Document::FeatureCollection {
            features: features
                .iter()
                .map(|feature| {
                    Member::Feature(GeoJsonFeature {
                        id: Some(Value::String(feature.id.as_str().to_string())),
                        geometry: feature.geometry.clone(),
                        properties: Some(feature.properties.clone()),
                    })
                })
                .collect(),
        };
        serde_json::to_value(document).map_err(|e| GalleryError::codec_error(e.to_string()))
    }

    fn decode(&self, document: &Value) -> GalleryResult<Vec<Feature>> {
        let document = Document::deserialize(document)
            .map_err(|e| GalleryError::codec_error(e.to_string()))?;

        let raw: Vec<GeoJsonFeature> = match document {
            Document::FeatureCollection { features } => features
                .into_iter()
                .map(|Member::Feature(feature)| feature)
                .collect(),
            Document::Feature(feature) => vec![feature],
        };
        raw.into_iter().map(into_feature).collect()
    }
}

fn into_feature(raw: GeoJsonFeature) -> GalleryResult<Feature> {
    let id = match raw.id {
        None | Some(Value::Null) => FeatureId::new(),
        Some(Value::String(id)) => FeatureId::from(id),
        Some(Value::Number(n)) => FeatureId::from(n.to_string()),
        Some(other) => {
            return Err(GalleryError::codec_error(format!(
                "feature id must be a string or number, got {}",
                other
            )))
        }
    };

    Ok(Feature {
        id,
        geometry: raw.geometry,
        properties: raw.properties.unwrap_or_default(),
    })
}
