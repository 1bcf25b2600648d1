//! Feature records, geometry payloads and field-level patches

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Arbitrary feature properties keyed by name
pub type Properties = BTreeMap<String, Value>;

/// Stable unique identifier of a feature
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureId(String);

impl FeatureId {
    /// Generate a fresh random identifier
    pub fn new() -> Self {
        FeatureId(Uuid::new_v4().to_string())
    }

    /// Borrow the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for FeatureId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FeatureId {
    fn from(value: &str) -> Self {
        FeatureId(value.to_string())
    }
}

impl From<String> for FeatureId {
    fn from(value: String) -> Self {
        FeatureId(value)
    }
}

/// A position: longitude, latitude and an optional altitude
///
/// Serialized as a GeoJSON coordinate array. Elements past the altitude are
/// accepted and dropped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub lng: f64,
    pub lat: f64,
    pub alt: Option<f64>,
}

impl Position {
    pub fn new(lng: f64, lat: f64) -> Self {
        Position { lng, lat, alt: None }
    }

    pub fn with_alt(lng: f64, lat: f64, alt: f64) -> Self {
        Position {
            lng,
            lat,
            alt: Some(alt),
        }
    }
}

impl Serialize for Position {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.alt {
            Some(alt) => [self.lng, self.lat, alt].serialize(serializer),
            None => [self.lng, self.lat].serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Position {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let coords = Vec::<f64>::deserialize(deserializer)?;
        match coords.as_slice() {
            [lng, lat] => Ok(Position::new(*lng, *lat)),
            [lng, lat, alt, ..] => Ok(Position::with_alt(*lng, *lat, *alt)),
            _ => Err(de::Error::invalid_length(
                coords.len(),
                &"a position with at least two coordinates",
            )),
        }
    }
}

/// Geometry payload in GeoJSON shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Position },
    MultiPoint { coordinates: Vec<Position> },
    LineString { coordinates: Vec<Position> },
    MultiLineString { coordinates: Vec<Vec<Position>> },
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
    GeometryCollection { geometries: Vec<Geometry> },
}

impl Geometry {
    /// Point geometry at the given longitude/latitude
    pub fn point(lng: f64, lat: f64) -> Self {
        Geometry::Point {
            coordinates: Position::new(lng, lat),
        }
    }

    /// All positions of the geometry, flattened
    pub fn positions(&self) -> Vec<Position> {
        match self {
            Geometry::Point { coordinates } => vec![*coordinates],
            Geometry::MultiPoint { coordinates } | Geometry::LineString { coordinates } => {
                coordinates.clone()
            }
            Geometry::MultiLineString { coordinates } | Geometry::Polygon { coordinates } => {
                coordinates.iter().flatten().copied().collect()
            }
            Geometry::MultiPolygon { coordinates } => {
                coordinates.iter().flatten().flatten().copied().collect()
            }
            Geometry::GeometryCollection { geometries } => {
                geometries.iter().flat_map(Geometry::positions).collect()
            }
        }
    }
}

/// A geometric record: identifier, geometry and properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Immutable identity
    pub id: FeatureId,
    /// Geometry payload; `None` for a feature without location
    pub geometry: Option<Geometry>,
    /// Arbitrary key/value properties
    #[serde(default)]
    pub properties: Properties,
}

impl Feature {
    /// Create a feature with no properties
    pub fn new(id: impl Into<FeatureId>, geometry: Geometry) -> Self {
        Feature {
            id: id.into(),
            geometry: Some(geometry),
            properties: Properties::new(),
        }
    }

    /// Create a feature with null geometry
    pub fn without_geometry(id: impl Into<FeatureId>) -> Self {
        Feature {
            id: id.into(),
            geometry: None,
            properties: Properties::new(),
        }
    }

    /// Create a feature with a freshly generated identifier
    pub fn with_fresh_id(geometry: Geometry) -> Self {
        Feature {
            id: FeatureId::new(),
            geometry: Some(geometry),
            properties: Properties::new(),
        }
    }

    /// Builder-style property setter
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Change to a single property key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyChange {
    /// Set the key to a value
    Set(Value),
    /// Remove the key
    Remove,
}

/// Field-level change applied by an update operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeaturePatch {
    /// Replacement geometry, if the geometry changes; `Some(None)` clears it
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_geometry"
    )]
    pub geometry: Option<Option<Geometry>>,
    /// Property changes keyed by property name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, PropertyChange>,
}

impl FeaturePatch {
    /// Empty patch
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the geometry
    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = Some(Some(geometry));
        self
    }

    /// Set the geometry to null
    pub fn clear_geometry(mut self) -> Self {
        self.geometry = Some(None);
        self
    }

    /// Set a property value
    pub fn set_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties
            .insert(key.into(), PropertyChange::Set(value.into()));
        self
    }

    /// Remove a property key
    pub fn remove_property(mut self, key: impl Into<String>) -> Self {
        self.properties.insert(key.into(), PropertyChange::Remove);
        self
    }

    /// Whether the patch changes nothing
    pub fn is_empty(&self) -> bool {
        self.geometry.is_none() && self.properties.is_empty()
    }

    /// Apply the patch to a feature in place
    pub fn apply_to(&self, feature: &mut Feature) {
        if let Some(geometry) = &self.geometry {
            feature.geometry = geometry.clone();
        }
        for (key, change) in &self.properties {
            match change {
                PropertyChange::Set(value) => {
                    feature.properties.insert(key.clone(), value.clone());
                }
                PropertyChange::Remove => {
                    feature.properties.remove(key);
                }
            }
        }
    }

    /// Patch restoring every field this patch touches to its value in `prior`
    pub fn inverse_against(&self, prior: &Feature) -> FeaturePatch {
        let geometry = self.geometry.as_ref().map(|_| prior.geometry.clone());
        let properties = self
            .properties
            .keys()
            .map(|key| {
                let restore = match prior.properties.get(key) {
                    Some(value) => PropertyChange::Set(value.clone()),
                    None => PropertyChange::Remove,
                };
                (key.clone(), restore)
            })
            .collect();

        FeaturePatch {
            geometry,
            properties,
        }
    }
}

// A present `geometry` key, even `null`, is a change
fn present_geometry<'de, D>(deserializer: D) -> Result<Option<Option<Geometry>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Geometry>::deserialize(deserializer).map(Some)
}

/// Bounding box over feature positions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min_lng: f64,
    pub min_lat: f64,
    pub max_lng: f64,
    pub max_lat: f64,
}

impl Extent {
    /// Degenerate extent covering one position
    pub fn from_position(p: Position) -> Self {
        Extent {
            min_lng: p.lng,
            min_lat: p.lat,
            max_lng: p.lng,
            max_lat: p.lat,
        }
    }

    /// Grow the extent to cover a position
    pub fn include(&mut self, p: Position) {
        self.min_lng = self.min_lng.min(p.lng);
        self.min_lat = self.min_lat.min(p.lat);
        self.max_lng = self.max_lng.max(p.lng);
        self.max_lat = self.max_lat.max(p.lat);
    }

    /// Extent of a set of features, `None` when there are no positions
    ///
    /// Features with null geometry are skipped.
    pub fn of<'a>(features: impl IntoIterator<Item = &'a Feature>) -> Option<Extent> {
        let mut extent: Option<Extent> = None;
        let positions = features
            .into_iter()
            .filter_map(|f| f.geometry.as_ref())
            .flat_map(Geometry::positions);
        for position in positions {
            match extent.as_mut() {
                Some(e) => e.include(position),
                None => extent = Some(Extent::from_position(position)),
            }
        }
        extent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_geometry_serializes_in_geojson_shape() {
        let value = serde_json::to_value(Geometry::point(1.5, -2.0)).unwrap();
        assert_eq!(value, json!({"type": "Point", "coordinates": [1.5, -2.0]}));

        let parsed: Geometry =
            serde_json::from_value(json!({"type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 1.0]]}))
                .unwrap();
        assert_eq!(
            parsed,
            Geometry::LineString {
                coordinates: vec![Position::new(0.0, 0.0), Position::new(1.0, 1.0)]
            }
        );
    }

    #[test]
    fn test_position_keeps_altitude() {
        let parsed: Geometry =
            serde_json::from_value(json!({"type": "Point", "coordinates": [1.0, 2.0, 15.0]})).unwrap();
        assert_eq!(
            parsed,
            Geometry::Point {
                coordinates: Position::with_alt(1.0, 2.0, 15.0)
            }
        );
        assert_eq!(
            serde_json::to_value(&parsed).unwrap(),
            json!({"type": "Point", "coordinates": [1.0, 2.0, 15.0]})
        );

        let err = serde_json::from_value::<Position>(json!([1.0])).unwrap_err();
        assert!(err.to_string().contains("at least two coordinates"));
    }

    #[test]
    fn test_geometry_collection_positions() {
        let parsed: Geometry = serde_json::from_value(json!({
            "type": "GeometryCollection",
            "geometries": [
                {"type": "Point", "coordinates": [1.0, 1.0]},
                {"type": "LineString", "coordinates": [[2.0, 2.0], [3.0, 3.0]]}
            ]
        }))
        .unwrap();

        assert_eq!(parsed.positions().len(), 3);
        assert_eq!(parsed.positions()[2], Position::new(3.0, 3.0));
    }

    #[test]
    fn test_patch_can_clear_geometry() {
        let prior = Feature::new("f1", Geometry::point(1.0, 1.0));
        let patch = FeaturePatch::new().clear_geometry();

        let text = serde_json::to_string(&patch).unwrap();
        assert_eq!(serde_json::from_str::<FeaturePatch>(&text).unwrap(), patch);

        let mut feature = prior.clone();
        patch.apply_to(&mut feature);
        assert!(feature.geometry.is_none());

        patch.inverse_against(&prior).apply_to(&mut feature);
        assert_eq!(feature, prior);
    }

    #[test]
    fn test_patch_apply_and_inverse_restores_prior() {
        let prior = Feature::new("f1", Geometry::point(0.0, 0.0))
            .with_property("name", "A")
            .with_property("height", 3);

        let patch = FeaturePatch::new()
            .with_geometry(Geometry::point(5.0, 5.0))
            .set_property("name", "B")
            .set_property("color", "red")
            .remove_property("height");

        let inverse = patch.inverse_against(&prior);

        let mut feature = prior.clone();
        patch.apply_to(&mut feature);
        assert_eq!(feature.geometry, Some(Geometry::point(5.0, 5.0)));
        assert_eq!(feature.properties.get("name"), Some(&json!("B")));
        assert_eq!(feature.properties.get("color"), Some(&json!("red")));
        assert!(!feature.properties.contains_key("height"));

        inverse.apply_to(&mut feature);
        assert_eq!(feature, prior);
    }

    #[test]
    fn test_inverse_only_touches_patched_fields() {
        let prior = Feature::new("f1", Geometry::point(0.0, 0.0)).with_property("name", "A");
        let inverse = FeaturePatch::new()
            .set_property("name", "B")
            .inverse_against(&prior);

        assert!(inverse.geometry.is_none());
        assert_eq!(inverse.properties.len(), 1);
        assert_eq!(
            inverse.properties.get("name"),
            Some(&PropertyChange::Set(json!("A")))
        );
    }

    #[test]
    fn test_property_change_null_survives_serialization() {
        let patch = FeaturePatch::new().set_property("note", Value::Null);
        let text = serde_json::to_string(&patch).unwrap();
        let back: FeaturePatch = serde_json::from_str(&text).unwrap();
        assert_eq!(back, patch);
    }

    #[test]
    fn test_extent_of_features() {
        let features = vec![
            Feature::new("a", Geometry::point(-10.0, 5.0)),
            Feature::new(
                "b",
                Geometry::Polygon {
                    coordinates: vec![vec![
                        Position::new(0.0, 0.0),
                        Position::new(20.0, -3.0),
                        Position::new(4.0, 8.0),
                        Position::new(0.0, 0.0),
                    ]],
                },
            ),
            Feature::without_geometry("c"),
        ];

        let extent = Extent::of(&features).unwrap();
        assert_eq!(extent.min_lng, -10.0);
        assert_eq!(extent.min_lat, -3.0);
        assert_eq!(extent.max_lng, 20.0);
        assert_eq!(extent.max_lat, 8.0);

        assert!(Extent::of(&Vec::<Feature>::new()).is_none());
        assert!(Extent::of(&[Feature::without_geometry("d")]).is_none());
    }
}
