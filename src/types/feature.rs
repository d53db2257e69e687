//! Decoded features: one geometry plus one attribute record each.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The identifier field every sublayer carries. Assigned by the decoder when
/// the source file does not provide one.
pub const OBJECT_ID_FIELD: &str = "OBJECTID";

/// The GeoJSON geometry kinds the decoder recognises.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeoJsonKind {
    Point,
    MultiPoint,
    LineString,
    MultiLineString,
    Polygon,
    MultiPolygon,
    GeometryCollection,
}

impl GeoJsonKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "Point" => Some(Self::Point),
            "MultiPoint" => Some(Self::MultiPoint),
            "LineString" => Some(Self::LineString),
            "MultiLineString" => Some(Self::MultiLineString),
            "Polygon" => Some(Self::Polygon),
            "MultiPolygon" => Some(Self::MultiPolygon),
            "GeometryCollection" => Some(Self::GeometryCollection),
            _ => None,
        }
    }
}

/// A geometry as read from the payload. Coordinates are carried through
/// untouched; this engine neither validates nor reprojects them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Geometry {
    pub kind: GeoJsonKind,
    /// The original GeoJSON geometry object.
    pub raw: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Feature {
    /// 1-based and unique within the owning sublayer.
    pub object_id: u64,
    pub geometry: Option<Geometry>,
    /// Attribute record, without the identifier field.
    pub attributes: Map<String, Value>,
}

impl Feature {
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }
}

/// An ordered sequence of decoded features.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
    /// `true` when the identifiers were synthesized as `1..N` by the decoder.
    pub synthesized_ids: bool,
}

impl FeatureCollection {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Largest identifier in the collection, `0` when empty.
    pub fn max_object_id(&self) -> u64 {
        self.features.iter().map(|f| f.object_id).max().unwrap_or(0)
    }

    /// Renumbers identifiers to `start, start + 1, ...` in the current order.
    pub fn renumber_from(&mut self, start: u64) {
        for (offset, feature) in self.features.iter_mut().enumerate() {
            feature.object_id = start + offset as u64;
        }
    }
}
