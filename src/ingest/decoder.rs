// In: src/ingest/decoder.rs

//! The GeoJSON feature decoder.
//!
//! Turns a raw byte payload fetched from storage into a [`FeatureCollection`].
//! The decoder checks structure only: a payload is rejected when it is not a
//! GeoJSON `FeatureCollection` (or single `Feature`), or when a geometry object
//! is not shaped like one. Coordinates are never inspected.
//!
//! Identifier normalisation happens here as well. A file without an
//! `OBJECTID` property gets identifiers `1..N` in decoded order.

use hashbrown::HashSet;
use serde_json::{Map, Value};

use crate::error::{FloodSyncError, SyncResult};
use crate::types::{Feature, FeatureCollection, GeoJsonKind, Geometry, OBJECT_ID_FIELD};

/// Decodes a GeoJSON payload into features with normalised identifiers.
pub fn decode_features(bytes: &[u8]) -> SyncResult<FeatureCollection> {
    let document: Value = serde_json::from_slice(bytes)
        .map_err(|e| FloodSyncError::Decode(format!("payload is not valid JSON: {}", e)))?;

    let raw_features = match type_tag(&document)? {
        "FeatureCollection" => match document.get("features") {
            Some(Value::Array(items)) => items.iter().collect::<Vec<_>>(),
            _ => {
                return Err(FloodSyncError::Decode(
                    "FeatureCollection has no 'features' array".to_string(),
                ))
            }
        },
        "Feature" => vec![&document],
        other => {
            return Err(FloodSyncError::Decode(format!(
                "expected a FeatureCollection or Feature, found '{}'",
                other
            )))
        }
    };

    // 1. Decode every record, keeping any explicit identifier aside.
    let mut decoded = Vec::with_capacity(raw_features.len());
    for (position, raw) in raw_features.into_iter().enumerate() {
        decoded.push(decode_one(raw, position)?);
    }

    // 2. Normalise identifiers across the whole collection.
    let explicit = decoded.iter().filter(|(id, _)| id.is_some()).count();
    let synthesized_ids = explicit == 0;

    let features = if synthesized_ids {
        decoded
            .into_iter()
            .enumerate()
            .map(|(position, (_, mut feature))| {
                feature.object_id = position as u64 + 1;
                feature
            })
            .collect()
    } else if explicit == decoded.len() {
        let mut seen = HashSet::with_capacity(decoded.len());
        let mut features = Vec::with_capacity(decoded.len());
        for (id, mut feature) in decoded {
            // `explicit == decoded.len()` guarantees every id is present.
            let id = id.unwrap_or_default();
            if !seen.insert(id) {
                return Err(FloodSyncError::Decode(format!(
                    "duplicate {} value {}",
                    OBJECT_ID_FIELD, id
                )));
            }
            feature.object_id = id;
            features.push(feature);
        }
        features
    } else {
        return Err(FloodSyncError::Decode(format!(
            "{} is present on {} of {} features",
            OBJECT_ID_FIELD,
            explicit,
            decoded.len()
        )));
    };

    Ok(FeatureCollection {
        features,
        synthesized_ids,
    })
}

fn type_tag(object: &Value) -> SyncResult<&str> {
    object
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| FloodSyncError::Decode("object has no string 'type' member".to_string()))
}

/// Decodes one GeoJSON feature. The returned identifier is the explicit
/// `OBJECTID` property, if the feature carried one.
fn decode_one(raw: &Value, position: usize) -> SyncResult<(Option<u64>, Feature)> {
    if !raw.is_object() || type_tag(raw)? != "Feature" {
        return Err(FloodSyncError::Decode(format!(
            "record {} is not a GeoJSON Feature",
            position
        )));
    }

    let geometry = match raw.get("geometry") {
        None | Some(Value::Null) => None,
        Some(value) => Some(decode_geometry(value).map_err(|reason| {
            FloodSyncError::Decode(format!("record {}: {}", position, reason))
        })?),
    };

    let mut attributes = match raw.get("properties") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(props)) => props.clone(),
        Some(_) => {
            return Err(FloodSyncError::Decode(format!(
                "record {}: 'properties' must be an object",
                position
            )))
        }
    };

    let object_id = match attributes.remove(OBJECT_ID_FIELD) {
        None | Some(Value::Null) => None,
        Some(value) => match value.as_u64() {
            Some(id) if id > 0 => Some(id),
            _ => {
                return Err(FloodSyncError::Decode(format!(
                    "record {}: {} must be a positive integer, got {}",
                    position, OBJECT_ID_FIELD, value
                )))
            }
        },
    };

    Ok((
        object_id,
        Feature {
            object_id: 0,
            geometry,
            attributes,
        },
    ))
}

fn decode_geometry(value: &Value) -> Result<Geometry, String> {
    let name = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| "geometry has no 'type'".to_string())?;
    let kind =
        GeoJsonKind::parse(name).ok_or_else(|| format!("unknown geometry type '{}'", name))?;

    let member = match kind {
        GeoJsonKind::GeometryCollection => "geometries",
        _ => "coordinates",
    };
    match value.get(member) {
        Some(Value::Array(items)) => {
            if kind == GeoJsonKind::GeometryCollection {
                for child in items {
                    decode_geometry(child)?;
                }
            }
        }
        _ => return Err(format!("{:?} geometry has no '{}' array", kind, member)),
    }

    Ok(Geometry {
        kind,
        raw: value.clone(),
    })
}
