//! This module defines the canonical, type-safe representation of field and
//! geometry types used in sublayer schemas.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The type of a single attribute field in a sublayer schema.
///
/// Inference from decoded GeoJSON properties is deliberately coarse: the
/// platform only distinguishes a handful of primitive field kinds.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// The platform-managed object identifier.
    Oid,
    String,
    Integer,
    Double,
    Boolean,
}

impl FieldType {
    /// Infers the field type of a single JSON value. `null` carries no type information.
    pub fn infer(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(Self::Boolean),
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(Self::Integer),
            Value::Number(_) => Some(Self::Double),
            // Nested arrays/objects are stored as their JSON text.
            Value::String(_) | Value::Array(_) | Value::Object(_) => Some(Self::String),
        }
    }

    /// Returns the narrowest type able to hold values of both `self` and `other`.
    pub fn widen(self, other: Self) -> Self {
        use FieldType::*;
        match (self, other) {
            (a, b) if a == b => a,
            (Integer, Double) | (Double, Integer) => Double,
            _ => String,
        }
    }

    /// Returns `true` if a field already declared as `self` can accept values
    /// inferred as `incoming` without a schema change.
    pub fn accepts(self, incoming: Self) -> bool {
        use FieldType::*;
        self == incoming || matches!((self, incoming), (Double, Integer) | (String, _))
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// One `name`/`type` pair of a sublayer schema.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

/// The geometry type declared for a whole sublayer.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GeometryType {
    Point,
    Multipoint,
    Polyline,
    /// Flood extents are areas; every sublayer in this domain is a polygon layer.
    #[default]
    Polygon,
}

impl GeometryType {
    /// The platform's wire name for this geometry type.
    pub fn esri_name(&self) -> &'static str {
        match self {
            Self::Point => "esriGeometryPoint",
            Self::Multipoint => "esriGeometryMultipoint",
            Self::Polyline => "esriGeometryPolyline",
            Self::Polygon => "esriGeometryPolygon",
        }
    }
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.esri_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_infer_from_json_values() {
        assert_eq!(FieldType::infer(&json!("Europe")), Some(FieldType::String));
        assert_eq!(FieldType::infer(&json!(2022)), Some(FieldType::Integer));
        assert_eq!(FieldType::infer(&json!(1.5)), Some(FieldType::Double));
        assert_eq!(FieldType::infer(&json!(true)), Some(FieldType::Boolean));
        assert_eq!(FieldType::infer(&json!([1, 2])), Some(FieldType::String));
        assert_eq!(FieldType::infer(&Value::Null), None);
    }

    #[test]
    fn test_widen_numeric_then_string() {
        assert_eq!(FieldType::Integer.widen(FieldType::Double), FieldType::Double);
        assert_eq!(FieldType::Double.widen(FieldType::Integer), FieldType::Double);
        assert_eq!(FieldType::Integer.widen(FieldType::Boolean), FieldType::String);
        assert_eq!(FieldType::String.widen(FieldType::String), FieldType::String);
    }

    #[test]
    fn test_accepts_is_directional() {
        assert!(FieldType::Double.accepts(FieldType::Integer));
        assert!(!FieldType::Integer.accepts(FieldType::Double));
        assert!(FieldType::String.accepts(FieldType::Boolean));
        assert!(!FieldType::Boolean.accepts(FieldType::String));
    }

    #[test]
    fn test_field_def_serializes_with_type_key() {
        let field = FieldDef::new("location", FieldType::String);
        let json = serde_json::to_value(&field).unwrap();
        assert_eq!(json, json!({"name": "location", "type": "string"}));
        assert_eq!(GeometryType::default().to_string(), "esriGeometryPolygon");
    }
}
