// In: src/types/resources.rs

//! Handles and definitions exchanged with the hosting platform.
//!
//! Handles are plain values: a collection handle is returned by the registry
//! and threaded explicitly through the orchestrator phases. Nothing here holds
//! a live connection.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::feature::Feature;
use super::field_type::{FieldDef, GeometryType};

//==================================================================================
// I. Content Items & Collections
//==================================================================================

/// A search hit from the platform's content index.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ItemHandle {
    pub id: String,
    pub title: String,
    pub item_type: String,
}

/// The logical dataset collection (a hosted feature service).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionHandle {
    pub id: String,
    pub name: String,
}

impl From<ItemHandle> for CollectionHandle {
    fn from(item: ItemHandle) -> Self {
        Self {
            id: item.id,
            name: item.title,
        }
    }
}

/// Operations a hosted service allows its clients.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Query,
    Extract,
    Create,
    Update,
    Editing,
    Delete,
}

impl Capability {
    /// The full CRUD capability set an editable collection is created with.
    pub fn full_crud() -> Vec<Capability> {
        vec![
            Capability::Query,
            Capability::Extract,
            Capability::Create,
            Capability::Update,
            Capability::Editing,
            Capability::Delete,
        ]
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Parameters for creating an empty collection.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CreateServiceRequest {
    pub name: String,
    /// `false` keeps the service editable.
    pub has_static_data: bool,
    pub capabilities: Vec<Capability>,
    pub tags: Vec<String>,
    pub snippet: String,
}

//==================================================================================
// II. Sublayers
//==================================================================================

/// A persisted sublayer as listed by the platform, in persisted order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SublayerInfo {
    pub index: u32,
    pub name: String,
    pub geometry_type: GeometryType,
    pub fields: Vec<FieldDef>,
    pub feature_count: usize,
    /// Largest identifier currently stored, `0` for an empty sublayer.
    pub max_object_id: u64,
}

/// The "add to definition" payload for a brand-new sublayer.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LayerDefinition {
    pub name: String,
    pub geometry_type: GeometryType,
    pub fields: Vec<FieldDef>,
    pub features: Vec<Feature>,
}

/// How re-ingested features are written into an existing sublayer.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeatureWriteMode {
    /// **Default:** drop the stored features and write the new payload. The
    /// existing schema is kept.
    #[default]
    Replace,
    /// Keep the stored features and add the new ones after them, with
    /// identifiers continuing from the stored maximum.
    Append,
}

/// An in-place update of an existing sublayer.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SublayerUpdate {
    pub name: String,
    /// Fields present in the new payload but missing from the stored schema.
    pub added_fields: Vec<FieldDef>,
    pub features: Vec<Feature>,
    pub mode: FeatureWriteMode,
}

//==================================================================================
// III. Views
//==================================================================================

/// The desired state of a filtered view.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ViewDefinition {
    pub name: String,
    pub definition_expression: String,
    /// Referenced sublayers, by name. The view does not own them.
    pub sublayers: Vec<String>,
}

/// A saved view over some sublayers of a collection.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ViewHandle {
    pub id: String,
    pub name: String,
    pub collection_id: String,
    pub sublayers: Vec<String>,
    pub definition_expression: String,
}

//==================================================================================
// IV. Visualization Artifacts
//==================================================================================

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MapRequest {
    pub title: String,
    pub tags: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MapHandle {
    pub id: String,
    pub title: String,
    pub view_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DashboardRequest {
    pub title: String,
    pub tags: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DashboardHandle {
    pub id: String,
    pub title: String,
    pub url: String,
}
