//! This module defines the core, strongly-typed data representations used
//! throughout the reconciliation engine.
//!
//! - `field_type`: the canonical field and geometry type enums, replacing the
//!   stringly-typed schema entries of the hosting platform.
//! - `feature`: decoded features and feature collections.
//! - `resources`: handles and definitions for collections, sublayers, views and
//!   visualization artifacts as the platform collaborators exchange them.

pub mod feature;
pub mod field_type;
pub mod resources;

// Re-export the main type(s) for easier access.
pub use feature::{Feature, FeatureCollection, GeoJsonKind, Geometry, OBJECT_ID_FIELD};
pub use field_type::{FieldDef, FieldType, GeometryType};
pub use resources::{
    Capability, CollectionHandle, CreateServiceRequest, DashboardHandle, DashboardRequest,
    FeatureWriteMode, ItemHandle, LayerDefinition, MapHandle, MapRequest, SublayerInfo,
    SublayerUpdate, ViewDefinition, ViewHandle,
};
