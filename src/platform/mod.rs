// In: src/platform/mod.rs

// ====================================================================================
// ARCHITECTURAL OVERVIEW: The Collaborator Boundary
// ====================================================================================
//
// The engine never talks to a vendor SDK directly. Everything outside the core
// is reached through three traits:
//
//   1. [ObjectStore]      -> lists and fetches raw dataset files by key
//   2. [ContentPlatform]  -> searches, creates and updates hosted resources
//                            (collections, sublayers, views)
//   3. [Visualizer]       -> turns a finished view into a map and a dashboard
//
// Every method is a blocking call that may fail with a `PlatformError`. The
// reconcilers wrap each call in a `CallPolicy` (bounded retry + deadline) and
// translate failures into the semantic `FloodSyncError` variants.
//
// Backends shipped here:
//   - `memory`:   in-process reference implementations with fault injection
//   - `fs_store`: an `ObjectStore` over a local directory tree
//
// ====================================================================================

pub mod fs_store;
pub mod memory;

pub use fs_store::FsObjectStore;
pub use memory::{MemoryObjectStore, MemoryPlatform, MemoryVisualizer, PlatformOp};

use crate::error::PlatformError;
use crate::types::{
    CollectionHandle, CreateServiceRequest, DashboardHandle, DashboardRequest, ItemHandle,
    LayerDefinition, MapHandle, MapRequest, SublayerInfo, SublayerUpdate, ViewDefinition,
    ViewHandle,
};

/// Item type of hosted collections in the platform's content index.
pub const FEATURE_SERVICE_ITEM_TYPE: &str = "Feature Service";

/// One entry of a bucket listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
}

/// **CONTRACT:** read access to the bucket holding the yearly dataset files.
pub trait ObjectStore: Send + Sync {
    fn list_objects(&self, bucket: &str) -> Result<Vec<ObjectSummary>, PlatformError>;

    fn fetch_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, PlatformError>;
}

/// **CONTRACT:** the hosting platform's content management operations.
///
/// Implementations are free to return search hits that only loosely match the
/// query; callers filter for exact titles themselves.
pub trait ContentPlatform: Send + Sync {
    fn search(
        &self,
        title: &str,
        item_type: &str,
        max_items: usize,
    ) -> Result<Vec<ItemHandle>, PlatformError>;

    fn create_service(&self, request: &CreateServiceRequest) -> Result<ItemHandle, PlatformError>;

    /// Sublayers of a collection, in persisted order.
    fn sublayers(&self, collection: &CollectionHandle) -> Result<Vec<SublayerInfo>, PlatformError>;

    /// Appends a new sublayer to the collection's definition.
    fn add_to_definition(
        &self,
        collection: &CollectionHandle,
        layer: &LayerDefinition,
    ) -> Result<SublayerInfo, PlatformError>;

    /// Rewrites the features (and widens the schema) of an existing sublayer.
    fn update_sublayer(
        &self,
        collection: &CollectionHandle,
        update: &SublayerUpdate,
    ) -> Result<SublayerInfo, PlatformError>;

    fn list_views(&self, collection: &CollectionHandle) -> Result<Vec<ViewHandle>, PlatformError>;

    fn create_view(
        &self,
        collection: &CollectionHandle,
        definition: &ViewDefinition,
    ) -> Result<ViewHandle, PlatformError>;

    /// Re-applies a definition to an existing view in place.
    fn update_view(
        &self,
        view: &ViewHandle,
        definition: &ViewDefinition,
    ) -> Result<ViewHandle, PlatformError>;
}

/// **CONTRACT:** builds presentation artifacts from a view.
pub trait Visualizer: Send + Sync {
    fn build_map(&self, view: &ViewHandle, request: &MapRequest)
        -> Result<MapHandle, PlatformError>;

    fn build_dashboard(
        &self,
        map: &MapHandle,
        request: &DashboardRequest,
    ) -> Result<DashboardHandle, PlatformError>;
}
