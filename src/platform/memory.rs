// In: src/platform/memory.rs

//! In-process reference implementations of the collaborator traits.
//!
//! These backends behave like the hosted services in the ways the engine cares
//! about: search is fuzzy (substring, case-insensitive), service names are
//! unique, `add_to_definition` happily appends a second sublayer with an
//! existing name, and view names are unique per collection. Failures can be
//! queued per operation with `inject_failure`, and every call is counted.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use hashbrown::HashMap;

use super::{ContentPlatform, ObjectStore, ObjectSummary, Visualizer, FEATURE_SERVICE_ITEM_TYPE};
use crate::error::PlatformError;
use crate::types::{
    CollectionHandle, CreateServiceRequest, DashboardHandle, DashboardRequest, Feature,
    FeatureWriteMode, FieldType, ItemHandle, LayerDefinition, MapHandle, MapRequest,
    SublayerInfo, SublayerUpdate, ViewDefinition, ViewHandle,
};

//==================================================================================
// 0. Fault Injection
//==================================================================================

/// Every collaborator operation, for fault injection and call accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformOp {
    Search,
    CreateService,
    Sublayers,
    AddToDefinition,
    UpdateSublayer,
    ListViews,
    CreateView,
    UpdateView,
    ListObjects,
    FetchObject,
    BuildMap,
    BuildDashboard,
}

#[derive(Debug, Default)]
struct FaultPlan {
    queued: HashMap<PlatformOp, VecDeque<PlatformError>>,
    calls: HashMap<PlatformOp, usize>,
}

impl FaultPlan {
    /// Counts the call and pops the next queued failure for `op`, if any.
    fn enter(&mut self, op: PlatformOp) -> Result<(), PlatformError> {
        *self.calls.entry(op).or_insert(0) += 1;
        match self.queued.get_mut(&op).and_then(|queue| queue.pop_front()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn inject(&mut self, op: PlatformOp, err: PlatformError) {
        self.queued.entry(op).or_default().push_back(err);
    }

    fn count(&self, op: PlatformOp) -> usize {
        self.calls.get(&op).copied().unwrap_or(0)
    }
}

/// A poisoned lock only means another test thread panicked; the data is still usable.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

//==================================================================================
// I. Content Platform
//==================================================================================

#[derive(Debug, Clone)]
struct StoredSublayer {
    info: SublayerInfo,
    features: Vec<Feature>,
}

impl StoredSublayer {
    fn refresh_counts(&mut self) {
        self.info.feature_count = self.features.len();
        self.info.max_object_id = self.features.iter().map(|f| f.object_id).max().unwrap_or(0);
    }
}

#[derive(Debug, Clone)]
struct StoredService {
    item: ItemHandle,
    request: CreateServiceRequest,
    sublayers: Vec<StoredSublayer>,
    views: Vec<ViewHandle>,
}

#[derive(Debug, Default)]
struct PlatformState {
    services: Vec<StoredService>,
    /// Non-service items (maps, documents) that only show up in search.
    other_items: Vec<ItemHandle>,
    next_id: u64,
    faults: FaultPlan,
}

impl PlatformState {
    fn allocate_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn service_mut(&mut self, id: &str) -> Result<&mut StoredService, PlatformError> {
        self.services
            .iter_mut()
            .find(|s| s.item.id == id)
            .ok_or_else(|| PlatformError::not_found(format!("no service with id '{}'", id)))
    }

    fn service(&self, id: &str) -> Result<&StoredService, PlatformError> {
        self.services
            .iter()
            .find(|s| s.item.id == id)
            .ok_or_else(|| PlatformError::not_found(format!("no service with id '{}'", id)))
    }
}

/// An in-memory hosting platform.
#[derive(Debug, Default)]
pub struct MemoryPlatform {
    state: Mutex<PlatformState>,
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `err` to be returned by the next call of `op`.
    pub fn inject_failure(&self, op: PlatformOp, err: PlatformError) {
        lock(&self.state).faults.inject(op, err);
    }

    /// How many times `op` has been called, failed calls included.
    pub fn call_count(&self, op: PlatformOp) -> usize {
        lock(&self.state).faults.count(op)
    }

    /// Adds a searchable item that is not a feature service.
    pub fn seed_item(&self, title: &str, item_type: &str) -> ItemHandle {
        let mut state = lock(&self.state);
        let item = ItemHandle {
            id: state.allocate_id("item"),
            title: title.to_string(),
            item_type: item_type.to_string(),
        };
        state.other_items.push(item.clone());
        item
    }

    /// Number of services whose title is exactly `title`.
    pub fn service_count(&self, title: &str) -> usize {
        lock(&self.state)
            .services
            .iter()
            .filter(|s| s.item.title == title)
            .count()
    }

    /// The request a service was created with.
    pub fn service_request(&self, collection_id: &str) -> Option<CreateServiceRequest> {
        let state = lock(&self.state);
        state.service(collection_id).ok().map(|s| s.request.clone())
    }

    /// Stored features of the first sublayer called `sublayer`.
    pub fn features(&self, collection_id: &str, sublayer: &str) -> Option<Vec<Feature>> {
        let state = lock(&self.state);
        let service = state.service(collection_id).ok()?;
        service
            .sublayers
            .iter()
            .find(|s| s.info.name == sublayer)
            .map(|s| s.features.clone())
    }

    /// All views of a collection, in creation order.
    pub fn views(&self, collection_id: &str) -> Vec<ViewHandle> {
        let state = lock(&self.state);
        state
            .service(collection_id)
            .map(|s| s.views.clone())
            .unwrap_or_default()
    }
}

impl ContentPlatform for MemoryPlatform {
    fn search(
        &self,
        title: &str,
        item_type: &str,
        max_items: usize,
    ) -> Result<Vec<ItemHandle>, PlatformError> {
        let mut state = lock(&self.state);
        state.faults.enter(PlatformOp::Search)?;

        let needle = title.to_lowercase();
        let hits = state
            .services
            .iter()
            .map(|s| &s.item)
            .chain(state.other_items.iter())
            .filter(|item| item.item_type == item_type)
            .filter(|item| item.title.to_lowercase().contains(&needle))
            .take(max_items)
            .cloned()
            .collect();
        Ok(hits)
    }

    fn create_service(&self, request: &CreateServiceRequest) -> Result<ItemHandle, PlatformError> {
        let mut state = lock(&self.state);
        state.faults.enter(PlatformOp::CreateService)?;

        if state.services.iter().any(|s| s.item.title == request.name) {
            return Err(PlatformError::rejected(format!(
                "a service named '{}' already exists",
                request.name
            )));
        }
        let item = ItemHandle {
            id: state.allocate_id("svc"),
            title: request.name.clone(),
            item_type: FEATURE_SERVICE_ITEM_TYPE.to_string(),
        };
        state.services.push(StoredService {
            item: item.clone(),
            request: request.clone(),
            sublayers: Vec::new(),
            views: Vec::new(),
        });
        Ok(item)
    }

    fn sublayers(&self, collection: &CollectionHandle) -> Result<Vec<SublayerInfo>, PlatformError> {
        let mut state = lock(&self.state);
        state.faults.enter(PlatformOp::Sublayers)?;

        let service = state.service(&collection.id)?;
        Ok(service.sublayers.iter().map(|s| s.info.clone()).collect())
    }

    fn add_to_definition(
        &self,
        collection: &CollectionHandle,
        layer: &LayerDefinition,
    ) -> Result<SublayerInfo, PlatformError> {
        let mut state = lock(&self.state);
        state.faults.enter(PlatformOp::AddToDefinition)?;

        if !layer.fields.iter().any(|f| f.field_type == FieldType::Oid) {
            return Err(PlatformError::rejected(format!(
                "layer '{}' has no object id field",
                layer.name
            )));
        }
        let service = state.service_mut(&collection.id)?;
        let mut stored = StoredSublayer {
            info: SublayerInfo {
                index: service.sublayers.len() as u32,
                name: layer.name.clone(),
                geometry_type: layer.geometry_type,
                fields: layer.fields.clone(),
                feature_count: 0,
                max_object_id: 0,
            },
            features: layer.features.clone(),
        };
        stored.refresh_counts();
        let info = stored.info.clone();
        service.sublayers.push(stored);
        Ok(info)
    }

    fn update_sublayer(
        &self,
        collection: &CollectionHandle,
        update: &SublayerUpdate,
    ) -> Result<SublayerInfo, PlatformError> {
        let mut state = lock(&self.state);
        state.faults.enter(PlatformOp::UpdateSublayer)?;

        let service = state.service_mut(&collection.id)?;
        let stored = service
            .sublayers
            .iter_mut()
            .find(|s| s.info.name == update.name)
            .ok_or_else(|| {
                PlatformError::not_found(format!("no sublayer named '{}'", update.name))
            })?;

        for field in &update.added_fields {
            if !stored.info.fields.iter().any(|f| f.name == field.name) {
                stored.info.fields.push(field.clone());
            }
        }
        match update.mode {
            FeatureWriteMode::Replace => stored.features = update.features.clone(),
            FeatureWriteMode::Append => stored.features.extend(update.features.iter().cloned()),
        }
        stored.refresh_counts();
        Ok(stored.info.clone())
    }

    fn list_views(&self, collection: &CollectionHandle) -> Result<Vec<ViewHandle>, PlatformError> {
        let mut state = lock(&self.state);
        state.faults.enter(PlatformOp::ListViews)?;

        Ok(state.service(&collection.id)?.views.clone())
    }

    fn create_view(
        &self,
        collection: &CollectionHandle,
        definition: &ViewDefinition,
    ) -> Result<ViewHandle, PlatformError> {
        let mut state = lock(&self.state);
        state.faults.enter(PlatformOp::CreateView)?;

        let id = state.allocate_id("view");
        let service = state.service_mut(&collection.id)?;
        if service.views.iter().any(|v| v.name == definition.name) {
            return Err(PlatformError::rejected(format!(
                "view '{}' already exists",
                definition.name
            )));
        }
        if let Some(missing) = definition
            .sublayers
            .iter()
            .find(|name| !service.sublayers.iter().any(|s| &s.info.name == *name))
        {
            return Err(PlatformError::rejected(format!(
                "view references unknown sublayer '{}'",
                missing
            )));
        }
        let view = ViewHandle {
            id,
            name: definition.name.clone(),
            collection_id: collection.id.clone(),
            sublayers: definition.sublayers.clone(),
            definition_expression: definition.definition_expression.clone(),
        };
        service.views.push(view.clone());
        Ok(view)
    }

    fn update_view(
        &self,
        view: &ViewHandle,
        definition: &ViewDefinition,
    ) -> Result<ViewHandle, PlatformError> {
        let mut state = lock(&self.state);
        state.faults.enter(PlatformOp::UpdateView)?;

        let service = state.service_mut(&view.collection_id)?;
        let stored = service
            .views
            .iter_mut()
            .find(|v| v.id == view.id)
            .ok_or_else(|| PlatformError::not_found(format!("no view with id '{}'", view.id)))?;
        stored.definition_expression = definition.definition_expression.clone();
        stored.sublayers = definition.sublayers.clone();
        Ok(stored.clone())
    }
}

//==================================================================================
// II. Object Store
//==================================================================================

#[derive(Debug, Default)]
struct StoreState {
    buckets: BTreeMap<String, BTreeMap<String, Vec<u8>>>,
    faults: FaultPlan,
}

/// An in-memory bucket store. Keys list in lexicographic order.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    state: Mutex<StoreState>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, bucket: &str, key: &str, bytes: impl Into<Vec<u8>>) {
        lock(&self.state)
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), bytes.into());
    }

    pub fn inject_failure(&self, op: PlatformOp, err: PlatformError) {
        lock(&self.state).faults.inject(op, err);
    }

    pub fn call_count(&self, op: PlatformOp) -> usize {
        lock(&self.state).faults.count(op)
    }
}

impl ObjectStore for MemoryObjectStore {
    fn list_objects(&self, bucket: &str) -> Result<Vec<ObjectSummary>, PlatformError> {
        let mut state = lock(&self.state);
        state.faults.enter(PlatformOp::ListObjects)?;

        let objects = state
            .buckets
            .get(bucket)
            .ok_or_else(|| PlatformError::not_found(format!("no bucket '{}'", bucket)))?;
        Ok(objects
            .iter()
            .map(|(key, bytes)| ObjectSummary {
                key: key.clone(),
                size: bytes.len() as u64,
            })
            .collect())
    }

    fn fetch_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, PlatformError> {
        let mut state = lock(&self.state);
        state.faults.enter(PlatformOp::FetchObject)?;

        state
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .cloned()
            .ok_or_else(|| PlatformError::not_found(format!("no object '{}/{}'", bucket, key)))
    }
}

//==================================================================================
// III. Visualizer
//==================================================================================

#[derive(Debug, Default)]
struct VisualState {
    maps: Vec<MapHandle>,
    dashboards: Vec<DashboardHandle>,
    next_id: u64,
    faults: FaultPlan,
}

/// Builds map and dashboard records with deterministic URLs under `base_url`.
#[derive(Debug)]
pub struct MemoryVisualizer {
    base_url: String,
    state: Mutex<VisualState>,
}

impl MemoryVisualizer {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            state: Mutex::new(VisualState::default()),
        }
    }

    pub fn inject_failure(&self, op: PlatformOp, err: PlatformError) {
        lock(&self.state).faults.inject(op, err);
    }

    pub fn maps(&self) -> Vec<MapHandle> {
        lock(&self.state).maps.clone()
    }

    pub fn dashboards(&self) -> Vec<DashboardHandle> {
        lock(&self.state).dashboards.clone()
    }
}

impl Visualizer for MemoryVisualizer {
    fn build_map(
        &self,
        view: &ViewHandle,
        request: &MapRequest,
    ) -> Result<MapHandle, PlatformError> {
        let mut state = lock(&self.state);
        state.faults.enter(PlatformOp::BuildMap)?;

        state.next_id += 1;
        let map = MapHandle {
            id: format!("map-{}", state.next_id),
            title: request.title.clone(),
            view_id: view.id.clone(),
        };
        state.maps.push(map.clone());
        Ok(map)
    }

    fn build_dashboard(
        &self,
        map: &MapHandle,
        request: &DashboardRequest,
    ) -> Result<DashboardHandle, PlatformError> {
        let mut state = lock(&self.state);
        state.faults.enter(PlatformOp::BuildDashboard)?;

        if !state.maps.iter().any(|m| m.id == map.id) {
            return Err(PlatformError::not_found(format!("no map with id '{}'", map.id)));
        }
        state.next_id += 1;
        let id = format!("dash-{}", state.next_id);
        let dashboard = DashboardHandle {
            url: format!("{}/apps/dashboards/{}", self.base_url, id),
            id,
            title: request.title.clone(),
        };
        state.dashboards.push(dashboard.clone());
        Ok(dashboard)
    }
}
