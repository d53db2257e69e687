// In: src/reconcile/registry.rs

//! The collection registry: finds or creates the one logical collection.
//!
//! Identity is the collection's title. The platform's search is fuzzy, so the
//! registry filters hits for an exact title and takes the first one; any
//! further exact matches are ignored. Once resolved, a handle is kept in a
//! name → handle map for the rest of the run, so the ingestion loop and the
//! view phase share one explicit value instead of re-searching per file.

use hashbrown::HashMap;

use crate::config::ServiceDefaults;
use crate::error::{FloodSyncError, SyncResult};
use crate::platform::{ContentPlatform, FEATURE_SERVICE_ITEM_TYPE};
use crate::reconcile::retry::CallPolicy;
use crate::types::{CollectionHandle, CreateServiceRequest};

pub struct CollectionRegistry<'a> {
    platform: &'a dyn ContentPlatform,
    policy: CallPolicy,
    defaults: ServiceDefaults,
    resolved: HashMap<String, CollectionHandle>,
}

impl<'a> CollectionRegistry<'a> {
    pub fn new(
        platform: &'a dyn ContentPlatform,
        policy: CallPolicy,
        defaults: ServiceDefaults,
    ) -> Self {
        Self {
            platform,
            policy,
            defaults,
            resolved: HashMap::new(),
        }
    }

    /// A handle resolved earlier in this run, without touching the platform.
    pub fn cached(&self, name: &str) -> Option<&CollectionHandle> {
        self.resolved.get(name)
    }

    /// Looks up the collection titled `name` without creating it.
    pub fn find_collection(&mut self, name: &str) -> SyncResult<Option<CollectionHandle>> {
        if let Some(handle) = self.resolved.get(name) {
            return Ok(Some(handle.clone()));
        }

        let hits = self
            .policy
            .call("search", || {
                self.platform
                    .search(name, FEATURE_SERVICE_ITEM_TYPE, self.defaults.max_search_items)
            })
            .map_err(|source| FloodSyncError::Registry {
                name: name.to_string(),
                source,
            })?;

        let found = hits
            .into_iter()
            .find(|item| item.title == name)
            .map(CollectionHandle::from);
        if let Some(handle) = &found {
            log::info!("Collection '{}' exists ({}).", name, handle.id);
            self.resolved.insert(name.to_string(), handle.clone());
        }
        Ok(found)
    }

    /// Returns the collection titled `name`, creating an empty editable one if
    /// none exists. Only the create path mutates the platform.
    pub fn resolve_collection(&mut self, name: &str) -> SyncResult<CollectionHandle> {
        // 1. Look for an existing collection with this exact title.
        if let Some(handle) = self.find_collection(name)? {
            return Ok(handle);
        }

        // 2. Nothing found: create an empty, editable collection.
        log::info!("Collection '{}' not found. Creating it...", name);
        let request = CreateServiceRequest {
            name: name.to_string(),
            has_static_data: false,
            capabilities: self.defaults.capabilities.clone(),
            tags: self.defaults.tags.clone(),
            snippet: self.defaults.snippet.clone(),
        };
        let item = self
            .policy
            .call("create_service", || self.platform.create_service(&request))
            .map_err(|source| FloodSyncError::Registry {
                name: name.to_string(),
                source,
            })?;
        log::info!("Collection '{}' created ({}).", name, item.id);

        let handle = CollectionHandle::from(item);
        self.resolved.insert(name.to_string(), handle.clone());
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlatformError;
    use crate::platform::{MemoryPlatform, PlatformOp};
    use crate::types::Capability;

    fn registry(platform: &MemoryPlatform) -> CollectionRegistry<'_> {
        CollectionRegistry::new(platform, CallPolicy::no_retry(), ServiceDefaults::default())
    }

    #[test]
    fn test_creates_editable_collection_when_missing() {
        let platform = MemoryPlatform::new();
        let mut registry = registry(&platform);

        let handle = registry.resolve_collection("Flood_Data").unwrap();

        assert_eq!(handle.name, "Flood_Data");
        let request = platform.service_request(&handle.id).unwrap();
        assert!(!request.has_static_data);
        assert_eq!(request.capabilities, Capability::full_crud());
        assert_eq!(request.tags, vec!["Flood", "Feature", "Service"]);
        assert_eq!(request.snippet, "Flood data feature service");
    }

    #[test]
    fn test_finds_existing_by_exact_title_only() {
        let platform = MemoryPlatform::new();
        let archive = registry(&platform)
            .resolve_collection("Flood_Data_Archive")
            .unwrap();
        platform.seed_item("Flood_Data", "Web Map");

        // A fresh registry (new run) must not mistake the archive for the target.
        let handle = registry(&platform).resolve_collection("Flood_Data").unwrap();

        assert_ne!(handle.id, archive.id);
        assert_eq!(platform.service_count("Flood_Data"), 1);

        let again = registry(&platform).resolve_collection("Flood_Data").unwrap();
        assert_eq!(again, handle);
        assert_eq!(platform.call_count(PlatformOp::CreateService), 2);
    }

    #[test]
    fn test_cache_avoids_repeat_searches() {
        let platform = MemoryPlatform::new();
        let mut registry = registry(&platform);

        let first = registry.resolve_collection("Flood_Data").unwrap();
        let second = registry.resolve_collection("Flood_Data").unwrap();

        assert_eq!(first, second);
        assert_eq!(platform.call_count(PlatformOp::Search), 1);
        assert_eq!(registry.cached("Flood_Data"), Some(&first));
    }

    #[test]
    fn test_find_never_creates() {
        let platform = MemoryPlatform::new();
        let mut registry = registry(&platform);

        assert_eq!(registry.find_collection("Flood_Data").unwrap(), None);
        assert_eq!(platform.call_count(PlatformOp::CreateService), 0);

        let created = registry.resolve_collection("Flood_Data").unwrap();
        let mut fresh = CollectionRegistry::new(
            &platform,
            CallPolicy::no_retry(),
            ServiceDefaults::default(),
        );
        assert_eq!(fresh.find_collection("Flood_Data").unwrap(), Some(created));
    }

    #[test]
    fn test_create_failure_is_registry_error_and_not_cached() {
        let platform = MemoryPlatform::new();
        platform.inject_failure(
            PlatformOp::CreateService,
            PlatformError::rejected("quota exceeded"),
        );
        let mut registry = registry(&platform);

        let err = registry.resolve_collection("Flood_Data").unwrap_err();

        assert!(matches!(err, FloodSyncError::Registry { ref name, .. } if name == "Flood_Data"));
        assert!(registry.cached("Flood_Data").is_none());
        // The next attempt goes back to the platform and succeeds.
        assert!(registry.resolve_collection("Flood_Data").is_ok());
    }

    #[test]
    fn test_transient_search_failure_is_retried() {
        let platform = MemoryPlatform::new();
        platform.inject_failure(PlatformOp::Search, PlatformError::transient("503"));
        let policy = CallPolicy::new(
            2,
            std::time::Duration::ZERO,
            std::time::Duration::ZERO,
            std::time::Duration::from_secs(5),
        );
        let mut registry = CollectionRegistry::new(&platform, policy, ServiceDefaults::default());

        assert!(registry.resolve_collection("Flood_Data").is_ok());
        assert_eq!(platform.call_count(PlatformOp::Search), 2);
    }
}
