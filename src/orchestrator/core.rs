// In: src/orchestrator/core.rs

use hashbrown::HashSet;

use crate::config::{ConsumerProfile, SyncConfig};
use crate::error::{FloodSyncError, PlatformError, SyncResult};
use crate::ingest::{decode_features, extract_year};
use crate::orchestrator::cancel::CancellationToken;
use crate::orchestrator::report::{FileReport, ProfileArtifacts, ProfileReport, RunReport};
use crate::platform::{ContentPlatform, ObjectStore, Visualizer};
use crate::reconcile::{
    CallPolicy, CollectionRegistry, SublayerOutcome, SublayerReconciler, ViewReconciler,
    ViewRequest,
};
use crate::types::{CollectionHandle, DashboardRequest, MapRequest, SublayerInfo};

//==================================================================================
// 1. The Orchestrator
//==================================================================================

/// Drives one reconciliation run against the three collaborators.
pub struct Orchestrator<'a> {
    config: &'a SyncConfig,
    store: &'a dyn ObjectStore,
    platform: &'a dyn ContentPlatform,
    visualizer: &'a dyn Visualizer,
    policy: CallPolicy,
    cancel: CancellationToken,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: &'a SyncConfig,
        store: &'a dyn ObjectStore,
        platform: &'a dyn ContentPlatform,
        visualizer: &'a dyn Visualizer,
    ) -> Self {
        Self {
            config,
            store,
            platform,
            visualizer,
            policy: CallPolicy::from_config(&config.call_policy),
            cancel: CancellationToken::new(),
        }
    }

    /// Replaces the default (never-cancelled) token with one the caller holds.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Overrides the call policy derived from the configuration.
    pub fn with_call_policy(mut self, policy: CallPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Runs INGEST, COLLECTION-READY and VIEW-AND-ARTIFACT in order.
    ///
    /// **CONTRACT:** never fails as a whole. Every file and every profile gets
    /// its own `Result` in the returned report; only a collection that cannot
    /// be resolved after ingestion stops the view phase.
    pub fn run(&self) -> RunReport {
        let mut report = RunReport::new();
        let mut registry =
            CollectionRegistry::new(self.platform, self.policy, self.config.service.clone());

        log::info!(
            "\n--- FLOOD SYNC: bucket '{}' → collection '{}' ({} profile(s)) ---",
            self.config.bucket,
            self.config.collection_name,
            self.config.profiles.len()
        );

        // 1. INGEST
        self.ingest_phase(&mut registry, &mut report);
        if report.cancelled {
            return self.finish(report);
        }

        // 2. COLLECTION-READY
        let collection = match self.collection_ready_phase(&mut registry, &mut report) {
            Ok(collection) => collection,
            Err(err) => {
                log::error!("Collection is unavailable, skipping all views: {}", err);
                report.collection_error = Some(err);
                return self.finish(report);
            }
        };

        // 3. VIEW-AND-ARTIFACT
        self.view_phase(&collection, &mut report);
        self.finish(report)
    }

    fn finish(&self, mut report: RunReport) -> RunReport {
        report.finish();
        let summary = report.summary();
        log::info!("--- FLOOD SYNC DONE: {} ---", summary);
        for (profile, url) in report.dashboard_urls() {
            log::info!("  - {}: {}", profile, url);
        }
        report
    }

    fn cancelled_before(&self, unit: &str, report: &mut RunReport) -> bool {
        if self.cancel.is_cancelled() {
            log::warn!("{}", FloodSyncError::Cancelled(unit.to_string()));
            report.cancelled = true;
            return true;
        }
        false
    }

    //==============================================================================
    // 2. Phase 1: Ingest
    //==============================================================================

    fn ingest_phase(&self, registry: &mut CollectionRegistry<'_>, report: &mut RunReport) {
        let listing = self
            .policy
            .call("list_objects", || self.store.list_objects(&self.config.bucket))
            .map_err(|source| FloodSyncError::Storage {
                key: self.config.bucket.clone(),
                source,
            });
        let mut objects = match listing {
            Ok(objects) => objects,
            Err(err) => {
                log::error!("Listing failed, nothing ingested: {}", err);
                report.listing_error = Some(err);
                return;
            }
        };
        objects.sort_by(|a, b| a.key.cmp(&b.key));

        for object in objects {
            if !object.key.ends_with(&self.config.file_suffix) {
                log::debug!(
                    "Ignoring '{}' (suffix is not '{}').",
                    object.key,
                    self.config.file_suffix
                );
                report.ignored_keys.push(object.key);
                continue;
            }
            if self.cancelled_before(&object.key, report) {
                return;
            }

            let result = self.ingest_file(registry, &object.key);
            match &result {
                Ok(outcome) => {
                    log_metric!(
                        "event" = "file_ingested",
                        "key" = &object.key,
                        "sublayer" = &outcome.name,
                        "features" = &outcome.features_written
                    );
                }
                Err(err @ FloodSyncError::MissingYear(_)) => {
                    log::warn!("Skipping '{}': {}", object.key, err);
                }
                Err(err) => {
                    log::error!("Failed to ingest '{}' [{}]: {}", object.key, err.kind(), err);
                }
            }
            report.files.push(FileReport {
                key: object.key,
                result,
            });
        }
    }

    /// extract year → fetch → decode → resolve collection → reconcile sublayer.
    fn ingest_file(
        &self,
        registry: &mut CollectionRegistry<'_>,
        key: &str,
    ) -> SyncResult<SublayerOutcome> {
        let year = extract_year(key).ok_or_else(|| FloodSyncError::MissingYear(key.to_string()))?;
        log::info!("Processing '{}' (year {}).", key, year);

        let bytes = self
            .policy
            .call("fetch_object", || self.store.fetch_object(&self.config.bucket, key))
            .map_err(|source| FloodSyncError::Storage {
                key: key.to_string(),
                source,
            })?;
        let features = decode_features(&bytes)?;
        let collection = registry.resolve_collection(&self.config.collection_name)?;

        SublayerReconciler::new(
            self.platform,
            self.policy,
            self.config.sublayer_prefix.clone(),
            self.config.reingest_mode,
        )
        .reconcile_sublayer(&collection, features, year)
    }

    //==============================================================================
    // 3. Phase 2: Collection Ready
    //==============================================================================

    fn collection_ready_phase(
        &self,
        registry: &mut CollectionRegistry<'_>,
        report: &mut RunReport,
    ) -> SyncResult<CollectionHandle> {
        let name = &self.config.collection_name;
        // The collection only comes into existence through a file that landed.
        let ingested_any = report.files.iter().any(|f| f.result.is_ok());
        let collection = if ingested_any {
            registry.resolve_collection(name)?
        } else {
            registry
                .find_collection(name)?
                .ok_or_else(|| FloodSyncError::Registry {
                    name: name.clone(),
                    source: PlatformError::not_found(
                        "nothing was ingested and no collection exists",
                    ),
                })?
        };
        let sublayers = self
            .policy
            .call("sublayers", || self.platform.sublayers(&collection))
            .map_err(|source| FloodSyncError::Registry {
                name: collection.name.clone(),
                source,
            })?;

        log::info!(
            "Collection '{}' ({}) is ready with {} sublayer(s).",
            collection.name,
            collection.id,
            sublayers.len()
        );
        report.collection = Some(collection.clone());
        report.sublayers = sublayers;
        Ok(collection)
    }

    //==============================================================================
    // 4. Phase 3: Views & Artifacts
    //==============================================================================

    fn view_phase(&self, collection: &CollectionHandle, report: &mut RunReport) {
        let views = ViewReconciler::new(self.platform, self.policy);

        for profile in &self.config.profiles {
            if self.cancelled_before(&profile.name, report) {
                return;
            }

            let selected = self.select_sublayers(profile, &report.sublayers);
            let result = self.process_profile(&views, collection, profile, &selected);
            match &result {
                Ok(artifacts) => log::info!(
                    "Profile '{}' published: {}",
                    profile.name,
                    artifacts.dashboard.url
                ),
                Err(err) => log::error!(
                    "Profile '{}' failed [{}]: {}",
                    profile.name,
                    err.kind(),
                    err
                ),
            }
            report.profiles.push(ProfileReport {
                profile: profile.name.clone(),
                selected_sublayers: selected,
                result,
            });
        }
    }

    /// Sublayer names in persisted order whose year the profile's rule selects.
    /// Names repeated by legacy duplicates are listed once.
    fn select_sublayers(
        &self,
        profile: &ConsumerProfile,
        sublayers: &[SublayerInfo],
    ) -> Vec<String> {
        let mut seen = HashSet::new();
        sublayers
            .iter()
            .filter(|info| profile.subset.matches(self.config.sublayer_year(&info.name)))
            .filter(|info| seen.insert(info.name.as_str()))
            .map(|info| info.name.clone())
            .collect()
    }

    /// View, then map, then dashboard. Artifacts are only requested for a view
    /// that reconciled.
    fn process_profile(
        &self,
        views: &ViewReconciler<'_>,
        collection: &CollectionHandle,
        profile: &ConsumerProfile,
        selected: &[String],
    ) -> SyncResult<ProfileArtifacts> {
        let request = ViewRequest {
            name: profile.view_name.clone(),
            predicate: profile.predicate.clone(),
            sublayers: selected.to_vec(),
        };
        let view = views.reconcile_view(collection, &request)?;

        let tags = vec![
            "flood".to_string(),
            "dashboard".to_string(),
            profile.name.clone(),
        ];
        let map_request = MapRequest {
            title: format!("{} Map", profile.display_title),
            tags: tags.clone(),
        };
        let map = self
            .policy
            .call("build_map", || self.visualizer.build_map(&view.handle, &map_request))
            .map_err(|e| FloodSyncError::Artifact {
                title: map_request.title.clone(),
                reason: e.to_string(),
            })?;

        let dashboard_request = DashboardRequest {
            title: profile.display_title.clone(),
            tags,
        };
        let dashboard = self
            .policy
            .call("build_dashboard", || {
                self.visualizer.build_dashboard(&map, &dashboard_request)
            })
            .map_err(|e| FloodSyncError::Artifact {
                title: dashboard_request.title.clone(),
                reason: e.to_string(),
            })?;

        Ok(ProfileArtifacts {
            view,
            map,
            dashboard,
        })
    }
}
