// In: src/orchestrator_tests.rs

use std::time::Duration;

use serde_json::json;

use crate::config::{ConsumerProfile, SubsetRule, SyncConfig};
use crate::error::{FloodSyncError, PlatformError};
use crate::orchestrator::{CancellationToken, Orchestrator, RunReport};
use crate::platform::{
    ContentPlatform, MemoryObjectStore, MemoryPlatform, MemoryVisualizer, ObjectStore,
    ObjectSummary, PlatformOp,
};
use crate::reconcile::{CallPolicy, SublayerAction, ViewAction};

const BUCKET: &str = "flood-data-bucket";

// Test Helpers

fn profile(name: &str, predicate: &str, subset: SubsetRule) -> ConsumerProfile {
    ConsumerProfile {
        name: name.to_string(),
        contact_email: format!("{}@example.com", name.to_lowercase()),
        view_name: format!("{}_view", name.to_lowercase()),
        predicate: predicate.to_string(),
        display_title: format!("{} Flood Dashboard", name),
        subset,
    }
}

/// Two profiles, `.geo` inputs.
fn scenario_config() -> SyncConfig {
    SyncConfig {
        file_suffix: ".geo".to_string(),
        profiles: vec![
            profile(
                "All",
                "location in ('Europe','North America')",
                SubsetRule::All,
            ),
            profile(
                "Recent",
                "year >= 2022 AND year <= 2024",
                SubsetRule::Years {
                    years: vec![2022, 2023],
                },
            ),
        ],
        ..SyncConfig::default()
    }
}

fn flood_file(locations: &[&str]) -> Vec<u8> {
    let features: Vec<_> = locations
        .iter()
        .map(|location| {
            json!({
                "type": "Feature",
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]
                },
                "properties": {"location": location, "depth_m": 1.5}
            })
        })
        .collect();
    serde_json::to_vec(&json!({"type": "FeatureCollection", "features": features})).unwrap()
}

struct Harness {
    store: MemoryObjectStore,
    platform: MemoryPlatform,
    visualizer: MemoryVisualizer,
}

impl Harness {
    fn new(files: &[(&str, Vec<u8>)]) -> Self {
        let store = MemoryObjectStore::new();
        for (key, bytes) in files {
            store.put(BUCKET, key, bytes.clone());
        }
        Self {
            store,
            platform: MemoryPlatform::new(),
            visualizer: MemoryVisualizer::new("https://maps.example.org"),
        }
    }

    fn run(&self, config: &SyncConfig) -> RunReport {
        Orchestrator::new(config, &self.store, &self.platform, &self.visualizer)
            .with_call_policy(CallPolicy::no_retry())
            .run()
    }

    fn sublayer_names(&self, report: &RunReport) -> Vec<String> {
        let collection = report.collection.as_ref().expect("collection resolved");
        self.platform
            .sublayers(collection)
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect()
    }
}

//==================================================================================
// End-to-end
//==================================================================================

#[test]
fn test_two_files_two_profiles_end_to_end() {
    // Arrange
    let harness = Harness::new(&[
        ("flood_2022.geo", flood_file(&["Europe", "Asia"])),
        ("flood_2023.geo", flood_file(&["North America"])),
    ]);
    let config = scenario_config();

    // Act
    let report = harness.run(&config);

    // Assert
    assert!(report.is_clean(), "{:?}", report);
    assert_eq!(harness.platform.service_count("Flood_Data"), 1);
    assert_eq!(
        harness.sublayer_names(&report),
        vec!["flood_data_2022", "flood_data_2023"]
    );

    let views = harness
        .platform
        .views(&report.collection.as_ref().unwrap().id);
    assert_eq!(views.len(), 2);
    assert_eq!(views[0].name, "all_view");
    assert_eq!(
        views[0].definition_expression,
        "location in ('Europe','North America')"
    );
    assert_eq!(views[0].sublayers, vec!["flood_data_2022", "flood_data_2023"]);
    assert_eq!(views[1].name, "recent_view");
    assert_eq!(views[1].sublayers, vec!["flood_data_2022", "flood_data_2023"]);

    let urls = report.dashboard_urls();
    assert_eq!(urls.len(), 2);
    assert_eq!(urls[0].0, "All");
    assert!(urls[0].1.starts_with("https://maps.example.org/apps/dashboards/"));

    let maps = harness.visualizer.maps();
    assert_eq!(maps[0].title, "All Flood Dashboard Map");
    assert_eq!(maps[1].title, "Recent Flood Dashboard Map");
}

#[test]
fn test_year_subset_selects_by_name_not_position() {
    let harness = Harness::new(&[
        ("flood_2021.geo", flood_file(&["Europe"])),
        ("flood_2022.geo", flood_file(&["Europe"])),
        ("flood_2023.geo", flood_file(&["Europe"])),
    ]);

    let report = harness.run(&scenario_config());

    let recent = report.profile("Recent").unwrap();
    assert_eq!(
        recent.selected_sublayers,
        vec!["flood_data_2022", "flood_data_2023"]
    );
    let all = report.profile("All").unwrap();
    assert_eq!(all.selected_sublayers.len(), 3);
}

//==================================================================================
// Partial failure & skips
//==================================================================================

#[test]
fn test_corrupt_second_file_does_not_stop_the_run() {
    let harness = Harness::new(&[
        ("flood_2021.geo", flood_file(&["Europe"])),
        ("flood_2022.geo", br#"{"type": "FeatureCollection", "features": ["#.to_vec()),
        ("flood_2023.geo", flood_file(&["Asia"])),
    ]);

    let report = harness.run(&scenario_config());

    assert_eq!(report.files.len(), 3);
    assert!(report.file("flood_2021.geo").unwrap().result.is_ok());
    assert!(matches!(
        report.file("flood_2022.geo").unwrap().result,
        Err(FloodSyncError::Decode(_))
    ));
    assert!(report.file("flood_2023.geo").unwrap().result.is_ok());
    assert_eq!(
        harness.sublayer_names(&report),
        vec!["flood_data_2021", "flood_data_2023"]
    );
    // Views are still derived from what did land.
    assert_eq!(report.dashboard_urls().len(), 2);
    assert_eq!(report.summary().files_failed, 1);
}

#[test]
fn test_files_without_year_or_suffix_are_skipped() {
    let harness = Harness::new(&[
        ("flood_latest.geo", flood_file(&["Europe"])),
        ("flood_2022.geo", flood_file(&["Europe"])),
        ("README.txt", b"notes".to_vec()),
    ]);

    let report = harness.run(&scenario_config());

    let skipped = report.file("flood_latest.geo").unwrap();
    assert!(skipped.is_skipped());
    assert_eq!(report.ignored_keys, vec!["README.txt"]);
    assert_eq!(report.summary().files_skipped, 1);
    assert_eq!(harness.sublayer_names(&report), vec!["flood_data_2022"]);
    // The skipped file was never fetched.
    assert_eq!(harness.store.call_count(PlatformOp::FetchObject), 1);
}

#[test]
fn test_transient_fetch_failure_is_retried() {
    let harness = Harness::new(&[("flood_2022.geo", flood_file(&["Europe"]))]);
    harness
        .store
        .inject_failure(PlatformOp::FetchObject, PlatformError::transient("throttled"));
    let config = scenario_config();
    let policy = CallPolicy::new(3, Duration::ZERO, Duration::ZERO, Duration::from_secs(30));

    let report = Orchestrator::new(&config, &harness.store, &harness.platform, &harness.visualizer)
        .with_call_policy(policy)
        .run();

    assert!(report.file("flood_2022.geo").unwrap().result.is_ok());
    assert_eq!(harness.store.call_count(PlatformOp::FetchObject), 2);
}

//==================================================================================
// Idempotence
//==================================================================================

#[test]
fn test_second_run_converges_instead_of_duplicating() {
    let harness = Harness::new(&[
        ("flood_2022.geo", flood_file(&["Europe", "Asia"])),
        ("flood_2023.geo", flood_file(&["North America"])),
    ]);
    let config = scenario_config();

    let first = harness.run(&config);
    let second = harness.run(&config);

    assert_eq!(harness.platform.service_count("Flood_Data"), 1);
    assert_eq!(
        harness.sublayer_names(&second),
        vec!["flood_data_2022", "flood_data_2023"]
    );
    assert_eq!(first.collection, second.collection);
    for file in &second.files {
        assert_eq!(file.result.as_ref().unwrap().action, SublayerAction::Replaced);
    }
    for profile in &second.profiles {
        assert_eq!(
            profile.result.as_ref().unwrap().view.action,
            ViewAction::Updated
        );
    }
    let collection_id = &second.collection.as_ref().unwrap().id;
    assert_eq!(harness.platform.views(collection_id).len(), 2);
    let features = harness
        .platform
        .features(collection_id, "flood_data_2022")
        .unwrap();
    assert_eq!(features.len(), 2);
}

//==================================================================================
// Fatal and per-profile failures
//==================================================================================

#[test]
fn test_registry_failure_aborts_views_but_reports_files() {
    let harness = Harness::new(&[
        ("flood_2022.geo", flood_file(&["Europe"])),
        ("flood_2023.geo", flood_file(&["Asia"])),
    ]);
    // One rejection per resolve attempt: two files plus the collection-ready phase.
    for _ in 0..3 {
        harness
            .platform
            .inject_failure(PlatformOp::Search, PlatformError::rejected("portal offline"));
    }

    let report = harness.run(&scenario_config());

    assert_eq!(report.files.len(), 2);
    for file in &report.files {
        assert_eq!(file.result.as_ref().unwrap_err().kind(), "RegistryError");
    }
    assert!(matches!(
        report.collection_error,
        Some(FloodSyncError::Registry { .. })
    ));
    assert!(report.profiles.is_empty());
    assert!(harness.visualizer.maps().is_empty());
}

#[test]
fn test_nothing_ingested_never_creates_the_collection() {
    // Arrange: the bucket does not exist, so listing fails.
    let harness = Harness::new(&[]);

    // Act
    let report = harness.run(&scenario_config());

    // Assert
    assert!(matches!(
        report.listing_error,
        Some(FloodSyncError::Storage { .. })
    ));
    assert_eq!(harness.platform.call_count(PlatformOp::CreateService), 0);
    assert!(report.collection.is_none());
    assert_eq!(
        report.collection_error.as_ref().map(|e| e.kind()),
        Some("RegistryError")
    );
    assert!(report.profiles.is_empty());
}

#[test]
fn test_only_failed_files_never_create_the_collection() {
    let harness = Harness::new(&[
        ("flood_2022.geo", b"not json".to_vec()),
        ("flood_latest.geo", flood_file(&["Europe"])),
    ]);

    let report = harness.run(&scenario_config());

    assert_eq!(harness.platform.call_count(PlatformOp::CreateService), 0);
    assert!(report.collection_error.is_some());
    assert!(harness.visualizer.maps().is_empty());
}

#[test]
fn test_nothing_ingested_still_refreshes_views_of_an_existing_collection() {
    let harness = Harness::new(&[("flood_2022.geo", flood_file(&["Europe"]))]);
    let config = scenario_config();
    let first = harness.run(&config);

    // The next run finds an empty bucket but the collection is already there.
    let empty = Harness {
        store: MemoryObjectStore::new(),
        platform: harness.platform,
        visualizer: harness.visualizer,
    };
    empty.store.put(BUCKET, "README.txt", b"notes".to_vec());
    let second = empty.run(&config);

    assert_eq!(second.collection, first.collection);
    assert_eq!(empty.platform.call_count(PlatformOp::CreateService), 1);
    assert_eq!(second.dashboard_urls().len(), 2);
}

#[test]
fn test_view_error_skips_that_profiles_artifacts_only() {
    let harness = Harness::new(&[("flood_2022.geo", flood_file(&["Europe"]))]);
    let mut config = scenario_config();
    config.profiles[0].predicate = "(location = 'Europe'".to_string();

    let report = harness.run(&config);

    let broken = report.profile("All").unwrap();
    assert!(matches!(broken.result, Err(FloodSyncError::View { .. })));
    assert!(report.profile("Recent").unwrap().result.is_ok());
    assert_eq!(harness.visualizer.maps().len(), 1);
    assert_eq!(harness.visualizer.dashboards().len(), 1);
}

#[test]
fn test_map_failure_is_artifact_error_and_skips_dashboard() {
    let harness = Harness::new(&[("flood_2022.geo", flood_file(&["Europe"]))]);
    harness
        .visualizer
        .inject_failure(PlatformOp::BuildMap, PlatformError::rejected("renderer down"));

    let report = harness.run(&scenario_config());

    let failed = report.profile("All").unwrap();
    assert_eq!(failed.result.as_ref().unwrap_err().kind(), "ArtifactError");
    assert_eq!(harness.visualizer.dashboards().len(), 1);
    assert_eq!(report.dashboard_urls().len(), 1);
}

//==================================================================================
// Cancellation
//==================================================================================

/// Cancels the run as soon as the first object has been fetched.
struct CancelAfterFirstFetch<'a> {
    inner: &'a MemoryObjectStore,
    token: CancellationToken,
}

impl ObjectStore for CancelAfterFirstFetch<'_> {
    fn list_objects(&self, bucket: &str) -> Result<Vec<ObjectSummary>, PlatformError> {
        self.inner.list_objects(bucket)
    }

    fn fetch_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, PlatformError> {
        let bytes = self.inner.fetch_object(bucket, key);
        self.token.cancel();
        bytes
    }
}

#[test]
fn test_cancellation_finishes_current_file_then_stops() {
    let harness = Harness::new(&[
        ("flood_2022.geo", flood_file(&["Europe"])),
        ("flood_2023.geo", flood_file(&["Asia"])),
    ]);
    let token = CancellationToken::new();
    let store = CancelAfterFirstFetch {
        inner: &harness.store,
        token: token.clone(),
    };
    let config = scenario_config();

    let report = Orchestrator::new(&config, &store, &harness.platform, &harness.visualizer)
        .with_call_policy(CallPolicy::no_retry())
        .with_cancellation(token)
        .run();

    assert!(report.cancelled);
    assert_eq!(report.files.len(), 1);
    assert!(report.files[0].result.is_ok());
    assert!(report.profiles.is_empty());
    assert!(report.summary().to_string().ends_with("CANCELLED"));
}

#[test]
fn test_cancelled_before_start_touches_nothing() {
    let harness = Harness::new(&[("flood_2022.geo", flood_file(&["Europe"]))]);
    let token = CancellationToken::new();
    token.cancel();
    let config = scenario_config();

    let report = Orchestrator::new(&config, &harness.store, &harness.platform, &harness.visualizer)
        .with_cancellation(token)
        .run();

    assert!(report.cancelled);
    assert!(report.files.is_empty());
    assert_eq!(harness.platform.call_count(PlatformOp::CreateService), 0);
}
