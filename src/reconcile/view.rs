// In: src/reconcile/view.rs

//! The view reconciler: one named, filtered view per consumer.
//!
//! The predicate is opaque to the engine and handed to the platform verbatim.
//! Only structural breakage is caught locally (empty text, unbalanced
//! parentheses, an unterminated quote) so that an obviously broken predicate
//! never reaches the platform.

use hashbrown::HashMap;

use crate::error::{FloodSyncError, SyncResult};
use crate::platform::ContentPlatform;
use crate::reconcile::retry::CallPolicy;
use crate::types::{CollectionHandle, ViewDefinition, ViewHandle};

/// A consumer's requested view.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewRequest {
    pub name: String,
    pub predicate: String,
    /// Sublayer names the view exposes.
    pub sublayers: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewAction {
    Created,
    Updated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewOutcome {
    pub handle: ViewHandle,
    pub action: ViewAction,
}

pub struct ViewReconciler<'a> {
    platform: &'a dyn ContentPlatform,
    policy: CallPolicy,
}

impl<'a> ViewReconciler<'a> {
    pub fn new(platform: &'a dyn ContentPlatform, policy: CallPolicy) -> Self {
        Self { platform, policy }
    }

    /// Creates the view named in `request`, or brings an existing one in line
    /// with the request's predicate and sublayers.
    ///
    /// **CONTRACT:** at most one view per name per collection. Calling twice
    /// with different predicates leaves one view carrying the second predicate.
    pub fn reconcile_view(
        &self,
        collection: &CollectionHandle,
        request: &ViewRequest,
    ) -> SyncResult<ViewOutcome> {
        let view_error = |reason: String| FloodSyncError::View {
            view: request.name.clone(),
            reason,
        };

        check_predicate(&request.predicate).map_err(view_error)?;
        if request.sublayers.is_empty() {
            return Err(view_error("no sublayers selected".to_string()));
        }

        let definition = ViewDefinition {
            name: request.name.clone(),
            definition_expression: request.predicate.clone(),
            sublayers: request.sublayers.clone(),
        };

        let views = self
            .policy
            .call("list_views", || self.platform.list_views(collection))
            .map_err(|e| view_error(format!("could not list views: {}", e)))?;
        // Reversed so the earliest view wins if a name was ever duplicated.
        let by_name: HashMap<&str, &ViewHandle> = views
            .iter()
            .rev()
            .map(|view| (view.name.as_str(), view))
            .collect();

        let outcome = match by_name.get(request.name.as_str()) {
            Some(existing) => {
                let handle = self
                    .policy
                    .call("update_view", || self.platform.update_view(existing, &definition))
                    .map_err(|e| view_error(e.to_string()))?;
                ViewOutcome {
                    handle,
                    action: ViewAction::Updated,
                }
            }
            None => {
                let handle = self
                    .policy
                    .call("create_view", || {
                        self.platform.create_view(collection, &definition)
                    })
                    .map_err(|e| view_error(e.to_string()))?;
                ViewOutcome {
                    handle,
                    action: ViewAction::Created,
                }
            }
        };

        log::info!(
            "View '{}' {:?} on '{}' over {} sublayer(s): {}",
            outcome.handle.name,
            outcome.action,
            collection.name,
            outcome.handle.sublayers.len(),
            outcome.handle.definition_expression
        );
        Ok(outcome)
    }
}

/// Rejects predicates that are structurally broken. Anything else passes
/// through untouched; the platform owns the grammar.
pub fn check_predicate(predicate: &str) -> Result<(), String> {
    if predicate.trim().is_empty() {
        return Err("predicate is empty".to_string());
    }

    let mut depth: i32 = 0;
    let mut quote: Option<char> = None;
    for c in predicate.chars() {
        match (quote, c) {
            // SQL escapes a quote by doubling it, which toggles twice.
            (Some(open), c) if c == open => quote = None,
            (Some(_), _) => {}
            (None, '\'') | (None, '"') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => {
                depth -= 1;
                if depth < 0 {
                    return Err("unbalanced ')' in predicate".to_string());
                }
            }
            (None, _) => {}
        }
    }

    if quote.is_some() {
        return Err("unterminated quoted string in predicate".to_string());
    }
    if depth != 0 {
        return Err("unbalanced '(' in predicate".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlatformError;
    use crate::platform::{MemoryPlatform, PlatformOp};
    use crate::reconcile::CollectionRegistry;
    use crate::types::{FieldDef, FieldType, GeometryType, LayerDefinition};

    fn collection_with_years(platform: &MemoryPlatform, years: &[&str]) -> CollectionHandle {
        let mut registry =
            CollectionRegistry::new(platform, CallPolicy::no_retry(), Default::default());
        let collection = registry.resolve_collection("Flood_Data").unwrap();
        for year in years {
            let layer = LayerDefinition {
                name: format!("flood_data_{}", year),
                geometry_type: GeometryType::Polygon,
                fields: vec![FieldDef::new("OBJECTID", FieldType::Oid)],
                features: vec![],
            };
            platform.add_to_definition(&collection, &layer).unwrap();
        }
        collection
    }

    fn request(predicate: &str, sublayers: &[&str]) -> ViewRequest {
        ViewRequest {
            name: "client_a_view".to_string(),
            predicate: predicate.to_string(),
            sublayers: sublayers.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_creates_view_with_predicate_verbatim() {
        let platform = MemoryPlatform::new();
        let collection = collection_with_years(&platform, &["2022", "2023"]);
        let predicate = "location in ('Europe', 'North America')";

        let request = request(predicate, &["flood_data_2022", "flood_data_2023"]);

        let outcome = ViewReconciler::new(&platform, CallPolicy::no_retry())
            .reconcile_view(&collection, &request)
            .unwrap();

        assert_eq!(outcome.action, ViewAction::Created);
        assert_eq!(outcome.handle.definition_expression, predicate);
        assert_eq!(outcome.handle.sublayers.len(), 2);
    }

    #[test]
    fn test_second_call_updates_the_same_view() {
        let platform = MemoryPlatform::new();
        let collection = collection_with_years(&platform, &["2022", "2023"]);
        let reconciler = ViewReconciler::new(&platform, CallPolicy::no_retry());

        let first = reconciler
            .reconcile_view(&collection, &request("year >= 2022", &["flood_data_2022"]))
            .unwrap();
        let second = reconciler
            .reconcile_view(
                &collection,
                &request("year = 2023", &["flood_data_2022", "flood_data_2023"]),
            )
            .unwrap();

        assert_eq!(second.action, ViewAction::Updated);
        assert_eq!(second.handle.id, first.handle.id);
        let views = platform.views(&collection.id);
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].definition_expression, "year = 2023");
        assert_eq!(views[0].sublayers.len(), 2);
    }

    #[test]
    fn test_broken_predicates_never_reach_the_platform() {
        let platform = MemoryPlatform::new();
        let collection = collection_with_years(&platform, &["2022"]);
        let reconciler = ViewReconciler::new(&platform, CallPolicy::no_retry());

        for predicate in ["", "   ", "(year > 2020", "location = 'Europe", "year > 2020)"] {
            let err = reconciler
                .reconcile_view(&collection, &request(predicate, &["flood_data_2022"]))
                .unwrap_err();
            assert_eq!(err.kind(), "ViewError", "predicate {:?}", predicate);
        }
        assert_eq!(platform.call_count(PlatformOp::ListViews), 0);
    }

    #[test]
    fn test_quoted_parentheses_and_doubled_quotes_are_fine() {
        assert!(check_predicate("name = 'a (b'").is_ok());
        assert!(check_predicate("name = 'O''Brien'").is_ok());
        assert!(check_predicate("(year >= 2022 AND year <= 2024)").is_ok());
    }

    #[test]
    fn test_empty_sublayer_selection_is_view_error() {
        let platform = MemoryPlatform::new();
        let collection = collection_with_years(&platform, &[]);

        let err = ViewReconciler::new(&platform, CallPolicy::no_retry())
            .reconcile_view(&collection, &request("1=1", &[]))
            .unwrap_err();

        assert!(matches!(err, FloodSyncError::View { ref view, .. } if view == "client_a_view"));
    }

    #[test]
    fn test_platform_rejection_is_view_error() {
        let platform = MemoryPlatform::new();
        let collection = collection_with_years(&platform, &["2022"]);
        platform.inject_failure(
            PlatformOp::CreateView,
            PlatformError::rejected("Invalid definition expression"),
        );

        let err = ViewReconciler::new(&platform, CallPolicy::no_retry())
            .reconcile_view(&collection, &request("bogus ~~ 1", &["flood_data_2022"]))
            .unwrap_err();

        assert_eq!(err.kind(), "ViewError");
        assert!(err.to_string().contains("Invalid definition expression"));
    }
}
