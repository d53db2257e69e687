// In: src/reconcile/sublayer.rs

//! The sublayer reconciler: merges one year's decoded features into the
//! collection.
//!
//! The reconciler reads the collection's current sublayer names before
//! writing, and branches:
//!
//! 1. **Absent:** add a new sublayer to the collection's definition.
//! 2. **Present, `Replace`:** swap the stored features for the new payload and
//!    keep the stored schema, widening it with any new fields.
//! 3. **Present, `Append`:** keep the stored features and append the new ones,
//!    renumbering their identifiers after the stored maximum.
//!
//! Re-running ingestion with the same files therefore converges on one
//! sublayer per year instead of stacking duplicates.

use hashbrown::HashMap;
use serde_json::Value;

use crate::error::{FloodSyncError, SyncResult};
use crate::platform::ContentPlatform;
use crate::reconcile::retry::CallPolicy;
use crate::types::{
    CollectionHandle, FeatureCollection, FeatureWriteMode, FieldDef, FieldType, GeometryType,
    LayerDefinition, SublayerInfo, SublayerUpdate, OBJECT_ID_FIELD,
};

/// Attribute stamped on features that do not carry their own year.
pub const YEAR_FIELD: &str = "year";

/// What the reconciler did to the sublayer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SublayerAction {
    Created,
    Replaced,
    Appended,
}

/// The result of reconciling one file.
#[derive(Debug, Clone, PartialEq)]
pub struct SublayerOutcome {
    pub name: String,
    pub index: u32,
    pub action: SublayerAction,
    /// Features written by this reconciliation.
    pub features_written: usize,
    /// Features stored in the sublayer afterwards.
    pub feature_count: usize,
}

pub struct SublayerReconciler<'a> {
    platform: &'a dyn ContentPlatform,
    policy: CallPolicy,
    prefix: String,
    mode: FeatureWriteMode,
}

impl<'a> SublayerReconciler<'a> {
    pub fn new(
        platform: &'a dyn ContentPlatform,
        policy: CallPolicy,
        prefix: impl Into<String>,
        mode: FeatureWriteMode,
    ) -> Self {
        Self {
            platform,
            policy,
            prefix: prefix.into(),
            mode,
        }
    }

    pub fn sublayer_name(&self, year_key: &str) -> String {
        format!("{}{}", self.prefix, year_key)
    }

    /// Merges `features` into the sublayer keyed by `year_key`.
    pub fn reconcile_sublayer(
        &self,
        collection: &CollectionHandle,
        mut features: FeatureCollection,
        year_key: &str,
    ) -> SyncResult<SublayerOutcome> {
        let name = self.sublayer_name(year_key);
        let schema_error = |reason: String| FloodSyncError::SchemaUpdate {
            sublayer: name.clone(),
            reason,
        };

        // 1. Index the current sublayers by name.
        let current = self
            .policy
            .call("sublayers", || self.platform.sublayers(collection))
            .map_err(|e| schema_error(format!("could not list sublayers: {}", e)))?;
        let by_name = index_by_name(&current);

        // 2. Make the year filterable, then derive the schema from the payload.
        let stored_year_field = by_name.get(name.as_str()).and_then(|info| {
            info.fields
                .iter()
                .find(|f| f.name.eq_ignore_ascii_case(YEAR_FIELD))
                .map(|f| f.name.as_str())
        });
        stamp_year(&mut features, year_key, stored_year_field);
        let fields = infer_schema(&features).map_err(schema_error)?;

        // 3. Branch on presence.
        let outcome = match by_name.get(name.as_str()) {
            None => {
                let layer = LayerDefinition {
                    name: name.clone(),
                    geometry_type: GeometryType::Polygon,
                    fields,
                    features: features.features,
                };
                let info = self
                    .policy
                    .call("add_to_definition", || {
                        self.platform.add_to_definition(collection, &layer)
                    })
                    .map_err(|e| schema_error(e.to_string()))?;
                SublayerOutcome {
                    name: name.clone(),
                    index: info.index,
                    action: SublayerAction::Created,
                    features_written: layer.features.len(),
                    feature_count: info.feature_count,
                }
            }
            Some(existing) => {
                let added_fields = fields_to_add(existing, &fields).map_err(schema_error)?;
                if self.mode == FeatureWriteMode::Append {
                    features.renumber_from(existing.max_object_id + 1);
                }
                let update = SublayerUpdate {
                    name: name.clone(),
                    added_fields,
                    features: features.features,
                    mode: self.mode,
                };
                let info = self
                    .policy
                    .call("update_sublayer", || {
                        self.platform.update_sublayer(collection, &update)
                    })
                    .map_err(|e| schema_error(e.to_string()))?;
                SublayerOutcome {
                    name: name.clone(),
                    index: info.index,
                    action: match self.mode {
                        FeatureWriteMode::Replace => SublayerAction::Replaced,
                        FeatureWriteMode::Append => SublayerAction::Appended,
                    },
                    features_written: update.features.len(),
                    feature_count: info.feature_count,
                }
            }
        };

        log::info!(
            "Sublayer {} {:?} in '{}' ({} features written, {} stored).",
            outcome.name,
            outcome.action,
            collection.name,
            outcome.features_written,
            outcome.feature_count
        );
        Ok(outcome)
    }
}

/// Indexes sublayers by name. With duplicate names left behind by older runs
/// the first one in persisted order wins.
fn index_by_name(sublayers: &[SublayerInfo]) -> HashMap<&str, &SublayerInfo> {
    let mut by_name = HashMap::with_capacity(sublayers.len());
    for info in sublayers {
        if by_name.contains_key(info.name.as_str()) {
            log::warn!(
                "Sublayer name '{}' appears more than once (index {}); using the first.",
                info.name,
                info.index
            );
            continue;
        }
        by_name.insert(info.name.as_str(), info);
    }
    by_name
}

/// Adds the file's year as an integer attribute where a feature has none.
///
/// The attribute is written under the spelling the payload already uses for
/// its year column (`Year`, `YEAR`, ...), then the stored sublayer's spelling,
/// and only then `year`.
fn stamp_year(features: &mut FeatureCollection, year_key: &str, stored_field: Option<&str>) {
    let Ok(year) = year_key.parse::<u16>() else {
        return;
    };
    let field = features
        .features
        .iter()
        .flat_map(|f| f.attributes.keys())
        .find(|name| name.eq_ignore_ascii_case(YEAR_FIELD))
        .cloned()
        .or_else(|| stored_field.map(str::to_string))
        .unwrap_or_else(|| YEAR_FIELD.to_string());

    for feature in &mut features.features {
        let missing = matches!(feature.attributes.get(&field), None | Some(Value::Null));
        if missing {
            feature.attributes.insert(field.clone(), Value::from(year));
        }
    }
}

/// Infers the sublayer schema: the identifier field first, then attribute
/// fields in first-seen order across features. Within one feature, attributes
/// are visited in name order.
pub fn infer_schema(features: &FeatureCollection) -> Result<Vec<FieldDef>, String> {
    let mut order: Vec<String> = Vec::new();
    let mut types: HashMap<String, Option<FieldType>> = HashMap::new();
    let mut folded: HashMap<String, String> = HashMap::new();

    for feature in &features.features {
        for (name, value) in &feature.attributes {
            if name.trim().is_empty() {
                return Err("attribute field with an empty name".to_string());
            }
            if name.eq_ignore_ascii_case(OBJECT_ID_FIELD) {
                return Err(format!(
                    "attribute '{}' collides with the identifier field",
                    name
                ));
            }
            let key = name.to_ascii_lowercase();
            match folded.get(&key) {
                Some(seen) if seen != name => {
                    return Err(format!(
                        "attribute names '{}' and '{}' differ only in case",
                        seen, name
                    ))
                }
                Some(_) => {}
                None => {
                    folded.insert(key, name.clone());
                    order.push(name.clone());
                }
            }

            let slot = types.entry(name.clone()).or_insert(None);
            if let Some(inferred) = FieldType::infer(value) {
                *slot = Some(match *slot {
                    Some(current) => current.widen(inferred),
                    None => inferred,
                });
            }
        }
    }

    let mut fields = Vec::with_capacity(order.len() + 1);
    fields.push(FieldDef::new(OBJECT_ID_FIELD, FieldType::Oid));
    for name in order {
        let field_type = types.get(&name).copied().flatten().unwrap_or(FieldType::String);
        fields.push(FieldDef::new(name, field_type));
    }
    Ok(fields)
}

/// Fields of `incoming` that the stored schema lacks. Fails when a stored field
/// cannot hold the incoming values.
fn fields_to_add(existing: &SublayerInfo, incoming: &[FieldDef]) -> Result<Vec<FieldDef>, String> {
    let mut added = Vec::new();
    for field in incoming.iter().filter(|f| f.field_type != FieldType::Oid) {
        match existing
            .fields
            .iter()
            .find(|stored| stored.name.eq_ignore_ascii_case(&field.name))
        {
            Some(stored) if stored.field_type.accepts(field.field_type) => {}
            Some(stored) => {
                return Err(format!(
                    "field '{}' is stored as {} but the new data is {}",
                    stored.name, stored.field_type, field.field_type
                ))
            }
            None => added.push(field.clone()),
        }
    }
    Ok(added)
}
