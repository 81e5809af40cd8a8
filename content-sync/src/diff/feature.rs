//! Différentiel contre le magasin géographique
//!
//! Les attributs sont comparés un à un, hors identité gérée par le magasin ;
//! la géométrie est comparée composante par composante après arrondi. Une
//! mise à jour ne réécrit que ce qui a changé.

use std::collections::HashMap;

use content_sources::types::round_to;
use content_sources::CanonicalRecord;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::report::{StageReport, SyncOutcome};
use crate::reproject::{Projector, ReprojectError, PROJECTED_PRECISION};
use crate::store::feature::{GLOBAL_ID, OBJECT_ID};
use crate::store::{FeatureEdit, FeatureFilter, FeatureRecord, FeatureStore, StoreError};
use crate::sync::SyncError;
use crate::AUDIT_TARGET;

/// Attributs jamais comparés (identité interne et géométrie du service)
const EXCLUDED_ATTRIBUTES: [&str; 3] = [OBJECT_ID, GLOBAL_ID, "SHAPE"];

/// Construit la feature candidate d'un enregistrement canonique
pub fn candidate(
    record: &CanonicalRecord,
    projector: &Projector,
) -> Result<FeatureRecord, ReprojectError> {
    let geometry = projector.project(record.coordinate)?;

    let mut attributes = Map::new();
    attributes.insert("origin".to_string(), json!(record.origin.label()));
    attributes.insert("post_id".to_string(), json!(record.post_id));
    attributes.insert("published_date".to_string(), json!(record.published_millis()));
    attributes.insert("post_url".to_string(), json!(record.post_url));
    attributes.insert("title".to_string(), json!(record.title));
    attributes.insert("content".to_string(), json!(record.content));
    attributes.insert("photo_url".to_string(), json!(record.photo_url));
    attributes.insert("video_url".to_string(), json!(record.video_url));
    attributes.insert("thumb_url".to_string(), json!(record.thumb_url));
    attributes.insert("post_type".to_string(), json!(record.post_type.label()));
    attributes.insert("source".to_string(), json!(record.source.name()));
    attributes.insert("latitude".to_string(), json!(record.latitude()));
    attributes.insert("longitude".to_string(), json!(record.longitude()));

    Ok(FeatureRecord::new(attributes, geometry))
}

/// Modification détectée sur une feature existante
#[derive(Debug, Clone, PartialEq)]
pub enum Modification {
    Attribute { name: String, old: Value, new: Value },
    X { old: f64, new: f64 },
    Y { old: f64, new: f64 },
}

/// Décision pour un enregistrement entrant
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureDecision {
    Add,
    Update(Vec<Modification>),
    Unchanged,
    /// Plusieurs features portent déjà ce `post_id`
    Ambiguous(usize),
}

/// Instantané du magasin, indexé par `post_id`
#[derive(Debug, Clone, Default)]
pub struct FeatureSnapshot {
    by_post_id: HashMap<String, Vec<FeatureRecord>>,
}

impl FeatureSnapshot {
    pub fn new(features: Vec<FeatureRecord>) -> Self {
        let mut by_post_id: HashMap<String, Vec<FeatureRecord>> = HashMap::new();
        for feature in features {
            let Some(post_id) = feature.post_id().map(str::to_string) else {
                continue;
            };
            by_post_id.entry(post_id).or_default().push(feature);
        }
        Self { by_post_id }
    }

    pub fn get(&self, post_id: &str) -> &[FeatureRecord] {
        self.by_post_id.get(post_id).map_or(&[][..], Vec::as_slice)
    }

    /// Nombre de clés distinctes
    pub fn len(&self) -> usize {
        self.by_post_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_post_id.is_empty()
    }
}

fn is_excluded(name: &str) -> bool {
    EXCLUDED_ATTRIBUTES
        .iter()
        .any(|excluded| excluded.eq_ignore_ascii_case(name))
}

/// Égalité de valeurs d'attribut
///
/// Les nombres sont comparés numériquement ; un attribut nul côté magasin
/// équivaut à une chaîne vide.
fn values_equal(old: &Value, new: &Value) -> bool {
    match (old, new) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Null, Value::String(s)) | (Value::String(s), Value::Null) => s.is_empty(),
        _ => old == new,
    }
}

/// Liste les différences entre une feature existante et la candidate
pub fn modifications(existing: &FeatureRecord, candidate: &FeatureRecord) -> Vec<Modification> {
    let mut modifications: Vec<Modification> = candidate
        .attributes
        .iter()
        .filter(|(name, _)| !is_excluded(name))
        .filter_map(|(name, new)| {
            let old = existing.attributes.get(name).unwrap_or(&Value::Null);
            (!values_equal(old, new)).then(|| Modification::Attribute {
                name: name.clone(),
                old: old.clone(),
                new: new.clone(),
            })
        })
        .collect();

    let old_x = round_to(existing.geometry.x(), PROJECTED_PRECISION);
    let old_y = round_to(existing.geometry.y(), PROJECTED_PRECISION);
    let new_x = round_to(candidate.geometry.x(), PROJECTED_PRECISION);
    let new_y = round_to(candidate.geometry.y(), PROJECTED_PRECISION);

    if old_x != new_x {
        modifications.push(Modification::X { old: old_x, new: new_x });
    }
    if old_y != new_y {
        modifications.push(Modification::Y { old: old_y, new: new_y });
    }

    modifications
}

/// Décide de l'action pour une feature candidate
pub fn decide(snapshot: &FeatureSnapshot, candidate: &FeatureRecord) -> FeatureDecision {
    let existing = candidate.post_id().map_or(&[][..], |id| snapshot.get(id));

    match existing {
        [] => FeatureDecision::Add,
        [single] => {
            let modifications = modifications(single, candidate);
            if modifications.is_empty() {
                FeatureDecision::Unchanged
            } else {
                FeatureDecision::Update(modifications)
            }
        }
        several => FeatureDecision::Ambiguous(several.len()),
    }
}

/// Construit la modification partielle à envoyer au magasin
pub fn build_edit(object_id: i64, modifications: &[Modification]) -> FeatureEdit {
    let mut edit = FeatureEdit::new(object_id);
    for modification in modifications {
        match modification {
            Modification::Attribute { name, new, .. } => {
                edit.attributes.insert(name.clone(), new.clone());
            }
            Modification::X { new, .. } => edit.x = Some(*new),
            Modification::Y { new, .. } => edit.y = Some(*new),
        }
    }
    edit
}

/// Relit la feature vivante puis applique les seuls champs modifiés
async fn update_live<S: FeatureStore>(
    store: &mut S,
    post_id: &str,
    modifications: &[Modification],
) -> Result<(), StoreError> {
    let filter = FeatureFilter::PostIdEquals(post_id.to_string());
    let live = store.query(&filter).await?;
    let object_id = live
        .first()
        .and_then(FeatureRecord::object_id)
        .ok_or_else(|| StoreError::NotFound {
            key: filter.to_string(),
        })?;

    store
        .edit_features(&[build_edit(object_id, modifications)])
        .await
}

fn audit(post_id: &str, modification: &Modification) {
    match modification {
        Modification::Attribute { name, old, new } => {
            info!(target: AUDIT_TARGET, post_id, attribute = %name, old = %old, new = %new, "Feature attribute changed")
        }
        Modification::X { old, new } => {
            info!(target: AUDIT_TARGET, post_id, old, new, "Feature x changed")
        }
        Modification::Y { old, new } => {
            info!(target: AUDIT_TARGET, post_id, old, new, "Feature y changed")
        }
    }
}

/// Applique la décision pour un enregistrement
///
/// Une écriture refusée est comptée dans l'étape ; une erreur fatale du
/// magasin ou une coordonnée non projetable interrompt le run.
pub async fn apply<S: FeatureStore>(
    store: &mut S,
    snapshot: &FeatureSnapshot,
    record: &CanonicalRecord,
    projector: &Projector,
    stage: &mut StageReport,
) -> Result<(), SyncError> {
    let candidate = candidate(record, projector)?;
    let post_id = record.post_id.as_str();

    let result = match decide(snapshot, &candidate) {
        FeatureDecision::Add => store.add_features(&[candidate]).await.map(|ids| {
            info!(target: AUDIT_TARGET, post_id, objectid = ?ids.first(), "Feature added");
            SyncOutcome::Added
        }),
        FeatureDecision::Update(modifications) => {
            update_live(store, post_id, &modifications).await.map(|_| {
                for modification in &modifications {
                    audit(post_id, modification);
                }
                debug!(post_id, changes = modifications.len(), "Feature updated");
                SyncOutcome::Updated
            })
        }
        FeatureDecision::Unchanged => Ok(SyncOutcome::Unchanged),
        FeatureDecision::Ambiguous(count) => {
            warn!(post_id, count, "Several features share this post_id, skipping record");
            stage.record_error(
                Some(post_id),
                format!("{} features share post_id {}", count, post_id),
            );
            return Ok(());
        }
    };

    match result {
        Ok(outcome) => stage.record(outcome),
        Err(e) if e.is_fatal() => return Err(e.into()),
        Err(e) => {
            warn!(post_id, error = %e, "Feature write failed, skipping record");
            stage.record_error(Some(post_id), e.to_string());
        }
    }
    Ok(())
}
