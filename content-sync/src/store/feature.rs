//! Magasin géographique stocké dans un fichier GeoJSON
//!
//! `FeatureCollection` de points en EPSG:3857. Le magasin gère lui-même les
//! attributs d'identité `objectid` (entier séquentiel) et `globalid`. Comme
//! pour la table, le fichier est réécrit par lots.

use std::fmt;
use std::path::{Path, PathBuf};

use geo::Point;
use geojson::{FeatureCollection, GeoJson, Geometry, JsonObject, Value as GeometryValue};
use serde_json::{json, Map, Value};
use tracing::debug;

use super::{FeatureStore, StoreError, DEFAULT_BATCH_SIZE};
use crate::reproject::TARGET_EPSG;

/// Attribut d'identité interne
pub const OBJECT_ID: &str = "objectid";
/// Attribut d'identité globale
pub const GLOBAL_ID: &str = "globalid";
/// Attribut portant la clé naturelle
pub const POST_ID: &str = "post_id";

/// Feature : attributs plus géométrie ponctuelle projetée
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    pub attributes: Map<String, Value>,
    pub geometry: Point<f64>,
}

impl FeatureRecord {
    pub fn new(attributes: Map<String, Value>, geometry: Point<f64>) -> Self {
        Self {
            attributes,
            geometry,
        }
    }

    /// Clé naturelle (`post_id`)
    pub fn post_id(&self) -> Option<&str> {
        self.attributes.get(POST_ID).and_then(Value::as_str)
    }

    /// Identifiant interne attribué par le magasin
    pub fn object_id(&self) -> Option<i64> {
        self.attributes.get(OBJECT_ID).and_then(Value::as_i64)
    }
}

/// Filtre de requête sur le magasin
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureFilter {
    PostIdEquals(String),
}

impl FeatureFilter {
    pub fn matches(&self, feature: &FeatureRecord) -> bool {
        match self {
            FeatureFilter::PostIdEquals(id) => feature.post_id() == Some(id.as_str()),
        }
    }
}

impl fmt::Display for FeatureFilter {
    /// Expression `where` telle qu'un service de features l'attend
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureFilter::PostIdEquals(id) => {
                write!(f, "{}='{}'", POST_ID, id.replace('\'', "''"))
            }
        }
    }
}

/// Modification partielle d'une feature existante
///
/// Seuls les attributs présents et les composantes de géométrie renseignées
/// sont réécrits.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureEdit {
    pub object_id: i64,
    pub attributes: Map<String, Value>,
    pub x: Option<f64>,
    pub y: Option<f64>,
}

impl FeatureEdit {
    pub fn new(object_id: i64) -> Self {
        Self {
            object_id,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.x.is_none() && self.y.is_none()
    }

    fn apply(&self, feature: &mut FeatureRecord) {
        for (name, value) in &self.attributes {
            feature.attributes.insert(name.clone(), value.clone());
        }
        if let Some(x) = self.x {
            feature.geometry.set_x(x);
        }
        if let Some(y) = self.y {
            feature.geometry.set_y(y);
        }
    }
}

/// Magasin de features GeoJSON
#[derive(Debug)]
pub struct GeoJsonFeatureStore {
    path: PathBuf,
    features: Vec<FeatureRecord>,
    next_object_id: i64,
    pending: usize,
    batch_size: usize,
}

impl GeoJsonFeatureStore {
    /// Ouvre le magasin ; un fichier absent est un magasin vide
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let features = match tokio::fs::read_to_string(path).await {
            Ok(content) => parse_features(&content).map_err(|e| {
                StoreError::connection(format!("unreadable feature store {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Feature store not found, starting empty");
                Vec::new()
            }
            Err(e) => {
                return Err(StoreError::connection(format!(
                    "cannot open feature store {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let next_object_id = features
            .iter()
            .filter_map(FeatureRecord::object_id)
            .max()
            .unwrap_or(0)
            + 1;

        debug!(path = %path.display(), features = features.len(), "Feature store opened");

        Ok(Self {
            path: path.to_path_buf(),
            features,
            next_object_id,
            pending: 0,
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }

    /// Nombre de modifications déclenchant une réécriture (au moins 1)
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Modifications pas encore écrites sur disque
    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    async fn persist(&mut self) -> Result<(), StoreError> {
        let written = match serde_json::to_string_pretty(&to_collection(&self.features)) {
            Ok(content) => tokio::fs::write(&self.path, content)
                .await
                .map_err(StoreError::from),
            Err(e) => Err(e.into()),
        };
        written.map_err(|e| {
            StoreError::connection(format!(
                "cannot write feature store {}: {}",
                self.path.display(),
                e
            ))
        })?;

        debug!(path = %self.path.display(), features = self.features.len(), pending = self.pending, "Feature store written");
        self.pending = 0;
        Ok(())
    }

    async fn changed(&mut self, count: usize) -> Result<(), StoreError> {
        self.pending += count;
        if self.pending >= self.batch_size {
            self.persist().await?;
        }
        Ok(())
    }
}

/// GUID déterministe dérivé de la clé et de l'objectid
pub fn global_id(post_id: &str, object_id: i64) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(post_id.as_bytes());
    hasher.update(&object_id.to_le_bytes());
    let hex = hasher.finalize().to_hex();
    let hex = hex.as_str();

    format!(
        "{{{}-{}-{}-{}-{}}}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
    .to_uppercase()
}

fn parse_features(content: &str) -> Result<Vec<FeatureRecord>, StoreError> {
    let geojson: GeoJson = content.parse()?;
    let collection = FeatureCollection::try_from(geojson)?;

    collection
        .features
        .into_iter()
        .map(|feature| {
            let geometry = match feature.geometry.map(|g| g.value) {
                Some(GeometryValue::Point(position)) if position.len() >= 2 => {
                    Point::new(position[0], position[1])
                }
                Some(_) => {
                    return Err(StoreError::connection("non-point geometry in feature store"))
                }
                None => Point::new(0.0, 0.0),
            };
            Ok(FeatureRecord::new(
                feature.properties.unwrap_or_default(),
                geometry,
            ))
        })
        .collect()
}

fn to_collection(features: &[FeatureRecord]) -> FeatureCollection {
    let mut crs = JsonObject::new();
    crs.insert(
        "crs".to_string(),
        json!({
            "type": "name",
            "properties": {"name": format!("urn:ogc:def:crs:EPSG::{}", TARGET_EPSG)}
        }),
    );

    FeatureCollection {
        bbox: None,
        features: features
            .iter()
            .map(|f| geojson::Feature {
                bbox: None,
                geometry: Some(Geometry::new(GeometryValue::Point(vec![
                    f.geometry.x(),
                    f.geometry.y(),
                ]))),
                id: f.object_id().map(|id| geojson::feature::Id::Number(id.into())),
                properties: Some(f.attributes.clone()),
                foreign_members: None,
            })
            .collect(),
        foreign_members: Some(crs),
    }
}

impl FeatureStore for GeoJsonFeatureStore {
    async fn read_all(&self) -> Result<Vec<FeatureRecord>, StoreError> {
        Ok(self.features.clone())
    }

    async fn query(&self, filter: &FeatureFilter) -> Result<Vec<FeatureRecord>, StoreError> {
        debug!(filter = %filter, "Querying features");
        Ok(self
            .features
            .iter()
            .filter(|f| filter.matches(f))
            .cloned()
            .collect())
    }

    async fn add_features(&mut self, features: &[FeatureRecord]) -> Result<Vec<i64>, StoreError> {
        let mut ids = Vec::with_capacity(features.len());

        for feature in features {
            let object_id = self.next_object_id;
            self.next_object_id += 1;

            let mut stored = feature.clone();
            let post_id = stored.post_id().unwrap_or_default().to_string();
            stored.attributes.insert(OBJECT_ID.to_string(), json!(object_id));
            stored
                .attributes
                .insert(GLOBAL_ID.to_string(), json!(global_id(&post_id, object_id)));

            self.features.push(stored);
            ids.push(object_id);
        }

        self.changed(features.len()).await?;
        Ok(ids)
    }

    async fn edit_features(&mut self, edits: &[FeatureEdit]) -> Result<(), StoreError> {
        // Vérifier toutes les cibles avant d'écrire quoi que ce soit
        let mut targets = Vec::with_capacity(edits.len());
        for edit in edits {
            let position = self
                .features
                .iter()
                .position(|f| f.object_id() == Some(edit.object_id))
                .ok_or_else(|| StoreError::NotFound {
                    key: format!("{}={}", OBJECT_ID, edit.object_id),
                })?;
            targets.push(position);
        }

        for (edit, position) in edits.iter().zip(targets) {
            edit.apply(&mut self.features[position]);
        }
        self.changed(edits.len()).await
    }

    async fn flush(&mut self) -> Result<(), StoreError> {
        if self.pending > 0 {
            self.persist().await?;
        }
        Ok(())
    }
}
