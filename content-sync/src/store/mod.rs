//! Magasins en aval : table ordonnée et magasin géographique
//!
//! Le cœur ne connaît que les primitives ci-dessous ; les clients réseau
//! (ou les implémentations fichier de ce module) les fournissent.

pub mod feature;
pub mod table;

use content_sources::TableRow;
use thiserror::Error;

pub use feature::{FeatureEdit, FeatureFilter, FeatureRecord, GeoJsonFeatureStore};
pub use table::CsvTableStore;

/// Modifications gardées en mémoire avant réécriture du fichier
pub const DEFAULT_BATCH_SIZE: usize = 200;

/// Erreurs des magasins
#[derive(Debug, Error)]
pub enum StoreError {
    /// Magasin injoignable ou illisible : le run est abandonné
    #[error("Store connection failed: {0}")]
    Connection(String),

    /// Écriture refusée pour un enregistrement
    #[error("Write failed for post {post_id}: {reason}")]
    Write { post_id: String, reason: String },

    /// Enregistrement attendu mais absent du magasin
    #[error("Not found in store: {key}")]
    NotFound { key: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),
}

impl StoreError {
    pub fn connection(reason: impl Into<String>) -> Self {
        Self::Connection(reason.into())
    }

    pub fn write(post_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Write {
            post_id: post_id.into(),
            reason: reason.into(),
        }
    }

    /// Une erreur fatale interrompt le run ; les autres ne coûtent qu'un enregistrement
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Connection(_))
    }
}

/// Table ordonnée, adressée par position de ligne
#[allow(async_fn_in_trait)]
pub trait TableStore {
    /// Toutes les lignes, dans l'ordre du magasin
    async fn read_all(&self) -> Result<Vec<TableRow>, StoreError>;

    /// Ajoute une ligne en fin de table
    async fn append(&mut self, row: &TableRow) -> Result<(), StoreError>;

    /// Réécrit entièrement la ligne `index`
    async fn update(&mut self, index: usize, row: &TableRow) -> Result<(), StoreError>;

    /// Trie toute la table sur une colonne
    async fn sort(&mut self, column: usize, ascending: bool) -> Result<(), StoreError>;

    /// Écrit les modifications en attente
    async fn flush(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Magasin géographique de features ponctuelles
#[allow(async_fn_in_trait)]
pub trait FeatureStore {
    /// Instantané complet du magasin
    async fn read_all(&self) -> Result<Vec<FeatureRecord>, StoreError>;

    /// Features correspondant au filtre
    async fn query(&self, filter: &FeatureFilter) -> Result<Vec<FeatureRecord>, StoreError>;

    /// Ajoute des features ; renvoie les `objectid` attribués
    async fn add_features(&mut self, features: &[FeatureRecord]) -> Result<Vec<i64>, StoreError>;

    /// Applique des modifications partielles, adressées par `objectid`
    async fn edit_features(&mut self, edits: &[FeatureEdit]) -> Result<(), StoreError>;

    /// Écrit les modifications en attente
    async fn flush(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}
