//! Types d'erreurs pour le crate content-sources

use thiserror::Error;

use crate::types::Source;

/// Erreurs pouvant survenir lors de la lecture ou de la normalisation des sources
#[derive(Debug, Error)]
pub enum SourceError {
    /// Erreur d'I/O lors de la lecture d'un dump ou d'un export
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON invalide
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV invalide (table de géocodage)
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Date de publication illisible
    #[error("Invalid published date for post {post_id}: {value:?}")]
    InvalidDate { post_id: String, value: String },

    /// Article CMS sans image dans son contenu
    #[error("No <img> found in content of post {post_id}")]
    MissingImage { post_id: String },

    /// Ligne de table non convertible en enregistrement canonique
    #[error("Invalid table row: {0}")]
    InvalidRow(String),

    /// Enregistrement mal formé ; les autres enregistrements de la page restent lus
    #[error("Malformed {feed} record {post_id:?}: {reason}")]
    Record {
        feed: Source,
        post_id: String,
        reason: String,
    },

    /// Page non exploitable renvoyée par un collaborateur de pagination
    #[error("Page error for {feed}: {reason}")]
    Page { feed: Source, reason: String },
}

impl SourceError {
    /// Crée une erreur de date avec contexte
    pub fn invalid_date(post_id: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidDate {
            post_id: post_id.into(),
            value: value.into(),
        }
    }

    /// Publication concernée, quand elle est identifiable
    pub fn post_id(&self) -> Option<&str> {
        match self {
            Self::InvalidDate { post_id, .. }
            | Self::MissingImage { post_id }
            | Self::Record { post_id, .. } => Some(post_id.as_str()).filter(|id| !id.is_empty()),
            _ => None,
        }
    }

    /// L'erreur met-elle fin à la lecture de la source ?
    pub fn ends_source(&self) -> bool {
        matches!(self, Self::Page { .. })
    }

    /// Crée une erreur de ligne invalide
    pub fn invalid_row(reason: impl Into<String>) -> Self {
        Self::InvalidRow(reason.into())
    }
}
