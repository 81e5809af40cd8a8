//! Schéma canonique commun à toutes les sources
//!
//! Une ligne de la table est positionnelle : les consommateurs en aval
//! dépendent de l'ordre des colonnes, pas de leur nom.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

use crate::SourceError;

/// Noms des colonnes de la table, dans l'ordre positionnel
pub const COLUMNS: [&str; 13] = [
    "origin",
    "post_id",
    "published_date",
    "post_url",
    "title",
    "content",
    "photo_url",
    "video_url",
    "thumb_url",
    "post_type",
    "source",
    "latitude",
    "longitude",
];

/// Nombre de colonnes d'une ligne sans géolocalisation
pub const BASE_COLUMN_COUNT: usize = 11;

/// Nombre de colonnes d'une ligne complète
pub const GEO_COLUMN_COUNT: usize = 13;

/// Index de la colonne `post_id`
pub const POST_ID_COLUMN: usize = 1;

/// Index de la colonne `published_date` (clé de tri globale)
pub const PUBLISHED_DATE_COLUMN: usize = 2;

/// Format de `published_date` dans la table (tri lexicographique = chronologique)
pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Précision des coordonnées géographiques (~1 cm)
pub const COORD_PRECISION: i32 = 7;

/// Source de publication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Source {
    /// Flux de cartes (image, vidéo, citation, article)
    Tchop,
    /// Plateforme vidéo
    YouTube,
    /// API de blog
    Blogger,
    /// CMS auto-hébergé (géocodage exporté à part)
    Wordpress,
}

impl Source {
    /// Toutes les sources, dans l'ordre de traitement
    pub const ALL: [Source; 4] = [
        Source::Tchop,
        Source::YouTube,
        Source::Blogger,
        Source::Wordpress,
    ];

    /// Nom affiché (colonne `source`)
    pub fn name(self) -> &'static str {
        match self {
            Source::Tchop => "Tchop",
            Source::YouTube => "YouTube",
            Source::Blogger => "Blogger",
            Source::Wordpress => "Wordpress",
        }
    }

    /// Retrouve une source depuis son nom affiché
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }

    /// La source fournit-elle des colonnes de géolocalisation ?
    ///
    /// La plateforme vidéo n'a jamais de position : ses lignes s'arrêtent à
    /// la colonne `source`.
    pub fn has_geo_columns(self) -> bool {
        !matches!(self, Source::YouTube)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Normaliseur ayant produit un enregistrement (provenance, pas identité)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Origin(pub Source);

impl Origin {
    /// Libellé de provenance (colonne `origin`)
    pub fn label(self) -> &'static str {
        match self.0 {
            Source::Tchop => "Tchop Download Script",
            Source::YouTube => "YouTube Download Script",
            Source::Blogger => "Blogger Download Script",
            Source::Wordpress => "Wordpress Download Script",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Source::ALL
            .into_iter()
            .map(Origin)
            .find(|o| o.label() == label)
    }
}

/// Type de publication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostType {
    Photo,
    Video,
    Quote,
    Article,
    /// Aucun média identifiable (`no_info`)
    Unknown,
}

impl PostType {
    pub fn label(self) -> &'static str {
        match self {
            PostType::Photo => "photo",
            PostType::Video => "video",
            PostType::Quote => "quote",
            PostType::Article => "article",
            PostType::Unknown => "no_info",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "photo" => Some(PostType::Photo),
            "video" => Some(PostType::Video),
            "quote" => Some(PostType::Quote),
            "article" => Some(PostType::Article),
            "no_info" => Some(PostType::Unknown),
            _ => None,
        }
    }
}

/// Coordonnée WGS84 en degrés
///
/// `(0, 0)` est la sentinelle « pas de position » : elle n'est jamais
/// représentée par une `Coordinate`, seulement par `None`. Un point réellement
/// situé en (0, 0) est donc indiscernable d'une absence de position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Construit une coordonnée arrondie à 7 décimales, `None` pour la sentinelle
    pub fn from_degrees(latitude: f64, longitude: f64) -> Option<Self> {
        if latitude == 0.0 && longitude == 0.0 {
            return None;
        }
        Some(Self {
            latitude: round_to(latitude, COORD_PRECISION),
            longitude: round_to(longitude, COORD_PRECISION),
        })
    }
}

/// Arrondit une valeur à `decimals` décimales
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}

/// Ligne positionnelle de la table (11 ou 13 champs)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct TableRow(Vec<String>);

impl TableRow {
    pub fn new(fields: Vec<String>) -> Self {
        Self(fields)
    }

    pub fn fields(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    /// Identifiant de publication (deuxième colonne)
    pub fn post_id(&self) -> Option<&str> {
        self.get(POST_ID_COLUMN)
    }

    pub fn into_inner(self) -> Vec<String> {
        self.0
    }
}

impl From<Vec<String>> for TableRow {
    fn from(fields: Vec<String>) -> Self {
        Self(fields)
    }
}

/// Enregistrement canonique, un par publication
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    pub origin: Origin,
    /// Unique par source seulement ; jamais préfixé artificiellement
    pub post_id: String,
    pub published_date: DateTime<Utc>,
    pub post_url: String,
    pub title: String,
    pub content: String,
    pub photo_url: String,
    pub video_url: String,
    pub thumb_url: String,
    pub post_type: PostType,
    pub source: Source,
    pub coordinate: Option<Coordinate>,
}

impl CanonicalRecord {
    /// Latitude, 0 pour la sentinelle
    pub fn latitude(&self) -> f64 {
        self.coordinate.map_or(0.0, |c| c.latitude)
    }

    /// Longitude, 0 pour la sentinelle
    pub fn longitude(&self) -> f64 {
        self.coordinate.map_or(0.0, |c| c.longitude)
    }

    /// Date de publication en millisecondes epoch
    pub fn published_millis(&self) -> i64 {
        self.published_date.timestamp_millis()
    }

    /// Convertit en ligne positionnelle
    pub fn to_row(&self) -> TableRow {
        let mut fields = vec![
            self.origin.label().to_string(),
            self.post_id.clone(),
            self.published_date.format(DATE_FORMAT).to_string(),
            self.post_url.clone(),
            self.title.clone(),
            self.content.clone(),
            self.photo_url.clone(),
            self.video_url.clone(),
            self.thumb_url.clone(),
            self.post_type.label().to_string(),
            self.source.name().to_string(),
        ];

        if self.source.has_geo_columns() {
            fields.push(format_degrees(self.coordinate.map(|c| c.latitude)));
            fields.push(format_degrees(self.coordinate.map(|c| c.longitude)));
        }

        TableRow(fields)
    }

    /// Reconstruit un enregistrement depuis une ligne de la table
    pub fn from_row(row: &TableRow) -> Result<Self, SourceError> {
        let len = row.len();
        if len != BASE_COLUMN_COUNT && len < GEO_COLUMN_COUNT {
            return Err(SourceError::invalid_row(format!(
                "expected {} or {} fields, got {}",
                BASE_COLUMN_COUNT, GEO_COLUMN_COUNT, len
            )));
        }

        let field = |idx: usize| row.0[idx].clone();
        let post_id = field(POST_ID_COLUMN);

        let origin = Origin::from_label(&row.0[0]).ok_or_else(|| {
            SourceError::invalid_row(format!("post {}: unknown origin {:?}", post_id, row.0[0]))
        })?;
        let post_type = PostType::from_label(&row.0[9]).ok_or_else(|| {
            SourceError::invalid_row(format!("post {}: unknown type {:?}", post_id, row.0[9]))
        })?;
        let source = Source::from_name(&row.0[10]).ok_or_else(|| {
            SourceError::invalid_row(format!("post {}: unknown source {:?}", post_id, row.0[10]))
        })?;
        let published_date = parse_published_date(&post_id, &row.0[PUBLISHED_DATE_COLUMN])?;

        let coordinate = if len >= GEO_COLUMN_COUNT {
            let latitude = parse_degrees(&post_id, &row.0[11])?;
            let longitude = parse_degrees(&post_id, &row.0[12])?;
            Coordinate::from_degrees(latitude, longitude)
        } else {
            None
        };

        Ok(Self {
            origin,
            post_id,
            published_date,
            post_url: field(3),
            title: field(4),
            content: field(5),
            photo_url: field(6),
            video_url: field(7),
            thumb_url: field(8),
            post_type,
            source,
            coordinate,
        })
    }
}

/// Parse une date de publication source (seuls les 19 premiers caractères comptent)
///
/// Le décalage horaire éventuel est ignoré : l'instant est lu comme UTC.
pub fn parse_published_date(post_id: &str, raw: &str) -> Result<DateTime<Utc>, SourceError> {
    let head = raw
        .get(..19)
        .ok_or_else(|| SourceError::invalid_date(post_id, raw))?;

    NaiveDateTime::parse_from_str(head, DATE_FORMAT)
        .map(|dt| dt.and_utc())
        .map_err(|_| SourceError::invalid_date(post_id, raw))
}

fn format_degrees(value: Option<f64>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "0".to_string(),
    }
}

fn parse_degrees(post_id: &str, raw: &str) -> Result<f64, SourceError> {
    raw.trim().parse::<f64>().map_err(|_| {
        SourceError::invalid_row(format!("post {}: invalid coordinate {:?}", post_id, raw))
    })
}
