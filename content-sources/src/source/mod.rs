//! Formes brutes des sources et normaliseurs
//!
//! Chaque source a son propre module : les structures désérialisées depuis
//! sa réponse et la fonction qui les convertit en `CanonicalRecord`.

pub mod blogger;
pub mod tchop;
pub mod wordpress;
pub mod youtube;

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::geocode::GeocodeTable;
use crate::types::{CanonicalRecord, Source};
use crate::SourceError;

/// Enregistrement brut, étiqueté par source
#[derive(Debug, Clone)]
pub enum RawRecord {
    Tchop(tchop::Card),
    YouTube(youtube::SearchResult),
    Blogger(blogger::Post),
    Wordpress(wordpress::Post),
}

impl RawRecord {
    pub fn source(&self) -> Source {
        match self {
            RawRecord::Tchop(_) => Source::Tchop,
            RawRecord::YouTube(_) => Source::YouTube,
            RawRecord::Blogger(_) => Source::Blogger,
            RawRecord::Wordpress(_) => Source::Wordpress,
        }
    }

    /// Identifiant tel que livré par la source
    pub fn post_id(&self) -> String {
        match self {
            RawRecord::Tchop(card) => card.id().to_string(),
            RawRecord::YouTube(item) => item.video_id().unwrap_or_default().to_string(),
            RawRecord::Blogger(post) => post.id.clone(),
            RawRecord::Wordpress(post) => post.id.to_string(),
        }
    }
}

/// Identifiant numérique ou textuel selon la source
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Number(i64),
    Text(String),
}

impl fmt::Display for RawId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawId::Number(n) => write!(f, "{}", n),
            RawId::Text(s) => f.write_str(s),
        }
    }
}

/// Convertit les enregistrements bruts vers le schéma canonique
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    geocodes: GeocodeTable,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table de géocodage utilisée pour les articles du CMS
    pub fn with_geocodes(mut self, geocodes: GeocodeTable) -> Self {
        self.geocodes = geocodes;
        self
    }

    pub fn normalize(&self, raw: &RawRecord) -> Result<CanonicalRecord, SourceError> {
        match raw {
            RawRecord::Tchop(card) => tchop::normalize(card),
            RawRecord::YouTube(item) => youtube::normalize(item),
            RawRecord::Blogger(post) => blogger::normalize(post),
            RawRecord::Wordpress(post) => wordpress::normalize(post, &self.geocodes),
        }
    }
}

/// Enregistrements d'une page, chacun décodé isolément
pub type PageRecords = Vec<Result<RawRecord, SourceError>>;

/// Décode une page brute (JSON) de la source
///
/// Seule l'enveloppe de la page peut faire échouer la page entière ; un
/// enregistrement mal formé n'écarte que lui-même.
pub fn decode_page(source: Source, page: Value) -> Result<PageRecords, SourceError> {
    let records = match source {
        Source::Tchop => tchop::page_records(serde_json::from_value(page)?),
        Source::YouTube => youtube::page_records(serde_json::from_value(page)?),
        Source::Blogger => blogger::page_records(serde_json::from_value(page)?),
        Source::Wordpress => wordpress::page_records(serde_json::from_value(page)?),
    };
    Ok(records)
}

/// Identifiant lu sans décodage typé, pour situer une erreur
pub(crate) fn value_id(value: &Value) -> String {
    let id = match value.get("id") {
        Some(Value::Object(id)) => id.get("videoId"),
        other => other,
    };
    match id {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Décode un enregistrement isolé de la page
pub(crate) fn decode_record<T: DeserializeOwned>(
    source: Source,
    value: Value,
) -> Result<T, SourceError> {
    let post_id = value_id(&value);
    serde_json::from_value(value).map_err(|e| SourceError::Record {
        feed: source,
        post_id,
        reason: e.to_string(),
    })
}

/// `null` lu comme la valeur par défaut du champ
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Retire tout caractère hors ASCII (contrainte de la table en aval)
pub fn strip_non_ascii(text: &str) -> String {
    text.chars().filter(char::is_ascii).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_non_ascii() {
        assert_eq!(strip_non_ascii("Café día"), "Caf da");
        assert_eq!(strip_non_ascii("plain"), "plain");
        assert_eq!(strip_non_ascii("🎉 Launch"), " Launch");
    }

    #[test]
    fn test_raw_id_display() {
        let number: RawId = serde_json::from_str("1234").unwrap();
        let text: RawId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(number.to_string(), "1234");
        assert_eq!(text.to_string(), "abc");
    }

    #[test]
    fn test_value_id() {
        assert_eq!(value_id(&serde_json::json!({"id": 311})), "311");
        assert_eq!(value_id(&serde_json::json!({"id": "q1"})), "q1");
        assert_eq!(value_id(&serde_json::json!({"id": {"videoId": "a1B2"}})), "a1B2");
        assert_eq!(value_id(&serde_json::json!({"title": "x"})), "");
    }

    #[test]
    fn test_malformed_record_is_isolated() {
        let page = serde_json::json!([
            {"id": 1, "date": "2019-04-02T11:45:10"},
            {"id": "not-a-number", "date": "2019-04-02T11:45:10"},
            {"id": 3, "date": "2019-04-02T11:45:10"}
        ]);
        let records = decode_page(Source::Wordpress, page).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].as_ref().unwrap().post_id(), "1");
        assert!(matches!(
            &records[1],
            Err(SourceError::Record { post_id, .. }) if post_id == "not-a-number"
        ));
        assert_eq!(records[2].as_ref().unwrap().post_id(), "3");
    }
}
