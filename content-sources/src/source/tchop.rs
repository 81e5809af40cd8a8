//! Flux de cartes (Tchop)
//!
//! La réponse est une liste de « mixes » contenant chacun des cartes typées.
//! Le texte est réduit à l'ASCII et la position vient du bloc EXIF de
//! l'image ou de la vidéo.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{decode_record, strip_non_ascii, PageRecords, RawId, RawRecord};
use crate::types::{parse_published_date, CanonicalRecord, Coordinate, Origin, PostType, Source};
use crate::SourceError;

/// Regroupement de cartes renvoyé par l'API
#[derive(Debug, Clone, Deserialize)]
pub struct Mix {
    #[serde(default)]
    pub cards: Vec<Value>,
}

/// Carte, étiquetée par son champ `type`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Card {
    Image(ImageCard),
    Video(VideoCard),
    Quote(QuoteCard),
    Article(ArticleCard),
    /// Type de carte non géré
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageCard {
    pub id: RawId,
    pub posted_time: String,
    pub title: Option<String>,
    pub headline: Option<String>,
    pub text: Option<String>,
    pub image: Option<Image>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoCard {
    pub id: RawId,
    pub posted_time: String,
    pub title: Option<String>,
    pub headline: Option<String>,
    pub text: Option<String>,
    pub video: Option<Video>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteCard {
    pub id: RawId,
    pub posted_time: String,
    pub url: Option<String>,
    pub quote_person: Option<String>,
    pub quote: Option<String>,
    pub image: Option<Image>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleCard {
    pub id: RawId,
    pub posted_time: String,
    pub url: Option<String>,
    pub title: Option<String>,
    #[serde(rename = "abstract")]
    pub summary: Option<String>,
    pub image: Option<Image>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Image {
    pub phone: Option<Rendition>,
    #[serde(default)]
    pub exif: Option<Value>,
}

impl Image {
    fn jpg(&self) -> String {
        self.phone
            .as_ref()
            .map(|p| p.jpg.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Rendition {
    #[serde(default)]
    pub jpg: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Video {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub exif: Option<Value>,
}

impl Card {
    /// Identifiant de la carte (vide pour un type non géré)
    pub fn id(&self) -> String {
        match self {
            Card::Image(c) => c.id.to_string(),
            Card::Video(c) => c.id.to_string(),
            Card::Quote(c) => c.id.to_string(),
            Card::Article(c) => c.id.to_string(),
            Card::Other => String::new(),
        }
    }
}

/// Champs extraits d'une carte avant nettoyage
struct CardFields<'a> {
    post_id: String,
    posted_time: &'a str,
    post_type: PostType,
    post_url: String,
    title: String,
    headline: String,
    text: String,
    image_url: String,
    video_url: String,
    exif: Option<&'a Value>,
}

/// Position lue dans le bloc EXIF, seulement s'il contient exactement une entrée
fn exif_coordinate(exif: Option<&Value>) -> Option<Coordinate> {
    let map = exif?.as_object()?;
    if map.len() != 1 {
        return None;
    }
    let gps = map.get("gps")?;
    let latitude = gps.get("latitude")?.as_f64()?;
    let longitude = gps.get("longitude")?.as_f64()?;
    Coordinate::from_degrees(latitude, longitude)
}

fn fields(card: &Card) -> Option<CardFields<'_>> {
    let fields = match card {
        Card::Image(c) => CardFields {
            post_id: c.id.to_string(),
            posted_time: &c.posted_time,
            post_type: PostType::Photo,
            post_url: String::new(),
            title: c.title.clone().unwrap_or_default(),
            headline: c.headline.clone().unwrap_or_default(),
            text: c.text.clone().unwrap_or_default(),
            image_url: c.image.as_ref().map(Image::jpg).unwrap_or_default(),
            video_url: String::new(),
            exif: c.image.as_ref().and_then(|i| i.exif.as_ref()),
        },
        Card::Video(c) => CardFields {
            post_id: c.id.to_string(),
            posted_time: &c.posted_time,
            post_type: PostType::Video,
            post_url: String::new(),
            title: c.title.clone().unwrap_or_default(),
            headline: c.headline.clone().unwrap_or_default(),
            text: c.text.clone().unwrap_or_default(),
            image_url: String::new(),
            video_url: c.video.as_ref().map(|v| v.url.clone()).unwrap_or_default(),
            exif: c.video.as_ref().and_then(|v| v.exif.as_ref()),
        },
        Card::Quote(c) => CardFields {
            post_id: c.id.to_string(),
            posted_time: &c.posted_time,
            post_type: PostType::Quote,
            post_url: c.url.clone().unwrap_or_default(),
            title: String::new(),
            headline: c.quote_person.clone().unwrap_or_default(),
            text: c.quote.clone().unwrap_or_default(),
            image_url: c.image.as_ref().map(Image::jpg).unwrap_or_default(),
            video_url: String::new(),
            exif: c.image.as_ref().and_then(|i| i.exif.as_ref()),
        },
        Card::Article(c) => CardFields {
            post_id: c.id.to_string(),
            posted_time: &c.posted_time,
            post_type: PostType::Article,
            post_url: c.url.clone().unwrap_or_default(),
            title: String::new(),
            headline: c.title.clone().unwrap_or_default(),
            text: c.summary.clone().unwrap_or_default(),
            image_url: c.image.as_ref().map(Image::jpg).unwrap_or_default(),
            video_url: String::new(),
            exif: c.image.as_ref().and_then(|i| i.exif.as_ref()),
        },
        Card::Other => return None,
    };
    Some(fields)
}

/// Normalise une carte
pub fn normalize(card: &Card) -> Result<CanonicalRecord, SourceError> {
    let Some(mut f) = fields(card) else {
        return Err(SourceError::invalid_row("unsupported card type"));
    };

    // Publications courtes : le titre est souvent plus complet que le texte
    if f.title.chars().count() > f.text.chars().count() {
        f.text = std::mem::take(&mut f.title);
    }

    let published_date = parse_published_date(&f.post_id, f.posted_time)?;

    Ok(CanonicalRecord {
        origin: Origin(Source::Tchop),
        post_id: f.post_id,
        published_date,
        post_url: f.post_url,
        title: strip_non_ascii(&f.headline),
        content: strip_non_ascii(&f.text),
        photo_url: f.image_url.clone(),
        video_url: f.video_url,
        thumb_url: f.image_url,
        post_type: f.post_type,
        source: Source::Tchop,
        coordinate: exif_coordinate(f.exif),
    })
}

/// Aplatit une réponse (liste de mixes) en enregistrements bruts
pub fn page_records(mixes: Vec<Mix>) -> PageRecords {
    mixes
        .into_iter()
        .flat_map(|mix| mix.cards)
        .map(|value| decode_record::<Card>(Source::Tchop, value))
        .filter(|card| {
            let known = !matches!(card, Ok(Card::Other));
            if !known {
                debug!("Skipping card of unsupported type");
            }
            known
        })
        .map(|card| card.map(RawRecord::Tchop))
        .collect()
}
