//! Plateforme vidéo (YouTube)
//!
//! Aucune position n'est jamais disponible : les lignes produites n'ont pas
//! de colonnes de géolocalisation.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{decode_record, nullable, PageRecords, RawRecord};
use crate::types::{parse_published_date, CanonicalRecord, Origin, PostType, Source};
use crate::SourceError;

/// Page de résultats de recherche
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchListResponse {
    #[serde(default)]
    pub items: Vec<Value>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResult {
    pub id: ResourceId,
    pub snippet: Snippet,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceId {
    pub video_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    pub published_at: String,
    #[serde(default, deserialize_with = "nullable")]
    pub title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub description: String,
    #[serde(default)]
    pub thumbnails: Thumbnails,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Thumbnails {
    pub medium: Option<Thumbnail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Thumbnail {
    pub url: String,
}

impl SearchResult {
    pub fn video_id(&self) -> Option<&str> {
        self.id.video_id.as_deref()
    }
}

/// Normalise un résultat de recherche vidéo
pub fn normalize(item: &SearchResult) -> Result<CanonicalRecord, SourceError> {
    let video_id = item
        .video_id()
        .ok_or_else(|| SourceError::invalid_row("search result without videoId"))?;

    let published_date = parse_published_date(video_id, &item.snippet.published_at)?;
    let thumb_url = item
        .snippet
        .thumbnails
        .medium
        .as_ref()
        .map(|t| t.url.clone())
        .unwrap_or_default();

    Ok(CanonicalRecord {
        origin: Origin(Source::YouTube),
        post_id: video_id.to_string(),
        published_date,
        post_url: format!("https://www.youtube.com/watch?v={}", video_id),
        title: item.snippet.title.clone(),
        content: item.snippet.description.clone(),
        photo_url: String::new(),
        video_url: format!("https://www.youtube.com/embed/{}?wmode=opaque#isVideo", video_id),
        thumb_url,
        post_type: PostType::Video,
        source: Source::YouTube,
        coordinate: None,
    })
}

/// Enregistrements d'une page ; les résultats qui ne sont pas des vidéos sont ignorés
pub fn page_records(page: SearchListResponse) -> PageRecords {
    page.items
        .into_iter()
        .filter(|item| {
            let is_video = item.pointer("/id/videoId").is_some_and(Value::is_string);
            if !is_video {
                debug!("Skipping search result without videoId");
            }
            is_video
        })
        .map(|item| decode_record(Source::YouTube, item).map(RawRecord::YouTube))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BASE_COLUMN_COUNT;
    use serde_json::json;

    #[test]
    fn test_normalize_video() {
        let page: SearchListResponse = serde_json::from_value(json!({
            "nextPageToken": "CDIQAA",
            "items": [{
                "id": {"kind": "youtube#video", "videoId": "dQw4w9WgXcQ"},
                "snippet": {
                    "publishedAt": "2019-02-20T14:05:11.000Z",
                    "title": "Clean water for every school",
                    "description": "Día uno",
                    "thumbnails": {
                        "default": {"url": "https://i.ytimg.com/vi/dQw4w9WgXcQ/default.jpg"},
                        "medium": {"url": "https://i.ytimg.com/vi/dQw4w9WgXcQ/mqdefault.jpg"}
                    }
                }
            }]
        }))
        .unwrap();

        assert_eq!(page.next_page_token.as_deref(), Some("CDIQAA"));
        let records = page_records(page);
        let Ok(RawRecord::YouTube(item)) = &records[0] else {
            panic!("expected a video record");
        };

        let record = normalize(item).unwrap();
        assert_eq!(record.post_id, "dQw4w9WgXcQ");
        assert_eq!(record.post_url, "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
        assert_eq!(
            record.video_url,
            "https://www.youtube.com/embed/dQw4w9WgXcQ?wmode=opaque#isVideo"
        );
        assert_eq!(record.thumb_url, "https://i.ytimg.com/vi/dQw4w9WgXcQ/mqdefault.jpg");
        assert_eq!(record.content, "Día uno");
        assert_eq!(record.photo_url, "");
        assert_eq!(record.post_type, PostType::Video);
        assert_eq!(record.coordinate, None);
        assert_eq!(record.to_row().len(), BASE_COLUMN_COUNT);
    }

    #[test]
    fn test_channel_results_are_skipped() {
        let page: SearchListResponse = serde_json::from_value(json!({
            "items": [{
                "id": {"kind": "youtube#channel", "channelId": "UC123"},
                "snippet": {"publishedAt": "2019-02-20T14:05:11.000Z"}
            }]
        }))
        .unwrap();

        assert!(page_records(page).is_empty());
    }

    #[test]
    fn test_null_texts_and_malformed_items() {
        let page: SearchListResponse = serde_json::from_value(json!({
            "items": [
                {
                    "id": {"videoId": "a1B2c3D4e5F"},
                    "snippet": {"publishedAt": "2019-02-20T14:05:11.000Z", "title": null, "description": null}
                },
                {"id": {"videoId": "Z9y8X7w6V5u"}}
            ]
        }))
        .unwrap();

        let records = page_records(page);
        let Ok(RawRecord::YouTube(item)) = &records[0] else {
            panic!("expected a video record");
        };
        let record = normalize(item).unwrap();
        assert_eq!(record.title, "");
        assert_eq!(record.content, "");
        assert!(matches!(
            &records[1],
            Err(SourceError::Record { post_id, .. }) if post_id == "Z9y8X7w6V5u"
        ));
    }
}
