//! API de blog (Blogger)
//!
//! Le résumé et les médias sont extraits du HTML de l'article ; la position
//! est optionnelle.

use serde::Deserialize;
use serde_json::Value;

use super::{decode_record, nullable, PageRecords, RawRecord};
use crate::html;
use crate::types::{parse_published_date, CanonicalRecord, Coordinate, Origin, PostType, Source};
use crate::SourceError;

/// Valeur des champs média quand aucun média n'est identifiable
pub const NO_INFO: &str = "NO INFO";

/// Page de la liste d'articles ; `items` peut être absent ou nul
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostList {
    #[serde(default)]
    pub items: Option<Vec<Value>>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Post {
    pub id: String,
    pub published: String,
    #[serde(default, deserialize_with = "nullable")]
    pub url: String,
    #[serde(default, deserialize_with = "nullable")]
    pub title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub content: String,
    /// Lu sans typage : une position illisible vaut absence de position
    #[serde(default)]
    pub location: Option<Value>,
}

impl Post {
    /// Position de l'article, `None` si absente, partielle ou illisible
    pub fn coordinate(&self) -> Option<Coordinate> {
        let location = self.location.as_ref()?;
        let latitude = location.get("lat")?.as_f64()?;
        let longitude = location.get("lng")?.as_f64()?;
        Coordinate::from_degrees(latitude, longitude)
    }
}

/// Médias détectés dans le HTML d'un article
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Media {
    pub post_type: PostType,
    pub photo_url: String,
    pub video_url: String,
    pub thumb_url: String,
}

/// Classe l'article selon ses médias : lien → photo, iframe → vidéo, sinon `no_info`
pub fn classify_media(content: &str) -> Media {
    if let Some(href) = html::first_attr(content, "a", "href") {
        return Media {
            post_type: PostType::Photo,
            photo_url: href.clone(),
            video_url: String::new(),
            thumb_url: href,
        };
    }

    if let Some(mut iframe) = html::tags(content, "iframe").find(|attrs| attrs.contains_key("src")) {
        return Media {
            post_type: PostType::Video,
            photo_url: String::new(),
            video_url: iframe.remove("src").unwrap_or_default(),
            thumb_url: iframe.remove("data-thumbnail-src").unwrap_or_default(),
        };
    }

    Media {
        post_type: PostType::Unknown,
        photo_url: NO_INFO.to_string(),
        video_url: NO_INFO.to_string(),
        thumb_url: NO_INFO.to_string(),
    }
}

/// Normalise un article
pub fn normalize(post: &Post) -> Result<CanonicalRecord, SourceError> {
    let published_date = parse_published_date(&post.id, &post.published)?;
    let media = classify_media(&post.content);

    Ok(CanonicalRecord {
        origin: Origin(Source::Blogger),
        post_id: post.id.clone(),
        published_date,
        post_url: post.url.clone(),
        title: post.title.clone(),
        content: html::excerpt(&post.content),
        photo_url: media.photo_url,
        video_url: media.video_url,
        thumb_url: media.thumb_url,
        post_type: media.post_type,
        source: Source::Blogger,
        coordinate: post.coordinate(),
    })
}

pub fn page_records(page: PostList) -> PageRecords {
    page.items
        .unwrap_or_default()
        .into_iter()
        .map(|item| decode_record(Source::Blogger, item).map(RawRecord::Blogger))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn post(content: &str, location: Option<serde_json::Value>) -> Post {
        let mut value = json!({
            "id": "7038845021419133587",
            "published": "2019-01-15T06:30:00-08:00",
            "url": "https://youth.example.com/2019/01/post.html",
            "title": "Youth voices",
            "content": content,
        });
        if let Some(loc) = location {
            value["location"] = loc;
        }
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_photo_post() {
        let p = post(
            r#"<div><a href="https://bp.example/photo.jpg"><img src="https://bp.example/s320/photo.jpg"></a>Young reporters met in Zomba.</div>"#,
            Some(json!({"name": "Zomba", "lat": -15.3860191, "lng": 35.3187962})),
        );

        let record = normalize(&p).unwrap();
        assert_eq!(record.post_type, PostType::Photo);
        assert_eq!(record.photo_url, "https://bp.example/photo.jpg");
        assert_eq!(record.thumb_url, "https://bp.example/photo.jpg");
        assert_eq!(record.video_url, "");
        assert_eq!(record.content, "Young reporters met in Zomba....");
        let c = record.coordinate.unwrap();
        assert_eq!(c.latitude, -15.3860191);
        assert_eq!(record.to_row().get(2), Some("2019-01-15T06:30:00"));
    }

    #[test]
    fn test_video_post() {
        let p = post(
            r#"<iframe allowfullscreen data-thumbnail-src="https://i.ytimg.com/vi/x/0.jpg" src="https://www.youtube.com/embed/x"></iframe>"#,
            None,
        );

        let media = classify_media(&p.content);
        assert_eq!(media.post_type, PostType::Video);
        assert_eq!(media.video_url, "https://www.youtube.com/embed/x");
        assert_eq!(media.thumb_url, "https://i.ytimg.com/vi/x/0.jpg");
        assert_eq!(media.photo_url, "");
        assert_eq!(normalize(&p).unwrap().coordinate, None);
    }

    #[test]
    fn test_post_without_media() {
        let media = classify_media("<p>Only text</p>");
        assert_eq!(media.post_type, PostType::Unknown);
        assert_eq!(media.photo_url, NO_INFO);
        assert_eq!(media.video_url, NO_INFO);
        assert_eq!(media.thumb_url, NO_INFO);
    }

    #[test]
    fn test_partial_location_is_absent() {
        let p = post("<p>x</p>", Some(json!({"name": "Somewhere", "lat": -15.0})));
        assert_eq!(normalize(&p).unwrap().coordinate, None);
    }

    #[test]
    fn test_null_items_page() {
        let page: PostList = serde_json::from_value(json!({"items": null})).unwrap();
        assert!(page_records(page).is_empty());
    }

    #[test]
    fn test_unreadable_location_is_absent() {
        let p = post("<p>x</p>", Some(json!({"lat": "unknown", "lng": 35.3})));
        assert_eq!(normalize(&p).unwrap().coordinate, None);

        let p = post("<p>x</p>", Some(json!("Zomba")));
        assert_eq!(normalize(&p).unwrap().coordinate, None);
    }

    #[test]
    fn test_bad_post_keeps_the_rest_of_the_page() {
        let page: PostList = serde_json::from_value(json!({
            "items": [
                {"id": "1", "published": "2019-01-15T06:30:00-08:00", "title": null, "content": "<p>a</p>",
                 "location": {"lat": "unknown", "lng": 35.3}},
                {"id": "2", "title": "no date"},
                {"id": "3", "published": "2019-01-16T06:30:00-08:00", "content": "<p>c</p>"}
            ]
        }))
        .unwrap();

        let records = page_records(page);
        assert_eq!(records.len(), 3);
        let Ok(RawRecord::Blogger(first)) = &records[0] else {
            panic!("expected a post");
        };
        let record = normalize(first).unwrap();
        assert_eq!(record.title, "");
        assert_eq!(record.coordinate, None);
        assert!(matches!(
            &records[1],
            Err(SourceError::Record { post_id, .. }) if post_id == "2"
        ));
        assert!(records[2].is_ok());
    }
}
