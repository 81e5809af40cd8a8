//! CMS auto-hébergé (WordPress)
//!
//! La position n'est pas dans l'article : elle est jointe depuis la table de
//! géocodage exportée à part.

use serde::Deserialize;
use serde_json::Value;

use super::{decode_record, nullable, PageRecords, RawRecord};
use crate::geocode::GeocodeTable;
use crate::html;
use crate::types::{parse_published_date, CanonicalRecord, Origin, PostType, Source};
use crate::SourceError;

#[derive(Debug, Clone, Deserialize)]
pub struct Post {
    pub id: u64,
    pub date: String,
    #[serde(default, deserialize_with = "nullable")]
    pub link: String,
    #[serde(default)]
    pub title: Rendered,
    #[serde(default)]
    pub excerpt: Rendered,
    #[serde(default)]
    pub content: Rendered,
}

/// Champ HTML rendu par l'API REST
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Rendered {
    #[serde(default, deserialize_with = "nullable")]
    pub rendered: String,
}

/// Normalise un article ; échoue si le contenu ne contient aucune image
pub fn normalize(post: &Post, geocodes: &GeocodeTable) -> Result<CanonicalRecord, SourceError> {
    let post_id = post.id.to_string();
    let published_date = parse_published_date(&post_id, &post.date)?;

    let image = html::first_attr(&post.content.rendered, "img", "src").ok_or_else(|| {
        SourceError::MissingImage {
            post_id: post_id.clone(),
        }
    })?;

    let coordinate = geocodes.lookup(&post_id);

    Ok(CanonicalRecord {
        origin: Origin(Source::Wordpress),
        post_id,
        published_date,
        post_url: post.link.clone(),
        title: post.title.rendered.clone(),
        content: html::excerpt(&post.excerpt.rendered),
        photo_url: image.clone(),
        video_url: String::new(),
        thumb_url: image,
        post_type: PostType::Photo,
        source: Source::Wordpress,
        coordinate,
    })
}

pub fn page_records(posts: Vec<Value>) -> PageRecords {
    posts
        .into_iter()
        .map(|post| decode_record(Source::Wordpress, post).map(RawRecord::Wordpress))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Coordinate;
    use serde_json::json;

    fn post(content: &str) -> Post {
        serde_json::from_value(json!({
            "id": 311,
            "date": "2019-04-02T11:45:10",
            "link": "https://stories.example.org/2019/04/02/311/",
            "title": {"rendered": "Nutrition week"},
            "excerpt": {"rendered": "<p>\nMothers gathered at the health centre</p>\n"},
            "content": {"rendered": content}
        }))
        .unwrap()
    }

    #[test]
    fn test_normalize_with_geocode() {
        let mut geocodes = GeocodeTable::default();
        geocodes.insert("311", Coordinate::from_degrees(-14.0, 33.8).unwrap());

        let p = post(r#"<p><img class="wp-image" src="https://stories.example.org/img/311.jpg"/></p>"#);
        let record = normalize(&p, &geocodes).unwrap();

        assert_eq!(record.post_id, "311");
        assert_eq!(record.photo_url, "https://stories.example.org/img/311.jpg");
        assert_eq!(record.thumb_url, record.photo_url);
        assert_eq!(record.video_url, "");
        assert_eq!(record.post_type, PostType::Photo);
        assert_eq!(record.content, "Mothers gathered at the health centre ...");
        assert_eq!(record.coordinate.unwrap().latitude, -14.0);
    }

    #[test]
    fn test_absent_geocode_defaults_to_no_location() {
        let p = post(r#"<img src="a.jpg">"#);
        let record = normalize(&p, &GeocodeTable::default()).unwrap();
        assert_eq!(record.coordinate, None);
        assert_eq!(record.to_row().get(11), Some("0"));
    }

    #[test]
    fn test_missing_image_is_an_error() {
        let p = post("<p>No picture</p>");
        let err = normalize(&p, &GeocodeTable::default()).unwrap_err();
        assert!(matches!(err, SourceError::MissingImage { ref post_id } if post_id == "311"));
    }
}
