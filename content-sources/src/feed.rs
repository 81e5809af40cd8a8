//! Pagination des sources
//!
//! La récupération réseau reste l'affaire du collaborateur : le cœur ne voit
//! que « reste-t-il une page ? » et « page suivante ».

use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::source::{decode_page, PageRecords, RawRecord};
use crate::types::Source;
use crate::SourceError;

/// Fournisseur de pages d'enregistrements bruts
pub trait PageSource {
    /// Source dont proviennent les pages
    fn source(&self) -> Source;

    /// Reste-t-il une page à lire ?
    fn has_more(&self) -> bool;

    /// Lit la page suivante
    ///
    /// `Err` signale une page inexploitable et termine la source ; une erreur
    /// propre à un enregistrement reste dans la page.
    fn next_page(&mut self) -> Result<PageRecords, SourceError>;
}

/// Itérateur paresseux sur les enregistrements d'un `PageSource`
///
/// Les erreurs d'enregistrement sont remontées une à une ; une page en
/// erreur est remontée une fois, puis l'itération s'arrête.
pub struct Records<P> {
    pages: P,
    buffer: std::vec::IntoIter<Result<RawRecord, SourceError>>,
    done: bool,
}

impl<P: PageSource> Records<P> {
    pub fn new(pages: P) -> Self {
        Self {
            pages,
            buffer: Vec::new().into_iter(),
            done: false,
        }
    }
}

impl<P: PageSource> Iterator for Records<P> {
    type Item = Result<RawRecord, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.buffer.next() {
                return Some(record);
            }
            if self.done || !self.pages.has_more() {
                return None;
            }
            match self.pages.next_page() {
                Ok(page) => self.buffer = page.into_iter(),
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Pages enregistrées dans un fichier dump JSON
///
/// Le fichier contient un tableau de pages telles que renvoyées par l'API.
/// Le flux de cartes n'est pas paginé : sa réponse entière forme une page.
#[derive(Debug)]
pub struct DumpPages {
    source: Source,
    pages: std::vec::IntoIter<Value>,
    remaining: usize,
    page_number: usize,
}

impl DumpPages {
    /// Ouvre un dump depuis le disque
    pub fn open(path: &Path, source: Source) -> Result<Self, SourceError> {
        let content = std::fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&content)?;
        debug!(path = %path.display(), source = %source, "Dump loaded");
        Ok(Self::from_value(source, value))
    }

    pub fn from_value(source: Source, value: Value) -> Self {
        let pages = match (source, value) {
            (Source::Tchop, value) => vec![value],
            (_, Value::Array(pages)) => pages,
            (_, single) => vec![single],
        };

        Self {
            source,
            remaining: pages.len(),
            pages: pages.into_iter(),
            page_number: 0,
        }
    }

    /// Itérateur sur les enregistrements du dump
    pub fn records(self) -> Records<Self> {
        Records::new(self)
    }
}

impl PageSource for DumpPages {
    fn source(&self) -> Source {
        self.source
    }

    fn has_more(&self) -> bool {
        self.remaining > 0
    }

    fn next_page(&mut self) -> Result<PageRecords, SourceError> {
        let Some(page) = self.pages.next() else {
            return Ok(Vec::new());
        };
        self.remaining -= 1;
        self.page_number += 1;

        decode_page(self.source, page).map_err(|e| SourceError::Page {
            feed: self.source,
            reason: format!("page {}: {}", self.page_number, e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wordpress_post(id: u64) -> Value {
        json!({
            "id": id,
            "date": "2019-04-02T11:45:10",
            "link": format!("https://stories.example.org/{}", id),
            "title": {"rendered": "t"},
            "excerpt": {"rendered": "e"},
            "content": {"rendered": "<img src=\"x.jpg\">"}
        })
    }

    #[test]
    fn test_records_flatten_pages() {
        let dump = json!([[wordpress_post(1), wordpress_post(2)], [wordpress_post(3)]]);
        let ids: Vec<String> = DumpPages::from_value(Source::Wordpress, dump)
            .records()
            .map(|r| r.unwrap().post_id())
            .collect();

        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_bad_page_ends_iteration() {
        let dump = json!([[wordpress_post(1)], {"code": "rest_post_invalid_page_number"}, [wordpress_post(9)]]);
        let results: Vec<_> = DumpPages::from_value(Source::Wordpress, dump).records().collect();

        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(SourceError::Page { .. })));
    }

    #[test]
    fn test_malformed_record_does_not_end_the_source() {
        let dump = json!([
            [wordpress_post(1), {"id": 2, "date": null}],
            [wordpress_post(3)]
        ]);
        let results: Vec<_> = DumpPages::from_value(Source::Wordpress, dump).records().collect();

        assert_eq!(results.len(), 3);
        assert!(matches!(&results[1], Err(e) if !e.ends_source() && e.post_id() == Some("2")));
        assert_eq!(results[2].as_ref().unwrap().post_id(), "3");
    }

    #[test]
    fn test_blog_location_errors_stay_local() {
        let dump = json!([{"items": [
            {"id": "1", "published": "2019-01-15T06:30:00-08:00", "content": "<p>a</p>",
             "location": {"lat": -15.38, "lng": 35.31}},
            {"id": "2", "published": "2019-01-15T06:30:00-08:00", "content": "<p>b</p>",
             "location": {"lat": "unknown", "lng": 35.31}}
        ]}]);
        let ids: Vec<String> = DumpPages::from_value(Source::Blogger, dump)
            .records()
            .map(|r| r.unwrap().post_id())
            .collect();

        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn test_card_feed_is_single_page() {
        let dump = json!([
            {"cards": [{"type": "quote", "id": 1, "postedTime": "2019-05-01T09:00:00", "quote": "q"}]},
            {"cards": [{"type": "quote", "id": 2, "postedTime": "2019-05-01T09:00:00", "quote": "q"}]}
        ]);
        let pages = DumpPages::from_value(Source::Tchop, dump);
        assert_eq!(pages.remaining, 1);
        assert_eq!(pages.records().count(), 2);
    }
}
