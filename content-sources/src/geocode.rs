//! Table de géocodage exportée séparément depuis le CMS
//!
//! Le fichier est produit par un export externe (panneau d'administration) :
//! colonne 2 = identifiant de l'article, 9 = latitude, 10 = longitude.
//! Son absence, ou celle d'une ligne, n'est jamais fatale.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use tracing::{debug, warn};

use crate::types::Coordinate;
use crate::SourceError;

/// Index de la colonne identifiant
pub const POST_ID_COLUMN: usize = 2;
/// Index de la colonne latitude
pub const LATITUDE_COLUMN: usize = 9;
/// Index de la colonne longitude
pub const LONGITUDE_COLUMN: usize = 10;

/// Correspondance `post_id → coordonnée`
#[derive(Debug, Clone, Default)]
pub struct GeocodeTable {
    entries: HashMap<String, Coordinate>,
}

impl GeocodeTable {
    /// Charge la table depuis un fichier CSV ; fichier absent = table vide
    pub fn load(path: &Path) -> Result<Self, SourceError> {
        if !path.exists() {
            warn!(path = %path.display(), "Geocode export not found, CMS posts will have no location");
            return Ok(Self::default());
        }

        let file = std::fs::File::open(path)?;
        let table = Self::from_reader(file)?;
        debug!(path = %path.display(), entries = table.len(), "Geocode table loaded");
        Ok(table)
    }

    /// Lit la table depuis un flux CSV avec ligne d'en-tête
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, SourceError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let mut entries = HashMap::new();

        for (line, result) in reader.records().enumerate() {
            // +2 : en-tête et numérotation à partir de 1
            let line = line + 2;
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    warn!(line, error = %e, "Skipping malformed geocode record");
                    continue;
                }
            };

            let parsed = (
                record.get(POST_ID_COLUMN).map(str::trim),
                record.get(LATITUDE_COLUMN).and_then(parse_degrees),
                record.get(LONGITUDE_COLUMN).and_then(parse_degrees),
            );

            match parsed {
                (Some(post_id), Some(lat), Some(lon)) if !post_id.is_empty() => {
                    if let Some(coordinate) = Coordinate::from_degrees(lat, lon) {
                        entries.insert(post_id.to_string(), coordinate);
                    }
                }
                _ => {
                    warn!(line, "Skipping unreadable geocode row");
                }
            }
        }

        Ok(Self { entries })
    }

    /// Coordonnée d'un article, `None` si inconnue
    pub fn lookup(&self, post_id: &str) -> Option<Coordinate> {
        self.entries.get(post_id).copied()
    }

    pub fn insert(&mut self, post_id: impl Into<String>, coordinate: Coordinate) {
        self.entries.insert(post_id.into(), coordinate);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_degrees(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = "\
location_id,featured,object_id,object_type,title,street,city,region,country,latitude,longitude
1,0,101,post,Lilongwe,,Lilongwe,Central,MW,-13.9626121234,33.7741195
2,0,102,post,Null island,,,,,0,0
3,0,103,post,Broken,,,,,abc,33.1
4,0,104,post,Blantyre,,Blantyre,Southern,MW,-15.7861,35.0058
";

    #[test]
    fn test_from_reader() {
        let table = GeocodeTable::from_reader(EXPORT.as_bytes()).unwrap();

        assert_eq!(table.len(), 2);
        let lilongwe = table.lookup("101").unwrap();
        assert_eq!(lilongwe.latitude, -13.9626121);
        assert_eq!(lilongwe.longitude, 33.7741195);
        assert!(table.lookup("104").is_some());
    }

    #[test]
    fn test_sentinel_and_broken_rows_are_absent() {
        let table = GeocodeTable::from_reader(EXPORT.as_bytes()).unwrap();
        assert_eq!(table.lookup("102"), None);
        assert_eq!(table.lookup("103"), None);
        assert_eq!(table.lookup("999"), None);
    }

    #[test]
    fn test_malformed_records_do_not_stop_loading() {
        let mut export = b"location_id,featured,object_id,object_type,title,street,city,region,country,latitude,longitude\n".to_vec();
        export.extend_from_slice(b"1,0,201,post,Zomba \xff\xfe,,,,,-15.38,35.31\n");
        export.extend_from_slice(b"2,0,202\n");
        export.extend_from_slice(b"3,0,203,post,Mzuzu,,,,,-11.46,34.02\n");

        let table = GeocodeTable::from_reader(export.as_slice()).unwrap();
        assert_eq!(table.lookup("201"), None);
        assert_eq!(table.lookup("202"), None);
        assert_eq!(table.lookup("203").unwrap().latitude, -11.46);
    }

    #[test]
    fn test_missing_file_is_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let table = GeocodeTable::load(&dir.path().join("gmw_locations.csv")).unwrap();
        assert!(table.is_empty());
    }
}
