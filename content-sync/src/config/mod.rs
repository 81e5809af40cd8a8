//! Configuration d'un run
//!
//! Fichier JSON, surchargé par les variables d'environnement puis par la CLI.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use content_sources::{DumpPages, GeocodeTable, Source};
use serde::{Deserialize, Serialize};

use crate::reproject::ProjectionBackend;

/// Variable d'environnement : chemin de la table
pub const ENV_TABLE_PATH: &str = "CONTENT_TABLE_PATH";
/// Variable d'environnement : chemin du magasin géographique
pub const ENV_FEATURES_PATH: &str = "CONTENT_FEATURES_PATH";
/// Variable d'environnement : journal d'audit
pub const ENV_AUDIT_LOG: &str = "CONTENT_AUDIT_LOG";
/// Variable d'environnement : rapport JSON
pub const ENV_REPORT_PATH: &str = "CONTENT_REPORT_PATH";

/// Configuration principale
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyncConfig {
    /// Dumps des sources
    #[serde(default)]
    pub sources: SourcePaths,

    /// Table ordonnée (CSV)
    #[serde(default = "default_table")]
    pub table: PathBuf,

    /// Magasin géographique (GeoJSON)
    #[serde(default = "default_features")]
    pub features: PathBuf,

    /// Journal d'audit, ouvert en ajout
    #[serde(default = "default_audit_log")]
    pub audit_log: PathBuf,

    /// Rapport JSON du run (optionnel)
    #[serde(default)]
    pub report: Option<PathBuf>,

    /// Backend de projection
    #[serde(default)]
    pub projection: ProjectionBackend,
}

/// Chemins des dumps, une entrée par source
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SourcePaths {
    pub tchop: Option<PathBuf>,
    pub youtube: Option<PathBuf>,
    pub blogger: Option<PathBuf>,
    pub wordpress: Option<PathBuf>,
    /// Export CSV de géocodage du CMS
    pub wordpress_geocodes: Option<PathBuf>,
}

impl SourcePaths {
    pub fn get(&self, source: Source) -> Option<&Path> {
        let path = match source {
            Source::Tchop => &self.tchop,
            Source::YouTube => &self.youtube,
            Source::Blogger => &self.blogger,
            Source::Wordpress => &self.wordpress,
        };
        path.as_deref()
    }
}

fn default_table() -> PathBuf {
    PathBuf::from("content.csv")
}

fn default_features() -> PathBuf {
    PathBuf::from("features.geojson")
}

fn default_audit_log() -> PathBuf {
    PathBuf::from("logs.txt")
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sources: SourcePaths::default(),
            table: default_table(),
            features: default_features(),
            audit_log: default_audit_log(),
            report: None,
            projection: ProjectionBackend::default(),
        }
    }
}

impl SyncConfig {
    /// Charge une configuration depuis un fichier
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse config JSON")
    }

    /// Applique les surcharges de l'environnement du processus
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Applique les surcharges fournies par `lookup`
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = |key: &str| lookup(key).filter(|v| !v.is_empty()).map(PathBuf::from);

        if let Some(p) = path(ENV_TABLE_PATH) {
            self.table = p;
        }
        if let Some(p) = path(ENV_FEATURES_PATH) {
            self.features = p;
        }
        if let Some(p) = path(ENV_AUDIT_LOG) {
            self.audit_log = p;
        }
        if let Some(p) = path(ENV_REPORT_PATH) {
            self.report = Some(p);
        }
    }

    /// Ouvre les dumps configurés, dans l'ordre de traitement des sources
    pub fn feeds(&self) -> Result<Vec<DumpPages>> {
        Source::ALL
            .into_iter()
            .filter_map(|source| self.sources.get(source).map(|path| (source, path)))
            .map(|(source, path)| {
                DumpPages::open(path, source)
                    .context(format!("Failed to open {} dump: {}", source, path.display()))
            })
            .collect()
    }

    /// Charge la table de géocodage du CMS (vide si non configurée)
    pub fn geocodes(&self) -> Result<GeocodeTable> {
        match &self.sources.wordpress_geocodes {
            Some(path) => GeocodeTable::load(path)
                .context(format!("Failed to load geocodes: {}", path.display())),
            None => Ok(GeocodeTable::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config: SyncConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.table, PathBuf::from("content.csv"));
        assert_eq!(config.audit_log, PathBuf::from("logs.txt"));
        assert_eq!(config.projection, ProjectionBackend::Mercator);
        assert!(config.sources.get(Source::Tchop).is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let config: SyncConfig = serde_json::from_str(
            r#"{
                "sources": {
                    "blogger": "dumps/blogger.json",
                    "wordpress": "dumps/wordpress.json",
                    "wordpress_geocodes": "dumps/gmw_locations.csv"
                },
                "table": "out/content.csv",
                "features": "out/features.geojson",
                "report": "out/report.json",
                "projection": "proj"
            }"#,
        )
        .unwrap();

        assert_eq!(
            config.sources.get(Source::Blogger),
            Some(Path::new("dumps/blogger.json"))
        );
        assert!(config.sources.get(Source::YouTube).is_none());
        assert_eq!(config.report, Some(PathBuf::from("out/report.json")));
        assert_eq!(config.projection, ProjectionBackend::Proj);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_TABLE_PATH, "/data/table.csv"),
            (ENV_AUDIT_LOG, ""),
            (ENV_REPORT_PATH, "/data/report.json"),
        ]
        .into_iter()
        .collect();

        let mut config = SyncConfig::default();
        config.apply_env_with(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.table, PathBuf::from("/data/table.csv"));
        assert_eq!(config.features, PathBuf::from("features.geojson"));
        assert_eq!(config.audit_log, PathBuf::from("logs.txt"));
        assert_eq!(config.report, Some(PathBuf::from("/data/report.json")));
    }

    #[test]
    fn test_feeds_follow_source_order() {
        let dir = tempfile::tempdir().unwrap();
        let wordpress = dir.path().join("wordpress.json");
        let tchop = dir.path().join("tchop.json");
        std::fs::write(&wordpress, "[]").unwrap();
        std::fs::write(&tchop, "[]").unwrap();

        let mut config = SyncConfig::default();
        config.sources.wordpress = Some(wordpress);
        config.sources.tchop = Some(tchop);

        let sources: Vec<Source> = config
            .feeds()
            .unwrap()
            .iter()
            .map(content_sources::PageSource::source)
            .collect();
        assert_eq!(sources, vec![Source::Tchop, Source::Wordpress]);
    }

    #[test]
    fn test_missing_dump_is_an_error() {
        let mut config = SyncConfig::default();
        config.sources.blogger = Some(PathBuf::from("/nonexistent/blogger.json"));
        assert!(config.feeds().is_err());
    }
}
