//! Définition et implémentation des commandes CLI
//!
//! - `sync` (défaut) : sources → table → magasin géographique
//! - `normalize` : lignes canoniques d'un dump, sans accès aux magasins
//! - `project` : projection d'une position

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use content_sources::{Coordinate, DumpPages, GeocodeTable, Normalizer, Source};
use tracing::{info, warn};

use content_sync::reproject::Projector;
use content_sync::store::{CsvTableStore, GeoJsonFeatureStore};
use content_sync::{Reconciler, SyncConfig, SyncStatus};

#[derive(Subcommand)]
pub enum Commands {
    /// Synchronize every configured source into both stores
    Sync(SyncArgs),

    /// Print the canonical rows of one source dump as JSON lines
    Normalize {
        /// Source of the dump (tchop, youtube, blogger, wordpress)
        #[arg(short, long, value_parser = parse_source)]
        source: Source,

        /// Path to the JSON dump
        #[arg(short, long)]
        input: PathBuf,

        /// Geocode export of the CMS (wordpress only)
        #[arg(long)]
        geocodes: Option<PathBuf>,
    },

    /// Print the Web Mercator projection of a WGS84 position
    #[command(allow_negative_numbers = true)]
    Project {
        /// Latitude in degrees
        #[arg(long)]
        lat: f64,

        /// Longitude in degrees
        #[arg(long)]
        lon: f64,
    },
}

/// Arguments de la synchronisation (commande par défaut)
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// JSON configuration file
    #[arg(short, long, default_value = "content-sync.json")]
    pub config: PathBuf,

    /// Table store path (défaut : env CONTENT_TABLE_PATH / config)
    #[arg(long)]
    pub table: Option<PathBuf>,

    /// Feature store path (défaut : env CONTENT_FEATURES_PATH / config)
    #[arg(long)]
    pub features: Option<PathBuf>,

    /// Audit log path (défaut : env CONTENT_AUDIT_LOG / logs.txt)
    #[arg(long)]
    pub audit_log: Option<PathBuf>,

    /// Write the run report as JSON
    #[arg(long)]
    pub report: Option<PathBuf>,
}

fn parse_source(raw: &str) -> Result<Source, String> {
    Source::ALL
        .into_iter()
        .find(|s| s.name().eq_ignore_ascii_case(raw))
        .ok_or_else(|| format!("unknown source '{}' (tchop, youtube, blogger, wordpress)", raw))
}

/// Résout la configuration : fichier, puis environnement, puis CLI
pub fn resolve_config(args: &SyncArgs) -> Result<SyncConfig> {
    let mut config = if args.config.exists() {
        SyncConfig::load(&args.config)?
    } else {
        SyncConfig::default()
    };
    config.apply_env();

    if let Some(table) = &args.table {
        config.table = table.clone();
    }
    if let Some(features) = &args.features {
        config.features = features.clone();
    }
    if let Some(audit_log) = &args.audit_log {
        config.audit_log = audit_log.clone();
    }
    if let Some(report) = &args.report {
        config.report = Some(report.clone());
    }

    Ok(config)
}

/// Exécute la synchronisation
pub async fn cmd_sync(config: &SyncConfig) -> Result<()> {
    let geocodes = config.geocodes()?;
    let feeds = config.feeds()?;
    if feeds.is_empty() {
        warn!("No source configured, only the feature stage will run");
    }

    let table = CsvTableStore::open(&config.table)
        .await
        .context("Failed to open table store")?;
    let features = GeoJsonFeatureStore::open(&config.features)
        .await
        .context("Failed to open feature store")?;
    let projector = Projector::for_backend(config.projection)?;
    info!(
        table = %config.table.display(),
        features = %config.features.display(),
        projection = projector.backend_name(),
        "Stores opened"
    );

    let mut reconciler = Reconciler::new(table, features)
        .with_normalizer(Normalizer::new().with_geocodes(geocodes))
        .with_projector(projector);

    let report = reconciler.run(feeds).await;
    report.display();

    if let Some(path) = &config.report {
        report
            .save_to_file(path)
            .context(format!("Failed to write report: {}", path.display()))?;
        info!(path = %path.display(), "Report saved");
    }

    if report.status == SyncStatus::Failed {
        match &report.fatal {
            Some(fatal) => bail!("Sync aborted during {}: {}", fatal.stage, fatal.message),
            None => bail!("Sync failed: no record could be synchronized"),
        }
    }

    Ok(())
}

/// Affiche les lignes canoniques d'un dump
pub fn cmd_normalize(source: Source, input: &Path, geocodes: Option<&Path>) -> Result<()> {
    let geocodes = match geocodes {
        Some(path) => GeocodeTable::load(path)?,
        None => GeocodeTable::default(),
    };
    let normalizer = Normalizer::new().with_geocodes(geocodes);

    let pages = DumpPages::open(input, source)
        .context(format!("Failed to open dump: {}", input.display()))?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut skipped = 0;

    for raw in pages.records() {
        let record = match raw.and_then(|raw| normalizer.normalize(&raw)) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Record skipped");
                skipped += 1;
                continue;
            }
        };
        serde_json::to_writer(&mut out, &record.to_row())?;
        writeln!(out)?;
    }

    if skipped > 0 {
        warn!(skipped, "Some records could not be normalized");
    }
    Ok(())
}

/// Affiche la projection d'une position
pub fn cmd_project(lat: f64, lon: f64) -> Result<()> {
    let projector = Projector::new();
    let point = projector.project(Coordinate::from_degrees(lat, lon))?;
    println!("{} {}", point.x(), point.y());
    Ok(())
}
