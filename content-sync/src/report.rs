//! Rapport de synchronisation
//!
//! Chaque étape (une par source pour la table, une pour le magasin
//! géographique) produit un `StageReport` ; le `SyncReport` les agrège.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;

/// Statut global du run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncStatus {
    /// Aucune erreur
    Success,
    /// Des enregistrements ont été ignorés
    PartialSuccess,
    /// Run abandonné, ou rien n'a pu être traité
    Failed,
}

/// Niveau de sévérité des erreurs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorLevel {
    /// Run abandonné
    Fatal,
    /// Enregistrement ignoré
    Error,
}

/// Erreur rattachée à une étape et, si possible, à une publication
#[derive(Debug, Clone, Serialize)]
pub struct RecordError {
    pub level: ErrorLevel,
    pub stage: String,
    pub post_id: Option<String>,
    pub message: String,
}

/// Résultat d'une décision appliquée
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Added,
    Updated,
    Unchanged,
}

/// Compteurs d'une étape
#[derive(Debug, Clone, Default, Serialize)]
pub struct StageReport {
    pub stage: String,
    pub processed: usize,
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub errors: Vec<RecordError>,
}

impl StageReport {
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            ..Default::default()
        }
    }

    pub fn record(&mut self, outcome: SyncOutcome) {
        self.processed += 1;
        match outcome {
            SyncOutcome::Added => self.added += 1,
            SyncOutcome::Updated => self.updated += 1,
            SyncOutcome::Unchanged => self.unchanged += 1,
        }
    }

    /// Enregistre un enregistrement ignoré
    pub fn record_error(&mut self, post_id: Option<&str>, message: impl Into<String>) {
        self.processed += 1;
        self.errors.push(RecordError {
            level: ErrorLevel::Error,
            stage: self.stage.clone(),
            post_id: post_id.map(str::to_string),
            message: message.into(),
        });
    }

    /// Ajoute les compteurs d'une autre étape
    pub fn merge(&mut self, other: &StageReport) {
        self.processed += other.processed;
        self.added += other.added;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.errors.extend(other.errors.iter().cloned());
    }

    pub fn summary(&self) -> String {
        format!(
            "{}: {} processed, {} added, {} updated, {} unchanged, {} errors",
            self.stage,
            self.processed,
            self.added,
            self.updated,
            self.unchanged,
            self.errors.len()
        )
    }
}

/// Rapport complet d'un run
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub duration_secs: f64,
    pub status: SyncStatus,
    /// Étapes table, une par source
    pub table: Vec<StageReport>,
    /// Étape magasin géographique
    pub features: Option<StageReport>,
    /// Cause de l'abandon du run
    pub fatal: Option<RecordError>,
}

impl Default for SyncReport {
    fn default() -> Self {
        Self {
            duration_secs: 0.0,
            status: SyncStatus::Success,
            table: Vec::new(),
            features: None,
            fatal: None,
        }
    }
}

impl SyncReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enregistre l'erreur ayant interrompu le run
    pub fn record_fatal(&mut self, stage: &str, message: impl Into<String>) {
        self.fatal = Some(RecordError {
            level: ErrorLevel::Fatal,
            stage: stage.to_string(),
            post_id: None,
            message: message.into(),
        });
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Compteurs cumulés de toutes les étapes table
    pub fn table_totals(&self) -> StageReport {
        let mut totals = StageReport::new("table");
        for stage in &self.table {
            totals.merge(stage);
        }
        totals
    }

    /// Toutes les erreurs non fatales, dans l'ordre des étapes
    pub fn errors(&self) -> impl Iterator<Item = &RecordError> {
        self.table
            .iter()
            .chain(self.features.iter())
            .flat_map(|stage| stage.errors.iter())
    }

    /// Détermine le statut final
    pub fn finalize(&mut self) {
        let table = self.table_totals();
        let mut processed = table.processed;
        let mut succeeded = table.added + table.updated + table.unchanged;
        if let Some(features) = &self.features {
            processed += features.processed;
            succeeded += features.added + features.updated + features.unchanged;
        }
        let has_errors = self.errors().next().is_some();

        self.status = if self.fatal.is_some() {
            SyncStatus::Failed
        } else if has_errors && succeeded > 0 {
            SyncStatus::PartialSuccess
        } else if has_errors || (processed > 0 && succeeded == 0) {
            SyncStatus::Failed
        } else {
            SyncStatus::Success
        };
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("SYNC REPORT");
        println!("{}", "=".repeat(60));

        println!("\nStatus: {:?}", self.status);
        println!("Duration: {:.2}s", self.duration_secs);

        println!("\n--- TABLE ---");
        for stage in &self.table {
            println!("  {}", stage.summary());
        }
        println!("  {}", self.table_totals().summary());

        if let Some(features) = &self.features {
            println!("\n--- FEATURES ---");
            println!("  {}", features.summary());
        }

        let errors: Vec<_> = self.errors().collect();
        if !errors.is_empty() {
            println!("\n--- ERRORS ({}) ---", errors.len());
            for e in errors.iter().take(20) {
                let location = match &e.post_id {
                    Some(id) => format!("[{}:{}]", e.stage, id),
                    None => format!("[{}]", e.stage),
                };
                println!("  {} {}", location, e.message);
            }
            if errors.len() > 20 {
                println!("  ... and {} more", errors.len() - 20);
            }
        }

        if let Some(fatal) = &self.fatal {
            println!("\n--- FATAL ---");
            println!("  [{}] {}", fatal.stage, fatal.message);
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Affichage compact pour le résumé
    pub fn summary(&self) -> String {
        let table = self.table_totals();
        let features = self.features.clone().unwrap_or_else(|| StageReport::new("features"));
        format!(
            "{:?}: table {} added, {} updated, {} unchanged; features {} added, {} updated, {} unchanged; {} errors",
            self.status,
            table.added,
            table.updated,
            table.unchanged,
            features.added,
            features.updated,
            features.unchanged,
            self.errors().count()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_counters() {
        let mut stage = StageReport::new("table/Tchop");
        stage.record(SyncOutcome::Added);
        stage.record(SyncOutcome::Unchanged);
        stage.record(SyncOutcome::Unchanged);
        stage.record_error(Some("12"), "write refused");

        assert_eq!(stage.processed, 4);
        assert_eq!(stage.added, 1);
        assert_eq!(stage.unchanged, 2);
        assert_eq!(stage.errors[0].post_id.as_deref(), Some("12"));
        assert_eq!(stage.errors[0].stage, "table/Tchop");
    }

    #[test]
    fn test_table_totals() {
        let mut report = SyncReport::new();
        let mut a = StageReport::new("table/Tchop");
        a.record(SyncOutcome::Added);
        let mut b = StageReport::new("table/Blogger");
        b.record(SyncOutcome::Updated);
        b.record_error(None, "page 2: bad JSON");
        report.table = vec![a, b];

        let totals = report.table_totals();
        assert_eq!(totals.processed, 3);
        assert_eq!(totals.added, 1);
        assert_eq!(totals.updated, 1);
        assert_eq!(totals.errors.len(), 1);
    }

    #[test]
    fn test_finalize_success() {
        let mut report = SyncReport::new();
        let mut stage = StageReport::new("features");
        stage.record(SyncOutcome::Unchanged);
        report.features = Some(stage);
        report.finalize();

        assert_eq!(report.status, SyncStatus::Success);
    }

    #[test]
    fn test_finalize_partial_success() {
        let mut report = SyncReport::new();
        let mut stage = StageReport::new("table/Wordpress");
        stage.record(SyncOutcome::Added);
        stage.record_error(Some("312"), "No <img> found");
        report.table.push(stage);
        report.finalize();

        assert_eq!(report.status, SyncStatus::PartialSuccess);
    }

    #[test]
    fn test_finalize_failed() {
        let mut report = SyncReport::new();
        report.table.push(StageReport::new("table/Tchop"));
        report.record_fatal("features", "Store connection failed");
        report.finalize();

        assert_eq!(report.status, SyncStatus::Failed);
    }

    #[test]
    fn test_summary() {
        let mut report = SyncReport::new();
        let mut stage = StageReport::new("table/YouTube");
        stage.record(SyncOutcome::Added);
        report.table.push(stage);
        report.finalize();

        let summary = report.summary();
        assert!(summary.starts_with("Success"));
        assert!(summary.contains("table 1 added"));
    }

    #[test]
    fn test_save_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let mut report = SyncReport::new();
        report.table.push(StageReport::new("table/Tchop"));
        report.save_to_file(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"status\": \"Success\""));
    }
}
