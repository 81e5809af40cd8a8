//! Orchestration d'un run de synchronisation
//!
//! Ordre : pour chaque source, normalisation puis différentiel table ; tri
//! global de la table ; relecture de la table triée ; différentiel du
//! magasin géographique sur l'ensemble.

use std::time::Instant;

use content_sources::types::PUBLISHED_DATE_COLUMN;
use content_sources::{CanonicalRecord, Normalizer, PageSource, Records};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::diff::{feature, table, FeatureSnapshot, TableSnapshot};
use crate::report::{StageReport, SyncReport};
use crate::reproject::{Projector, ReprojectError};
use crate::store::{FeatureStore, StoreError, TableStore};

/// Erreur interrompant un run
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Reproject(#[from] ReprojectError),
}

/// Nom de l'étape du magasin géographique
pub const FEATURE_STAGE: &str = "features";

/// Réconcilie les sources avec la table et le magasin géographique
pub struct Reconciler<T, F> {
    table: T,
    features: F,
    normalizer: Normalizer,
    projector: Projector,
}

impl<T: TableStore, F: FeatureStore> Reconciler<T, F> {
    pub fn new(table: T, features: F) -> Self {
        Self {
            table,
            features,
            normalizer: Normalizer::new(),
            projector: Projector::new(),
        }
    }

    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_projector(mut self, projector: Projector) -> Self {
        self.projector = projector;
        self
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    pub fn features(&self) -> &F {
        &self.features
    }

    pub fn into_stores(self) -> (T, F) {
        (self.table, self.features)
    }

    /// Exécute un run complet
    ///
    /// Une erreur fatale est consignée dans le rapport (statut `Failed`) ;
    /// tout ce qui a été écrit avant reste en place.
    pub async fn run<P: PageSource>(&mut self, feeds: Vec<P>) -> SyncReport {
        let start = Instant::now();
        let mut report = SyncReport::new();

        if let Err((stage, e)) = self.run_stages(feeds, &mut report).await {
            error!(stage = %stage, error = %e, "Sync aborted");
            report.record_fatal(&stage, e.to_string());
            self.flush_after_abort().await;
        }

        report.set_duration(start.elapsed());
        report.finalize();
        info!("{}", report.summary());
        report
    }

    async fn run_stages<P: PageSource>(
        &mut self,
        feeds: Vec<P>,
        report: &mut SyncReport,
    ) -> Result<(), (String, SyncError)> {
        let snapshot = self
            .table
            .read_all()
            .await
            .map(TableSnapshot::new)
            .map_err(|e| ("table".to_string(), fatal(e)))?;
        info!(rows = snapshot.len(), "Table snapshot loaded");

        for feed in feeds {
            let name = format!("table/{}", feed.source());
            let mut stage = StageReport::new(&name);
            let result = match self.sync_table(feed, &snapshot, &mut stage).await {
                Ok(()) => self.table.flush().await,
                Err(e) => Err(e),
            };
            info!("{}", stage.summary());
            report.table.push(stage);
            result.map_err(|e| (name, SyncError::from(e)))?;
        }

        self.table
            .sort(PUBLISHED_DATE_COLUMN, true)
            .await
            .map_err(|e| ("table".to_string(), fatal(e)))?;
        debug!("Table sorted by published_date");

        let mut stage = StageReport::new(FEATURE_STAGE);
        let result = self.sync_features(&mut stage).await;
        info!("{}", stage.summary());
        report.features = Some(stage);
        result.map_err(|e| (FEATURE_STAGE.to_string(), e))
    }

    async fn sync_table<P: PageSource>(
        &mut self,
        feed: P,
        snapshot: &TableSnapshot,
        stage: &mut StageReport,
    ) -> Result<(), StoreError> {
        for raw in Records::new(feed) {
            let raw = match raw {
                Ok(raw) => raw,
                Err(e) if e.ends_source() => {
                    warn!(error = %e, "Source page unreadable, ending source");
                    stage.record_error(None, e.to_string());
                    continue;
                }
                Err(e) => {
                    warn!(post_id = ?e.post_id(), error = %e, "Record unreadable, skipping");
                    stage.record_error(e.post_id(), e.to_string());
                    continue;
                }
            };

            let record = match self.normalizer.normalize(&raw) {
                Ok(record) => record,
                Err(e) => {
                    let post_id = raw.post_id();
                    warn!(post_id = %post_id, error = %e, "Record not normalized, skipping");
                    stage.record_error(Some(&post_id), e.to_string());
                    continue;
                }
            };

            table::apply(&mut self.table, snapshot, &record, stage).await?;
        }
        Ok(())
    }

    async fn sync_features(&mut self, stage: &mut StageReport) -> Result<(), SyncError> {
        let rows = self.table.read_all().await.map_err(fatal)?;
        let snapshot = self
            .features
            .read_all()
            .await
            .map(FeatureSnapshot::new)
            .map_err(fatal)?;
        info!(rows = rows.len(), features = snapshot.len(), "Feature snapshot loaded");

        for row in &rows {
            let record = match CanonicalRecord::from_row(row) {
                Ok(record) => record,
                Err(e) => {
                    warn!(post_id = ?row.post_id(), error = %e, "Table row unreadable, skipping");
                    stage.record_error(row.post_id(), e.to_string());
                    continue;
                }
            };

            feature::apply(
                &mut self.features,
                &snapshot,
                &record,
                &self.projector,
                stage,
            )
            .await?;
        }

        self.features.flush().await?;
        Ok(())
    }

    /// Écrit ce qui a été appliqué avant l'abandon
    async fn flush_after_abort(&mut self) {
        if let Err(e) = self.table.flush().await {
            warn!(error = %e, "Pending table writes lost");
        }
        if let Err(e) = self.features.flush().await {
            warn!(error = %e, "Pending feature writes lost");
        }
    }
}

/// Une lecture d'instantané qui échoue interrompt toujours le run
fn fatal(e: StoreError) -> SyncError {
    if e.is_fatal() {
        e.into()
    } else {
        StoreError::connection(e.to_string()).into()
    }
}
