//! Différentiel contre la table ordonnée
//!
//! La décision est pure (`decide`) ; `apply` l'exécute contre le magasin. Le
//! même instantané sert à toutes les sources d'un run : un enregistrement ne
//! voit jamais les écritures faites plus tôt dans ce run.

use std::collections::HashMap;

use content_sources::types::{COLUMNS, PUBLISHED_DATE_COLUMN};
use content_sources::{CanonicalRecord, TableRow};
use tracing::{debug, info, warn};

use crate::report::{StageReport, SyncOutcome};
use crate::store::{StoreError, TableStore};
use crate::AUDIT_TARGET;

/// Changement d'une colonne
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub column: usize,
    pub old: String,
    pub new: String,
}

impl FieldChange {
    /// Nom de la colonne
    pub fn name(&self) -> &'static str {
        COLUMNS.get(self.column).copied().unwrap_or("?")
    }
}

/// Décision pour un enregistrement entrant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableDecision {
    /// Absent de la table : ajout en fin de table
    Add,
    /// Présent et différent : réécriture complète de la ligne `index`
    Update {
        index: usize,
        changes: Vec<FieldChange>,
    },
    Unchanged,
}

/// Instantané de la table lu une fois en début de run
#[derive(Debug, Clone, Default)]
pub struct TableSnapshot {
    rows: Vec<TableRow>,
    positions: HashMap<String, usize>,
}

impl TableSnapshot {
    pub fn new(rows: Vec<TableRow>) -> Self {
        let mut positions = HashMap::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            let Some(post_id) = row.post_id() else {
                continue;
            };
            // En cas de doublon, la première occurrence fait foi
            positions.entry(post_id.to_string()).or_insert(index);
        }
        Self { rows, positions }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position de la ligne portant ce `post_id`
    pub fn position(&self, post_id: &str) -> Option<usize> {
        self.positions.get(post_id).copied()
    }

    pub fn row(&self, index: usize) -> Option<&TableRow> {
        self.rows.get(index)
    }
}

/// Compare la ligne entrante au préfixe de même longueur de la ligne existante
///
/// Une ligne de 11 champs n'est donc jamais comparée aux colonnes de
/// géolocalisation d'une ligne existante de 13 champs.
pub fn field_changes(existing: &TableRow, incoming: &TableRow) -> Vec<FieldChange> {
    incoming
        .fields()
        .iter()
        .enumerate()
        .filter_map(|(column, new)| {
            let old = existing.get(column).unwrap_or("");
            (old != new).then(|| FieldChange {
                column,
                old: old.to_string(),
                new: new.clone(),
            })
        })
        .collect()
}

/// Décide de l'action pour une ligne entrante
pub fn decide(snapshot: &TableSnapshot, incoming: &TableRow) -> TableDecision {
    let Some(index) = incoming.post_id().and_then(|id| snapshot.position(id)) else {
        return TableDecision::Add;
    };
    let Some(existing) = snapshot.row(index) else {
        return TableDecision::Add;
    };

    let changes = field_changes(existing, incoming);
    if changes.is_empty() {
        TableDecision::Unchanged
    } else {
        TableDecision::Update { index, changes }
    }
}

/// Applique la décision pour un enregistrement
///
/// Une écriture refusée est comptée dans l'étape et n'interrompt pas le run ;
/// seule une erreur fatale du magasin est remontée.
pub async fn apply<S: TableStore>(
    store: &mut S,
    snapshot: &TableSnapshot,
    record: &CanonicalRecord,
    stage: &mut StageReport,
) -> Result<(), StoreError> {
    let row = record.to_row();
    let post_id = record.post_id.as_str();

    let result = match decide(snapshot, &row) {
        TableDecision::Add => store.append(&row).await.map(|_| {
            info!(
                target: AUDIT_TARGET,
                post_id,
                source = record.source.name(),
                published_date = row.get(PUBLISHED_DATE_COLUMN).unwrap_or_default(),
                title = %record.title,
                "Table row added"
            );
            SyncOutcome::Added
        }),
        TableDecision::Update { index, changes } => {
            store.update(index, &row).await.map(|_| {
                for change in &changes {
                    info!(
                        target: AUDIT_TARGET,
                        post_id,
                        row = index,
                        column = change.name(),
                        old = %change.old,
                        new = %change.new,
                        "Table field changed"
                    );
                }
                debug!(post_id, row = index, changes = changes.len(), "Row updated");
                SyncOutcome::Updated
            })
        }
        TableDecision::Unchanged => Ok(SyncOutcome::Unchanged),
    };

    match result {
        Ok(outcome) => stage.record(outcome),
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            warn!(post_id, error = %e, "Table write failed, skipping record");
            stage.record_error(Some(post_id), e.to_string());
        }
    }
    Ok(())
}
