//! Table ordonnée stockée dans un fichier CSV
//!
//! Les écritures sont appliquées en mémoire puis le fichier est réécrit par
//! lots (`flush`, ou dès que le lot est plein). Un tri réécrit immédiatement.
//! Un fichier qui ne peut plus être écrit rend le magasin injoignable.

use std::path::{Path, PathBuf};

use content_sources::types::COLUMNS;
use content_sources::TableRow;
use tracing::debug;

use super::{StoreError, TableStore, DEFAULT_BATCH_SIZE};

/// Table CSV avec ligne d'en-tête ; les lignes ont 11 ou 13 champs
#[derive(Debug)]
pub struct CsvTableStore {
    path: PathBuf,
    rows: Vec<TableRow>,
    pending: usize,
    batch_size: usize,
}

impl CsvTableStore {
    /// Ouvre la table ; un fichier absent est une table vide
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let rows = match tokio::fs::read(path).await {
            Ok(bytes) => parse_rows(&bytes).map_err(|e| {
                StoreError::connection(format!("unreadable table {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Table not found, starting empty");
                Vec::new()
            }
            Err(e) => {
                return Err(StoreError::connection(format!(
                    "cannot open table {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        debug!(path = %path.display(), rows = rows.len(), "Table opened");

        Ok(Self {
            path: path.to_path_buf(),
            rows,
            pending: 0,
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }

    /// Nombre de modifications déclenchant une réécriture (au moins 1)
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Modifications pas encore écrites sur disque
    pub fn pending(&self) -> usize {
        self.pending
    }

    async fn persist(&mut self) -> Result<(), StoreError> {
        let written = match write_rows(&self.rows) {
            Ok(bytes) => tokio::fs::write(&self.path, bytes)
                .await
                .map_err(StoreError::from),
            Err(e) => Err(e),
        };
        written.map_err(|e| {
            StoreError::connection(format!("cannot write table {}: {}", self.path.display(), e))
        })?;

        debug!(path = %self.path.display(), rows = self.rows.len(), pending = self.pending, "Table written");
        self.pending = 0;
        Ok(())
    }

    async fn changed(&mut self) -> Result<(), StoreError> {
        self.pending += 1;
        if self.pending >= self.batch_size {
            self.persist().await?;
        }
        Ok(())
    }
}

fn parse_rows(bytes: &[u8]) -> Result<Vec<TableRow>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    reader
        .records()
        .map(|record| {
            let record = record?;
            Ok(TableRow::new(record.iter().map(str::to_string).collect()))
        })
        .collect()
}

fn write_rows(rows: &[TableRow]) -> Result<Vec<u8>, StoreError> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());

    writer.write_record(COLUMNS)?;
    for row in rows {
        writer.write_record(row.fields())?;
    }

    writer
        .into_inner()
        .map_err(|e| StoreError::Io(e.into_error()))
}

impl TableStore for CsvTableStore {
    async fn read_all(&self) -> Result<Vec<TableRow>, StoreError> {
        Ok(self.rows.clone())
    }

    async fn append(&mut self, row: &TableRow) -> Result<(), StoreError> {
        self.rows.push(row.clone());
        self.changed().await
    }

    async fn update(&mut self, index: usize, row: &TableRow) -> Result<(), StoreError> {
        let post_id = row.post_id().unwrap_or_default();
        let len = self.rows.len();
        let Some(slot) = self.rows.get_mut(index) else {
            return Err(StoreError::write(
                post_id,
                format!("row {} out of range ({} rows)", index, len),
            ));
        };

        *slot = row.clone();
        self.changed().await
    }

    async fn sort(&mut self, column: usize, ascending: bool) -> Result<(), StoreError> {
        // Tri stable : les lignes de même clé gardent leur ordre relatif
        self.rows.sort_by(|a, b| {
            let ordering = a.get(column).unwrap_or("").cmp(b.get(column).unwrap_or(""));
            if ascending {
                ordering
            } else {
                ordering.reverse()
            }
        });
        self.persist().await
    }

    async fn flush(&mut self) -> Result<(), StoreError> {
        if self.pending > 0 {
            self.persist().await?;
        }
        Ok(())
    }
}
