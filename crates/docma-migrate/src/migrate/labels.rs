//! Label migration.

use futures::TryStreamExt;
use tracing::info;

use crate::bulk::{BulkInsertStats, BulkInserter, InsertMode};
use crate::config::MigrationConfig;
use crate::connectors::DocumentStream;
use crate::error::Result;
use crate::model::{dedup_names, LabelIndex};
use crate::schema::LABEL_COLUMNS;
use crate::target::TargetStore;
use crate::value::SqlValue;

/// Label migration counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LabelStats {
    /// Label entries read from documents, repeats included.
    pub collected: u64,
    /// Distinct non-empty names sent to the target.
    pub unique: u64,
    /// Bulk insert outcome.
    pub bulk: BulkInsertStats,
}

/// Creates every label referenced by a source document.
pub struct LabelMigrator<'a> {
    target: &'a dyn TargetStore,
    table: &'a str,
    mode: InsertMode,
    max_statement_bytes: usize,
}

impl<'a> LabelMigrator<'a> {
    /// Create a label migrator for `config`.
    #[must_use]
    pub fn new(target: &'a dyn TargetStore, config: &'a MigrationConfig) -> Self {
        Self {
            target,
            table: &config.tables.labels,
            mode: config.options.label_insert_mode,
            max_statement_bytes: config.options.max_statement_bytes,
        }
    }

    /// Collect, deduplicate and persist all label names of `documents`, then
    /// index every persisted label by name.
    ///
    /// # Errors
    ///
    /// Fails on a source read error, on a duplicate name in strict mode, and
    /// on any bulk insert failure.
    pub async fn migrate(&self, documents: DocumentStream) -> Result<(LabelIndex, LabelStats)> {
        let names: Vec<String> = documents
            .try_fold(Vec::new(), |mut names, doc| async move {
                names.extend(doc.labels);
                Ok(names)
            })
            .await?;

        let collected = names.len() as u64;
        let unique = dedup_names(names);
        info!(
            "Collected {} label entries, {} distinct",
            collected,
            unique.len()
        );

        let inserter = BulkInserter::new(self.target, self.max_statement_bytes);
        let bulk = inserter
            .insert(self.table, LABEL_COLUMNS, self.mode, &unique, |name| {
                vec![SqlValue::from(name.as_str())]
            })
            .await?;

        let index = self.build_index().await?;
        info!("Label index holds {} labels", index.len());

        Ok((
            index,
            LabelStats {
                collected,
                unique: unique.len() as u64,
                bulk,
            },
        ))
    }

    /// Index the labels currently persisted in the target.
    ///
    /// # Errors
    ///
    /// Fails when the labels cannot be read.
    pub async fn build_index(&self) -> Result<LabelIndex> {
        let labels = self.target.fetch_labels(self.table).await?;
        Ok(LabelIndex::from_labels(labels))
    }
}
