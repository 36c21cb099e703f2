//! Document migration.
//!
//! Each source document becomes one `docs` row plus its numbers, its account
//! data and its label links. Child rows are written tolerantly so that a
//! re-run against a populated target adds nothing twice.

use futures::StreamExt;
use indicatif::ProgressBar;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::bulk::{BulkInserter, InsertMode};
use crate::config::{DocumentPolicy, MigrationConfig};
use crate::connectors::DocumentStream;
use crate::error::{Error, Result};
use crate::filename::{parse_filename, zero_date};
use crate::model::{
    to_naive, DocAccountData, DocLabelLink, DocNumber, LabelIndex, SourceDocument, TargetDocument,
};
use crate::schema::{DOC_ACCOUNT_DATA_COLUMNS, DOC_LABEL_COLUMNS, DOC_NUMBER_COLUMNS};
use crate::target::{DocumentWrite, TargetStore};
use crate::value::SqlValue;

/// Document migration counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DocumentStats {
    /// Documents read from the source.
    pub read: u64,
    /// Documents created in the target.
    pub inserted: u64,
    /// Existing documents updated in place.
    pub updated: u64,
    /// Existing documents left alone.
    pub skipped: u64,
    /// Document number rows written.
    pub doc_numbers: u64,
    /// Account data rows written.
    pub account_data: u64,
    /// Document/label links written.
    pub label_links: u64,
    /// Bulk statements executed.
    pub statements: u64,
}

/// Builds the target row for `doc`.
///
/// A missing barcode or date is taken from the document name when it follows
/// the scan naming pattern; otherwise it stays blank.
#[must_use]
pub fn to_target_document(doc: &SourceDocument) -> TargetDocument {
    let zero = zero_date();
    let mut target = TargetDocument {
        name: doc.name.clone(),
        barcode: doc.barcode.clone(),
        note: doc.note.clone(),
        date_of_scan: to_naive(doc.infos.date_of_scan),
        date_of_receipt: to_naive(doc.infos.date_of_receipt),
    };

    let incomplete = target.barcode.is_empty()
        || target.date_of_scan == zero
        || target.date_of_receipt == zero;
    if !incomplete {
        return target;
    }

    match parse_filename(&doc.name) {
        Ok(info) => {
            if target.barcode.is_empty() {
                target.barcode = info.barcode;
            }
            if target.date_of_scan == zero {
                target.date_of_scan = info.date;
            }
            if target.date_of_receipt == zero {
                target.date_of_receipt = info.date;
            }
        }
        Err(e) => warn!("{}: leaving missing fields blank", e),
    }
    target
}

/// Resolves the label names of a document to links, in first-seen order.
///
/// Empty names are ignored.
///
/// # Errors
///
/// Returns [`Error::MissingLabelReference`] for a name the index does not know.
pub fn resolve_links(
    doc_id: i64,
    document: &str,
    labels: &[String],
    index: &LabelIndex,
) -> Result<Vec<DocLabelLink>> {
    let mut seen = HashSet::new();
    let mut links = Vec::with_capacity(labels.len());
    for name in labels.iter().filter(|n| !n.is_empty()) {
        let label_id = index
            .resolve(name)
            .ok_or_else(|| Error::MissingLabelReference {
                document: document.to_string(),
                label: name.clone(),
            })?;
        let link = DocLabelLink { doc_id, label_id };
        if seen.insert(link) {
            links.push(link);
        }
    }
    Ok(links)
}

/// Migrates documents one at a time, in source order.
pub struct DocumentMigrator<'a> {
    target: &'a dyn TargetStore,
    config: &'a MigrationConfig,
    index: &'a LabelIndex,
}

impl<'a> DocumentMigrator<'a> {
    /// Create a document migrator that links against `index`.
    #[must_use]
    pub fn new(
        target: &'a dyn TargetStore,
        config: &'a MigrationConfig,
        index: &'a LabelIndex,
    ) -> Self {
        Self {
            target,
            config,
            index,
        }
    }

    /// Drain `documents`, migrating each one.
    ///
    /// # Errors
    ///
    /// Stops at the first fatal error. Documents migrated before it stay
    /// committed.
    pub async fn migrate(
        &self,
        mut documents: DocumentStream,
        progress: &ProgressBar,
    ) -> Result<DocumentStats> {
        let mut stats = DocumentStats::default();
        while let Some(doc) = documents.next().await {
            let doc = doc?;
            stats.read += 1;
            self.migrate_document(&doc, &mut stats).await?;
            progress.inc(1);
        }

        info!(
            "Documents: {} read, {} inserted, {} updated, {} skipped",
            stats.read, stats.inserted, stats.updated, stats.skipped
        );
        Ok(stats)
    }

    /// Migrate a single document with its numbers, account data and links.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingLabelReference`] when a label is not indexed,
    /// and any store error. Under [`DocumentPolicy::SkipExisting`] a name
    /// collision is logged and the document skipped instead.
    pub async fn migrate_document(
        &self,
        doc: &SourceDocument,
        stats: &mut DocumentStats,
    ) -> Result<()> {
        let tables = &self.config.tables;
        let row = to_target_document(doc);

        let doc_id = match self.config.options.document_policy {
            DocumentPolicy::Upsert => match self.target.upsert_document(&tables.docs, &row).await? {
                DocumentWrite::Inserted(id) => {
                    stats.inserted += 1;
                    id
                }
                DocumentWrite::Updated(id) => {
                    debug!("Updated existing document {}", doc.display_key());
                    stats.updated += 1;
                    id
                }
            },
            DocumentPolicy::SkipExisting => {
                match self.target.insert_document(&tables.docs, &row).await {
                    Ok(id) => {
                        stats.inserted += 1;
                        id
                    }
                    Err(e) if e.is_duplicate_key() => {
                        warn!("Skipping document {}: {}", doc.display_key(), e);
                        stats.skipped += 1;
                        return Ok(());
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        let inserter = BulkInserter::new(self.target, self.config.options.max_statement_bytes);

        let numbers: Vec<DocNumber> = doc
            .account_data
            .doc_numbers
            .iter()
            .map(|number| DocNumber {
                doc_id,
                number: number.clone(),
            })
            .collect();
        let bulk = inserter
            .insert(
                &tables.doc_numbers,
                DOC_NUMBER_COLUMNS,
                InsertMode::Tolerant,
                &numbers,
                |n| vec![SqlValue::I64(n.doc_id), SqlValue::from(n.number.as_str())],
            )
            .await?;
        stats.statements += bulk.statements;
        stats.doc_numbers += bulk.inserted;

        let account = [DocAccountData {
            doc_id,
            account_number: doc.account_data.acc_number,
            period_from: to_naive(doc.account_data.doc_period.from),
            period_to: to_naive(doc.account_data.doc_period.to),
        }];
        let bulk = inserter
            .insert(
                &tables.doc_account_data,
                DOC_ACCOUNT_DATA_COLUMNS,
                InsertMode::Tolerant,
                &account,
                |a| {
                    vec![
                        SqlValue::I64(a.doc_id),
                        SqlValue::I64(a.account_number),
                        SqlValue::from(a.period_from),
                        SqlValue::from(a.period_to),
                    ]
                },
            )
            .await?;
        stats.statements += bulk.statements;
        stats.account_data += bulk.inserted;

        let links = resolve_links(doc_id, &doc.name, &doc.labels, self.index)?;
        let bulk = inserter
            .insert(
                &tables.docs_labels,
                DOC_LABEL_COLUMNS,
                InsertMode::Tolerant,
                &links,
                |l| vec![SqlValue::I64(l.doc_id), SqlValue::I64(l.label_id)],
            )
            .await?;
        stats.statements += bulk.statements;
        stats.label_links += bulk.inserted;

        Ok(())
    }
}
