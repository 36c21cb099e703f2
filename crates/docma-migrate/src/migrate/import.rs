//! Import of freshly scanned files from a directory.
//!
//! Every file becomes a document named after the file, dated by its
//! filename, linked to the inbox label and given an empty account data row.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::bulk::{BulkInserter, InsertMode};
use crate::config::MigrationConfig;
use crate::error::{Error, Result};
use crate::filename::{parse_filename, zero_date, ScanInfo};
use crate::model::{DocAccountData, DocLabelLink, TargetDocument};
use crate::schema::{DOC_ACCOUNT_DATA_COLUMNS, DOC_LABEL_COLUMNS};
use crate::target::{DocumentWrite, TargetStore};
use crate::value::SqlValue;

/// Directory import counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportStats {
    /// Files found in the directory.
    pub files: u64,
    /// Documents created.
    pub inserted: u64,
    /// Documents that already existed and were updated.
    pub updated: u64,
    /// Files whose name did not follow the scan pattern.
    pub invalid_names: u64,
    /// Inbox links written.
    pub links: u64,
    /// Account data rows written.
    pub account_data: u64,
}

/// Imports the files of a directory as inbox documents.
pub struct DirectoryImporter<'a> {
    target: &'a dyn TargetStore,
    config: &'a MigrationConfig,
}

impl<'a> DirectoryImporter<'a> {
    /// Create an importer writing into `target`.
    #[must_use]
    pub fn new(target: &'a dyn TargetStore, config: &'a MigrationConfig) -> Self {
        Self { target, config }
    }

    /// Import every regular file in `dir`, in name order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingLabelReference`] before writing anything when
    /// the inbox label does not exist, and any I/O or store error.
    pub async fn import_dir(&self, dir: &Path) -> Result<ImportStats> {
        let tables = &self.config.tables;
        let inbox = &self.config.options.inbox_label;

        let label = self
            .target
            .find_label(&tables.labels, inbox)
            .await?
            .ok_or_else(|| Error::MissingLabelReference {
                document: dir.display().to_string(),
                label: inbox.clone(),
            })?;

        let files = list_files(dir).await?;
        info!("Importing {} files from {}", files.len(), dir.display());

        let mut stats = ImportStats {
            files: files.len() as u64,
            ..ImportStats::default()
        };
        let mut links = Vec::with_capacity(files.len());
        let mut accounts = Vec::with_capacity(files.len());

        for name in &files {
            let info = parse_filename(name).unwrap_or_else(|e| {
                warn!("{}", e);
                stats.invalid_names += 1;
                ScanInfo::default()
            });
            let doc = TargetDocument {
                name: name.clone(),
                barcode: info.barcode,
                note: String::new(),
                date_of_scan: info.date,
                date_of_receipt: info.date,
            };

            let doc_id = match self.target.upsert_document(&tables.docs, &doc).await? {
                DocumentWrite::Inserted(id) => {
                    stats.inserted += 1;
                    id
                }
                DocumentWrite::Updated(id) => {
                    debug!("{} already imported", name);
                    stats.updated += 1;
                    id
                }
            };
            links.push(DocLabelLink {
                doc_id,
                label_id: label.id,
            });
            accounts.push(DocAccountData {
                doc_id,
                account_number: 0,
                period_from: zero_date(),
                period_to: zero_date(),
            });
        }

        let inserter = BulkInserter::new(self.target, self.config.options.max_statement_bytes);
        stats.links = inserter
            .insert(
                &tables.docs_labels,
                DOC_LABEL_COLUMNS,
                InsertMode::Tolerant,
                &links,
                |l| vec![SqlValue::I64(l.doc_id), SqlValue::I64(l.label_id)],
            )
            .await?
            .inserted;
        stats.account_data = inserter
            .insert(
                &tables.doc_account_data,
                DOC_ACCOUNT_DATA_COLUMNS,
                InsertMode::Tolerant,
                &accounts,
                |a| {
                    vec![
                        SqlValue::I64(a.doc_id),
                        SqlValue::I64(a.account_number),
                        SqlValue::from(a.period_from),
                        SqlValue::from(a.period_to),
                    ]
                },
            )
            .await?
            .inserted;

        info!(
            "Import done: {} new, {} updated, {} with unparseable names",
            stats.inserted, stats.updated, stats.invalid_names
        );
        Ok(stats)
    }
}

async fn list_files(dir: &Path) -> Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let path: PathBuf = entry.path();
        match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => names.push(name.to_string()),
            None => warn!("Skipping file with non UTF-8 name: {}", path.display()),
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{dry_run_config, TableNames};
    use crate::target::memory::MemoryTarget;
    use chrono::NaiveDate;

    async fn target_with_inbox() -> MemoryTarget {
        let target = MemoryTarget::with_schema(&TableNames::default());
        BulkInserter::new(&target, 1024)
            .insert(
                "labels",
                crate::schema::LABEL_COLUMNS,
                InsertMode::Strict,
                &["Neu"],
                |n| vec![SqlValue::from(*n)],
            )
            .await
            .unwrap();
        target
    }

    fn scan_dir(names: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for name in names {
            std::fs::write(dir.path().join(name), b"%PDF").unwrap();
        }
        std::fs::create_dir(dir.path().join("subdir")).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_import_links_files_to_inbox() {
        let target = target_with_inbox().await;
        let config = dry_run_config();
        let dir = scan_dir(&["20140102_0000002.pdf", "20140101_0000001.pdf"]);

        let stats = DirectoryImporter::new(&target, &config)
            .import_dir(dir.path())
            .await
            .unwrap();

        assert_eq!(stats.files, 2);
        assert_eq!(stats.inserted, 2);
        assert_eq!(stats.links, 2);
        assert_eq!(stats.account_data, 2);
        assert_eq!(
            target.column_values("docs", "name").unwrap(),
            vec![
                SqlValue::from("20140101_0000001.pdf"),
                SqlValue::from("20140102_0000002.pdf"),
            ]
        );
        assert_eq!(
            target.column_values("docs", "barcode").unwrap()[0],
            SqlValue::from("0000001")
        );
        let scanned = NaiveDate::from_ymd_opt(2014, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(
            target.column_values("docs", "date_of_receipt").unwrap()[0],
            SqlValue::DateTime(scanned)
        );
        assert_eq!(
            target.column_values("docs_labels", "label_id").unwrap(),
            vec![SqlValue::I64(1), SqlValue::I64(1)]
        );
    }

    #[tokio::test]
    async fn test_import_twice_adds_nothing() {
        let target = target_with_inbox().await;
        let config = dry_run_config();
        let dir = scan_dir(&["20140101_0000001.pdf"]);
        let importer = DirectoryImporter::new(&target, &config);

        importer.import_dir(dir.path()).await.unwrap();
        let stats = importer.import_dir(dir.path()).await.unwrap();

        assert_eq!(stats.updated, 1);
        assert_eq!(stats.links, 0);
        assert_eq!(stats.account_data, 0);
        assert_eq!(target.count_rows("docs").await.unwrap(), 1);
        assert_eq!(target.count_rows("docs_labels").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_import_invalid_name_is_not_fatal() {
        let target = target_with_inbox().await;
        let config = dry_run_config();
        let dir = scan_dir(&["scan.pdf"]);

        let stats = DirectoryImporter::new(&target, &config)
            .import_dir(dir.path())
            .await
            .unwrap();

        assert_eq!(stats.invalid_names, 1);
        assert_eq!(stats.inserted, 1);
        assert_eq!(
            target.column_values("docs", "date_of_scan").unwrap(),
            vec![SqlValue::DateTime(zero_date())]
        );
    }

    #[tokio::test]
    async fn test_import_requires_inbox_label() {
        let target = MemoryTarget::with_schema(&TableNames::default());
        let config = dry_run_config();
        let dir = scan_dir(&["20140101_0000001.pdf"]);

        let err = DirectoryImporter::new(&target, &config)
            .import_dir(dir.path())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::MissingLabelReference { ref label, .. } if label == "Neu"));
        assert_eq!(target.count_rows("docs").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_import_missing_directory() {
        let target = target_with_inbox().await;
        let config = dry_run_config();
        let dir = tempfile::tempdir().unwrap();

        let result = DirectoryImporter::new(&target, &config)
            .import_dir(&dir.path().join("absent"))
            .await;
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
