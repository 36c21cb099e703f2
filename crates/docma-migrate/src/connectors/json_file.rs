//! Snapshot file connector.
//!
//! A snapshot is a JSON file with two arrays, `documents` and `transactions`,
//! holding the records of the `Docs` and `AccProcess` collections in MongoDB
//! extended JSON (as written by `mongoexport`). Either array may be missing.

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::connectors::common::check_file_size;
use crate::connectors::{DocumentStream, SourceConnector};
use crate::error::{Error, Result};
use crate::model::{AccountingTransaction, SourceDocument};

/// Configuration for a snapshot file source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonFileConfig {
    /// Path to the snapshot file.
    pub path: PathBuf,
}

/// Source records held in memory.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Documents in source order.
    pub documents: Vec<SourceDocument>,
    /// Accounting transactions in source order.
    pub transactions: Vec<AccountingTransaction>,
}

impl Snapshot {
    /// Parse a snapshot from its JSON form.
    ///
    /// # Errors
    ///
    /// Returns an error when the root is not an object, a section is not an
    /// array, or a record does not have the expected shape.
    pub fn from_json(root: serde_json::Value) -> Result<Self> {
        let serde_json::Value::Object(mut map) = root else {
            return Err(Error::Extraction(
                "Snapshot root must be an object with 'documents' and 'transactions'".to_string(),
            ));
        };

        Ok(Self {
            documents: parse_section(map.remove("documents"), "documents")?,
            transactions: parse_section(map.remove("transactions"), "transactions")?,
        })
    }
}

fn parse_section<T>(section: Option<serde_json::Value>, name: &str) -> Result<Vec<T>>
where
    T: serde::de::DeserializeOwned,
{
    let items = match section {
        None | Some(serde_json::Value::Null) => return Ok(Vec::new()),
        Some(serde_json::Value::Array(items)) => items,
        Some(_) => {
            return Err(Error::Extraction(format!(
                "Snapshot section '{}' is not an array",
                name
            )))
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| -> Result<T> {
            let value = bson::Bson::try_from(item).map_err(|e| {
                Error::Extraction(format!("{}[{}] is not valid extended JSON: {}", name, idx, e))
            })?;
            Ok(bson::from_bson(value)?)
        })
        .collect()
}

fn read_json(path: &Path, what: &str) -> Result<serde_json::Value> {
    check_file_size(path)?;
    let file = File::open(path).map_err(|e| {
        Error::SourceConnection(format!(
            "Failed to open {} file '{}': {}",
            what,
            path.display(),
            e
        ))
    })?;

    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| Error::Extraction(format!("Failed to parse JSON: {}", e)))
}

/// Read accounting transactions from a JSON file.
///
/// The file holds either a bare array of transaction records or a snapshot
/// object, in which case its `transactions` section is read.
///
/// # Errors
///
/// Returns an error when the file cannot be read or a record does not have
/// the expected shape.
pub fn read_transactions_file(path: &Path) -> Result<Vec<AccountingTransaction>> {
    let root = read_json(path, "transactions")?;
    let transactions = match root {
        serde_json::Value::Array(_) => parse_section(Some(root), "transactions")?,
        serde_json::Value::Object(_) => Snapshot::from_json(root)?.transactions,
        _ => {
            return Err(Error::Extraction(
                "Transactions file must hold an array or a snapshot object".to_string(),
            ))
        }
    };

    info!(
        "Read {} transactions from {}",
        transactions.len(),
        path.display()
    );
    Ok(transactions)
}

/// Source connector over a snapshot file or an in-memory [`Snapshot`].
pub struct SnapshotConnector {
    config: Option<JsonFileConfig>,
    snapshot: Snapshot,
    loaded: bool,
}

impl SnapshotConnector {
    /// Creates a connector that loads `config.path` on connect.
    #[must_use]
    pub fn new(config: JsonFileConfig) -> Self {
        Self {
            config: Some(config),
            snapshot: Snapshot::default(),
            loaded: false,
        }
    }

    /// Creates a connector over records that are already in memory.
    #[must_use]
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            config: None,
            snapshot,
            loaded: true,
        }
    }

    fn ensure_loaded(&self) -> Result<()> {
        if self.loaded {
            Ok(())
        } else {
            Err(Error::SourceConnection("Not connected".to_string()))
        }
    }
}

#[async_trait]
impl SourceConnector for SnapshotConnector {
    fn source_type(&self) -> &'static str {
        "json_file"
    }

    async fn connect(&mut self) -> Result<()> {
        let Some(config) = &self.config else {
            return Ok(());
        };

        let root = read_json(&config.path, "snapshot")?;
        self.snapshot = Snapshot::from_json(root)?;
        self.loaded = true;

        info!(
            "Loaded snapshot {}: {} documents, {} transactions",
            config.path.display(),
            self.snapshot.documents.len(),
            self.snapshot.transactions.len()
        );
        Ok(())
    }

    async fn count_documents(&self) -> Result<Option<u64>> {
        self.ensure_loaded()?;
        Ok(Some(self.snapshot.documents.len() as u64))
    }

    async fn documents(&self) -> Result<DocumentStream> {
        self.ensure_loaded()?;
        let documents = self.snapshot.documents.clone();
        Ok(futures::stream::iter(documents.into_iter().map(Ok)).boxed())
    }

    async fn transactions(&self) -> Result<Vec<AccountingTransaction>> {
        self.ensure_loaded()?;
        Ok(self.snapshot.transactions.clone())
    }

    async fn close(&mut self) -> Result<()> {
        if self.config.is_some() {
            self.snapshot = Snapshot::default();
            self.loaded = false;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "json_file_tests.rs"]
mod tests;
