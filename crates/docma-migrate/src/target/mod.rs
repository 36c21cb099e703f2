//! Target stores for the relational side of the migration.

pub mod memory;
pub mod mysql;

use async_trait::async_trait;

use crate::bulk::InsertStatement;
use crate::config::{MigrationConfig, TableNames};
use crate::error::Result;
use crate::model::{Label, TargetDocument};

/// Outcome of a document upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentWrite {
    /// A new row was created with this id.
    Inserted(i64),
    /// A row with the same name existed; its mutable fields were updated.
    Updated(i64),
}

/// Trait for relational target stores.
///
/// All calls are issued sequentially by a single task.
#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Get the target type name.
    fn target_type(&self) -> &'static str;

    /// Connect to the store.
    async fn connect(&mut self) -> Result<()>;

    /// Create the target tables if they do not exist yet.
    async fn ensure_schema(&self, tables: &TableNames) -> Result<()>;

    /// Execute one bulk statement; returns the number of rows written.
    async fn execute_insert(&self, statement: &InsertStatement) -> Result<u64>;

    /// Insert a document and return its new id.
    ///
    /// Fails with [`crate::Error::DuplicateKey`] when the name is taken.
    async fn insert_document(&self, table: &str, doc: &TargetDocument) -> Result<i64>;

    /// Insert a document, or update barcode, dates and note of the row with
    /// the same name.
    async fn upsert_document(&self, table: &str, doc: &TargetDocument) -> Result<DocumentWrite>;

    /// All persisted labels.
    async fn fetch_labels(&self, table: &str) -> Result<Vec<Label>>;

    /// The label called `name`, if any.
    async fn find_label(&self, table: &str, name: &str) -> Result<Option<Label>>;

    /// Number of rows in `table`.
    async fn count_rows(&self, table: &str) -> Result<u64>;

    /// Remove every row from `table`.
    async fn truncate(&self, table: &str) -> Result<()>;

    /// Close the connection and cleanup resources.
    async fn close(&mut self) -> Result<()>;
}

/// Create the target store for a configuration.
///
/// Dry runs get an in-memory store; everything else talks to MySQL.
#[must_use]
pub fn create_target(config: &MigrationConfig) -> Box<dyn TargetStore> {
    if config.options.dry_run {
        Box::new(memory::MemoryTarget::new())
    } else {
        Box::new(mysql::MySqlTarget::new(config.target.url.clone()))
    }
}
