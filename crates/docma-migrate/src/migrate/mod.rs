//! Per-entity migration steps.
//!
//! Each migrator writes one family of tables through the [`BulkInserter`]
//! and knows nothing about the others; [`crate::pipeline::Pipeline`] runs
//! them in dependency order.
//!
//! [`BulkInserter`]: crate::bulk::BulkInserter

pub mod accounting;
pub mod documents;
pub mod import;
pub mod labels;

pub use accounting::AccountingMigrator;
pub use documents::{DocumentMigrator, DocumentStats};
pub use import::{DirectoryImporter, ImportStats};
pub use labels::{LabelMigrator, LabelStats};
