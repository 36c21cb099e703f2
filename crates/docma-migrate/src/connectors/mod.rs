//! Source connectors for the legacy document store.

pub mod common;
pub mod json_file;
pub mod mongodb;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::config::SourceConfig;
use crate::error::Result;
use crate::model::{AccountingTransaction, SourceDocument};

/// Forward-only sequence of source documents.
///
/// The stream is consumed by value and cannot be restarted; ask the connector
/// for a new one to read the collection again.
pub type DocumentStream = BoxStream<'static, Result<SourceDocument>>;

/// Trait for source store connectors.
///
/// Implement this trait to read documents and accounting transactions from a
/// new kind of source.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    /// Get the source type name.
    fn source_type(&self) -> &'static str;

    /// Connect to the source and validate configuration.
    async fn connect(&mut self) -> Result<()>;

    /// Number of source documents, if the source can tell cheaply.
    async fn count_documents(&self) -> Result<Option<u64>>;

    /// Open a cursor over all documents, in source order.
    async fn documents(&self) -> Result<DocumentStream>;

    /// Read all accounting transactions in one pass.
    async fn transactions(&self) -> Result<Vec<AccountingTransaction>>;

    /// Close the connection and cleanup resources.
    async fn close(&mut self) -> Result<()>;
}

/// Create a source connector from configuration.
pub fn create_connector(config: &SourceConfig) -> Result<Box<dyn SourceConnector>> {
    match config {
        SourceConfig::MongoDB(cfg) => Ok(Box::new(mongodb::MongoDBConnector::new(cfg.clone()))),
        SourceConfig::JsonFile(cfg) => {
            Ok(Box::new(json_file::SnapshotConnector::new(cfg.clone())))
        }
    }
}
