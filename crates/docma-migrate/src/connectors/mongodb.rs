//! MongoDB source connector.
//!
//! Reads the `Docs` and `AccProcess` collections of a docMa database with the
//! native driver. Documents are streamed through a driver cursor; accounting
//! transactions are read in a single pass.

use async_trait::async_trait;
use bson::doc;
use futures::{StreamExt, TryStreamExt};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::connectors::common::validate_url;
use crate::connectors::{DocumentStream, SourceConnector};
use crate::error::{Error, Result};
use crate::model::{AccountingTransaction, SourceDocument};

/// Configuration for a MongoDB source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoDBConfig {
    /// Connection string (mongodb://host:port).
    pub uri: String,
    /// Database name.
    pub database: String,
    /// Collection holding the documents.
    #[serde(default = "default_documents_collection")]
    pub documents_collection: String,
    /// Collection holding the accounting transactions.
    #[serde(default = "default_transactions_collection")]
    pub transactions_collection: String,
}

fn default_documents_collection() -> String {
    "Docs".to_string()
}

fn default_transactions_collection() -> String {
    "AccProcess".to_string()
}

/// MongoDB source connector.
pub struct MongoDBConnector {
    config: MongoDBConfig,
    database: Option<Database>,
}

impl MongoDBConnector {
    /// Creates a new, unconnected MongoDB connector.
    pub fn new(config: MongoDBConfig) -> Self {
        Self {
            config,
            database: None,
        }
    }

    fn database(&self) -> Result<&Database> {
        self.database.as_ref().ok_or_else(|| {
            Error::SourceConnection("MongoDB connector is not connected".to_string())
        })
    }

    fn documents_collection(&self) -> Result<Collection<SourceDocument>> {
        Ok(self.database()?.collection(&self.config.documents_collection))
    }

    fn transactions_collection(&self) -> Result<Collection<AccountingTransaction>> {
        Ok(self
            .database()?
            .collection(&self.config.transactions_collection))
    }
}

#[async_trait]
impl SourceConnector for MongoDBConnector {
    fn source_type(&self) -> &'static str {
        "mongodb"
    }

    async fn connect(&mut self) -> Result<()> {
        validate_url(&self.config.uri)?;

        let options = ClientOptions::parse(&self.config.uri)
            .await
            .map_err(|e| Error::SourceConnection(format!("failed to parse URI: {}", e)))?;
        let client = Client::with_options(options)
            .map_err(|e| Error::SourceConnection(format!("failed to create client: {}", e)))?;

        let database = client.database(&self.config.database);
        database
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| Error::SourceConnection(format!("MongoDB ping failed: {}", e)))?;

        info!(
            "Connected to MongoDB database '{}' ({} / {})",
            self.config.database,
            self.config.documents_collection,
            self.config.transactions_collection
        );
        self.database = Some(database);
        Ok(())
    }

    async fn count_documents(&self) -> Result<Option<u64>> {
        let count = self
            .documents_collection()?
            .estimated_document_count(None)
            .await?;
        Ok(Some(count))
    }

    async fn documents(&self) -> Result<DocumentStream> {
        let cursor = self.documents_collection()?.find(None, None).await?;
        debug!("Opened cursor on {}", self.config.documents_collection);
        Ok(cursor.map_err(Error::from).boxed())
    }

    async fn transactions(&self) -> Result<Vec<AccountingTransaction>> {
        let cursor = self.transactions_collection()?.find(None, None).await?;
        let transactions: Vec<AccountingTransaction> = cursor.try_collect().await?;
        debug!(
            "Read {} transactions from {}",
            transactions.len(),
            self.config.transactions_collection
        );
        Ok(transactions)
    }

    async fn close(&mut self) -> Result<()> {
        self.database = None;
        Ok(())
    }
}

#[cfg(test)]
#[path = "mongodb_tests.rs"]
mod tests;
