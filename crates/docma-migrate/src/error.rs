//! Error types for docma-migrate.

use thiserror::Error;

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while migrating.
///
/// The first four variants are the domain failures of a migration run and carry
/// the context needed to locate the offending item. The remaining variants wrap
/// transport and I/O failures, which are always fatal and never retried.
#[derive(Error, Debug)]
pub enum Error {
    /// A filename does not follow the `YYYYMMDD_BBBBBBB.ext` scan pattern.
    #[error("Invalid filename format: '{filename}'")]
    InvalidFilenameFormat {
        /// The offending filename.
        filename: String,
    },

    /// A strict insert collided with an existing primary or unique key.
    #[error("Duplicate key in table '{table}': {message}")]
    DuplicateKey {
        /// Table the insert targeted.
        table: String,
        /// Driver message describing the collision.
        message: String,
    },

    /// A document references a label that is missing from the label index.
    #[error("Document '{document}' references unknown label '{label}'")]
    MissingLabelReference {
        /// Name of the referencing document.
        document: String,
        /// The unresolved label name.
        label: String,
    },

    /// A bulk insert wrote a different number of rows than it was given.
    #[error("Batch size mismatch in table '{table}': expected {expected} rows, got {actual}")]
    BatchSizeMismatch {
        /// Table the insert targeted.
        table: String,
        /// Number of input rows.
        expected: u64,
        /// Number of rows actually written.
        actual: u64,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source connection error.
    #[error("Source connection error: {0}")]
    SourceConnection(String),

    /// Destination connection error.
    #[error("Destination connection error: {0}")]
    DestinationConnection(String),

    /// Source record could not be read into the expected shape.
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Rows could not be written to the destination.
    #[error("Loading error: {0}")]
    Loading(String),

    /// MongoDB driver error.
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    /// BSON decoding error.
    #[error("BSON error: {0}")]
    Bson(#[from] bson::de::Error),

    /// MySQL driver error.
    #[error("MySQL error: {0}")]
    Sql(#[from] sqlx::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a `DuplicateKey` error.
    pub fn duplicate_key(table: impl Into<String>, message: impl Into<String>) -> Self {
        Error::DuplicateKey {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Returns true for a primary/unique key collision.
    #[must_use]
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Error::DuplicateKey { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_context() {
        let err = Error::BatchSizeMismatch {
            table: "labels".to_string(),
            expected: 3,
            actual: 2,
        };
        assert_eq!(
            err.to_string(),
            "Batch size mismatch in table 'labels': expected 3 rows, got 2"
        );

        let err = Error::MissingLabelReference {
            document: "20140101_0000001.pdf".to_string(),
            label: "Neu".to_string(),
        };
        assert!(err.to_string().contains("'Neu'"));
    }

    #[test]
    fn test_is_duplicate_key() {
        assert!(Error::duplicate_key("docs", "Duplicate entry").is_duplicate_key());
        assert!(!Error::Config("x".to_string()).is_duplicate_key());
    }
}
