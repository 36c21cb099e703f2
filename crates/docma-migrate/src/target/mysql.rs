//! MySQL target store.
//!
//! Uses a single pooled connection, so statements never overlap and
//! `LAST_INSERT_ID()` always refers to this session. The session `sql_mode`
//! is pinned on connect: bulk statements carry backslash-escaped literals,
//! which a server default of `NO_BACKSLASH_ESCAPES` would misread.

use async_trait::async_trait;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use tracing::{debug, info};

use crate::bulk::InsertStatement;
use crate::config::TableNames;
use crate::connectors::common::validate_url;
use crate::error::{Error, Result};
use crate::model::{Label, TargetDocument};
use crate::schema::table_defs;
use crate::target::{DocumentWrite, TargetStore};
use crate::value::quote_ident;

/// Session mode set on every new connection. Must not contain
/// `NO_BACKSLASH_ESCAPES`.
pub const SESSION_SQL_MODE: &str = "STRICT_ALL_TABLES,NO_ENGINE_SUBSTITUTION";

fn session_mode_sql() -> String {
    format!("SET SESSION sql_mode = '{}'", SESSION_SQL_MODE)
}

/// MySQL target store.
pub struct MySqlTarget {
    url: String,
    pool: Option<MySqlPool>,
}

impl MySqlTarget {
    /// Creates a new, unconnected store.
    #[must_use]
    pub fn new(url: String) -> Self {
        Self { url, pool: None }
    }

    fn pool(&self) -> Result<&MySqlPool> {
        self.pool.as_ref().ok_or_else(|| {
            Error::DestinationConnection("MySQL target is not connected".to_string())
        })
    }
}

/// Maps a unique-key violation to [`Error::DuplicateKey`]; everything else
/// passes through unchanged.
fn map_write_error(table: &str, err: sqlx::Error) -> Error {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return Error::duplicate_key(table, db.message());
        }
    }
    Error::Sql(err)
}

fn document_upsert_sql(table: &str) -> String {
    format!(
        "INSERT INTO {} (`name`, `barcode`, `date_of_scan`, `date_of_receipt`, `note`) \
         VALUES (?, ?, ?, ?, ?) \
         ON DUPLICATE KEY UPDATE `id` = LAST_INSERT_ID(`id`), `barcode` = VALUES(`barcode`), \
         `date_of_scan` = VALUES(`date_of_scan`), `date_of_receipt` = VALUES(`date_of_receipt`), \
         `note` = VALUES(`note`)",
        quote_ident(table)
    )
}

fn document_insert_sql(table: &str) -> String {
    format!(
        "INSERT INTO {} (`name`, `barcode`, `date_of_scan`, `date_of_receipt`, `note`) \
         VALUES (?, ?, ?, ?, ?)",
        quote_ident(table)
    )
}

impl MySqlTarget {
    async fn write_document(&self, sql: &str, table: &str, doc: &TargetDocument) -> Result<i64> {
        let result = sqlx::query(sql)
            .bind(&doc.name)
            .bind(&doc.barcode)
            .bind(doc.date_of_scan)
            .bind(doc.date_of_receipt)
            .bind(&doc.note)
            .execute(self.pool()?)
            .await
            .map_err(|e| map_write_error(table, e))?;

        i64::try_from(result.last_insert_id())
            .map_err(|_| Error::Loading(format!("Document id out of range in '{}'", table)))
    }

    async fn document_id(&self, table: &str, name: &str) -> Result<Option<i64>> {
        let sql = format!("SELECT `id` FROM {} WHERE `name` = ?", quote_ident(table));
        let id: Option<(i64,)> = sqlx::query_as(&sql)
            .bind(name)
            .fetch_optional(self.pool()?)
            .await?;
        Ok(id.map(|(id,)| id))
    }
}

#[async_trait]
impl TargetStore for MySqlTarget {
    fn target_type(&self) -> &'static str {
        "mysql"
    }

    async fn connect(&mut self) -> Result<()> {
        validate_url(&self.url)?;

        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    let sql = session_mode_sql();
                    sqlx::Executor::execute(&mut *conn, sqlx::raw_sql(&sql)).await?;
                    Ok(())
                })
            })
            .connect(&self.url)
            .await
            .map_err(|e| Error::DestinationConnection(format!("MySQL connect failed: {}", e)))?;

        let (mode,): (String,) = sqlx::query_as("SELECT @@SESSION.sql_mode")
            .fetch_one(&pool)
            .await
            .map_err(|e| Error::DestinationConnection(format!("MySQL ping failed: {}", e)))?;
        debug!("MySQL session sql_mode: {}", mode);

        info!("Connected to MySQL");
        self.pool = Some(pool);
        Ok(())
    }

    async fn ensure_schema(&self, tables: &TableNames) -> Result<()> {
        let pool = self.pool()?;
        for def in table_defs(tables) {
            sqlx::raw_sql(&def.create_sql()).execute(pool).await?;
            debug!("Ensured table {}", def.name);
        }
        Ok(())
    }

    async fn execute_insert(&self, statement: &InsertStatement) -> Result<u64> {
        let result = sqlx::raw_sql(&statement.sql)
            .execute(self.pool()?)
            .await
            .map_err(|e| map_write_error(&statement.table, e))?;
        Ok(result.rows_affected())
    }

    async fn insert_document(&self, table: &str, doc: &TargetDocument) -> Result<i64> {
        self.write_document(&document_insert_sql(table), table, doc)
            .await
    }

    async fn upsert_document(&self, table: &str, doc: &TargetDocument) -> Result<DocumentWrite> {
        let existing = self.document_id(table, &doc.name).await?;
        let id = self
            .write_document(&document_upsert_sql(table), table, doc)
            .await?;

        // last_insert_id is 0 when the update was a no-op
        Ok(match existing {
            Some(existing_id) => DocumentWrite::Updated(existing_id),
            None => DocumentWrite::Inserted(id),
        })
    }

    async fn fetch_labels(&self, table: &str) -> Result<Vec<Label>> {
        let sql = format!("SELECT `id`, `name` FROM {} ORDER BY `id`", quote_ident(table));
        let rows: Vec<(i64, String)> = sqlx::query_as(&sql).fetch_all(self.pool()?).await?;
        Ok(rows
            .into_iter()
            .map(|(id, name)| Label { id, name })
            .collect())
    }

    async fn find_label(&self, table: &str, name: &str) -> Result<Option<Label>> {
        let sql = format!(
            "SELECT `id`, `name` FROM {} WHERE `name` = ?",
            quote_ident(table)
        );
        let row: Option<(i64, String)> = sqlx::query_as(&sql)
            .bind(name)
            .fetch_optional(self.pool()?)
            .await?;
        Ok(row.map(|(id, name)| Label { id, name }))
    }

    async fn count_rows(&self, table: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        let (count,): (i64,) = sqlx::query_as(&sql).fetch_one(self.pool()?).await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn truncate(&self, table: &str) -> Result<()> {
        let sql = format!("TRUNCATE TABLE {}", quote_ident(table));
        sqlx::raw_sql(&sql).execute(self.pool()?).await?;
        info!("Truncated {}", table);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(pool) = self.pool.take() {
            pool.close().await;
        }
        Ok(())
    }
}
