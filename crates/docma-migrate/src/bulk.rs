//! Size-bounded multi-row inserts.
//!
//! Rows are rendered to SQL literals and packed into `INSERT ... VALUES`
//! statements. A statement is flushed before the next tuple would push its
//! text past the byte budget, so every multi-row statement fits. A row that
//! exceeds the budget on its own still gets sent, alone.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::target::TargetStore;
use crate::value::{quote_ident, render_tuple, SqlValue};

/// Default per-statement budget in bytes of SQL text.
pub const MAX_STATEMENT_BYTES: usize = 1_000_000;

/// Conflict handling of a bulk insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsertMode {
    /// Plain `INSERT`: a key collision fails the statement.
    #[default]
    Strict,
    /// `INSERT IGNORE`: colliding rows are skipped.
    Tolerant,
}

impl InsertMode {
    fn verb(self) -> &'static str {
        match self {
            InsertMode::Strict => "INSERT INTO",
            InsertMode::Tolerant => "INSERT IGNORE INTO",
        }
    }
}

impl std::fmt::Display for InsertMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InsertMode::Strict => write!(f, "strict"),
            InsertMode::Tolerant => write!(f, "tolerant"),
        }
    }
}

/// One flushed statement: the SQL text plus the rows it carries.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    /// Target table.
    pub table: String,
    /// Column list, in tuple order.
    pub columns: Vec<String>,
    /// Conflict handling.
    pub mode: InsertMode,
    /// Rows packed into this statement.
    pub rows: Vec<Vec<SqlValue>>,
    /// Rendered SQL text.
    pub sql: String,
}

/// Accumulates rendered tuples until the byte budget is reached.
#[derive(Debug)]
pub struct StatementBuffer {
    table: String,
    columns: Vec<String>,
    mode: InsertMode,
    prefix: String,
    max_bytes: usize,
    sql: String,
    rows: Vec<Vec<SqlValue>>,
}

impl StatementBuffer {
    /// Create an empty buffer for `table`.
    #[must_use]
    pub fn new(table: &str, columns: &[&str], mode: InsertMode, max_bytes: usize) -> Self {
        let quoted: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
        let prefix = format!(
            "{} {} ({}) VALUES",
            mode.verb(),
            quote_ident(table),
            quoted.join(", ")
        );

        Self {
            table: table.to_string(),
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            mode,
            prefix,
            max_bytes,
            sql: String::new(),
            rows: Vec::new(),
        }
    }

    /// Length of the fixed `INSERT ... VALUES` prefix.
    #[must_use]
    pub fn prefix_len(&self) -> usize {
        self.prefix.len()
    }

    /// Add a row. Returns the previous statement when this row did not fit.
    pub fn push(&mut self, values: Vec<SqlValue>) -> Option<InsertStatement> {
        let tuple = render_tuple(&values);

        if self.rows.is_empty() {
            self.start(tuple, values);
            return None;
        }

        if self.sql.len() + 1 + tuple.len() > self.max_bytes {
            let flushed = self.take();
            self.start(tuple, values);
            return Some(flushed);
        }

        self.sql.push(',');
        self.sql.push_str(&tuple);
        self.rows.push(values);
        None
    }

    /// Flush whatever is left.
    #[must_use]
    pub fn finish(mut self) -> Option<InsertStatement> {
        if self.rows.is_empty() {
            None
        } else {
            Some(self.take())
        }
    }

    fn start(&mut self, tuple: String, values: Vec<SqlValue>) {
        self.sql = format!("{} {}", self.prefix, tuple);
        self.rows.push(values);
    }

    fn take(&mut self) -> InsertStatement {
        InsertStatement {
            table: self.table.clone(),
            columns: self.columns.clone(),
            mode: self.mode,
            rows: std::mem::take(&mut self.rows),
            sql: std::mem::take(&mut self.sql),
        }
    }
}

/// Split `rows` into statements without executing them.
pub fn plan_statements<T, F>(
    table: &str,
    columns: &[&str],
    mode: InsertMode,
    max_bytes: usize,
    rows: &[T],
    render: F,
) -> Vec<InsertStatement>
where
    F: Fn(&T) -> Vec<SqlValue>,
{
    let mut buffer = StatementBuffer::new(table, columns, mode, max_bytes);
    let mut statements: Vec<InsertStatement> = rows
        .iter()
        .filter_map(|row| buffer.push(render(row)))
        .collect();
    statements.extend(buffer.finish());
    statements
}

/// Outcome of one bulk insert.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BulkInsertStats {
    /// Statements executed.
    pub statements: u64,
    /// Rows sent.
    pub rows: u64,
    /// Rows the store reported as written.
    pub inserted: u64,
}

impl std::ops::AddAssign for BulkInsertStats {
    fn add_assign(&mut self, other: Self) {
        self.statements += other.statements;
        self.rows += other.rows;
        self.inserted += other.inserted;
    }
}

/// Executes size-bounded inserts against a target store.
pub struct BulkInserter<'a> {
    target: &'a dyn TargetStore,
    max_statement_bytes: usize,
}

impl<'a> BulkInserter<'a> {
    /// Create an inserter with the given statement budget.
    #[must_use]
    pub fn new(target: &'a dyn TargetStore, max_statement_bytes: usize) -> Self {
        Self {
            target,
            max_statement_bytes,
        }
    }

    /// Insert `rows` into `table`, flushing statements in input order.
    ///
    /// Statements are not wrapped in a transaction: when one fails, the ones
    /// before it stay committed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateKey`] when a strict statement collides, any
    /// store error unchanged, and [`Error::BatchSizeMismatch`] when the rows
    /// sent (or, in strict mode, the rows written) differ from the input count.
    pub async fn insert<T, F>(
        &self,
        table: &str,
        columns: &[&str],
        mode: InsertMode,
        rows: &[T],
        render: F,
    ) -> Result<BulkInsertStats>
    where
        T: Sync,
        F: Fn(&T) -> Vec<SqlValue> + Send + Sync,
    {
        let mut stats = BulkInsertStats::default();
        if rows.is_empty() {
            return Ok(stats);
        }

        let mut buffer = StatementBuffer::new(table, columns, mode, self.max_statement_bytes);
        for row in rows {
            if let Some(statement) = buffer.push(render(row)) {
                self.execute(&statement, &mut stats).await?;
            }
        }
        if let Some(statement) = buffer.finish() {
            self.execute(&statement, &mut stats).await?;
        }

        let expected = rows.len() as u64;
        if stats.rows != expected {
            return Err(Error::BatchSizeMismatch {
                table: table.to_string(),
                expected,
                actual: stats.rows,
            });
        }
        if mode == InsertMode::Strict && stats.inserted != expected {
            return Err(Error::BatchSizeMismatch {
                table: table.to_string(),
                expected,
                actual: stats.inserted,
            });
        }

        Ok(stats)
    }

    async fn execute(
        &self,
        statement: &InsertStatement,
        stats: &mut BulkInsertStats,
    ) -> Result<()> {
        let affected = self.target.execute_insert(statement).await?;
        debug!(
            "{} insert into {}: {} rows, {} bytes, {} written",
            statement.mode,
            statement.table,
            statement.rows.len(),
            statement.sql.len(),
            affected
        );

        stats.statements += 1;
        stats.rows += statement.rows.len() as u64;
        stats.inserted += affected;
        Ok(())
    }
}

#[cfg(test)]
#[path = "bulk_tests.rs"]
mod tests;
