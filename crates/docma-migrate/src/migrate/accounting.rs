//! Accounting transaction migration.

use tracing::info;

use crate::bulk::{BulkInsertStats, BulkInserter, InsertMode};
use crate::config::MigrationConfig;
use crate::error::{Error, Result};
use crate::model::{to_naive, AccountingTransaction};
use crate::schema::ACCOUNTING_COLUMNS;
use crate::target::TargetStore;
use crate::value::SqlValue;

/// Renders a transaction in [`ACCOUNTING_COLUMNS`] order.
#[must_use]
pub fn accounting_row(tx: &AccountingTransaction) -> Vec<SqlValue> {
    vec![
        SqlValue::from(to_naive(tx.doc_date)),
        SqlValue::from(to_naive(tx.date_of_entry)),
        SqlValue::from(tx.doc_number_range.as_str()),
        SqlValue::from(tx.doc_number.as_str()),
        SqlValue::from(tx.posting_text.as_str()),
        SqlValue::F64(tx.amount_posted),
        SqlValue::I64(tx.debit_acc),
        SqlValue::I64(tx.credit_acc),
        SqlValue::I64(tx.tax_code),
        SqlValue::from(tx.cost_unit1.as_str()),
        SqlValue::from(tx.cost_unit2.as_str()),
        SqlValue::F64(tx.amount_posted_euro),
        SqlValue::from(tx.currency.as_str()),
    ]
}

/// Copies accounting transactions; they have no relation to documents.
pub struct AccountingMigrator<'a> {
    target: &'a dyn TargetStore,
    table: &'a str,
    mode: InsertMode,
    max_statement_bytes: usize,
}

impl<'a> AccountingMigrator<'a> {
    /// Create an accounting migrator for `config`.
    #[must_use]
    pub fn new(target: &'a dyn TargetStore, config: &'a MigrationConfig) -> Self {
        Self {
            target,
            table: &config.tables.accounting_data,
            mode: config.options.accounting_insert_mode,
            max_statement_bytes: config.options.max_statement_bytes,
        }
    }

    /// Persist `transactions` in source order.
    ///
    /// # Errors
    ///
    /// Fails on a non-finite amount before anything is written, and on any
    /// bulk insert failure.
    pub async fn migrate(&self, transactions: &[AccountingTransaction]) -> Result<BulkInsertStats> {
        if let Some(tx) = transactions
            .iter()
            .find(|tx| !tx.amount_posted.is_finite() || !tx.amount_posted_euro.is_finite())
        {
            return Err(Error::Loading(format!(
                "Transaction '{}' has a non-finite amount",
                tx.doc_number
            )));
        }

        let stats = BulkInserter::new(self.target, self.max_statement_bytes)
            .insert(
                self.table,
                ACCOUNTING_COLUMNS,
                self.mode,
                transactions,
                accounting_row,
            )
            .await?;
        info!(
            "Accounting: {} transactions in {} statements",
            stats.inserted, stats.statements
        );
        Ok(stats)
    }
}
