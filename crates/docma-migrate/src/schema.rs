//! Target table definitions.
//!
//! Both target stores build their tables from these definitions, so the MySQL
//! DDL and the in-memory dry-run store enforce the same keys.

use crate::config::TableNames;
use crate::value::quote_ident;

/// Table collation. Binary and NO PAD, so names compare byte for byte and a
/// trailing space makes a different key.
pub const COLLATION: &str = "utf8mb4_0900_bin";

/// Columns written when creating labels.
pub const LABEL_COLUMNS: &[&str] = &["name"];
/// Columns written for document numbers.
pub const DOC_NUMBER_COLUMNS: &[&str] = &["doc_id", "number"];
/// Columns written for document account data.
pub const DOC_ACCOUNT_DATA_COLUMNS: &[&str] =
    &["doc_id", "account_number", "period_from", "period_to"];
/// Columns written for document/label links.
pub const DOC_LABEL_COLUMNS: &[&str] = &["doc_id", "label_id"];
/// Columns written for accounting transactions.
pub const ACCOUNTING_COLUMNS: &[&str] = &[
    "doc_date",
    "date_of_entry",
    "doc_number_range",
    "doc_number",
    "posting_text",
    "amount_posted",
    "debit_account",
    "credit_account",
    "tax_code",
    "cost_unit1",
    "cost_unit2",
    "amount_posted_euro",
    "currency",
];

/// A column definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    /// Column name.
    pub name: &'static str,
    /// MySQL column type.
    pub sql_type: &'static str,
}

/// A foreign key from one column to another table's column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyDef {
    /// Referencing column.
    pub column: &'static str,
    /// Referenced table.
    pub ref_table: String,
    /// Referenced column.
    pub ref_column: &'static str,
}

/// A table definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    /// Table name.
    pub name: String,
    /// Columns in storage order.
    pub columns: Vec<ColumnDef>,
    /// Column filled from the table's counter when not provided.
    pub auto_increment: Option<&'static str>,
    /// Primary key columns.
    pub primary_key: Vec<&'static str>,
    /// Single-column unique keys besides the primary key.
    pub unique: Vec<&'static str>,
    /// Foreign keys.
    pub foreign_keys: Vec<ForeignKeyDef>,
}

impl TableDef {
    /// Position of `column` in [`TableDef::columns`].
    #[must_use]
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == column)
    }

    /// Every unique key (primary key first) as column positions.
    #[must_use]
    pub fn key_indexes(&self) -> Vec<Vec<usize>> {
        let mut keys = vec![self.primary_key.clone()];
        keys.extend(self.unique.iter().map(|c| vec![*c]));
        keys.into_iter()
            .map(|cols| cols.iter().filter_map(|c| self.column_index(c)).collect())
            .collect()
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for MySQL.
    #[must_use]
    pub fn create_sql(&self) -> String {
        let mut defs: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                let auto = if self.auto_increment == Some(c.name) {
                    " AUTO_INCREMENT"
                } else {
                    ""
                };
                format!("{} {} NOT NULL{}", quote_ident(c.name), c.sql_type, auto)
            })
            .collect();

        let pk: Vec<String> = self.primary_key.iter().map(|c| quote_ident(c)).collect();
        defs.push(format!("PRIMARY KEY ({})", pk.join(", ")));

        for column in &self.unique {
            defs.push(format!(
                "UNIQUE KEY {} ({})",
                quote_ident(&format!("uq_{}_{}", self.name, column)),
                quote_ident(column)
            ));
        }

        for fk in &self.foreign_keys {
            defs.push(format!(
                "FOREIGN KEY ({}) REFERENCES {} ({})",
                quote_ident(fk.column),
                quote_ident(&fk.ref_table),
                quote_ident(fk.ref_column)
            ));
        }

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE={}",
            quote_ident(&self.name),
            defs.join(",\n    "),
            COLLATION
        )
    }
}

fn col(name: &'static str, sql_type: &'static str) -> ColumnDef {
    ColumnDef { name, sql_type }
}

fn fk(column: &'static str, ref_table: &str) -> ForeignKeyDef {
    ForeignKeyDef {
        column,
        ref_table: ref_table.to_string(),
        ref_column: "id",
    }
}

/// All target tables, referenced tables first.
#[must_use]
pub fn table_defs(tables: &TableNames) -> Vec<TableDef> {
    vec![
        TableDef {
            name: tables.labels.clone(),
            columns: vec![col("id", "BIGINT"), col("name", "VARCHAR(255)")],
            auto_increment: Some("id"),
            primary_key: vec!["id"],
            unique: vec!["name"],
            foreign_keys: vec![],
        },
        TableDef {
            name: tables.docs.clone(),
            columns: vec![
                col("id", "BIGINT"),
                col("name", "VARCHAR(255)"),
                col("barcode", "VARCHAR(255)"),
                col("date_of_scan", "DATETIME(6)"),
                col("date_of_receipt", "DATETIME(6)"),
                col("note", "TEXT"),
            ],
            auto_increment: Some("id"),
            primary_key: vec!["id"],
            unique: vec!["name"],
            foreign_keys: vec![],
        },
        TableDef {
            name: tables.doc_numbers.clone(),
            columns: vec![col("doc_id", "BIGINT"), col("number", "VARCHAR(255)")],
            auto_increment: None,
            primary_key: vec!["doc_id", "number"],
            unique: vec![],
            foreign_keys: vec![fk("doc_id", &tables.docs)],
        },
        TableDef {
            name: tables.doc_account_data.clone(),
            columns: vec![
                col("doc_id", "BIGINT"),
                col("account_number", "BIGINT"),
                col("period_from", "DATETIME(6)"),
                col("period_to", "DATETIME(6)"),
            ],
            auto_increment: None,
            primary_key: vec!["doc_id"],
            unique: vec![],
            foreign_keys: vec![fk("doc_id", &tables.docs)],
        },
        TableDef {
            name: tables.docs_labels.clone(),
            columns: vec![col("doc_id", "BIGINT"), col("label_id", "BIGINT")],
            auto_increment: None,
            primary_key: vec!["doc_id", "label_id"],
            unique: vec![],
            foreign_keys: vec![fk("doc_id", &tables.docs), fk("label_id", &tables.labels)],
        },
        TableDef {
            name: tables.accounting_data.clone(),
            columns: vec![
                col("id", "BIGINT"),
                col("doc_date", "DATETIME(6)"),
                col("date_of_entry", "DATETIME(6)"),
                col("doc_number_range", "VARCHAR(255)"),
                col("doc_number", "VARCHAR(255)"),
                col("posting_text", "TEXT"),
                col("amount_posted", "DOUBLE"),
                col("debit_account", "BIGINT"),
                col("credit_account", "BIGINT"),
                col("tax_code", "BIGINT"),
                col("cost_unit1", "VARCHAR(255)"),
                col("cost_unit2", "VARCHAR(255)"),
                col("amount_posted_euro", "DOUBLE"),
                col("currency", "VARCHAR(16)"),
            ],
            auto_increment: Some("id"),
            primary_key: vec!["id"],
            unique: vec![],
            foreign_keys: vec![],
        },
    ]
}
