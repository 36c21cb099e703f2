//! In-memory target store for dry runs and tests.
//!
//! Tables are created from the same definitions as the MySQL DDL and enforce
//! the same primary, unique and foreign keys. Strict statements are applied
//! all-or-nothing; tolerant statements drop the rows that violate a key, the
//! way `INSERT IGNORE` does.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use crate::bulk::{InsertMode, InsertStatement};
use crate::config::TableNames;
use crate::error::{Error, Result};
use crate::model::{Label, TargetDocument};
use crate::schema::{table_defs, TableDef};
use crate::target::{DocumentWrite, TargetStore};
use crate::value::SqlValue;

const DOCUMENT_COLUMNS: [&str; 5] = ["name", "barcode", "date_of_scan", "date_of_receipt", "note"];

#[derive(Debug)]
struct MemoryTable {
    def: TableDef,
    rows: Vec<Vec<SqlValue>>,
    next_id: i64,
}

impl MemoryTable {
    fn new(def: TableDef) -> Self {
        Self {
            def,
            rows: Vec::new(),
            next_id: 1,
        }
    }

    /// Appends a row, filling the auto-increment column. Returns that id.
    fn push(&mut self, mut row: Vec<SqlValue>) -> i64 {
        let mut id = 0;
        if let Some(idx) = self.def.auto_increment.and_then(|c| self.def.column_index(c)) {
            match row[idx].as_i64() {
                Some(given) => {
                    id = given;
                    self.next_id = self.next_id.max(given + 1);
                }
                None => {
                    id = self.next_id;
                    row[idx] = SqlValue::I64(id);
                    self.next_id += 1;
                }
            }
        }
        self.rows.push(row);
        id
    }

    fn value<'a>(&self, row: &'a [SqlValue], column: &str) -> Result<&'a SqlValue> {
        self.def
            .column_index(column)
            .map(|idx| &row[idx])
            .ok_or_else(|| unknown_column(&self.def.name, column))
    }
}

enum Violation {
    Duplicate(String),
    ForeignKey(String),
    NotNull(String),
}

/// In-memory target store.
#[derive(Debug, Default)]
pub struct MemoryTarget {
    tables: Mutex<HashMap<String, MemoryTable>>,
    faults: Mutex<Faults>,
}

#[derive(Debug, Default)]
struct Faults {
    fail_inserts: HashSet<String>,
    under_report: HashSet<String>,
}

impl MemoryTarget {
    /// Creates an empty store without tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with all target tables already created.
    #[must_use]
    pub fn with_schema(tables: &TableNames) -> Self {
        let map = table_defs(tables)
            .into_iter()
            .map(|def| (def.name.clone(), MemoryTable::new(def)))
            .collect();
        Self {
            tables: Mutex::new(map),
            faults: Mutex::default(),
        }
    }

    /// All rows of `table`, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error when the table does not exist.
    pub fn rows(&self, table: &str) -> Result<Vec<Vec<SqlValue>>> {
        let tables = self.lock()?;
        Ok(get_table(&tables, table)?.rows.clone())
    }

    /// One column of `table`, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error when the table or column does not exist.
    pub fn column_values(&self, table: &str, column: &str) -> Result<Vec<SqlValue>> {
        let tables = self.lock()?;
        let t = get_table(&tables, table)?;
        let idx = t
            .def
            .column_index(column)
            .ok_or_else(|| unknown_column(table, column))?;
        Ok(t.rows.iter().map(|row| row[idx].clone()).collect())
    }

    /// Make every later insert into `table` fail like a dropped connection.
    #[cfg(test)]
    pub(crate) fn fail_inserts_into(&self, table: &str) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.fail_inserts.insert(table.to_string());
        }
    }

    /// Make bulk inserts into `table` report one row fewer than written.
    #[cfg(test)]
    pub(crate) fn under_report_inserts_into(&self, table: &str) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.under_report.insert(table.to_string());
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, MemoryTable>>> {
        self.tables
            .lock()
            .map_err(|_| Error::Loading("memory store lock poisoned".to_string()))
    }

    fn check_faults(&self, table: &str) -> Result<bool> {
        let faults = self
            .faults
            .lock()
            .map_err(|_| Error::Loading("memory store lock poisoned".to_string()))?;
        if faults.fail_inserts.contains(table) {
            return Err(Error::Loading(format!(
                "connection lost while writing to '{}'",
                table
            )));
        }
        Ok(faults.under_report.contains(table))
    }

    fn insert_document_locked(
        tables: &mut HashMap<String, MemoryTable>,
        table: &str,
        doc: &TargetDocument,
    ) -> Result<i64> {
        let columns: Vec<String> = DOCUMENT_COLUMNS.iter().map(|c| (*c).to_string()).collect();
        let t = get_table(tables, table)?;
        let row = build_row(&t.def, &columns, &document_values(doc))?;
        match check_row(tables, &t.def, &row, &[]) {
            Some(Violation::Duplicate(msg)) => return Err(Error::duplicate_key(table, msg)),
            Some(Violation::ForeignKey(msg) | Violation::NotNull(msg)) => {
                return Err(Error::Loading(msg))
            }
            None => {}
        }
        Ok(get_table_mut(tables, table)?.push(row))
    }
}

fn document_values(doc: &TargetDocument) -> Vec<SqlValue> {
    vec![
        SqlValue::from(doc.name.as_str()),
        SqlValue::from(doc.barcode.as_str()),
        SqlValue::from(doc.date_of_scan),
        SqlValue::from(doc.date_of_receipt),
        SqlValue::from(doc.note.as_str()),
    ]
}

fn missing_table(table: &str) -> Error {
    Error::Loading(format!("Table '{}' doesn't exist", table))
}

fn unknown_column(table: &str, column: &str) -> Error {
    Error::Loading(format!("Unknown column '{}' in '{}'", column, table))
}

fn get_table<'a>(tables: &'a HashMap<String, MemoryTable>, table: &str) -> Result<&'a MemoryTable> {
    tables.get(table).ok_or_else(|| missing_table(table))
}

fn get_table_mut<'a>(
    tables: &'a mut HashMap<String, MemoryTable>,
    table: &str,
) -> Result<&'a mut MemoryTable> {
    tables.get_mut(table).ok_or_else(|| missing_table(table))
}

/// Expands the given columns into a full row; absent columns are NULL.
fn build_row(def: &TableDef, columns: &[String], values: &[SqlValue]) -> Result<Vec<SqlValue>> {
    if columns.len() != values.len() {
        return Err(Error::Loading(format!(
            "Column count doesn't match value count in '{}'",
            def.name
        )));
    }

    let mut row = vec![SqlValue::Null; def.columns.len()];
    for (column, value) in columns.iter().zip(values) {
        let idx = def
            .column_index(column)
            .ok_or_else(|| unknown_column(&def.name, column))?;
        row[idx] = value.clone();
    }
    Ok(row)
}

/// Looks for a foreign key or unique key violation of `row` against the
/// stored rows and the rows already accepted from the same statement.
fn check_row(
    tables: &HashMap<String, MemoryTable>,
    def: &TableDef,
    row: &[SqlValue],
    pending: &[Vec<SqlValue>],
) -> Option<Violation> {
    // every column is NOT NULL; the auto-increment one is filled on push
    for (column, value) in def.columns.iter().zip(row) {
        if value.is_null() && def.auto_increment != Some(column.name) {
            return Some(Violation::NotNull(format!(
                "Column '{}' cannot be null",
                column.name
            )));
        }
    }

    for fk in &def.foreign_keys {
        let Some(idx) = def.column_index(fk.column) else {
            continue;
        };
        let value = &row[idx];
        if value.is_null() {
            continue;
        }
        let found = tables.get(&fk.ref_table).is_some_and(|parent| {
            parent
                .def
                .column_index(fk.ref_column)
                .is_some_and(|ref_idx| parent.rows.iter().any(|r| &r[ref_idx] == value))
        });
        if !found {
            return Some(Violation::ForeignKey(format!(
                "Cannot add or update a child row: foreign key constraint fails ({}.{} -> {}.{} = {})",
                def.name,
                fk.column,
                fk.ref_table,
                fk.ref_column,
                value.to_sql_literal()
            )));
        }
    }

    let existing = tables.get(&def.name).map(|t| t.rows.as_slice()).unwrap_or(&[]);
    for key in def.key_indexes() {
        if key.is_empty() || key.iter().any(|&i| row[i].is_null()) {
            continue;
        }
        let same_key = |other: &Vec<SqlValue>| key.iter().all(|&i| other[i] == row[i]);
        if existing.iter().chain(pending).any(same_key) {
            let entry: Vec<String> = key.iter().map(|&i| row[i].to_sql_literal()).collect();
            let names: Vec<&str> = key.iter().map(|&i| def.columns[i].name).collect();
            return Some(Violation::Duplicate(format!(
                "Duplicate entry {} for key '{}'",
                entry.join("-"),
                names.join("_")
            )));
        }
    }
    None
}

#[async_trait]
impl TargetStore for MemoryTarget {
    fn target_type(&self) -> &'static str {
        "memory"
    }

    async fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    async fn ensure_schema(&self, tables: &TableNames) -> Result<()> {
        let mut map = self.lock()?;
        for def in table_defs(tables) {
            map.entry(def.name.clone())
                .or_insert_with(|| MemoryTable::new(def));
        }
        Ok(())
    }

    async fn execute_insert(&self, statement: &InsertStatement) -> Result<u64> {
        let under_report = self.check_faults(&statement.table)?;
        let mut tables = self.lock()?;
        let def = get_table(&tables, &statement.table)?.def.clone();

        let mut accepted: Vec<Vec<SqlValue>> = Vec::with_capacity(statement.rows.len());
        for values in &statement.rows {
            let row = build_row(&def, &statement.columns, values)?;
            match (check_row(&tables, &def, &row, &accepted), statement.mode) {
                (None, _) => accepted.push(row),
                (Some(_), InsertMode::Tolerant) => {}
                (Some(Violation::Duplicate(msg)), InsertMode::Strict) => {
                    return Err(Error::duplicate_key(&statement.table, msg));
                }
                (
                    Some(Violation::ForeignKey(msg) | Violation::NotNull(msg)),
                    InsertMode::Strict,
                ) => {
                    return Err(Error::Loading(msg));
                }
            }
        }

        let written = accepted.len() as u64;
        let table = get_table_mut(&mut tables, &statement.table)?;
        for row in accepted {
            table.push(row);
        }

        if under_report {
            Ok(written.saturating_sub(1))
        } else {
            Ok(written)
        }
    }

    async fn insert_document(&self, table: &str, doc: &TargetDocument) -> Result<i64> {
        self.check_faults(table)?;
        let mut tables = self.lock()?;
        Self::insert_document_locked(&mut tables, table, doc)
    }

    async fn upsert_document(&self, table: &str, doc: &TargetDocument) -> Result<DocumentWrite> {
        self.check_faults(table)?;
        let mut tables = self.lock()?;
        let t = get_table_mut(&mut tables, table)?;
        let name_idx = t
            .def
            .column_index("name")
            .ok_or_else(|| unknown_column(table, "name"))?;

        let existing = t
            .rows
            .iter()
            .position(|row| row[name_idx].as_str() == Some(doc.name.as_str()));

        if let Some(pos) = existing {
            let values = document_values(doc);
            for (column, value) in DOCUMENT_COLUMNS.iter().zip(values).skip(1) {
                let idx = t
                    .def
                    .column_index(column)
                    .ok_or_else(|| unknown_column(table, column))?;
                t.rows[pos][idx] = value;
            }
            let id = t.value(&t.rows[pos], "id")?.as_i64().unwrap_or_default();
            return Ok(DocumentWrite::Updated(id));
        }

        Self::insert_document_locked(&mut tables, table, doc).map(DocumentWrite::Inserted)
    }

    async fn fetch_labels(&self, table: &str) -> Result<Vec<Label>> {
        let tables = self.lock()?;
        let t = get_table(&tables, table)?;
        t.rows
            .iter()
            .map(|row| -> Result<Label> {
                Ok(Label {
                    id: t.value(row, "id")?.as_i64().unwrap_or_default(),
                    name: t.value(row, "name")?.as_str().unwrap_or_default().to_string(),
                })
            })
            .collect()
    }

    async fn find_label(&self, table: &str, name: &str) -> Result<Option<Label>> {
        Ok(self
            .fetch_labels(table)
            .await?
            .into_iter()
            .find(|label| label.name == name))
    }

    async fn count_rows(&self, table: &str) -> Result<u64> {
        let tables = self.lock()?;
        Ok(get_table(&tables, table)?.rows.len() as u64)
    }

    async fn truncate(&self, table: &str) -> Result<()> {
        let mut tables = self.lock()?;
        let t = get_table_mut(&mut tables, table)?;
        t.rows.clear();
        t.next_id = 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
