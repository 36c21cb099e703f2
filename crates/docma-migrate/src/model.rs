//! Source records and target rows.
//!
//! Source shapes mirror the documents in the legacy collections, whose field
//! names are the lower-cased struct field names of the program that wrote them.

use bson::oid::ObjectId;
use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

use crate::filename::zero_date;

/// A document as stored in the source `Docs` collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceDocument {
    /// Opaque source key.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    /// Document name, usually the scanned filename.
    #[serde(default)]
    pub name: String,
    /// Barcode printed on the scan.
    #[serde(default)]
    pub barcode: String,
    /// Scan and receipt dates.
    #[serde(default)]
    pub infos: DocInfos,
    /// Free-form note.
    #[serde(default)]
    pub note: String,
    /// Accounting metadata.
    #[serde(rename = "accountdata", default)]
    pub account_data: DocAccountInfo,
    /// Label names in source order; may contain duplicates and empty entries.
    #[serde(default, deserialize_with = "null_as_default")]
    pub labels: Vec<String>,
}

impl SourceDocument {
    /// Human readable identity for log messages.
    #[must_use]
    pub fn display_key(&self) -> String {
        match &self.id {
            Some(id) if self.name.is_empty() => id.to_hex(),
            Some(id) => format!("{} ({})", self.name, id.to_hex()),
            None => self.name.clone(),
        }
    }
}

/// Scan and receipt dates of a source document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocInfos {
    /// When the document was scanned.
    #[serde(rename = "dateofscan", default)]
    pub date_of_scan: Option<bson::DateTime>,
    /// When the document was received.
    #[serde(rename = "dateofreceipt", default)]
    pub date_of_receipt: Option<bson::DateTime>,
}

/// Accounting metadata of a source document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocAccountInfo {
    /// Free-form document numbers.
    #[serde(rename = "docnumbers", default, deserialize_with = "null_as_default")]
    pub doc_numbers: Vec<String>,
    /// Accounting period the document belongs to.
    #[serde(rename = "docperiod", default)]
    pub doc_period: DocPeriod,
    /// Account number.
    #[serde(rename = "accnumber", default)]
    pub acc_number: i64,
}

/// Accounting period range.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocPeriod {
    /// Start of the period.
    #[serde(default)]
    pub from: Option<bson::DateTime>,
    /// End of the period.
    #[serde(default)]
    pub to: Option<bson::DateTime>,
}

/// An accounting transaction as stored in the source `AccProcess` collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountingTransaction {
    /// Opaque source key.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    /// Document date.
    #[serde(rename = "docdate", default)]
    pub doc_date: Option<bson::DateTime>,
    /// Date the posting was entered.
    #[serde(rename = "dateofentry", default)]
    pub date_of_entry: Option<bson::DateTime>,
    /// Document number range.
    #[serde(rename = "docnumberrange", default)]
    pub doc_number_range: String,
    /// Document number.
    #[serde(rename = "docnumber", default)]
    pub doc_number: String,
    /// Posting text.
    #[serde(rename = "postingtext", default)]
    pub posting_text: String,
    /// Amount posted.
    #[serde(rename = "amountposted", default)]
    pub amount_posted: f64,
    /// Debit account.
    #[serde(rename = "debitacc", default)]
    pub debit_acc: i64,
    /// Credit account.
    #[serde(rename = "creditacc", default)]
    pub credit_acc: i64,
    /// Tax code.
    #[serde(rename = "taxcode", default)]
    pub tax_code: i64,
    /// First cost unit.
    #[serde(rename = "costunit1", default)]
    pub cost_unit1: String,
    /// Second cost unit.
    #[serde(rename = "costunit2", default)]
    pub cost_unit2: String,
    /// Amount posted in euro.
    #[serde(rename = "amountpostedeuro", default)]
    pub amount_posted_euro: f64,
    /// Currency code.
    #[serde(default)]
    pub currency: String,
}

/// A label row of the target store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    /// Identifier assigned by the target store.
    pub id: i64,
    /// Unique label name.
    pub name: String,
}

/// A document row of the target store. `name` is the natural key.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetDocument {
    /// Unique document name.
    pub name: String,
    /// Barcode.
    pub barcode: String,
    /// Note.
    pub note: String,
    /// Scan date.
    pub date_of_scan: NaiveDateTime,
    /// Receipt date.
    pub date_of_receipt: NaiveDateTime,
}

/// A free-form number owned by a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocNumber {
    /// Owning document.
    pub doc_id: i64,
    /// Number string.
    pub number: String,
}

/// Accounting-period metadata of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocAccountData {
    /// Owning document.
    pub doc_id: i64,
    /// Account number.
    pub account_number: i64,
    /// Start of the period.
    pub period_from: NaiveDateTime,
    /// End of the period.
    pub period_to: NaiveDateTime,
}

/// Association between a document and a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocLabelLink {
    /// Linked document.
    pub doc_id: i64,
    /// Linked label.
    pub label_id: i64,
}

/// Label name to identifier map, built once per run from the persisted labels.
#[derive(Debug, Clone, Default)]
pub struct LabelIndex {
    ids: HashMap<String, i64>,
}

impl LabelIndex {
    /// Build the index from persisted labels.
    pub fn from_labels(labels: impl IntoIterator<Item = Label>) -> Self {
        Self {
            ids: labels.into_iter().map(|l| (l.name, l.id)).collect(),
        }
    }

    /// Look up the identifier of `name`.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<i64> {
        self.ids.get(name).copied()
    }

    /// Number of labels in the index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the index holds no labels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Converts a source timestamp to the zone-less UTC wall-clock value stored in
/// the target. Absent timestamps become the zero date.
#[must_use]
pub fn to_naive(value: Option<bson::DateTime>) -> NaiveDateTime {
    value.map_or_else(zero_date, |dt| dt.to_chrono().naive_utc())
}

/// Removes repeated and empty names, keeping the first occurrence of each.
#[must_use]
pub fn dedup_names(names: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    names
        .into_iter()
        .filter(|name| !name.is_empty() && seen.insert(name.clone()))
        .collect()
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
